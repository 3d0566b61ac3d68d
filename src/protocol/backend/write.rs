//! Backend message writers.
//!
//! These produce the byte stream a server would send, for scripting mock
//! servers and tests against the cursor.

use crate::error::ErrorFields;
use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::{FormatCode, Oid, TransactionStatus, oid};

use super::error::field_type;
use super::msg_type;

/// Write a RowDescription message.
///
/// Each field is `(name, type_oid, format)`; table OID, attribute number and
/// type modifier are written as "not a table column".
pub fn write_row_description(buf: &mut Vec<u8>, fields: &[(&str, Oid, FormatCode)]) {
    let mut msg = MessageBuilder::new(buf, msg_type::ROW_DESCRIPTION);
    msg.write_u16(fields.len() as u16);
    for &(name, type_oid, format) in fields {
        msg.write_cstr(name);
        msg.write_u32(0); // table oid
        msg.write_i16(0); // column attribute number
        msg.write_u32(type_oid);
        msg.write_i16(-1); // type size
        msg.write_i32(-1); // type modifier
        msg.write_u16(format as u16);
    }
    msg.finish();
}

/// Write a DataRow message. `None` columns are sent as NULL.
pub fn write_data_row(buf: &mut Vec<u8>, columns: &[Option<&[u8]>]) {
    let mut msg = MessageBuilder::new(buf, msg_type::DATA_ROW);
    msg.write_u16(columns.len() as u16);
    for column in columns {
        match column {
            Some(value) => {
                msg.write_i32(value.len() as i32);
                msg.write_bytes(value);
            }
            None => msg.write_i32(-1),
        }
    }
    msg.finish();
}

/// Write a CommandComplete message with the given command tag.
pub fn write_command_complete(buf: &mut Vec<u8>, tag: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::COMMAND_COMPLETE);
    msg.write_cstr(tag);
    msg.finish();
}

/// Write an EmptyQueryResponse message.
pub fn write_empty_query_response(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, msg_type::EMPTY_QUERY_RESPONSE).finish();
}

/// Write a ReadyForQuery message.
pub fn write_ready_for_query(buf: &mut Vec<u8>, status: TransactionStatus) {
    let mut msg = MessageBuilder::new(buf, msg_type::READY_FOR_QUERY);
    msg.write_u8(status as u8);
    msg.finish();
}

fn write_fields(msg: &mut MessageBuilder<'_>, fields: &ErrorFields) {
    let pairs = [
        (field_type::SEVERITY, fields.severity.as_deref()),
        (
            field_type::SEVERITY_NON_LOCALIZED,
            fields.severity_non_localized.as_deref(),
        ),
        (field_type::CODE, fields.code.as_deref()),
        (field_type::MESSAGE, fields.message.as_deref()),
        (field_type::DETAIL, fields.detail.as_deref()),
        (field_type::HINT, fields.hint.as_deref()),
        (field_type::WHERE, fields.where_.as_deref()),
        (field_type::SCHEMA, fields.schema.as_deref()),
        (field_type::TABLE, fields.table.as_deref()),
        (field_type::COLUMN, fields.column.as_deref()),
        (field_type::CONSTRAINT, fields.constraint.as_deref()),
    ];
    for (code, value) in pairs {
        if let Some(value) = value {
            msg.write_u8(code);
            msg.write_cstr(value);
        }
    }
    if let Some(position) = fields.position {
        msg.write_u8(field_type::POSITION);
        msg.write_cstr(&position.to_string());
    }
    msg.write_u8(0);
}

/// Write an ErrorResponse message.
pub fn write_error_response(buf: &mut Vec<u8>, fields: &ErrorFields) {
    let mut msg = MessageBuilder::new(buf, msg_type::ERROR_RESPONSE);
    write_fields(&mut msg, fields);
    msg.finish();
}

/// Write a NoticeResponse message.
pub fn write_notice_response(buf: &mut Vec<u8>, fields: &ErrorFields) {
    let mut msg = MessageBuilder::new(buf, msg_type::NOTICE_RESPONSE);
    write_fields(&mut msg, fields);
    msg.finish();
}

/// Write a ParameterStatus message.
pub fn write_parameter_status(buf: &mut Vec<u8>, name: &str, value: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::PARAMETER_STATUS);
    msg.write_cstr(name);
    msg.write_cstr(value);
    msg.finish();
}

/// Write a NotificationResponse message.
pub fn write_notification(buf: &mut Vec<u8>, pid: u32, channel: &str, payload: &str) {
    let mut msg = MessageBuilder::new(buf, msg_type::NOTIFICATION_RESPONSE);
    msg.write_u32(pid);
    msg.write_cstr(channel);
    msg.write_cstr(payload);
    msg.finish();
}

/// Builder for the byte stream a server sends in answer to one command.
///
/// ```
/// use zero_postgres_cursor::protocol::backend::write::ResponseScript;
/// use zero_postgres_cursor::protocol::types::oid;
///
/// let bytes = ResponseScript::new()
///     .layout(&[("id", oid::INT4)])
///     .row(&[Some("1")])
///     .complete("SELECT 1")
///     .ready()
///     .build();
/// assert_eq!(bytes[0], b'T');
/// ```
#[derive(Debug, Default)]
pub struct ResponseScript {
    buf: Vec<u8>,
}

impl ResponseScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// RowDescription with text-format columns.
    pub fn layout(mut self, columns: &[(&str, Oid)]) -> Self {
        let fields: Vec<_> = columns
            .iter()
            .map(|&(name, type_oid)| (name, type_oid, FormatCode::Text))
            .collect();
        write_row_description(&mut self.buf, &fields);
        self
    }

    /// DataRow of text values.
    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        let columns: Vec<Option<&[u8]>> = values.iter().map(|v| v.map(str::as_bytes)).collect();
        write_data_row(&mut self.buf, &columns);
        self
    }

    /// DataRow of raw values, for binary-format columns.
    pub fn raw_row(mut self, values: &[Option<&[u8]>]) -> Self {
        write_data_row(&mut self.buf, values);
        self
    }

    pub fn complete(mut self, tag: &str) -> Self {
        write_command_complete(&mut self.buf, tag);
        self
    }

    pub fn empty(mut self) -> Self {
        write_empty_query_response(&mut self.buf);
        self
    }

    pub fn ready(self) -> Self {
        self.ready_with(TransactionStatus::Idle)
    }

    pub fn ready_with(mut self, status: TransactionStatus) -> Self {
        write_ready_for_query(&mut self.buf, status);
        self
    }

    /// ErrorResponse with both severity fields set.
    pub fn error(mut self, severity: &str, code: &str, message: &str) -> Self {
        write_error_response(
            &mut self.buf,
            &ErrorFields {
                severity: Some(severity.into()),
                severity_non_localized: Some(severity.into()),
                code: Some(code.into()),
                message: Some(message.into()),
                ..Default::default()
            },
        );
        self
    }

    pub fn notice(mut self, message: &str) -> Self {
        write_notice_response(
            &mut self.buf,
            &ErrorFields {
                severity: Some("NOTICE".into()),
                message: Some(message.into()),
                ..Default::default()
            },
        );
        self
    }

    pub fn parameter(mut self, name: &str, value: &str) -> Self {
        write_parameter_status(&mut self.buf, name, value);
        self
    }

    /// Append bytes as-is, e.g. a malformed message.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// A complete `SELECT n` statement: int4 column `n` holding 1..=n.
    pub fn select_ints(mut self, n: usize) -> Self {
        self = self.layout(&[("n", oid::INT4)]);
        for i in 1..=n {
            let value = i.to_string();
            write_data_row(&mut self.buf, &[Some(value.as_bytes())]);
        }
        self.complete(&format!("SELECT {}", n))
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}
