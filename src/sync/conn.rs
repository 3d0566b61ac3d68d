//! Synchronous connection: frames backend messages for cursors.

use std::collections::VecDeque;
use std::io::Read;

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::protocol::backend::{AsyncMessage, RawMessage, ReadyForQuery, msg_type};
use crate::protocol::types::TransactionStatus;
use crate::source::{ConnState, Connection, MessageSource, ReadMode};

use super::stream::Stream;

/// Synchronous connection over any readable byte stream.
///
/// Authentication and command submission happen elsewhere; this type reads the
/// server's response stream on behalf of a [`Cursor`](super::Cursor).
pub struct Conn<S> {
    stream: Stream<S>,
    state: ConnState,
    transaction_status: TransactionStatus,
    server_params: Vec<(String, String)>,
    async_messages: VecDeque<AsyncMessage>,
    messages_read: u64,
}

impl<S: Read> Conn<S> {
    /// Wrap a stream positioned at the start of a command's response.
    pub fn new(inner: S) -> Self {
        Self {
            stream: Stream::new(inner),
            state: ConnState::Executing,
            transaction_status: TransactionStatus::Idle,
            server_params: Vec::new(),
            async_messages: VecDeque::new(),
            messages_read: 0,
        }
    }

    /// Server parameters reported by ParameterStatus.
    pub fn server_params(&self) -> &[(String, String)] {
        &self.server_params
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// Returns true if currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.transaction_status.in_transaction()
    }

    /// Returns true if the connection is broken and cannot be reused.
    pub fn is_broken(&self) -> bool {
        self.state == ConnState::Broken
    }

    /// Number of messages read from the stream, including absorbed ones.
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Take the notices, notifications and parameter changes received so far.
    pub fn take_async_messages(&mut self) -> Vec<AsyncMessage> {
        self.async_messages.drain(..).collect()
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn absorb(&mut self, msg: RawMessage<'_>) -> Result<()> {
        let message = AsyncMessage::parse(msg)?;
        tracing::debug!("async message: {:?}", message);
        if let AsyncMessage::ParameterChanged { name, value } = &message {
            match self.server_params.iter_mut().find(|(n, _)| n == name) {
                Some(param) => param.1 = value.clone(),
                None => self.server_params.push((name.clone(), value.clone())),
            }
        }
        self.async_messages.push_back(message);
        Ok(())
    }

    fn read_message_inner(&mut self, buffer_set: &mut BufferSet, mode: ReadMode) -> Result<()> {
        loop {
            let (type_byte, len) = self.stream.read_header()?;
            self.messages_read += 1;
            buffer_set.type_byte = type_byte;

            if mode == ReadMode::Discard && type_byte == msg_type::DATA_ROW {
                self.stream.discard(len)?;
                buffer_set.read_buffer.clear();
                return Ok(());
            }

            self.stream.read_payload(&mut buffer_set.read_buffer, len)?;

            if RawMessage::is_async_type(type_byte) {
                self.absorb(RawMessage::new(type_byte, &buffer_set.read_buffer))?;
                continue;
            }

            if type_byte == msg_type::READY_FOR_QUERY {
                let ready = ReadyForQuery::parse(&buffer_set.read_buffer)?;
                if let Some(status) = ready.transaction_status() {
                    self.transaction_status = status;
                }
            }
            return Ok(());
        }
    }
}

impl<S: Read> MessageSource for Conn<S> {
    fn read_message(&mut self, buffer_set: &mut BufferSet, mode: ReadMode) -> Result<()> {
        match self.state {
            ConnState::Closed => return Err(Error::InvalidUsage("connection is closed".into())),
            ConnState::Broken => return Err(Error::ConnectionBroken),
            _ => {}
        }
        let result = self.read_message_inner(buffer_set, mode);
        if let Err(e) = &result {
            tracing::error!("connection broken while reading: {}", e);
            self.state = ConnState::Broken;
        }
        result
    }
}

impl<S: Read> Connection for Conn<S> {
    fn state(&self) -> ConnState {
        self.state
    }

    fn set_state(&mut self, state: ConnState) {
        self.state = self.state.transition(state);
    }

    fn close(&mut self) -> Result<()> {
        self.state = ConnState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorFields;
    use crate::protocol::backend::write::*;

    fn script(write: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut buf = Vec::new();
        write(&mut buf);
        buf
    }

    #[test]
    fn absorbs_async_messages() {
        let bytes = script(|b| {
            write_parameter_status(b, "TimeZone", "UTC");
            write_notice_response(
                b,
                &ErrorFields {
                    severity: Some("NOTICE".into()),
                    message: Some("table exists, skipping".into()),
                    ..Default::default()
                },
            );
            write_notification(b, 9, "jobs", "1");
            write_parameter_status(b, "TimeZone", "Asia/Seoul");
            write_ready_for_query(b, TransactionStatus::InTransaction);
        });
        let mut conn = Conn::new(bytes.as_slice());
        let mut buffer_set = BufferSet::new();
        conn.read_message(&mut buffer_set, ReadMode::Buffered).unwrap();

        assert_eq!(buffer_set.type_byte, msg_type::READY_FOR_QUERY);
        assert_eq!(conn.messages_read(), 5);
        assert!(conn.in_transaction());
        assert_eq!(
            conn.server_params(),
            &[("TimeZone".to_string(), "Asia/Seoul".to_string())]
        );
        let messages = conn.take_async_messages();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[1], AsyncMessage::Notice(_)));
        assert!(conn.take_async_messages().is_empty());
    }

    #[test]
    fn discard_mode_drops_row_payloads_only() {
        let bytes = script(|b| {
            write_data_row(b, &[Some(b"abc".as_slice())]);
            write_command_complete(b, "SELECT 1");
        });
        let mut conn = Conn::new(bytes.as_slice());
        let mut buffer_set = BufferSet::new();
        conn.read_message(&mut buffer_set, ReadMode::Discard).unwrap();
        assert_eq!(buffer_set.type_byte, msg_type::DATA_ROW);
        assert!(buffer_set.read_buffer.is_empty());
        conn.read_message(&mut buffer_set, ReadMode::Discard).unwrap();
        assert_eq!(buffer_set.read_buffer, b"SELECT 1\0");
    }

    #[test]
    fn read_error_breaks_connection() {
        let bytes = script(|b| write_command_complete(b, "SELECT 1"));
        let mut conn = Conn::new(&bytes[..bytes.len() - 2]);
        let mut buffer_set = BufferSet::new();
        assert!(matches!(
            conn.read_message(&mut buffer_set, ReadMode::Buffered),
            Err(Error::Io(_))
        ));
        assert!(conn.is_broken());
        assert!(matches!(
            conn.read_message(&mut buffer_set, ReadMode::Buffered),
            Err(Error::ConnectionBroken)
        ));
        conn.set_state(ConnState::Ready);
        assert_eq!(conn.state(), ConnState::Broken);
    }

    #[test]
    fn closed_connection_refuses_reads() {
        let mut conn = Conn::new(&b""[..]);
        conn.close().unwrap();
        let mut buffer_set = BufferSet::new();
        let err = conn
            .read_message(&mut buffer_set, ReadMode::Buffered)
            .unwrap_err();
        assert!(err.is_caller_misuse());
    }
}
