//! ErrorResponse and NoticeResponse bodies.
//!
//! Both messages carry the same body: a sequence of `(code byte, cstring)`
//! fields closed by a zero byte.

use crate::error::{Error, ErrorFields, Result};
use crate::protocol::codec::read_cstr;

/// Field codes the cursor keeps. Others are skipped.
pub mod field_type {
    pub const SEVERITY: u8 = b'S';
    /// Never translated, PostgreSQL 9.6+
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    /// SQLSTATE
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    /// 1-based character offset into the query
    pub const POSITION: u8 = b'P';
    pub const WHERE: u8 = b'W';
    pub const SCHEMA: u8 = b's';
    pub const TABLE: u8 = b't';
    pub const COLUMN: u8 = b'c';
    pub const CONSTRAINT: u8 = b'n';
}

/// Iterator over the raw fields of an error or notice body.
#[derive(Debug, Clone)]
pub struct FieldIter<'a> {
    data: &'a [u8],
}

impl<'a> FieldIter<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { data: payload }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = Result<(u8, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&code, rest) = self.data.split_first()?;
        if code == 0 {
            self.data = &[];
            return None;
        }
        match read_cstr(rest) {
            Ok((value, rest)) => {
                self.data = rest;
                Some(Ok((code, value)))
            }
            Err(e) => {
                self.data = &[];
                Some(Err(e))
            }
        }
    }
}

fn collect_fields(payload: &[u8]) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    for field in FieldIter::new(payload) {
        let (code, value) = field?;
        let slot = match code {
            field_type::SEVERITY => &mut fields.severity,
            field_type::SEVERITY_NON_LOCALIZED => &mut fields.severity_non_localized,
            field_type::CODE => &mut fields.code,
            field_type::MESSAGE => &mut fields.message,
            field_type::DETAIL => &mut fields.detail,
            field_type::HINT => &mut fields.hint,
            field_type::WHERE => &mut fields.where_,
            field_type::SCHEMA => &mut fields.schema,
            field_type::TABLE => &mut fields.table,
            field_type::COLUMN => &mut fields.column,
            field_type::CONSTRAINT => &mut fields.constraint,
            field_type::POSITION => {
                fields.position = value.parse().ok();
                continue;
            }
            other => {
                tracing::trace!("skipping error field '{}'", other as char);
                continue;
            }
        };
        *slot = Some(value.to_owned());
    }
    Ok(fields)
}

/// ErrorResponse: the command failed.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub fields: ErrorFields,
}

impl ErrorResponse {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        collect_fields(payload).map(|fields| Self { fields })
    }

    /// FATAL and PANIC end the session; the server sends nothing more.
    pub fn ends_session(&self) -> bool {
        matches!(self.fields.severity(), Some("FATAL" | "PANIC"))
    }

    pub fn into_error(self) -> Error {
        Error::Server(self.fields)
    }
}

/// NoticeResponse: informational, never affects the command.
#[derive(Debug, Clone)]
pub struct NoticeResponse {
    pub fields: ErrorFields,
}

impl NoticeResponse {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        collect_fields(payload).map(|fields| Self { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_fields_and_skips_unknown() {
        let payload = b"SERROR\0VERROR\0C23505\0Mduplicate key\0Fnbtinsert.c\0L664\0P17\0\0";
        let err = ErrorResponse::parse(payload).unwrap();
        assert_eq!(err.fields.severity(), Some("ERROR"));
        assert_eq!(err.fields.code.as_deref(), Some("23505"));
        assert_eq!(err.fields.message.as_deref(), Some("duplicate key"));
        assert_eq!(err.fields.position, Some(17));
        assert!(!err.ends_session());
        assert_eq!(err.into_error().sqlstate(), Some("23505"));
    }

    #[test]
    fn fatal_ends_session() {
        let err = ErrorResponse::parse(b"SFATAL\0VFATAL\0C57P01\0\0").unwrap();
        assert!(err.ends_session());
        assert!(err.into_error().is_connection_broken());
    }

    #[test]
    fn unterminated_field_is_protocol_error() {
        let mut iter = FieldIter::new(b"Mno terminator");
        assert!(matches!(iter.next(), Some(Err(Error::Protocol(_)))));
        assert!(iter.next().is_none());
    }
}
