//! PostgreSQL backend (server → client) messages.

pub mod error;
pub mod query;
pub mod status;
pub mod write;

pub use error::{ErrorResponse, NoticeResponse};
pub use query::{
    CommandComplete, DataRow, EmptyQueryResponse, FieldDescription, FieldDescriptionTail,
    RowDescription,
};
pub use status::{AsyncMessage, NotificationResponse, ParameterStatus, ReadyForQuery};

/// Backend message type bytes.
pub mod msg_type {
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
    /// NotificationResponse
    pub const NOTIFICATION_RESPONSE: u8 = b'A';
}

/// Classification of a backend message as seen by a result cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// RowDescription: the column layout of the next result set
    Layout,
    /// DataRow
    Row,
    /// CommandComplete
    Completion,
    /// EmptyQueryResponse
    EmptyResult,
    /// ReadyForQuery
    EndOfCommand,
    /// Anything else
    Other(u8),
}

impl MessageKind {
    /// Classify a message type byte.
    pub fn from_type_byte(type_byte: u8) -> Self {
        match type_byte {
            msg_type::ROW_DESCRIPTION => MessageKind::Layout,
            msg_type::DATA_ROW => MessageKind::Row,
            msg_type::COMMAND_COMPLETE => MessageKind::Completion,
            msg_type::EMPTY_QUERY_RESPONSE => MessageKind::EmptyResult,
            msg_type::READY_FOR_QUERY => MessageKind::EndOfCommand,
            other => MessageKind::Other(other),
        }
    }
}

/// Raw message from the PostgreSQL server.
///
/// This is a thin wrapper around the message type byte and payload.
/// Individual message types are parsed on demand.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    /// Message type byte
    pub type_byte: u8,
    /// Message payload (after length field)
    pub payload: &'a [u8],
}

impl<'a> RawMessage<'a> {
    /// Create a new RawMessage.
    pub fn new(type_byte: u8, payload: &'a [u8]) -> Self {
        Self { type_byte, payload }
    }

    /// Check if a type byte represents an async message (can arrive at any time).
    pub fn is_async_type(type_byte: u8) -> bool {
        matches!(
            type_byte,
            msg_type::NOTICE_RESPONSE
                | msg_type::NOTIFICATION_RESPONSE
                | msg_type::PARAMETER_STATUS
        )
    }
}
