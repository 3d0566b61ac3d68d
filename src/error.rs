//! Error types for zero-postgres-cursor.

use thiserror::Error;

use crate::protocol::types::Oid;

/// Result type for cursor operations.
pub type Result<T> = core::result::Result<T, Error>;

/// PostgreSQL error/notice field types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorFields {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// Non-localized severity (same as severity but never translated)
    pub severity_non_localized: Option<String>,
    /// SQLSTATE error code (5 characters)
    pub code: Option<String>,
    /// Primary error message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in query string (1-based)
    pub position: Option<u32>,
    /// Context/stack trace
    pub where_: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: Option<String>,
    /// Column name
    pub column: Option<String>,
    /// Constraint name
    pub constraint: Option<String>,
}

impl ErrorFields {
    /// Severity, preferring the non-localized form.
    pub fn severity(&self) -> Option<&str> {
        self.severity_non_localized
            .as_deref()
            .or(self.severity.as_deref())
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for zero-postgres-cursor.
///
/// Errors fall into two disjoint classes:
/// - stream-level failures ([`Error::Protocol`], [`Error::Io`], [`Error::ConnectionBroken`]),
///   after which the connection cannot run another command;
/// - caller misuse ([`Error::InvalidReadPosition`], [`Error::InvalidUsage`],
///   [`Error::Unsupported`]), which never touches the stream.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("PostgreSQL error: {0}")]
    Server(ErrorFields),

    /// Protocol violation (malformed message, message illegal in the current state)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection is broken and cannot be reused
    #[error("Connection is broken")]
    ConnectionBroken,

    /// A column was accessed while no row is current
    #[error("Invalid read position: no current row")]
    InvalidReadPosition,

    /// Invalid usage (e.g., column index out of range)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Accessor not wired for the column's type
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Column value could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionBroken | Error::Protocol(_) => true,
            Error::Server(fields) => {
                // FATAL and PANIC errors indicate connection is broken
                matches!(fields.severity(), Some("FATAL") | Some("PANIC"))
            }
            _ => false,
        }
    }

    /// Returns true if an incoming message was illegal for the cursor's state.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Returns true if the error was caused by the caller and left the stream untouched.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            Error::InvalidReadPosition | Error::InvalidUsage(_) | Error::Unsupported(_)
        )
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => fields.code.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn unsupported_oid(oid: Oid, target: &str) -> Self {
        Error::Unsupported(format!("cannot read oid {} as {}", oid, target))
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized>
    From<zerocopy::error::CastError<Src, Dst>> for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}
