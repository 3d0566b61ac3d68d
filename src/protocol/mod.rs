//! PostgreSQL wire protocol implementation.
//!
//! This module contains the low-level decoding of backend messages.
//!
//! # Structure
//!
//! - `backend`: Server → Client messages (parsing, plus writers for mock servers)
//! - `codec`: Low-level encoding/decoding primitives
//! - `types`: Common protocol types (FormatCode, Oid, TransactionStatus)

pub mod backend;
pub mod codec;
pub mod types;

// Re-export commonly used types
pub use backend::{MessageKind, RawMessage};
pub use types::{FormatCode, Oid, TransactionStatus};
