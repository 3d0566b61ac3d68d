//! A result-set cursor for the PostgreSQL wire protocol.
//!
//! Turns the backend messages that answer a command (RowDescription, DataRow,
//! CommandComplete, EmptyQueryResponse, ReadyForQuery) into rows read through a
//! cursor, without ever leaving the connection's stream out of sync.
//!
//! # Features
//!
//! - **Sans-I/O state machine**: [`state::CursorCore`] classifies messages without doing I/O
//! - **Sync and async APIs**: Choose between [`sync::Cursor`] and [`tokio::Cursor`]
//! - **Zero-copy parsing**: Rows are decoded straight from the message payload
//! - **Drain on close**: Unread rows and result sets are skipped without being materialized
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpStream;
//!
//! use zero_postgres_cursor::CursorOpts;
//! use zero_postgres_cursor::sync::{Conn, Cursor};
//!
//! fn main() -> zero_postgres_cursor::Result<()> {
//!     // A stream whose command was already sent
//!     let stream = TcpStream::connect("localhost:5432")?;
//!     let mut conn = Conn::new(stream);
//!
//!     let mut cursor = Cursor::new(&mut conn, CursorOpts::default());
//!     while cursor.read()? {
//!         println!("{}: {}", cursor.get_i32(0)?, cursor.get_str(1)?);
//!     }
//!     while cursor.next_result()? {
//!         while cursor.read()? {}
//!     }
//!     println!("rows affected: {:?}", cursor.records_affected());
//!     cursor.close()?;
//!     Ok(())
//! }
//! ```

pub mod buffer_pool;
pub mod buffer_set;
pub mod error;
pub mod layout;
pub mod opts;
pub mod protocol;
pub mod row;
pub mod source;
pub mod state;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use buffer_pool::BufferPool;
pub use buffer_set::BufferSet;
pub use error::{Error, ErrorFields, Result};
pub use layout::{ColumnInfo, ColumnLayout};
pub use opts::CursorOpts;
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use row::RowBuffer;
pub use source::{AsyncConnection, AsyncMessageSource, ConnState, Connection, MessageSource, ReadMode};
pub use state::{Completion, CursorCore, CursorState, Outcome};
pub use value::FromWireValue;
