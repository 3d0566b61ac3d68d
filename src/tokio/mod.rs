//! Asynchronous result cursor using Tokio.

mod conn;
mod cursor;
mod stream;

pub use conn::Conn;
pub use cursor::Cursor;
