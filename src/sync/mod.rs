//! Synchronous result cursor.

mod conn;
mod cursor;
mod stream;

pub use conn::Conn;
pub use cursor::Cursor;
