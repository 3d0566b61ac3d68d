//! Sans-I/O state machine for consuming a command's results.
//!
//! [`CursorCore`] performs no I/O. A driver reads one message into a
//! [`BufferSet`](crate::buffer_set::BufferSet), hands it to the core and reacts
//! to the returned [`Outcome`].

pub mod cursor;
pub mod outcome;

pub use cursor::{Boundary, Completion, CursorCore};
pub use outcome::{CursorState, Outcome};
