//! Seams between a cursor and the connection it reads from.
//!
//! A cursor never frames bytes itself. It asks a [`MessageSource`] for the next
//! backend message and tells the [`Connection`] when it is fetching, done, or
//! unusable.

use std::future::Future;

use crate::buffer_set::BufferSet;
use crate::error::Result;

/// How a source should treat the payload of the next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Buffer every payload into `BufferSet::read_buffer`.
    #[default]
    Buffered,
    /// DataRow payloads may be skipped on the wire; `read_buffer` is left empty
    /// for them. Every other message is buffered as usual.
    Discard,
}

/// Busy/idle status of a connection as seen by cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// No command in flight
    #[default]
    Ready,
    /// A command was submitted and its response is being read
    Executing,
    /// Rows are being handed to a caller
    Fetching,
    /// The stream is out of sync; only closing is possible
    Broken,
    /// Closed
    Closed,
}

impl ConnState {
    /// State after a requested transition.
    ///
    /// `Closed` is final and `Broken` can only be followed by `Closed`.
    pub fn transition(self, to: ConnState) -> ConnState {
        match (self, to) {
            (ConnState::Closed, _) => ConnState::Closed,
            (ConnState::Broken, ConnState::Closed) => ConnState::Closed,
            (ConnState::Broken, _) => ConnState::Broken,
            (_, to) => to,
        }
    }
}

/// Blocking source of backend messages.
pub trait MessageSource {
    /// Read the next message into `buffer_set`.
    ///
    /// Asynchronous messages (notices, parameter changes, notifications) are
    /// handled by the source and never returned.
    fn read_message(&mut self, buffer_set: &mut BufferSet, mode: ReadMode) -> Result<()>;
}

/// A connection a cursor can drive.
pub trait Connection: MessageSource {
    /// Current status.
    fn state(&self) -> ConnState;

    /// Request a status change. See [`ConnState::transition`].
    fn set_state(&mut self, state: ConnState);

    /// Close the connection.
    fn close(&mut self) -> Result<()>;
}

/// Asynchronous source of backend messages.
pub trait AsyncMessageSource {
    /// Read the next message into `buffer_set`.
    ///
    /// Dropping the returned future before it completes leaves the stream in an
    /// unknown position; the source must refuse further reads.
    fn read_message(
        &mut self,
        buffer_set: &mut BufferSet,
        mode: ReadMode,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A connection an async cursor can drive.
pub trait AsyncConnection: AsyncMessageSource {
    /// Current status.
    fn state(&self) -> ConnState;

    /// Request a status change. See [`ConnState::transition`].
    fn set_state(&mut self, state: ConnState);

    /// Close the connection.
    ///
    /// Synchronous so that a cursor can release its connection from `Drop`.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_is_sticky() {
        let state = ConnState::Executing.transition(ConnState::Broken);
        assert_eq!(state, ConnState::Broken);
        assert_eq!(state.transition(ConnState::Ready), ConnState::Broken);
        assert_eq!(state.transition(ConnState::Closed), ConnState::Closed);
        assert_eq!(
            ConnState::Closed.transition(ConnState::Ready),
            ConnState::Closed
        );
        assert_eq!(
            ConnState::Fetching.transition(ConnState::Ready),
            ConnState::Ready
        );
    }
}
