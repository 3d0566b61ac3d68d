//! Cursor states and classifier outcomes.

/// Position of a cursor within its command's response.
///
/// Moves forward along `InResult -> BetweenResults -> Consumed -> Closed`, except
/// that `InResult` is re-entered from `BetweenResults` when another result set
/// begins. `Closed` is reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    /// Rows of the current result set may still arrive
    #[default]
    InResult,
    /// The current result set ended; a RowDescription or ReadyForQuery follows
    BetweenResults,
    /// ReadyForQuery was seen; nothing more belongs to this cursor
    Consumed,
    /// Released
    Closed,
}

impl CursorState {
    /// Whether the cursor may still read messages from the stream.
    pub fn is_active(self) -> bool {
        matches!(self, CursorState::InResult | CursorState::BetweenResults)
    }
}

/// Result of feeding one message to the cursor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A row is live and can be read
    RowProduced,
    /// The command ended
    NoMoreRows,
    /// The message was absorbed; read another
    ConsumeAnother,
}
