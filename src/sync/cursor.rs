//! Blocking result cursor.

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::layout::ColumnLayout;
use crate::opts::CursorOpts;
use crate::protocol::backend::{ErrorResponse, msg_type};
use crate::protocol::types::{Oid, TransactionStatus};
use crate::row::RowBuffer;
use crate::source::{ConnState, Connection, ReadMode};
use crate::state::{Boundary, Completion, CursorCore, CursorState, Outcome};
use crate::value::FromWireValue;

type CloseObserver<'c> = Box<dyn FnOnce(&Completion) + 'c>;

/// Cursor over the results of one command.
///
/// Holds the connection exclusively until it is closed or dropped. Dropping an
/// open cursor drains the rest of the command so the connection can be reused.
pub struct Cursor<'c, C: Connection> {
    conn: &'c mut C,
    core: CursorCore,
    buffer_set: BufferSet,
    observers: Vec<CloseObserver<'c>>,
}

impl<'c, C: Connection> Cursor<'c, C> {
    /// Create a cursor reading a command's response from `conn`.
    pub fn new(conn: &'c mut C, opts: CursorOpts) -> Self {
        Self::from_core(conn, CursorCore::new(opts))
    }

    /// Create a cursor whose first result set's layout is already known.
    pub fn with_layout(conn: &'c mut C, opts: CursorOpts, layout: ColumnLayout) -> Self {
        Self::from_core(conn, CursorCore::with_layout(opts, layout))
    }

    /// Create a cursor around a prepared state machine.
    pub fn from_core(conn: &'c mut C, core: CursorCore) -> Self {
        conn.set_state(ConnState::Executing);
        Self {
            conn,
            core,
            buffer_set: BufferSet::new(),
            observers: Vec::new(),
        }
    }

    /// Register a callback to run once when the cursor closes.
    pub fn on_close(&mut self, observer: impl FnOnce(&Completion) + 'c) {
        self.observers.push(Box::new(observer));
    }

    /// Poison the cursor and the connection on stream-level failures.
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_connection_broken() && !self.core.is_broken() {
                tracing::error!("result cursor poisoned: {}", e);
                self.core.mark_broken();
                self.conn.set_state(ConnState::Broken);
            }
        }
        result
    }

    fn ensure_usable(&self) -> Result<bool> {
        if self.core.state() == CursorState::Closed {
            return Ok(false);
        }
        if self.core.is_broken() {
            return Err(Error::ConnectionBroken);
        }
        Ok(true)
    }

    /// Read the next message, turning an ErrorResponse into `Error::Server`.
    ///
    /// A non-fatal server error leaves the stream at the end of the command.
    fn next_message(&mut self, mode: ReadMode) -> Result<()> {
        self.conn.read_message(&mut self.buffer_set, mode)?;
        if self.buffer_set.type_byte != msg_type::ERROR_RESPONSE {
            return Ok(());
        }

        let response = ErrorResponse::parse(&self.buffer_set.read_buffer)?;
        let ends_session = response.ends_session();
        let error = response.into_error();
        if !ends_session {
            tracing::debug!("server error, draining to ReadyForQuery: {}", error);
            self.core.consume_row();
            loop {
                self.conn.read_message(&mut self.buffer_set, ReadMode::Discard)?;
                if Boundary::CommandEnd.matches(self.buffer_set.type_byte) {
                    break;
                }
            }
            self.core.step(&mut self.buffer_set)?;
        }
        Err(error)
    }

    /// Discard messages until `boundary`, classifying each on the way.
    ///
    /// The boundary message is left in the buffer for the caller to step.
    fn skip_until(&mut self, boundary: Boundary) -> Result<()> {
        let mut skipped = 0usize;
        loop {
            self.next_message(ReadMode::Discard)?;
            if boundary.matches(self.buffer_set.type_byte) {
                tracing::debug!("skipped {} messages to {:?}", skipped, boundary);
                return Ok(());
            }
            self.core.skip(&mut self.buffer_set)?;
            skipped += 1;
        }
    }

    fn read_inner(&mut self) -> Result<bool> {
        self.core.consume_row();

        if self.core.state() == CursorState::InResult && self.core.wants_skip_to_result_end() {
            self.skip_until(Boundary::ResultEnd)?;
            self.core.step(&mut self.buffer_set)?;
            return Ok(false);
        }

        while self.core.state() == CursorState::InResult {
            self.next_message(ReadMode::Buffered)?;
            match self.core.step(&mut self.buffer_set)? {
                Outcome::RowProduced => {
                    self.conn.set_state(ConnState::Fetching);
                    return Ok(true);
                }
                Outcome::NoMoreRows => return Ok(false),
                Outcome::ConsumeAnother => {}
            }
        }
        Ok(false)
    }

    /// Advance to the next row of the current result set.
    ///
    /// Returns `false` when the result set (or the command) has no more rows.
    /// The previous row is consumed first.
    pub fn read(&mut self) -> Result<bool> {
        if !self.ensure_usable()? {
            return Ok(false);
        }
        let result = self.read_inner();
        self.check(result)
    }

    fn next_result_inner(&mut self) -> Result<bool> {
        match self.core.state() {
            CursorState::Consumed | CursorState::Closed => return Ok(false),
            CursorState::InResult => {
                self.core.consume_row();
                self.skip_until(Boundary::ResultEnd)?;
                if self.core.step(&mut self.buffer_set)? == Outcome::NoMoreRows {
                    return Ok(false);
                }
            }
            CursorState::BetweenResults => {}
        }

        self.next_message(ReadMode::Buffered)?;
        self.core.begin_result(&self.buffer_set)
    }

    /// Move past the rest of the current result set to the next one.
    ///
    /// Returns `true` if another result set follows, `false` at end of command.
    pub fn next_result(&mut self) -> Result<bool> {
        if !self.ensure_usable()? {
            return Ok(false);
        }
        let result = self.next_result_inner();
        self.check(result)
    }

    /// Close the cursor, draining whatever is left of the command.
    ///
    /// Idempotent. Close observers run exactly once.
    pub fn close(&mut self) -> Result<()> {
        if self.core.state() == CursorState::Closed {
            return Ok(());
        }

        let mut first_error = None;
        if !self.core.is_broken() && self.core.state().is_active() {
            self.core.consume_row();
            let drained = self
                .skip_until(Boundary::CommandEnd)
                .and_then(|()| self.core.step(&mut self.buffer_set).map(|_| ()));
            if let Err(e) = self.check(drained) {
                first_error = Some(e);
            }
        }

        self.finish_close(first_error)
    }

    /// Release the cursor without touching the stream.
    fn finish_close(&mut self, mut first_error: Option<Error>) -> Result<()> {
        self.core.close();
        if !self.core.is_broken() {
            self.conn.set_state(ConnState::Ready);
        }
        if self.core.opts().close_connection_on_close {
            if let Err(e) = self.conn.close() {
                first_error = first_error.or(Some(e));
            }
        }

        let completion = *self.core.completion();
        for observer in std::mem::take(&mut self.observers) {
            observer(&completion);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Total rows affected so far, `None` while unknown.
    pub fn records_affected(&self) -> Option<u64> {
        self.core.completion().records_affected()
    }

    /// Most recent OID generated by an `INSERT`.
    pub fn last_generated_id(&self) -> Option<Oid> {
        self.core.completion().last_generated_id()
    }

    pub fn is_closed(&self) -> bool {
        self.core.state() == CursorState::Closed
    }

    pub fn state(&self) -> CursorState {
        self.core.state()
    }

    /// Transaction status reported at the end of the command.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.core.transaction_status()
    }

    /// Layout of the current result set.
    pub fn layout(&self) -> Option<&ColumnLayout> {
        self.core.layout()
    }

    /// Number of columns in the current result set (0 between result sets).
    pub fn field_count(&self) -> usize {
        self.core.layout().map_or(0, ColumnLayout::len)
    }

    /// Name of a column.
    pub fn get_name(&self, ordinal: usize) -> Result<&str> {
        self.core.column(ordinal).map(|c| c.name.as_str())
    }

    /// Ordinal of a column by name.
    pub fn get_ordinal(&self, name: &str) -> Result<usize> {
        self.core.ordinal(name)
    }

    /// Type OID of a column.
    pub fn get_type_oid(&self, ordinal: usize) -> Result<Oid> {
        self.core.column(ordinal).map(|c| c.type_oid)
    }

    /// The current row.
    pub fn current_row(&self) -> Result<&RowBuffer> {
        self.core.current_row()
    }

    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        self.core.current_row()?.is_null(ordinal)
    }

    /// Decode a column of the current row.
    pub fn get<'a, T: FromWireValue<'a>>(&'a self, ordinal: usize) -> Result<T> {
        self.core.current_row()?.get(ordinal)
    }

    pub fn get_bool(&self, ordinal: usize) -> Result<bool> {
        self.get(ordinal)
    }

    pub fn get_i16(&self, ordinal: usize) -> Result<i16> {
        self.get(ordinal)
    }

    pub fn get_i32(&self, ordinal: usize) -> Result<i32> {
        self.get(ordinal)
    }

    pub fn get_i64(&self, ordinal: usize) -> Result<i64> {
        self.get(ordinal)
    }

    pub fn get_f32(&self, ordinal: usize) -> Result<f32> {
        self.get(ordinal)
    }

    pub fn get_f64(&self, ordinal: usize) -> Result<f64> {
        self.get(ordinal)
    }

    pub fn get_str(&self, ordinal: usize) -> Result<&str> {
        self.get(ordinal)
    }

    pub fn get_string(&self, ordinal: usize) -> Result<String> {
        self.get(ordinal)
    }

    /// Bytes of a bytea column, hex text form decoded.
    pub fn get_bytes(&self, ordinal: usize) -> Result<Vec<u8>> {
        self.get(ordinal)
    }
}

impl<C: Connection> Drop for Cursor<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("error closing result cursor on drop: {}", e);
        }
    }
}
