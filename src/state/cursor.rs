//! Result cursor state machine.

use std::sync::Arc;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::layout::{ColumnInfo, ColumnLayout};
use crate::opts::CursorOpts;
use crate::protocol::backend::{
    CommandComplete, EmptyQueryResponse, MessageKind, ReadyForQuery, msg_type,
};
use crate::protocol::types::{Oid, TransactionStatus};
use crate::row::RowBuffer;

use super::outcome::{CursorState, Outcome};

/// Completion metadata accumulated over every result set of a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    records_affected: Option<u64>,
    last_generated_id: Option<Oid>,
}

impl Completion {
    /// Total rows affected, or `None` if no CommandComplete reported a count.
    pub fn records_affected(&self) -> Option<u64> {
        self.records_affected
    }

    /// Most recent non-zero OID reported by an `INSERT`.
    pub fn last_generated_id(&self) -> Option<Oid> {
        self.last_generated_id
    }

    /// Fold one CommandComplete into the totals.
    ///
    /// The first reported count replaces "unknown"; later counts are added.
    pub fn record(&mut self, rows: Option<u64>, generated_id: Option<Oid>) {
        if let Some(rows) = rows {
            self.records_affected = Some(
                self.records_affected
                    .map_or(rows, |total| total.saturating_add(rows)),
            );
        }
        if generated_id.is_some() {
            self.last_generated_id = generated_id;
        }
    }
}

/// Message a drain stops at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// End of the current result set: CommandComplete, EmptyQueryResponse or ReadyForQuery
    ResultEnd,
    /// End of the command: ReadyForQuery
    CommandEnd,
}

impl Boundary {
    /// Check if a message type ends a drain.
    pub fn matches(self, type_byte: u8) -> bool {
        match self {
            Boundary::ResultEnd => matches!(
                type_byte,
                msg_type::COMMAND_COMPLETE
                    | msg_type::EMPTY_QUERY_RESPONSE
                    | msg_type::READY_FOR_QUERY
            ),
            Boundary::CommandEnd => type_byte == msg_type::READY_FOR_QUERY,
        }
    }
}

/// Everything a result cursor knows about its command.
///
/// Drivers own one of these per cursor and pass every message through it;
/// all state transitions happen here.
#[derive(Debug)]
pub struct CursorCore {
    state: CursorState,
    layout: Option<ColumnLayout>,
    row: Option<RowBuffer>,
    /// A row was produced in the current result set
    row_seen: bool,
    completion: Completion,
    transaction_status: TransactionStatus,
    opts: CursorOpts,
    pool: Arc<BufferPool>,
    broken: bool,
}

fn unexpected(type_byte: u8, phase: &str) -> Error {
    Error::Protocol(format!(
        "Unexpected message '{}' {}",
        type_byte as char, phase
    ))
}

impl CursorCore {
    /// Create a cursor core for a command whose layout is not known yet.
    pub fn new(opts: CursorOpts) -> Self {
        Self {
            state: CursorState::InResult,
            layout: None,
            row: None,
            row_seen: false,
            completion: Completion::default(),
            transaction_status: TransactionStatus::Idle,
            opts,
            pool: Arc::clone(&*GLOBAL_BUFFER_POOL),
            broken: false,
        }
    }

    /// Create a cursor core whose first result set has an already-known layout.
    pub fn with_layout(opts: CursorOpts, layout: ColumnLayout) -> Self {
        Self {
            layout: Some(layout),
            ..Self::new(opts)
        }
    }

    /// Current state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Layout of the current result set.
    pub fn layout(&self) -> Option<&ColumnLayout> {
        self.layout.as_ref()
    }

    /// The live row, if any.
    pub fn row(&self) -> Option<&RowBuffer> {
        self.row.as_ref()
    }

    /// The live row, or `InvalidReadPosition`.
    pub fn current_row(&self) -> Result<&RowBuffer> {
        self.row.as_ref().ok_or(Error::InvalidReadPosition)
    }

    /// Metadata of a column of the current result set.
    pub fn column(&self, ordinal: usize) -> Result<&ColumnInfo> {
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| Error::InvalidUsage("no result set is current".into()))?;
        layout.get(ordinal).ok_or_else(|| {
            Error::InvalidUsage(format!(
                "column index {} out of range ({} columns)",
                ordinal,
                layout.len()
            ))
        })
    }

    /// Ordinal of a column of the current result set by name.
    pub fn ordinal(&self, name: &str) -> Result<usize> {
        self.layout
            .as_ref()
            .and_then(|layout| layout.ordinal(name))
            .ok_or_else(|| Error::InvalidUsage(format!("no column named {:?}", name)))
    }

    /// Completion metadata so far.
    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Transaction status from the command's ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// Options the cursor was created with.
    pub fn opts(&self) -> &CursorOpts {
        &self.opts
    }

    /// Whether the stream was found out of sync.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Poison the cursor. The live row is released.
    pub fn mark_broken(&mut self) {
        self.broken = true;
        self.row = None;
    }

    /// Consume the live row, if any.
    pub fn consume_row(&mut self) {
        self.row = None;
    }

    /// Whether a read must skip the rest of the result set instead of producing a row.
    pub fn wants_skip_to_result_end(&self) -> bool {
        self.opts.single_row && self.row_seen
    }

    /// Release the cursor.
    pub fn close(&mut self) {
        self.row = None;
        self.state = CursorState::Closed;
    }

    /// Classify one message and apply its transition.
    pub fn step(&mut self, buffer_set: &mut BufferSet) -> Result<Outcome> {
        self.apply(buffer_set, true)
    }

    /// Like [`step`](Self::step), but rows are counted instead of materialized.
    ///
    /// Used while draining. In [`ReadMode::Discard`](crate::source::ReadMode) the
    /// DataRow payload may already be gone.
    pub fn skip(&mut self, buffer_set: &mut BufferSet) -> Result<()> {
        self.apply(buffer_set, false).map(|_| ())
    }

    /// Handle the first message after a finished result set.
    ///
    /// Returns `true` if a new result set begins, `false` at end of command.
    /// Anything else is a protocol violation.
    pub fn begin_result(&mut self, buffer_set: &BufferSet) -> Result<bool> {
        self.ensure_active()?;
        match MessageKind::from_type_byte(buffer_set.type_byte) {
            MessageKind::Layout => {
                self.install_layout(&buffer_set.read_buffer)?;
                Ok(true)
            }
            MessageKind::EndOfCommand => {
                self.end_command(&buffer_set.read_buffer)?;
                Ok(false)
            }
            _ => Err(unexpected(buffer_set.type_byte, "at result set boundary")),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidUsage(format!(
                "cursor is {:?} and reads no more messages",
                self.state
            )))
        }
    }

    fn apply(&mut self, buffer_set: &mut BufferSet, materialize: bool) -> Result<Outcome> {
        self.ensure_active()?;
        match MessageKind::from_type_byte(buffer_set.type_byte) {
            MessageKind::Layout => {
                self.install_layout(&buffer_set.read_buffer)?;
                Ok(Outcome::ConsumeAnother)
            }
            MessageKind::Row => {
                let Some(layout) = &self.layout else {
                    return Err(Error::Protocol(
                        "DataRow received without a RowDescription".into(),
                    ));
                };
                if materialize {
                    let payload = std::mem::replace(&mut buffer_set.read_buffer, self.pool.get());
                    self.row = Some(RowBuffer::new(
                        payload,
                        layout.clone(),
                        self.opts.sequential_access,
                        Arc::clone(&self.pool),
                    )?);
                }
                self.row_seen = true;
                Ok(Outcome::RowProduced)
            }
            MessageKind::Completion => {
                let complete = CommandComplete::parse(&buffer_set.read_buffer)?;
                tracing::debug!("command complete: {}", complete.tag);
                self.completion
                    .record(complete.rows_affected(), complete.inserted_oid());
                self.end_result();
                Ok(Outcome::ConsumeAnother)
            }
            MessageKind::EmptyResult => {
                EmptyQueryResponse::parse(&buffer_set.read_buffer)?;
                self.end_result();
                Ok(Outcome::ConsumeAnother)
            }
            MessageKind::EndOfCommand => {
                self.end_command(&buffer_set.read_buffer)?;
                Ok(Outcome::NoMoreRows)
            }
            MessageKind::Other(type_byte) => Err(unexpected(type_byte, "in query response")),
        }
    }

    fn install_layout(&mut self, payload: &[u8]) -> Result<()> {
        let layout = ColumnLayout::parse(payload)?;
        if self.layout.is_some() {
            tracing::warn!(
                "RowDescription received while a layout is assigned; replacing it ({} columns)",
                layout.len()
            );
        } else {
            tracing::debug!("result set started ({} columns)", layout.len());
        }
        self.layout = Some(layout);
        self.state = CursorState::InResult;
        Ok(())
    }

    fn end_result(&mut self) {
        self.row = None;
        self.layout = None;
        self.row_seen = false;
        self.state = CursorState::BetweenResults;
    }

    fn end_command(&mut self, payload: &[u8]) -> Result<()> {
        let ready = ReadyForQuery::parse(payload)?;
        let status = ready.status;
        self.transaction_status = ready.transaction_status().ok_or_else(|| {
            Error::Protocol(format!(
                "Invalid transaction status in ReadyForQuery: {}",
                status
            ))
        })?;
        self.row = None;
        self.layout = None;
        self.state = CursorState::Consumed;
        Ok(())
    }
}
