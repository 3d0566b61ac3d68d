//! Row buffer: one DataRow payload bound to the layout it arrived under.

use std::cell::Cell;
use std::ops::Range;
use std::sync::Arc;

use crate::buffer_pool::BufferPool;
use crate::error::{Error, Result};
use crate::layout::{ColumnInfo, ColumnLayout};
use crate::protocol::backend::DataRow;
use crate::protocol::backend::query::split_column;
use crate::protocol::types::FormatCode;
use crate::value::FromWireValue;

/// The live row of a cursor.
///
/// Owns the DataRow payload and the [`ColumnLayout`] of the result set it belongs
/// to. Dropping the buffer consumes the row and returns its payload allocation to
/// the [`BufferPool`].
#[derive(Debug)]
pub struct RowBuffer {
    payload: Vec<u8>,
    layout: ColumnLayout,
    /// Column ranges indexed once at creation; `None` is NULL.
    ranges: Vec<Option<Range<usize>>>,
    /// Lowest ordinal still readable, in sequential access mode
    next_sequential: Option<Cell<usize>>,
    pool: Arc<BufferPool>,
}

/// Locate the column that starts at `offset`.
///
/// Returns the value range (`None` for NULL) and the offset of the following column.
fn column_at(payload: &[u8], offset: usize) -> Result<(Option<Range<usize>>, usize)> {
    let mut data = payload
        .get(offset..)
        .ok_or_else(|| Error::Protocol("DataRow: column offset past payload".into()))?;
    let before = data.len();
    let value = split_column(&mut data)?;
    let next = offset + (before - data.len());
    Ok((value.map(|v| next - v.len()..next), next))
}

impl RowBuffer {
    /// Bind a DataRow payload to `layout`.
    ///
    /// The column count must match the layout; anything else means the stream
    /// is out of sync.
    pub fn new(
        payload: Vec<u8>,
        layout: ColumnLayout,
        sequential: bool,
        pool: Arc<BufferPool>,
    ) -> Result<Self> {
        let row = DataRow::parse(&payload)?;
        if row.len() != layout.len() {
            return Err(Error::Protocol(format!(
                "DataRow has {} columns but the row description has {}",
                row.len(),
                layout.len()
            )));
        }

        // Framing is checked for every row up front so a malformed column
        // surfaces from the read that produced it.
        let mut ranges = Vec::with_capacity(layout.len());
        let mut offset = DataRow::data_offset();
        for _ in 0..layout.len() {
            let (range, next) = column_at(&payload, offset)?;
            ranges.push(range);
            offset = next;
        }
        if offset != payload.len() {
            return Err(Error::Protocol(format!(
                "DataRow has {} trailing bytes",
                payload.len() - offset
            )));
        }

        Ok(Self {
            payload,
            layout,
            ranges,
            next_sequential: sequential.then(|| Cell::new(0)),
            pool,
        })
    }

    /// Layout the row was produced under.
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    fn column(&self, ordinal: usize) -> Result<&ColumnInfo> {
        self.layout.get(ordinal).ok_or_else(|| {
            Error::InvalidUsage(format!(
                "column index {} out of range (row has {} columns)",
                ordinal,
                self.layout.len()
            ))
        })
    }

    fn range(&self, ordinal: usize, consume: bool) -> Result<Option<Range<usize>>> {
        self.column(ordinal)?;
        if let Some(next) = &self.next_sequential {
            if ordinal < next.get() {
                return Err(Error::InvalidUsage(format!(
                    "column {} was already passed in sequential access mode (next readable is {})",
                    ordinal,
                    next.get()
                )));
            }
            if consume {
                next.set(ordinal + 1);
            }
        }
        Ok(self.ranges[ordinal].clone())
    }

    /// Raw bytes of a column, `None` for NULL.
    pub fn raw(&self, ordinal: usize) -> Result<Option<&[u8]>> {
        Ok(self
            .range(ordinal, true)?
            .map(|range| &self.payload[range]))
    }

    /// Check if a column is NULL.
    ///
    /// In sequential access mode this does not consume the column.
    pub fn is_null(&self, ordinal: usize) -> Result<bool> {
        Ok(self.range(ordinal, false)?.is_none())
    }

    /// Decode a column.
    pub fn get<'a, T: FromWireValue<'a>>(&'a self, ordinal: usize) -> Result<T> {
        let column = self.column(ordinal)?;
        let (type_oid, format) = (column.type_oid, column.format);
        match self.raw(ordinal)? {
            None => T::from_null(),
            Some(bytes) => match format {
                FormatCode::Text => T::from_text(type_oid, bytes),
                FormatCode::Binary => T::from_binary(type_oid, bytes),
            },
        }
    }
}

impl Drop for RowBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.payload));
    }
}
