//! Query-related backend messages.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U16 as U16BE, U32 as U32BE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::codec::{read_cstr, read_i32, read_u16};
use crate::protocol::types::{FormatCode, Oid};

/// RowDescription message header.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct RowDescriptionHead {
    /// Number of fields in the row
    pub num_fields: U16BE,
}

/// Fixed-size tail of a field description (18 bytes).
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct FieldDescriptionTail {
    /// Table OID (0 if not a table column)
    pub table_oid: U32BE,
    /// Column attribute number (0 if not a table column)
    pub column_id: I16BE,
    /// Data type OID
    pub type_oid: U32BE,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: I16BE,
    /// Type modifier (type-specific)
    pub type_modifier: I32BE,
    /// Format code (0=text, 1=binary)
    pub format: U16BE,
}

/// Field description within a RowDescription.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescription<'a> {
    /// Field name
    pub name: &'a str,
    /// Fixed-size metadata
    pub tail: &'a FieldDescriptionTail,
}

impl FieldDescription<'_> {
    /// Table OID (0 if not a table column)
    pub fn table_oid(&self) -> Oid {
        self.tail.table_oid.get()
    }

    /// Column attribute number (0 if not a table column)
    pub fn column_id(&self) -> i16 {
        self.tail.column_id.get()
    }

    /// Data type OID
    pub fn type_oid(&self) -> Oid {
        self.tail.type_oid.get()
    }

    /// Type size (-1 for variable, -2 for null-terminated)
    pub fn type_size(&self) -> i16 {
        self.tail.type_size.get()
    }

    /// Type modifier (type-specific)
    pub fn type_modifier(&self) -> i32 {
        self.tail.type_modifier.get()
    }

    /// Format code (0=text, 1=binary)
    pub fn format(&self) -> FormatCode {
        FormatCode::from_u16(self.tail.format.get())
    }
}

/// RowDescription message - describes the columns in a result set.
#[derive(Debug)]
pub struct RowDescription<'a> {
    fields: Vec<FieldDescription<'a>>,
}

impl<'a> RowDescription<'a> {
    /// Parse a RowDescription message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (head, mut data) = RowDescriptionHead::ref_from_prefix(payload)
            .map_err(|e| Error::Protocol(format!("RowDescription header: {e:?}")))?;

        let num_fields = head.num_fields.get() as usize;
        let mut fields = Vec::with_capacity(num_fields);

        for _ in 0..num_fields {
            let (name, rest) = read_cstr(data)?;
            let (tail, rest) = FieldDescriptionTail::ref_from_prefix(rest)
                .map_err(|e| Error::Protocol(format!("FieldDescription tail: {e:?}")))?;

            fields.push(FieldDescription { name, tail });
            data = rest;
        }

        if !data.is_empty() {
            return Err(Error::Protocol(format!(
                "RowDescription: {} trailing bytes after {} fields",
                data.len(),
                num_fields
            )));
        }

        Ok(Self { fields })
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get field descriptions.
    pub fn fields(&self) -> &[FieldDescription<'a>] {
        &self.fields
    }

    /// Iterate over field descriptions.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescription<'a>> {
        self.fields.iter()
    }
}

/// DataRow message - contains a single row of data.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    /// Number of columns
    num_columns: u16,
    /// Column data (after the column count)
    columns_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    /// Parse a DataRow message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (num_columns, columns_data) = read_u16(payload)
            .map_err(|e| Error::Protocol(format!("DataRow header: {e}")))?;
        Ok(Self {
            num_columns,
            columns_data,
        })
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.num_columns as usize
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.num_columns == 0
    }

    /// Byte offset of the first column value within the payload.
    pub const fn data_offset() -> usize {
        2
    }

    /// Create an iterator over column values.
    ///
    /// Each item is `Ok(None)` for NULL, `Ok(Some(bytes))` otherwise. A truncated
    /// column yields an error and ends the iteration.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.columns_data,
            left: self.num_columns,
        }
    }
}

/// Iterator over column values in a DataRow.
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
    left: u16,
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Result<Option<&'a [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;
        Some(split_column(&mut self.remaining))
    }
}

/// Split one length-prefixed column value off the front of `data`.
pub(crate) fn split_column<'a>(data: &mut &'a [u8]) -> Result<Option<&'a [u8]>> {
    let (len, rest) = read_i32(data)?;
    if len == -1 {
        *data = rest;
        return Ok(None);
    }
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("DataRow: invalid column length {}", len)))?;
    let (value, rest) = rest.split_at_checked(len).ok_or_else(|| {
        Error::Protocol(format!(
            "DataRow: column length {} exceeds remaining {} bytes",
            len,
            rest.len()
        ))
    })?;
    *data = rest;
    Ok(Some(value))
}

/// CommandComplete message - indicates successful completion of a command.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag (e.g., "SELECT 5", "INSERT 0 1", "UPDATE 10")
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    /// Parse a CommandComplete message from payload bytes.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (tag, _) = read_cstr(payload)?;
        Ok(Self { tag })
    }

    /// Parse the number of rows affected from the command tag.
    ///
    /// Returns `Some(count)` for commands like SELECT, INSERT, UPDATE, DELETE.
    /// Returns `None` for other commands or parse failures.
    pub fn rows_affected(&self) -> Option<u64> {
        let mut parts = self.tag.split_whitespace();
        match (parts.next()?, parts.next(), parts.next()) {
            ("INSERT", Some(_oid), Some(count)) => count.parse().ok(),
            ("SELECT" | "UPDATE" | "DELETE" | "MERGE" | "COPY" | "MOVE" | "FETCH", Some(count), None) => {
                count.parse().ok()
            }
            _ => None,
        }
    }

    /// The OID of the inserted row for `INSERT oid rows` tags.
    ///
    /// The server reports 0 unless exactly one row went into a table with OIDs.
    pub fn inserted_oid(&self) -> Option<Oid> {
        let mut parts = self.tag.split_whitespace();
        match (parts.next()?, parts.next()?.parse::<Oid>().ok()?) {
            ("INSERT", oid) if oid != 0 => Some(oid),
            _ => None,
        }
    }
}

/// EmptyQueryResponse message - response to an empty query string.
#[derive(Debug, Clone, Copy)]
pub struct EmptyQueryResponse;

impl EmptyQueryResponse {
    /// Parse an EmptyQueryResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if !payload.is_empty() {
            return Err(Error::Protocol(format!(
                "EmptyQueryResponse: unexpected {} byte payload",
                payload.len()
            )));
        }
        Ok(Self)
    }
}
