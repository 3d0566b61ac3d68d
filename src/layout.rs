//! Column layout of the current result set.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::backend::{FieldDescription, RowDescription};
use crate::protocol::types::{FormatCode, Oid};

/// Column information from RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: Oid,
    /// Column attribute number (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (-1 for variable, -2 for null-terminated)
    pub type_size: i16,
    /// Type modifier (type-specific)
    pub type_modifier: i32,
    /// Format code (0=text, 1=binary)
    pub format: FormatCode,
}

impl From<&FieldDescription<'_>> for ColumnInfo {
    fn from(field: &FieldDescription<'_>) -> Self {
        Self {
            name: field.name.to_string(),
            table_oid: field.table_oid(),
            column_id: field.column_id(),
            type_oid: field.type_oid(),
            type_size: field.type_size(),
            type_modifier: field.type_modifier(),
            format: field.format(),
        }
    }
}

/// Ordered, immutable description of the columns of one result set.
///
/// Cloning is cheap; every [`RowBuffer`](crate::row::RowBuffer) of a result set
/// shares the layout it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Arc<[ColumnInfo]>,
}

impl ColumnLayout {
    /// Build a layout from column descriptions.
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Parse a RowDescription payload into an owned layout.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let desc = RowDescription::parse(payload)?;
        Ok(Self::new(desc.iter().map(ColumnInfo::from).collect()))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the layout has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column at `ordinal`.
    pub fn get(&self, ordinal: usize) -> Option<&ColumnInfo> {
        self.columns.get(ordinal)
    }

    /// Iterate over columns in order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter()
    }

    /// Find the ordinal of a column by name.
    ///
    /// An exact match wins; otherwise the first ASCII case-insensitive match.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }
}
