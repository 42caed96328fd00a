//! Identifier newtypes shared by tables, columns and rows.

use std::fmt;

use serde::Serialize;

/// Identifies a table within a [`crate::storage::Group`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct TableKey(pub u32);
/// Identifies a column within its table; never reused after the column is dropped.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct ColKey(pub u32);
/// Stable row identity that survives relocation of the row's physical slot.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct RowKey(pub u64);

/// Group-wide column identity.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct ColumnRef {
    /// Table owning the column.
    pub table: TableKey,
    /// Column key within that table.
    pub col: ColKey,
}

impl ColumnRef {
    /// Creates a column reference.
    pub fn new(table: TableKey, col: ColKey) -> Self {
        Self { table, col }
    }
}

/// Handle to a single row of a table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct ObjRef {
    /// Table owning the row.
    pub table: TableKey,
    /// Stable key of the row.
    pub row: RowKey,
}

impl ObjRef {
    /// Creates a row handle.
    pub fn new(table: TableKey, row: RowKey) -> Self {
        Self { table, row }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.col)
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.row)
    }
}
