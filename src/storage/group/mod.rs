use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{LinkError, Result};
use crate::types::{ColumnRef, ObjRef, TableKey};

use super::backlink::BacklinkColumn;
use super::link::LinkColumn;
use super::metrics::{default_metrics, LinkMetrics};
use super::options::GroupOptions;
use super::table::Table;

mod cascade;
mod link_ops;
mod row_ops;
mod schema_ops;

/// The table hierarchy: owns every table, their link columns and the paired backlinks.
///
/// All link mutation goes through the group so both halves of each link relation are
/// updated together. A `Group` has no internal locking; [`crate::db::Database`] provides
/// snapshot isolation on top of it.
#[derive(Clone)]
pub struct Group {
    tables: Vec<Option<Table>>,
    names: FxHashMap<String, TableKey>,
    options: GroupOptions,
    metrics: Arc<dyn LinkMetrics>,
}

impl Group {
    /// Creates an empty group with default options.
    pub fn new() -> Self {
        Self::with_options(GroupOptions::default())
    }

    /// Creates an empty group.
    pub fn with_options(options: GroupOptions) -> Self {
        let metrics = options.metrics.clone().unwrap_or_else(default_metrics);
        Self {
            tables: Vec::new(),
            names: FxHashMap::default(),
            options,
            metrics,
        }
    }

    /// Options the group was created with.
    pub fn options(&self) -> &GroupOptions {
        &self.options
    }

    /// Table by key.
    pub fn table(&self, key: TableKey) -> Result<&Table> {
        self.tables
            .get(key.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| LinkError::InvalidReference(format!("table {key} does not exist")))
    }

    /// Table key by name.
    pub fn table_key(&self, name: &str) -> Option<TableKey> {
        self.names.get(name).copied()
    }

    /// Live tables in creation order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().flatten()
    }

    /// Content version of a table; increases on every mutation touching it.
    pub fn content_version(&self, table: TableKey) -> Result<u64> {
        Ok(self.table(table)?.content_version())
    }

    /// Link column by group-wide reference.
    pub fn link_column(&self, col: ColumnRef) -> Result<&LinkColumn> {
        self.table(col.table)?.link_column(col.col)
    }

    pub(crate) fn table_mut(&mut self, key: TableKey) -> Result<&mut Table> {
        self.tables
            .get_mut(key.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| LinkError::InvalidReference(format!("table {key} does not exist")))
    }

    pub(crate) fn link_column_mut(&mut self, col: ColumnRef) -> Result<&mut LinkColumn> {
        self.table_mut(col.table)?.link_mut(col.col)
    }

    /// Backlink column paired with the link column `col`.
    pub(crate) fn paired_backlink(&self, col: ColumnRef) -> Result<&BacklinkColumn> {
        let link = self.link_column(col)?;
        self.table(link.target()?)?.backlink(link.backlink()?)
    }

    pub(crate) fn paired_backlink_mut(&mut self, col: ColumnRef) -> Result<&mut BacklinkColumn> {
        let (target, backlink) = {
            let link = self.link_column(col)?;
            (link.target()?, link.backlink()?)
        };
        self.table_mut(target)?.backlink_mut(backlink)
    }

    pub(crate) fn slot(&self, obj: ObjRef) -> Result<usize> {
        self.table(obj.table)?.slot(obj.row)
    }

    pub(crate) fn bump_version(&mut self, table: TableKey) {
        if let Ok(table) = self.table_mut(table) {
            table.bump_version();
        }
    }

    /// Bumps the content version of the table targeted by link column `col`.
    pub fn bump_target_version(&mut self, col: ColumnRef) -> Result<()> {
        let target = self.link_column(col)?.target()?;
        self.bump_version(target);
        Ok(())
    }

    /// Marks both ends of a link column as changed.
    fn touch(&mut self, col: ColumnRef) -> Result<()> {
        self.bump_version(col.table);
        self.bump_target_version(col)
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("tables", &self.tables().map(Table::name).collect::<Vec<_>>())
            .field("removal", &self.options.removal)
            .finish()
    }
}
