use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{broken_invariant, LinkError, Result};
use crate::types::{ColKey, RowKey, TableKey};

use super::backlink::BacklinkColumn;
use super::link::LinkColumn;
use super::types::{LinkKind, PrimaryKey, Value, ValueKind};

#[derive(Clone, Debug)]
pub(crate) struct ValueColumn {
    key: ColKey,
    name: String,
    kind: ValueKind,
    nullable: bool,
    data: Vec<Value>,
}

impl ValueColumn {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn value(&self, slot: usize) -> &Value {
        &self.data[slot]
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Column {
    Value(ValueColumn),
    Link(LinkColumn),
    Backlink(BacklinkColumn),
}

impl Column {
    pub(crate) fn key(&self) -> ColKey {
        match self {
            Column::Value(col) => col.key,
            Column::Link(col) => col.key(),
            Column::Backlink(col) => col.key(),
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            Column::Value(col) => Some(&col.name),
            Column::Link(col) => Some(col.name()),
            Column::Backlink(_) => None,
        }
    }

    fn push_row(&mut self) {
        match self {
            Column::Value(col) => col.data.push(Value::Null),
            Column::Link(col) => col.push_row(),
            Column::Backlink(col) => col.push_row(),
        }
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        match self {
            Column::Value(col) => col.data.swap(a, b),
            Column::Link(col) => col.swap_rows(a, b),
            Column::Backlink(col) => col.retarget_row(a, b),
        }
    }

    fn pop_row(&mut self) -> Result<()> {
        match self {
            Column::Value(col) => {
                col.data.pop();
                Ok(())
            }
            Column::Link(col) => col.pop_row(),
            Column::Backlink(col) => col.pop_row(),
        }
    }
}

/// Public description of a column. Backlink columns are never listed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column key.
    pub key: ColKey,
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: ColumnType,
}

/// Type of a public column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Scalar values.
    Value {
        /// Scalar kind.
        kind: ValueKind,
        /// Whether null is accepted.
        nullable: bool,
    },
    /// Forward links.
    Link {
        /// Collection shape.
        kind: LinkKind,
        /// Target table.
        target: TableKey,
        /// Weak flag.
        weak: bool,
    },
}

/// A table: ordered columns plus rows addressed by stable [`RowKey`]s.
///
/// Rows occupy physical slots `0..len()`. Slots change when rows are removed or
/// swapped; row keys never do.
#[derive(Clone, Debug)]
pub struct Table {
    key: TableKey,
    name: String,
    columns: Vec<Column>,
    next_col: u32,
    primary_key: Option<ColKey>,
    pk_index: FxHashMap<PrimaryKey, RowKey>,
    keys: Vec<RowKey>,
    slots: FxHashMap<RowKey, usize>,
    next_row: u64,
    content_version: u64,
}

impl Table {
    pub(crate) fn new(key: TableKey, name: String) -> Self {
        Self {
            key,
            name,
            columns: Vec::new(),
            next_col: 0,
            primary_key: None,
            pk_index: FxHashMap::default(),
            keys: Vec::new(),
            slots: FxHashMap::default(),
            next_row: 0,
            content_version: 0,
        }
    }

    /// Table key.
    pub fn key(&self) -> TableKey {
        self.key
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Counter bumped on every mutation touching this table.
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    /// Row keys in physical order.
    pub fn row_keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Whether `row` is a live row of this table.
    pub fn contains_row(&self, row: RowKey) -> bool {
        self.slots.contains_key(&row)
    }

    /// Physical slot currently holding `row`.
    pub fn slot_of(&self, row: RowKey) -> Option<usize> {
        self.slots.get(&row).copied()
    }

    /// Public schema, in column order.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .filter_map(|column| {
                let ty = match column {
                    Column::Value(col) => ColumnType::Value {
                        kind: col.kind,
                        nullable: col.nullable,
                    },
                    Column::Link(col) => ColumnType::Link {
                        kind: col.kind(),
                        target: col.target_table()?,
                        weak: col.is_weak(),
                    },
                    Column::Backlink(_) => return None,
                };
                Some(ColumnInfo {
                    key: column.key(),
                    name: column.name()?.to_owned(),
                    ty,
                })
            })
            .collect()
    }

    /// Looks up a public column by name.
    pub fn column_key(&self, name: &str) -> Option<ColKey> {
        self.columns
            .iter()
            .find(|column| column.name() == Some(name))
            .map(Column::key)
    }

    /// Primary-key column, if the table was created with one.
    pub fn primary_key_column(&self) -> Option<ColKey> {
        self.primary_key
    }

    /// Link column by key.
    pub fn link_column(&self, col: ColKey) -> Result<&LinkColumn> {
        match self.column(col)? {
            Column::Link(link) => Ok(link),
            _ => Err(LinkError::InvalidArgument(format!(
                "column {col} of table '{}' is not a link column",
                self.name
            ))),
        }
    }

    /// Cell value of a value column.
    pub fn value(&self, row: RowKey, col: ColKey) -> Result<&Value> {
        let slot = self.slot(row)?;
        match self.column(col)? {
            Column::Value(column) => Ok(column.value(slot)),
            _ => Err(LinkError::InvalidArgument(format!(
                "column {col} of table '{}' is not a value column",
                self.name
            ))),
        }
    }

    /// Primary key of `row`, if the table has one.
    pub fn primary_key_of(&self, row: RowKey) -> Result<Option<PrimaryKey>> {
        let slot = self.slot(row)?;
        Ok(self.primary_key_at(slot))
    }

    /// Live row holding primary key `pk`.
    pub fn find_primary_key(&self, pk: &PrimaryKey) -> Option<RowKey> {
        self.pk_index.get(pk).copied()
    }

    pub(crate) fn primary_key_at(&self, slot: usize) -> Option<PrimaryKey> {
        let col = self.primary_key?;
        match self.column(col).ok()? {
            Column::Value(column) => PrimaryKey::from_value(column.value(slot)),
            _ => None,
        }
    }

    pub(crate) fn slot(&self, row: RowKey) -> Result<usize> {
        self.slot_of(row).ok_or_else(|| {
            LinkError::InvalidReference(format!(
                "row {row} no longer exists in table '{}'",
                self.name
            ))
        })
    }

    pub(crate) fn row_key(&self, slot: usize) -> RowKey {
        self.keys[slot]
    }

    pub(crate) fn bump_version(&mut self) {
        self.content_version += 1;
    }

    pub(crate) fn column(&self, col: ColKey) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.key() == col)
            .ok_or_else(|| {
                LinkError::InvalidReference(format!(
                    "column {col} does not exist in table '{}'",
                    self.name
                ))
            })
    }

    fn column_mut(&mut self, col: ColKey) -> Result<&mut Column> {
        let name = &self.name;
        self.columns
            .iter_mut()
            .find(|column| column.key() == col)
            .ok_or_else(|| {
                LinkError::InvalidReference(format!(
                    "column {col} does not exist in table '{name}'"
                ))
            })
    }

    pub(crate) fn column_iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub(crate) fn links(&self) -> impl Iterator<Item = &LinkColumn> {
        self.columns.iter().filter_map(|column| match column {
            Column::Link(link) => Some(link),
            _ => None,
        })
    }

    pub(crate) fn backlinks(&self) -> impl Iterator<Item = &BacklinkColumn> {
        self.columns.iter().filter_map(|column| match column {
            Column::Backlink(backlink) => Some(backlink),
            _ => None,
        })
    }

    pub(crate) fn backlinks_mut(&mut self) -> impl Iterator<Item = &mut BacklinkColumn> {
        self.columns.iter_mut().filter_map(|column| match column {
            Column::Backlink(backlink) => Some(backlink),
            _ => None,
        })
    }

    pub(crate) fn link_mut(&mut self, col: ColKey) -> Result<&mut LinkColumn> {
        let name = self.name.clone();
        match self.column_mut(col)? {
            Column::Link(link) => Ok(link),
            _ => Err(LinkError::InvalidArgument(format!(
                "column {col} of table '{name}' is not a link column"
            ))),
        }
    }

    pub(crate) fn backlink(&self, col: ColKey) -> Result<&BacklinkColumn> {
        match self.column(col)? {
            Column::Backlink(backlink) => Ok(backlink),
            _ => Err(broken_invariant(format!(
                "column {col} of table '{}' is not a backlink column",
                self.name
            ))),
        }
    }

    pub(crate) fn backlink_mut(&mut self, col: ColKey) -> Result<&mut BacklinkColumn> {
        let name = self.name.clone();
        match self.column_mut(col)? {
            Column::Backlink(backlink) => Ok(backlink),
            _ => Err(broken_invariant(format!(
                "column {col} of table '{name}' is not a backlink column"
            ))),
        }
    }

    fn ensure_unique_name(&self, name: &str) -> Result<()> {
        if self.column_key(name).is_some() {
            return Err(LinkError::NameInUse(format!("{}.{name}", self.name)));
        }
        Ok(())
    }

    pub(crate) fn allocate_col(&mut self) -> ColKey {
        let key = ColKey(self.next_col);
        self.next_col += 1;
        key
    }

    pub(crate) fn add_value_column(
        &mut self,
        name: &str,
        kind: ValueKind,
        nullable: bool,
    ) -> Result<ColKey> {
        self.ensure_unique_name(name)?;
        let key = self.allocate_col();
        let default = if nullable {
            Value::Null
        } else {
            default_value(kind)
        };
        self.columns.push(Column::Value(ValueColumn {
            key,
            name: name.to_owned(),
            kind,
            nullable,
            data: vec![default; self.keys.len()],
        }));
        self.bump_version();
        Ok(key)
    }

    pub(crate) fn add_primary_key_column(&mut self, name: &str, kind: ValueKind) -> Result<ColKey> {
        if !matches!(kind, ValueKind::Int | ValueKind::String) {
            return Err(LinkError::InvalidArgument(format!(
                "primary key column '{name}' must be int or string, not {kind}"
            )));
        }
        if !self.is_empty() || self.primary_key.is_some() {
            return Err(LinkError::Logic(
                "primary key must be declared on an empty table without one",
            ));
        }
        let key = self.add_value_column(name, kind, false)?;
        self.primary_key = Some(key);
        Ok(key)
    }

    pub(crate) fn check_link_name(&self, name: &str) -> Result<()> {
        self.ensure_unique_name(name)
    }

    pub(crate) fn push_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub(crate) fn remove_column(&mut self, col: ColKey) -> Result<Column> {
        let pos = self
            .columns
            .iter()
            .position(|column| column.key() == col)
            .ok_or_else(|| {
                LinkError::InvalidReference(format!(
                    "column {col} does not exist in table '{}'",
                    self.name
                ))
            })?;
        self.bump_version();
        Ok(self.columns.remove(pos))
    }

    pub(crate) fn push_row(&mut self) -> (RowKey, usize) {
        let row = RowKey(self.next_row);
        self.next_row += 1;
        let slot = self.keys.len();
        for column in &mut self.columns {
            column.push_row();
            if let Column::Value(col) = column {
                if !col.nullable {
                    col.data[slot] = default_value(col.kind);
                }
            }
        }
        self.keys.push(row);
        self.slots.insert(row, slot);
        (row, slot)
    }

    pub(crate) fn check_primary_key(&self, pk: &PrimaryKey) -> Result<()> {
        let col = self.primary_key.ok_or_else(|| {
            LinkError::InvalidArgument(format!("table '{}' has no primary key", self.name))
        })?;
        let expected = match self.column(col)? {
            Column::Value(column) => column.kind,
            _ => return Err(broken_invariant("primary key column is not a value column")),
        };
        if pk.kind() != expected {
            return Err(LinkError::InvalidArgument(format!(
                "primary key {pk} of table '{}' must be {expected}",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn assign_primary_key(&mut self, slot: usize, pk: PrimaryKey) -> Result<()> {
        self.check_primary_key(&pk)?;
        if self.pk_index.contains_key(&pk) {
            return Err(LinkError::DuplicatePrimaryKey(pk.to_string()));
        }
        let col = self
            .primary_key
            .ok_or_else(|| broken_invariant("primary key column vanished"))?;
        let row = self.row_key(slot);
        if let Column::Value(column) = self.column_mut(col)? {
            column.data[slot] = pk.to_value();
        }
        self.pk_index.insert(pk, row);
        Ok(())
    }

    pub(crate) fn set_value(&mut self, slot: usize, col: ColKey, value: Value) -> Result<()> {
        if Some(col) == self.primary_key {
            return Err(LinkError::Logic("primary key values cannot be modified"));
        }
        let table = self.name.clone();
        let column = match self.column_mut(col)? {
            Column::Value(column) => column,
            _ => {
                return Err(LinkError::InvalidArgument(format!(
                    "column {col} of table '{table}' is not a value column"
                )))
            }
        };
        match value.kind() {
            None if !column.nullable => {
                return Err(LinkError::InvalidArgument(format!(
                    "column '{table}.{}' is not nullable",
                    column.name
                )))
            }
            Some(kind) if kind != column.kind => {
                return Err(LinkError::InvalidArgument(format!(
                    "column '{table}.{}' holds {} values, got {kind}",
                    column.name, column.kind
                )))
            }
            _ => {}
        }
        column.data[slot] = value;
        Ok(())
    }

    /// Physically exchanges two slots across every column and the key map.
    pub(crate) fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for column in &mut self.columns {
            column.swap_rows(a, b);
        }
        self.keys.swap(a, b);
        self.slots.insert(self.keys[a], a);
        self.slots.insert(self.keys[b], b);
    }

    /// Drops the last slot. Its links must already have been cleared.
    pub(crate) fn pop_row(&mut self) -> Result<RowKey> {
        let last = self
            .keys
            .len()
            .checked_sub(1)
            .ok_or_else(|| broken_invariant(format!("table '{}' has no row to pop", self.name)))?;
        if let Some(pk) = self.primary_key_at(last) {
            self.pk_index.remove(&pk);
        }
        for column in &mut self.columns {
            column.pop_row()?;
        }
        let row = self.keys.remove(last);
        self.slots.remove(&row);
        Ok(row)
    }
}

fn default_value(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Int => Value::Int(0),
        ValueKind::Float => Value::Float(0.0),
        ValueKind::String => Value::Str(String::new()),
    }
}
