use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use crate::error::LinkError;
use crate::storage::{Group, GroupOptions, Link, LinkKind, LinkSpec, PrimaryKey, Value, ValueKind};
use crate::types::{ColKey, ObjRef, TableKey};

/// A schema plus rows, as read from a JSON fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    /// Tables in creation order.
    pub tables: Vec<TableDef>,
}

/// One table of a fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Primary key column, if the table has one.
    #[serde(default)]
    pub primary_key: Option<PrimaryKeyDef>,
    /// Value and link columns.
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    /// Rows as flat objects keyed by column name.
    #[serde(default)]
    pub rows: Vec<Map<String, JsonValue>>,
}

/// Primary key column definition.
#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryKeyDef {
    /// Column name.
    pub name: String,
    /// `int` or `string`.
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

/// Column definition; link columns are recognised by their `link` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ColumnDef {
    /// Link column to `target`.
    Link {
        /// Column name.
        name: String,
        /// Collection shape.
        link: LinkKind,
        /// Target table name.
        target: String,
        /// Weak links do not block dropping the target table.
        #[serde(default)]
        weak: bool,
    },
    /// Scalar column.
    Value {
        /// Column name.
        name: String,
        /// Scalar type.
        #[serde(rename = "type")]
        kind: ValueKind,
        /// Whether `null` is accepted.
        #[serde(default)]
        nullable: bool,
    },
}

/// Errors raised while loading a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The file could not be read.
    #[error("failed to read fixture {path}: {source}")]
    Io {
        /// Fixture path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not a valid fixture document.
    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
    /// The group rejected an operation.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// A cell or reference does not fit the schema.
    #[error("invalid fixture: {0}")]
    Invalid(String),
}

/// A group built from a fixture, with the rows of each table in fixture order.
#[derive(Debug)]
pub struct LoadedFixture {
    /// The populated group.
    pub group: Group,
    /// Rows per table name, indexed by their ordinal in the fixture.
    pub rows: BTreeMap<String, Vec<ObjRef>>,
}

impl LoadedFixture {
    /// Row `ordinal` of table `name`.
    pub fn row(&self, name: &str, ordinal: usize) -> Option<ObjRef> {
        self.rows.get(name).and_then(|rows| rows.get(ordinal)).copied()
    }

    /// Key of table `name`.
    pub fn table(&self, name: &str) -> Result<TableKey, FixtureError> {
        self.group
            .table_key(name)
            .ok_or_else(|| FixtureError::Invalid(format!("unknown table '{name}'")))
    }
}

/// Reads and builds the fixture at `path`.
pub fn load_fixture(path: &Path, options: GroupOptions) -> Result<LoadedFixture, FixtureError> {
    let contents = fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fixture: Fixture = serde_json::from_str(&contents)?;
    build_fixture(&fixture, options)
}

/// Builds a group from an already parsed fixture.
///
/// Tables are created first, then columns, then rows with their scalar cells, and links
/// last so that a cell may refer to any row of any table by ordinal.
pub fn build_fixture(fixture: &Fixture, options: GroupOptions) -> Result<LoadedFixture, FixtureError> {
    let mut group = Group::with_options(options);
    let mut keys = Vec::with_capacity(fixture.tables.len());
    for def in &fixture.tables {
        let key = match &def.primary_key {
            Some(pk) => group.add_table_with_primary_key(&def.name, &pk.name, pk.kind)?,
            None => group.add_table(&def.name)?,
        };
        keys.push(key);
    }

    let mut columns: Vec<Vec<(ColKey, &ColumnDef)>> = Vec::with_capacity(keys.len());
    for (def, &key) in fixture.tables.iter().zip(&keys) {
        let mut table_columns = Vec::with_capacity(def.columns.len());
        for column in &def.columns {
            let col = match column {
                ColumnDef::Value { name, kind, nullable } => {
                    group.add_column(key, name, *kind, *nullable)?
                }
                ColumnDef::Link { name, link, target, weak } => {
                    let target = table_key(&group, target)?;
                    let spec = LinkSpec {
                        name: name.as_str(),
                        kind: *link,
                        target,
                        weak: *weak,
                    };
                    group.add_link_column(key, spec)?
                }
            };
            table_columns.push((col, column));
        }
        columns.push(table_columns);
    }

    let mut rows = BTreeMap::new();
    for (def, &key) in fixture.tables.iter().zip(&keys) {
        let mut created = Vec::with_capacity(def.rows.len());
        for cells in &def.rows {
            let obj = match &def.primary_key {
                Some(pk) => {
                    let cell = cells.get(&pk.name).ok_or_else(|| {
                        FixtureError::Invalid(format!(
                            "row of '{}' lacks primary key '{}'",
                            def.name, pk.name
                        ))
                    })?;
                    group.create_row_with_primary_key(key, primary_key(cell)?)?
                }
                None => group.create_row(key)?,
            };
            created.push(obj);
        }
        rows.insert(def.name.clone(), created);
    }

    for ((def, table_columns), &key) in fixture.tables.iter().zip(&columns).zip(&keys) {
        for (ordinal, cells) in def.rows.iter().enumerate() {
            let obj = rows[&def.name][ordinal];
            for &(col, column) in table_columns {
                let ColumnDef::Value { name, kind, .. } = column else {
                    continue;
                };
                if let Some(cell) = cells.get(name) {
                    group.set_value(obj, col, scalar(*kind, cell)?)?;
                }
            }
        }
        debug!(table = %def.name, key = %key, rows = def.rows.len(), "fixture rows loaded");
    }

    for (def, table_columns) in fixture.tables.iter().zip(&columns) {
        for (ordinal, cells) in def.rows.iter().enumerate() {
            let obj = rows[&def.name][ordinal];
            for &(col, column) in table_columns {
                let ColumnDef::Link { name, link, target, .. } = column else {
                    continue;
                };
                let Some(cell) = cells.get(name) else {
                    continue;
                };
                let target_rows = rows.get(target).map(Vec::as_slice).unwrap_or_default();
                let target = table_key(&group, target)?;
                let cells = LinkCells {
                    group: &group,
                    target,
                    rows: target_rows,
                };
                match link {
                    LinkKind::Single => {
                        let value = cells.optional(cell)?;
                        group.set_link(obj, col, value)?;
                    }
                    LinkKind::List | LinkKind::Set => {
                        let items = cells.many(cell)?;
                        for item in items {
                            if *link == LinkKind::List {
                                group.list_push(obj, col, item)?;
                            } else {
                                group.set_insert(obj, col, item)?;
                            }
                        }
                    }
                    LinkKind::Dictionary => {
                        for (key, value) in cells.entries(cell)? {
                            group.dict_insert(obj, col, &key, value)?;
                        }
                    }
                }
            }
        }
    }

    debug!(tables = keys.len(), "fixture loaded");
    Ok(LoadedFixture { group, rows })
}

fn table_key(group: &Group, name: &str) -> Result<TableKey, FixtureError> {
    group
        .table_key(name)
        .ok_or_else(|| FixtureError::Invalid(format!("unknown link target table '{name}'")))
}

/// Resolves link cells against the rows of one target table.
struct LinkCells<'a> {
    group: &'a Group,
    target: TableKey,
    rows: &'a [ObjRef],
}

impl LinkCells<'_> {
    fn optional(&self, cell: &JsonValue) -> Result<Option<Link>, FixtureError> {
        match cell {
            JsonValue::Null => Ok(None),
            JsonValue::Number(n) => {
                let ordinal = n
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| FixtureError::Invalid(format!("bad row ordinal {n}")))?;
                let obj = self.rows.get(ordinal).ok_or_else(|| {
                    FixtureError::Invalid(format!("row ordinal {ordinal} out of range"))
                })?;
                Ok(Some(Link::Row(obj.row)))
            }
            JsonValue::Object(map) => {
                let pk = map.get("unresolved").ok_or_else(|| {
                    FixtureError::Invalid(format!("unexpected link cell {cell}"))
                })?;
                Ok(Some(self.group.link_to_primary_key(self.target, primary_key(pk)?)?))
            }
            other => Err(FixtureError::Invalid(format!("unexpected link cell {other}"))),
        }
    }

    fn many(&self, cell: &JsonValue) -> Result<Vec<Link>, FixtureError> {
        let JsonValue::Array(items) = cell else {
            return Err(FixtureError::Invalid(format!("expected an array, got {cell}")));
        };
        items
            .iter()
            .map(|item| {
                self.optional(item)?
                    .ok_or_else(|| FixtureError::Invalid("null inside a link list".into()))
            })
            .collect()
    }

    fn entries(&self, cell: &JsonValue) -> Result<Vec<(String, Option<Link>)>, FixtureError> {
        let JsonValue::Object(map) = cell else {
            return Err(FixtureError::Invalid(format!("expected an object, got {cell}")));
        };
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.optional(value)?)))
            .collect()
    }
}

fn primary_key(cell: &JsonValue) -> Result<PrimaryKey, FixtureError> {
    match cell {
        JsonValue::String(s) => Ok(PrimaryKey::Str(s.clone())),
        JsonValue::Number(n) => n
            .as_i64()
            .map(PrimaryKey::Int)
            .ok_or_else(|| FixtureError::Invalid(format!("primary key {n} is not an integer"))),
        other => Err(FixtureError::Invalid(format!("bad primary key {other}"))),
    }
}

fn scalar(kind: ValueKind, cell: &JsonValue) -> Result<Value, FixtureError> {
    let value = match (kind, cell) {
        (_, JsonValue::Null) => Some(Value::Null),
        (ValueKind::Bool, JsonValue::Bool(b)) => Some(Value::Bool(*b)),
        (ValueKind::Int, JsonValue::Number(n)) => n.as_i64().map(Value::Int),
        (ValueKind::Float, JsonValue::Number(n)) => n.as_f64().map(Value::Float),
        (ValueKind::String, JsonValue::String(s)) => Some(Value::Str(s.clone())),
        _ => None,
    };
    value.ok_or_else(|| FixtureError::Invalid(format!("cell {cell} is not a {kind:?}")))
}
