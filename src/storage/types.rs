use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ColumnRef, ObjRef, RowKey, TableKey};

/// Scalar type of a value column.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point number.
    Float,
    /// UTF-8 string.
    #[serde(alias = "str")]
    String,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

/// Owned cell value of a value column.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
}

impl Value {
    /// Returns the scalar kind, or `None` for null.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Int(_) => Some(ValueKind::Int),
            Value::Float(_) => Some(ValueKind::Float),
            Value::Str(_) => Some(ValueKind::String),
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// Primary-key value of a table declared with a primary key column.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PrimaryKey {
    /// Integer primary key.
    Int(i64),
    /// String primary key.
    Str(String),
}

impl PrimaryKey {
    /// Scalar kind a column must have to hold this key.
    pub fn kind(&self) -> ValueKind {
        match self {
            PrimaryKey::Int(_) => ValueKind::Int,
            PrimaryKey::Str(_) => ValueKind::String,
        }
    }

    /// Converts the key into a cell value.
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(v) => Value::Int(*v),
            PrimaryKey::Str(v) => Value::Str(v.clone()),
        }
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(PrimaryKey::Int(*v)),
            Value::Str(v) => Some(PrimaryKey::Str(v.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{v}"),
            PrimaryKey::Str(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey::Int(value)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        PrimaryKey::Str(value.to_owned())
    }
}

/// Collection shape of a link column.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Zero or one target per row.
    Single,
    /// Ordered targets, duplicates allowed.
    List,
    /// Unordered targets without duplicates.
    Set,
    /// String-keyed targets; a key may map to null.
    Dictionary,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkKind::Single => "single",
            LinkKind::List => "list",
            LinkKind::Set => "set",
            LinkKind::Dictionary => "dictionary",
        };
        f.write_str(name)
    }
}

/// A link value as exchanged with callers.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Link {
    /// Reference to a live row of the target table.
    Row(RowKey),
    /// Reference to a primary key for which the target table holds no row yet.
    Unresolved(PrimaryKey),
}

impl From<RowKey> for Link {
    fn from(row: RowKey) -> Self {
        Link::Row(row)
    }
}

impl From<ObjRef> for Link {
    fn from(obj: ObjRef) -> Self {
        Link::Row(obj.row)
    }
}

/// Specification for creating a new link column.
#[derive(Clone, Debug)]
pub struct LinkSpec<'a> {
    /// Column name, unique within the origin table.
    pub name: &'a str,
    /// Collection shape.
    pub kind: LinkKind,
    /// Target table.
    pub target: TableKey,
    /// Weak links do not keep their target referenced.
    pub weak: bool,
}

impl<'a> LinkSpec<'a> {
    /// Strong link column of the given shape.
    pub fn strong(name: &'a str, kind: LinkKind, target: TableKey) -> Self {
        Self {
            name,
            kind,
            target,
            weak: false,
        }
    }

    /// Weak link column of the given shape.
    pub fn weak(name: &'a str, kind: LinkKind, target: TableKey) -> Self {
        Self {
            name,
            kind,
            target,
            weak: true,
        }
    }
}

/// One incoming reference: an origin column and the origin row holding the link.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Backlink {
    /// Link column holding the forward reference.
    pub origin: ColumnRef,
    /// Row holding the forward reference.
    pub row: RowKey,
}

impl Backlink {
    /// Handle of the origin row.
    pub fn origin_obj(&self) -> ObjRef {
        ObjRef::new(self.origin.table, self.row)
    }
}
