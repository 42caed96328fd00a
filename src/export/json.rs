use rustc_hash::FxHashSet;
use serde_json::{json, Map, Number, Value as JsonValue};

use super::{LinkDepth, OutputMode, RenderOptions, RenderStats, UnresolvedMode};
use crate::error::Result;
use crate::storage::link::{LinkView, Target};
use crate::storage::{Column, Group, LinkColumn, PrimaryKey, Table, Value};
use crate::types::{ObjRef, TableKey};

/// Remaining hops for a limited traversal; `None` when unlimited.
type Remaining = Option<u32>;

pub(super) struct Renderer<'a> {
    group: &'a Group,
    opts: &'a RenderOptions,
    visited: FxHashSet<(TableKey, usize)>,
    stats: RenderStats,
}

impl<'a> Renderer<'a> {
    pub(super) fn new(group: &'a Group, opts: &'a RenderOptions) -> Self {
        Self {
            group,
            opts,
            visited: FxHashSet::default(),
            stats: RenderStats::default(),
        }
    }

    pub(super) fn into_stats(self) -> RenderStats {
        self.stats
    }

    pub(super) fn render_roots(&mut self, roots: &[ObjRef]) -> Result<JsonValue> {
        let group = self.group;
        let remaining = match self.opts.depth {
            LinkDepth::Unlimited => None,
            LinkDepth::Limited(hops) => Some(hops),
        };
        let mut rows = Vec::with_capacity(roots.len());
        for obj in roots {
            if self.opts.row_limit.is_some_and(|limit| rows.len() >= limit) {
                self.stats.truncated = true;
                break;
            }
            let table = group.table(obj.table)?;
            let slot = table.slot(obj.row)?;
            self.visited.insert((obj.table, slot));
            self.record_visit(table, slot);
            rows.push(self.render_row(table, slot, remaining)?);
        }
        self.stats.roots = rows.len();
        Ok(JsonValue::Array(rows))
    }

    fn render_row(&mut self, table: &'a Table, slot: usize, remaining: Remaining) -> Result<JsonValue> {
        let mut object = Map::new();
        if self.opts.mode == OutputMode::Json {
            object.insert("_key".into(), json!(table.row_key(slot).0));
        }
        for column in table.column_iter() {
            match column {
                Column::Value(col) => {
                    object.insert(self.rename(col.name()), self.scalar(col.value(slot)));
                }
                Column::Link(link) => {
                    let value = self.render_link(link, slot, remaining)?;
                    object.insert(self.rename(link.name()), value);
                }
                Column::Backlink(_) => {}
            }
        }
        Ok(JsonValue::Object(object))
    }

    fn render_link(&mut self, link: &'a LinkColumn, slot: usize, remaining: Remaining) -> Result<JsonValue> {
        let group = self.group;
        let target = group.table(link.target()?)?;
        Ok(match link.view(slot) {
            LinkView::Single(None) => JsonValue::Null,
            LinkView::Single(Some(t)) => self.render_target(target, t, remaining)?,
            LinkView::Many(targets) => {
                let mut items = Vec::with_capacity(targets.len());
                for t in targets {
                    items.push(self.render_target(target, t, remaining)?);
                }
                JsonValue::Array(items)
            }
            LinkView::Dictionary(entries) => {
                let mut object = Map::new();
                for (key, value) in entries {
                    let rendered = match value {
                        None => JsonValue::Null,
                        Some(t) => self.render_target(target, t, remaining)?,
                    };
                    object.insert(key.clone(), rendered);
                }
                JsonValue::Object(object)
            }
        })
    }

    fn render_target(&mut self, table: &'a Table, target: &Target, remaining: Remaining) -> Result<JsonValue> {
        let slot = match target {
            Target::Row(slot) => *slot,
            Target::Unresolved(pk) => return Ok(self.unresolved(table, pk)),
        };
        if !self.should_expand(table.key(), slot, remaining) {
            return Ok(self.reference(table, slot));
        }
        self.stats.expansions += 1;
        self.record_visit(table, slot);
        self.render_row(table, slot, remaining.map(|hops| hops - 1))
    }

    fn should_expand(&mut self, table: TableKey, slot: usize, remaining: Remaining) -> bool {
        if self
            .opts
            .expansion_limit
            .is_some_and(|limit| self.stats.expansions >= limit)
        {
            self.stats.truncated = true;
            return false;
        }
        match remaining {
            None => self.visited.insert((table, slot)),
            Some(hops) => hops > 0,
        }
    }

    fn record_visit(&mut self, table: &Table, slot: usize) {
        *self
            .stats
            .visits
            .entry(ObjRef::new(table.key(), table.row_key(slot)))
            .or_insert(0) += 1;
    }

    /// Identifier printed for a link that is not expanded.
    fn reference(&self, table: &Table, slot: usize) -> JsonValue {
        let key = match table.primary_key_at(slot) {
            Some(pk) if self.opts.mode != OutputMode::Json => self.primary_key(&pk),
            _ => self.integer(table.row_key(slot).0 as i64),
        };
        match self.opts.mode {
            OutputMode::XJsonPlus => json!({
                "$link": { "table": self.rename(table.name()), "key": key }
            }),
            _ => key,
        }
    }

    fn unresolved(&self, table: &Table, pk: &PrimaryKey) -> JsonValue {
        match self.opts.unresolved {
            UnresolvedMode::Null => JsonValue::Null,
            UnresolvedMode::Placeholder => match self.opts.mode {
                OutputMode::XJsonPlus => json!({
                    "$link": {
                        "table": self.rename(table.name()),
                        "key": self.primary_key(pk),
                        "unresolved": true
                    }
                }),
                _ => json!({ "$unresolved": self.primary_key(pk) }),
            },
        }
    }

    fn primary_key(&self, pk: &PrimaryKey) -> JsonValue {
        match pk {
            PrimaryKey::Int(v) => self.integer(*v),
            PrimaryKey::Str(v) => JsonValue::String(v.clone()),
        }
    }

    fn integer(&self, v: i64) -> JsonValue {
        match self.opts.mode {
            OutputMode::Json => json!(v),
            OutputMode::XJson | OutputMode::XJsonPlus => json!({ "$numberLong": v.to_string() }),
        }
    }

    fn scalar(&self, value: &Value) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(v) => JsonValue::Bool(*v),
            Value::Int(v) => self.integer(*v),
            Value::Float(v) => match self.opts.mode {
                OutputMode::Json => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
                OutputMode::XJson | OutputMode::XJsonPlus => {
                    json!({ "$numberDouble": v.to_string() })
                }
            },
            Value::Str(v) => JsonValue::String(v.clone()),
        }
    }

    fn rename(&self, name: &str) -> String {
        self.opts
            .renames
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }
}
