use std::collections::BTreeMap;

use crate::error::{broken_invariant, LinkError, Result};
use crate::types::{ColKey, ColumnRef, TableKey};

use super::types::{LinkKind, PrimaryKey};

/// Forward reference as stored in a link column. Live targets are physical row slots.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum Target {
    Row(usize),
    Unresolved(PrimaryKey),
}

impl Target {
    pub(crate) fn row(&self) -> Option<usize> {
        match self {
            Target::Row(slot) => Some(*slot),
            Target::Unresolved(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
enum LinkPayload {
    Single(Vec<Option<Target>>),
    List(Vec<Vec<Target>>),
    /// Each row kept sorted and deduplicated.
    Set(Vec<Vec<Target>>),
    Dictionary(Vec<BTreeMap<String, Option<Target>>>),
}

/// Borrowed view of one row's payload.
pub(crate) enum LinkView<'a> {
    Single(Option<&'a Target>),
    Many(&'a [Target]),
    Dictionary(&'a BTreeMap<String, Option<Target>>),
}

fn kind_mismatch(name: &str, actual: LinkKind, wanted: LinkKind) -> LinkError {
    LinkError::InvalidArgument(format!(
        "column '{name}' is a {actual} link column, not {wanted}"
    ))
}

/// Forward half of a link relation: per origin row, the targets it references.
///
/// The target table and the paired backlink column are bound exactly once when the
/// column is created through [`super::Group::add_link_column`].
#[derive(Clone, Debug)]
pub struct LinkColumn {
    key: ColKey,
    origin: TableKey,
    name: String,
    weak: bool,
    target: Option<TableKey>,
    backlink: Option<ColKey>,
    payload: LinkPayload,
}

impl LinkColumn {
    pub(crate) fn new(
        key: ColKey,
        origin: TableKey,
        name: String,
        kind: LinkKind,
        weak: bool,
        rows: usize,
    ) -> Self {
        let payload = match kind {
            LinkKind::Single => LinkPayload::Single(vec![None; rows]),
            LinkKind::List => LinkPayload::List(vec![Vec::new(); rows]),
            LinkKind::Set => LinkPayload::Set(vec![Vec::new(); rows]),
            LinkKind::Dictionary => LinkPayload::Dictionary(vec![BTreeMap::new(); rows]),
        };
        Self {
            key,
            origin,
            name,
            weak,
            target: None,
            backlink: None,
            payload,
        }
    }

    /// Column key within the origin table.
    pub fn key(&self) -> ColKey {
        self.key
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group-wide identity of this column.
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(self.origin, self.key)
    }

    /// Collection shape.
    pub fn kind(&self) -> LinkKind {
        match self.payload {
            LinkPayload::Single(_) => LinkKind::Single,
            LinkPayload::List(_) => LinkKind::List,
            LinkPayload::Set(_) => LinkKind::Set,
            LinkPayload::Dictionary(_) => LinkKind::Dictionary,
        }
    }

    /// Whether references held by this column leave the target's referenced status alone.
    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub(crate) fn set_weak(&mut self, weak: bool) {
        self.weak = weak;
    }

    /// Target table, once bound.
    pub fn target_table(&self) -> Option<TableKey> {
        self.target
    }

    /// Paired backlink column on the target table, once bound.
    pub fn backlink_column(&self) -> Option<ColKey> {
        self.backlink
    }

    /// Whether a row of this column may hold a null link.
    pub fn is_nullable(&self) -> bool {
        matches!(self.kind(), LinkKind::Single | LinkKind::Dictionary)
    }

    pub(crate) fn target(&self) -> Result<TableKey> {
        self.target.ok_or_else(|| {
            LinkError::InvalidReference(format!(
                "link column '{}' is not attached to a target table",
                self.name
            ))
        })
    }

    pub(crate) fn backlink(&self) -> Result<ColKey> {
        self.backlink.ok_or_else(|| {
            LinkError::InvalidReference(format!(
                "link column '{}' has no backlink column",
                self.name
            ))
        })
    }

    pub(crate) fn bind_target(&mut self, table: TableKey) -> Result<()> {
        if self.target.is_some() {
            return Err(LinkError::Logic("link column target table already bound"));
        }
        self.target = Some(table);
        Ok(())
    }

    pub(crate) fn bind_backlink(&mut self, column: ColKey) -> Result<()> {
        if self.backlink.is_some() {
            return Err(LinkError::Logic("link column backlink column already bound"));
        }
        self.backlink = Some(column);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        match &self.payload {
            LinkPayload::Single(rows) => rows.len(),
            LinkPayload::List(rows) | LinkPayload::Set(rows) => rows.len(),
            LinkPayload::Dictionary(rows) => rows.len(),
        }
    }

    pub(crate) fn push_row(&mut self) {
        match &mut self.payload {
            LinkPayload::Single(rows) => rows.push(None),
            LinkPayload::List(rows) | LinkPayload::Set(rows) => rows.push(Vec::new()),
            LinkPayload::Dictionary(rows) => rows.push(BTreeMap::new()),
        }
    }

    pub(crate) fn pop_row(&mut self) -> Result<()> {
        let last = self.len().checked_sub(1).ok_or_else(|| {
            broken_invariant(format!("link column '{}' has no row to pop", self.name))
        })?;
        if !self.is_empty_row(last) {
            return Err(broken_invariant(format!(
                "link column '{}' dropped row {last} while it still held links",
                self.name
            )));
        }
        match &mut self.payload {
            LinkPayload::Single(rows) => {
                rows.pop();
            }
            LinkPayload::List(rows) | LinkPayload::Set(rows) => {
                rows.pop();
            }
            LinkPayload::Dictionary(rows) => {
                rows.pop();
            }
        }
        Ok(())
    }

    /// Exchanges the payloads stored for two origin rows.
    pub(crate) fn swap_rows(&mut self, a: usize, b: usize) {
        match &mut self.payload {
            LinkPayload::Single(rows) => rows.swap(a, b),
            LinkPayload::List(rows) | LinkPayload::Set(rows) => rows.swap(a, b),
            LinkPayload::Dictionary(rows) => rows.swap(a, b),
        }
    }

    pub(crate) fn view(&self, row: usize) -> LinkView<'_> {
        match &self.payload {
            LinkPayload::Single(rows) => LinkView::Single(rows[row].as_ref()),
            LinkPayload::List(rows) | LinkPayload::Set(rows) => LinkView::Many(&rows[row]),
            LinkPayload::Dictionary(rows) => LinkView::Dictionary(&rows[row]),
        }
    }

    /// Every reference stored in `row`, one entry per occurrence.
    pub(crate) fn targets(&self, row: usize) -> Vec<Target> {
        match self.view(row) {
            LinkView::Single(target) => target.cloned().into_iter().collect(),
            LinkView::Many(targets) => targets.to_vec(),
            LinkView::Dictionary(map) => map.values().flatten().cloned().collect(),
        }
    }

    pub(crate) fn live_targets(&self, row: usize) -> Vec<usize> {
        self.targets(row).iter().filter_map(Target::row).collect()
    }

    pub(crate) fn count_occurrences(&self, row: usize, target: usize) -> usize {
        self.live_targets(row)
            .into_iter()
            .filter(|&t| t == target)
            .count()
    }

    pub(crate) fn unresolved_count(&self) -> usize {
        (0..self.len())
            .map(|row| {
                self.targets(row)
                    .iter()
                    .filter(|t| matches!(t, Target::Unresolved(_)))
                    .count()
            })
            .sum()
    }

    pub(crate) fn is_null(&self, row: usize) -> bool {
        match self.view(row) {
            LinkView::Single(target) => target.is_none(),
            LinkView::Many(targets) => targets.is_empty(),
            LinkView::Dictionary(map) => map.values().all(Option::is_none),
        }
    }

    fn is_empty_row(&self, row: usize) -> bool {
        match self.view(row) {
            LinkView::Dictionary(map) => map.is_empty(),
            _ => self.is_null(row),
        }
    }

    /// Puts `row` into its null representation and returns the references it held.
    /// Dictionary keys are kept with null values.
    pub(crate) fn set_null(&mut self, row: usize) -> Vec<Target> {
        match &mut self.payload {
            LinkPayload::Single(rows) => rows[row].take().into_iter().collect(),
            LinkPayload::List(rows) | LinkPayload::Set(rows) => std::mem::take(&mut rows[row]),
            LinkPayload::Dictionary(rows) => {
                rows[row].values_mut().filter_map(Option::take).collect()
            }
        }
    }

    /// Empties `row` completely, dictionary keys included.
    pub(crate) fn clear_row(&mut self, row: usize) -> Vec<Target> {
        let dropped = self.set_null(row);
        if let LinkPayload::Dictionary(rows) = &mut self.payload {
            rows[row].clear();
        }
        dropped
    }

    /// Removes one occurrence of `old_target` from `row`. Single links become null,
    /// collections drop the element.
    pub(crate) fn nullify(&mut self, row: usize, old_target: usize) -> Result<()> {
        let needle = Target::Row(old_target);
        let removed = match &mut self.payload {
            LinkPayload::Single(rows) => {
                if rows[row].as_ref() == Some(&needle) {
                    rows[row] = None;
                    true
                } else {
                    false
                }
            }
            LinkPayload::List(rows) | LinkPayload::Set(rows) => {
                match rows[row].iter().position(|t| *t == needle) {
                    Some(pos) => {
                        rows[row].remove(pos);
                        true
                    }
                    None => false,
                }
            }
            LinkPayload::Dictionary(rows) => {
                let key = rows[row]
                    .iter()
                    .find(|(_, v)| v.as_ref() == Some(&needle))
                    .map(|(k, _)| k.clone());
                match key {
                    Some(key) => {
                        rows[row].remove(&key);
                        true
                    }
                    None => false,
                }
            }
        };
        if removed {
            Ok(())
        } else {
            Err(broken_invariant(format!(
                "link column '{}' row {row} holds no reference to target row {old_target}",
                self.name
            )))
        }
    }

    /// Replaces every occurrence of `old_target` in `row`; returns how many were replaced.
    pub(crate) fn retarget(&mut self, row: usize, old_target: usize, new_target: usize) -> usize {
        self.rewrite(row, |target| match target {
            Target::Row(slot) if *slot == old_target => Some(Target::Row(new_target)),
            _ => None,
        })
    }

    /// Exchanges the identities `a` and `b` wherever they appear in `row`.
    pub(crate) fn swap_reference(&mut self, row: usize, a: usize, b: usize) -> usize {
        self.rewrite(row, |target| match target {
            Target::Row(slot) if *slot == a => Some(Target::Row(b)),
            Target::Row(slot) if *slot == b => Some(Target::Row(a)),
            _ => None,
        })
    }

    fn rewrite<F>(&mut self, row: usize, map: F) -> usize
    where
        F: Fn(&Target) -> Option<Target>,
    {
        let mut rewritten = 0;
        let mut apply = |slot: &mut Target| {
            if let Some(next) = map(slot) {
                *slot = next;
                rewritten += 1;
            }
        };
        match &mut self.payload {
            LinkPayload::Single(rows) => {
                if let Some(target) = rows[row].as_mut() {
                    apply(target);
                }
            }
            LinkPayload::List(rows) => rows[row].iter_mut().for_each(&mut apply),
            LinkPayload::Set(rows) => {
                rows[row].iter_mut().for_each(&mut apply);
                rows[row].sort();
            }
            LinkPayload::Dictionary(rows) => {
                rows[row].values_mut().flatten().for_each(&mut apply)
            }
        }
        rewritten
    }

    /// Turns every unresolved reference to `pk` into a live reference to `target`.
    /// Returns the origin rows touched, one entry per converted occurrence.
    pub(crate) fn resolve(&mut self, pk: &PrimaryKey, target: usize) -> Vec<usize> {
        let mut origins = Vec::new();
        for row in 0..self.len() {
            let converted = self.rewrite(row, |t| match t {
                Target::Unresolved(key) if key == pk => Some(Target::Row(target)),
                _ => None,
            });
            origins.extend(std::iter::repeat(row).take(converted));
        }
        origins
    }

    pub(crate) fn single(&self, row: usize) -> Result<Option<&Target>> {
        match &self.payload {
            LinkPayload::Single(rows) => Ok(rows[row].as_ref()),
            _ => Err(kind_mismatch(&self.name, self.kind(), LinkKind::Single)),
        }
    }

    pub(crate) fn set_single(&mut self, row: usize, value: Option<Target>) -> Result<Option<Target>> {
        let kind = self.kind();
        match &mut self.payload {
            LinkPayload::Single(rows) => Ok(std::mem::replace(&mut rows[row], value)),
            _ => Err(kind_mismatch(&self.name, kind, LinkKind::Single)),
        }
    }

    pub(crate) fn list(&self, row: usize) -> Result<&[Target]> {
        match &self.payload {
            LinkPayload::List(rows) => Ok(&rows[row]),
            _ => Err(kind_mismatch(&self.name, self.kind(), LinkKind::List)),
        }
    }

    pub(crate) fn list_mut(&mut self, row: usize) -> Result<&mut Vec<Target>> {
        let kind = self.kind();
        match &mut self.payload {
            LinkPayload::List(rows) => Ok(&mut rows[row]),
            _ => Err(kind_mismatch(&self.name, kind, LinkKind::List)),
        }
    }

    pub(crate) fn set(&self, row: usize) -> Result<&[Target]> {
        match &self.payload {
            LinkPayload::Set(rows) => Ok(&rows[row]),
            _ => Err(kind_mismatch(&self.name, self.kind(), LinkKind::Set)),
        }
    }

    /// Inserts into a set row, keeping it sorted. Returns false if already present.
    pub(crate) fn set_insert(&mut self, row: usize, target: Target) -> Result<bool> {
        let kind = self.kind();
        match &mut self.payload {
            LinkPayload::Set(rows) => match rows[row].binary_search(&target) {
                Ok(_) => Ok(false),
                Err(pos) => {
                    rows[row].insert(pos, target);
                    Ok(true)
                }
            },
            _ => Err(kind_mismatch(&self.name, kind, LinkKind::Set)),
        }
    }

    pub(crate) fn set_erase(&mut self, row: usize, target: &Target) -> Result<bool> {
        let kind = self.kind();
        match &mut self.payload {
            LinkPayload::Set(rows) => match rows[row].binary_search(target) {
                Ok(pos) => {
                    rows[row].remove(pos);
                    Ok(true)
                }
                Err(_) => Ok(false),
            },
            _ => Err(kind_mismatch(&self.name, kind, LinkKind::Set)),
        }
    }

    pub(crate) fn dictionary(&self, row: usize) -> Result<&BTreeMap<String, Option<Target>>> {
        match &self.payload {
            LinkPayload::Dictionary(rows) => Ok(&rows[row]),
            _ => Err(kind_mismatch(&self.name, self.kind(), LinkKind::Dictionary)),
        }
    }

    pub(crate) fn dictionary_mut(
        &mut self,
        row: usize,
    ) -> Result<&mut BTreeMap<String, Option<Target>>> {
        let kind = self.kind();
        match &mut self.payload {
            LinkPayload::Dictionary(rows) => Ok(&mut rows[row]),
            _ => Err(kind_mismatch(&self.name, kind, LinkKind::Dictionary)),
        }
    }
}
