use std::collections::BTreeMap;

use tracing::trace;

use super::Group;
use crate::error::{broken_invariant, LinkError, Result};
use crate::storage::link::Target;
use crate::storage::types::{Backlink, Link};
use crate::types::{ColKey, ColumnRef, ObjRef, TableKey};

impl Group {
    /// Validates `obj` and `col`, returning the column reference and the row's slot.
    fn locate(&self, obj: ObjRef, col: ColKey) -> Result<(ColumnRef, usize)> {
        let table = self.table(obj.table)?;
        let slot = table.slot(obj.row)?;
        table.link_column(col)?;
        Ok((ColumnRef::new(obj.table, col), slot))
    }

    pub(crate) fn resolve_link(&self, target_table: TableKey, link: &Link) -> Result<Target> {
        let table = self.table(target_table)?;
        match link {
            Link::Row(row) => Ok(Target::Row(table.slot(*row)?)),
            Link::Unresolved(pk) => {
                table.check_primary_key(pk)?;
                match table.find_primary_key(pk) {
                    Some(row) => Ok(Target::Row(table.slot(row)?)),
                    None => Ok(Target::Unresolved(pk.clone())),
                }
            }
        }
    }

    pub(crate) fn to_link(&self, target_table: TableKey, target: &Target) -> Result<Link> {
        match target {
            Target::Row(slot) => {
                let table = self.table(target_table)?;
                if *slot >= table.len() {
                    return Err(broken_invariant(format!(
                        "link names slot {slot} beyond the end of table '{}'",
                        table.name()
                    )));
                }
                Ok(Link::Row(table.row_key(*slot)))
            }
            Target::Unresolved(pk) => Ok(Link::Unresolved(pk.clone())),
        }
    }

    fn to_links<'a>(
        &self,
        target_table: TableKey,
        targets: impl IntoIterator<Item = &'a Target>,
    ) -> Result<Vec<Link>> {
        targets
            .into_iter()
            .map(|target| self.to_link(target_table, target))
            .collect()
    }

    /// Records the backlink tuple for a new forward reference.
    pub(crate) fn attach(&mut self, col: ColumnRef, origin_row: usize, target: &Target) -> Result<()> {
        let Some(target_row) = target.row() else {
            return Ok(());
        };
        self.paired_backlink_mut(col)?.add(target_row, origin_row);
        self.metrics.link_added();
        Ok(())
    }

    /// Removes the backlink tuple of a forward reference about to be dropped.
    fn detach(&mut self, col: ColumnRef, origin_row: usize, target: &Target) -> Result<()> {
        let Some(target_row) = target.row() else {
            return Ok(());
        };
        self.paired_backlink_mut(col)?.remove_one(target_row, origin_row)?;
        self.metrics.link_removed();
        Ok(())
    }

    /// Checks that every live reference in `targets` has a matching backlink tuple, so a
    /// batch of detaches cannot fail halfway through.
    fn ensure_backlinks(&self, col: ColumnRef, origin_row: usize, targets: &[Target]) -> Result<()> {
        let backlink = self.paired_backlink(col)?;
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for target_row in targets.iter().filter_map(Target::row) {
            *counts.entry(target_row).or_default() += 1;
        }
        for (target_row, expected) in counts {
            let found = if target_row < backlink.len() {
                backlink.count_origin(target_row, origin_row)
            } else {
                0
            };
            if found < expected {
                return Err(broken_invariant(format!(
                    "{col} row {origin_row} holds {expected} reference(s) to row {target_row} \
                     but only {found} backlink tuple(s) exist"
                )));
            }
        }
        Ok(())
    }

    fn target_of(&self, col: ColumnRef) -> Result<TableKey> {
        self.link_column(col)?.target()
    }

    /// Sets a single-link cell; `None` clears it.
    pub fn set_link(&mut self, obj: ObjRef, col: ColKey, value: Option<Link>) -> Result<()> {
        let (col, row) = self.locate(obj, col)?;
        let target_table = self.target_of(col)?;
        let new = value
            .as_ref()
            .map(|link| self.resolve_link(target_table, link))
            .transpose()?;
        let old = self.link_column(col)?.single(row)?.cloned();
        if old == new {
            return Ok(());
        }
        if let Some(old) = &old {
            self.detach(col, row, old)?;
        }
        self.link_column_mut(col)?.set_single(row, new.clone())?;
        if let Some(new) = &new {
            self.attach(col, row, new)?;
        }
        self.touch(col)
    }

    /// Reads a single-link cell.
    pub fn get_link(&self, obj: ObjRef, col: ColKey) -> Result<Option<Link>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        let target_table = link.target()?;
        link.single(row)?
            .map(|target| self.to_link(target_table, target))
            .transpose()
    }

    /// Appends to a link list.
    pub fn list_push(&mut self, obj: ObjRef, col: ColKey, link: Link) -> Result<()> {
        let (col_ref, row) = self.locate(obj, col)?;
        let len = self.link_column(col_ref)?.list(row)?.len();
        self.list_insert(obj, col, len, link)
    }

    /// Inserts into a link list at `index` (`index == len` appends).
    pub fn list_insert(&mut self, obj: ObjRef, col: ColKey, index: usize, link: Link) -> Result<()> {
        let (col, row) = self.locate(obj, col)?;
        let target = self.resolve_link(self.target_of(col)?, &link)?;
        let list = self.link_column_mut(col)?.list_mut(row)?;
        if index > list.len() {
            return Err(LinkError::InvalidArgument(format!(
                "list index {index} out of bounds (len {})",
                list.len()
            )));
        }
        list.insert(index, target.clone());
        self.attach(col, row, &target)?;
        self.touch(col)
    }

    /// Replaces the element at `index`, returning the previous link.
    pub fn list_set(&mut self, obj: ObjRef, col: ColKey, index: usize, link: Link) -> Result<Link> {
        let (col, row) = self.locate(obj, col)?;
        let target_table = self.target_of(col)?;
        let target = self.resolve_link(target_table, &link)?;
        let old = self.list_element(col, row, index)?;
        let previous = self.to_link(target_table, &old)?;
        self.detach(col, row, &old)?;
        self.link_column_mut(col)?.list_mut(row)?[index] = target.clone();
        self.attach(col, row, &target)?;
        self.touch(col)?;
        Ok(previous)
    }

    /// Removes the element at `index`, returning it.
    pub fn list_remove(&mut self, obj: ObjRef, col: ColKey, index: usize) -> Result<Link> {
        let (col, row) = self.locate(obj, col)?;
        let old = self.list_element(col, row, index)?;
        let previous = self.to_link(self.target_of(col)?, &old)?;
        self.detach(col, row, &old)?;
        self.link_column_mut(col)?.list_mut(row)?.remove(index);
        self.touch(col)?;
        Ok(previous)
    }

    fn list_element(&self, col: ColumnRef, row: usize, index: usize) -> Result<Target> {
        let list = self.link_column(col)?.list(row)?;
        list.get(index).cloned().ok_or_else(|| {
            LinkError::InvalidArgument(format!(
                "list index {index} out of bounds (len {})",
                list.len()
            ))
        })
    }

    /// Elements of a link list in order.
    pub fn list(&self, obj: ObjRef, col: ColKey) -> Result<Vec<Link>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        self.to_links(link.target()?, link.list(row)?)
    }

    /// Adds a link to a link set. Returns false, without side effects, if already present.
    pub fn set_insert(&mut self, obj: ObjRef, col: ColKey, link: Link) -> Result<bool> {
        let (col, row) = self.locate(obj, col)?;
        let target = self.resolve_link(self.target_of(col)?, &link)?;
        if !self.link_column_mut(col)?.set_insert(row, target.clone())? {
            return Ok(false);
        }
        self.attach(col, row, &target)?;
        self.touch(col)?;
        Ok(true)
    }

    /// Removes a link from a link set. Returns false if it was not present.
    pub fn set_erase(&mut self, obj: ObjRef, col: ColKey, link: Link) -> Result<bool> {
        let (col, row) = self.locate(obj, col)?;
        let target = self.resolve_link(self.target_of(col)?, &link)?;
        if !self.link_column(col)?.set(row)?.contains(&target) {
            return Ok(false);
        }
        self.detach(col, row, &target)?;
        self.link_column_mut(col)?.set_erase(row, &target)?;
        self.touch(col)?;
        Ok(true)
    }

    /// Members of a link set in storage order.
    pub fn set_members(&self, obj: ObjRef, col: ColKey) -> Result<Vec<Link>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        self.to_links(link.target()?, link.set(row)?)
    }

    /// Inserts or replaces a dictionary entry. `None` stores an explicit null.
    pub fn dict_insert(
        &mut self,
        obj: ObjRef,
        col: ColKey,
        key: &str,
        value: Option<Link>,
    ) -> Result<()> {
        let (col, row) = self.locate(obj, col)?;
        let target_table = self.target_of(col)?;
        let new = value
            .as_ref()
            .map(|link| self.resolve_link(target_table, link))
            .transpose()?;
        let old = self
            .link_column(col)?
            .dictionary(row)?
            .get(key)
            .cloned()
            .flatten();
        if let Some(old) = &old {
            self.detach(col, row, old)?;
        }
        self.link_column_mut(col)?
            .dictionary_mut(row)?
            .insert(key.to_owned(), new.clone());
        if let Some(new) = &new {
            self.attach(col, row, new)?;
        }
        self.touch(col)
    }

    /// Removes a dictionary entry. Returns false if the key was absent.
    pub fn dict_erase(&mut self, obj: ObjRef, col: ColKey, key: &str) -> Result<bool> {
        let (col, row) = self.locate(obj, col)?;
        let old = match self.link_column(col)?.dictionary(row)?.get(key) {
            None => return Ok(false),
            Some(old) => old.clone(),
        };
        if let Some(old) = &old {
            self.detach(col, row, old)?;
        }
        self.link_column_mut(col)?.dictionary_mut(row)?.remove(key);
        self.touch(col)?;
        Ok(true)
    }

    /// Looks up a dictionary entry: `None` if absent, `Some(None)` if present and null.
    pub fn dict_get(&self, obj: ObjRef, col: ColKey, key: &str) -> Result<Option<Option<Link>>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        let target_table = link.target()?;
        match link.dictionary(row)?.get(key) {
            None => Ok(None),
            Some(None) => Ok(Some(None)),
            Some(Some(target)) => Ok(Some(Some(self.to_link(target_table, target)?))),
        }
    }

    /// Dictionary entries in key order.
    pub fn dict_entries(&self, obj: ObjRef, col: ColKey) -> Result<Vec<(String, Option<Link>)>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        let target_table = link.target()?;
        link.dictionary(row)?
            .iter()
            .map(|(key, value)| -> Result<(String, Option<Link>)> {
                let value = value
                    .as_ref()
                    .map(|target| self.to_link(target_table, target))
                    .transpose()?;
                Ok((key.clone(), value))
            })
            .collect()
    }

    /// Every reference held by a cell, whatever the column's shape, one per occurrence.
    pub fn links(&self, obj: ObjRef, col: ColKey) -> Result<Vec<Link>> {
        let (col, row) = self.locate(obj, col)?;
        let link = self.link_column(col)?;
        self.to_links(link.target()?, &link.targets(row))
    }

    /// Puts a cell into its null representation, dropping every backlink it held.
    pub fn set_null(&mut self, obj: ObjRef, col: ColKey) -> Result<()> {
        let (col, row) = self.locate(obj, col)?;
        let targets = self.link_column(col)?.targets(row);
        self.ensure_backlinks(col, row, &targets)?;
        for target in &targets {
            self.detach(col, row, target)?;
        }
        self.link_column_mut(col)?.set_null(row);
        trace!(column = %col, row, dropped = targets.len(), "link cell nulled");
        self.touch(col)
    }

    /// Whether a cell holds no target.
    pub fn is_null(&self, obj: ObjRef, col: ColKey) -> Result<bool> {
        let (col, row) = self.locate(obj, col)?;
        Ok(self.link_column(col)?.is_null(row))
    }

    /// Every forward reference currently naming `obj`, one entry per occurrence.
    pub fn backlinks(&self, obj: ObjRef) -> Result<Vec<Backlink>> {
        let table = self.table(obj.table)?;
        let slot = table.slot(obj.row)?;
        let mut out = Vec::new();
        for backlink in table.backlinks() {
            let origin = backlink.origin()?;
            let origin_table = self.table(origin.table)?;
            for &row in backlink.origins(slot) {
                out.push(Backlink {
                    origin,
                    row: origin_table.row_key(row),
                });
            }
        }
        Ok(out)
    }

    /// Number of references to `obj` held by link column `origin`.
    pub fn backlink_count(&self, obj: ObjRef, origin: ColumnRef) -> Result<usize> {
        let slot = self.slot(obj)?;
        let backlink = self.paired_backlink(origin)?;
        if self.target_of(origin)? != obj.table {
            return Err(LinkError::InvalidArgument(format!(
                "link column {origin} does not target table {}",
                obj.table
            )));
        }
        Ok(backlink.count(slot))
    }

    /// Number of references to `obj` from strong link columns.
    pub fn strong_backlink_count(&self, obj: ObjRef) -> Result<usize> {
        let table = self.table(obj.table)?;
        let slot = table.slot(obj.row)?;
        let mut total = 0;
        for backlink in table.backlinks() {
            if !self.link_column(backlink.origin()?)?.is_weak() {
                total += backlink.count(slot);
            }
        }
        Ok(total)
    }

    /// Whether any strong link still references `obj`. Weak links never count.
    pub fn is_strongly_referenced(&self, obj: ObjRef) -> Result<bool> {
        Ok(self.strong_backlink_count(obj)? > 0)
    }
}
