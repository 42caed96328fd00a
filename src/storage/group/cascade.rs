use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use super::Group;
use crate::error::{broken_invariant, Result};
use crate::storage::options::RemovalStrategy;
use crate::types::{ColKey, ColumnRef, ObjRef, RowKey, TableKey};

/// Everything a row removal will touch, gathered and cross-checked before mutating.
#[derive(Debug, Default)]
struct RemovalPlan {
    /// Incoming references: origin column and origin row, one entry per backlink tuple.
    incoming: Vec<(ColumnRef, usize)>,
    /// Outgoing live references of the removed row: its link column and the target row,
    /// one entry per occurrence. Self references are covered by `incoming`.
    outgoing: Vec<(ColumnRef, usize)>,
    touched: BTreeSet<TableKey>,
}

fn count_rows(rows: impl IntoIterator<Item = usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row).or_insert(0) += 1;
    }
    counts
}

impl Group {
    /// Removes a row, nullifying every link that names it and dropping the backlinks of
    /// its own links. Weak and strong incoming links are cleaned up alike.
    ///
    /// The row's slot is refilled according to [`RemovalStrategy`]; every link naming a
    /// relocated row is rewritten before this call returns. A forward/backlink mismatch on the
    /// removed row or on any row it relocates is reported as
    /// [`crate::LinkError::BrokenInvariant`] before anything is modified.
    pub fn remove_row(&mut self, obj: ObjRef) -> Result<()> {
        let slot = self.slot(obj)?;
        let plan = self.plan_removal(obj.table, slot)?;

        for &(origin, origin_row) in &plan.incoming {
            self.link_column_mut(origin)?.nullify(origin_row, slot)?;
        }
        for backlink in self.table_mut(obj.table)?.backlinks_mut() {
            backlink.take(slot);
        }
        for &(col, target_row) in &plan.outgoing {
            self.paired_backlink_mut(col)?.remove_one(target_row, slot)?;
            self.metrics.link_removed();
        }
        let own_links: Vec<ColKey> = self.table(obj.table)?.links().map(|l| l.key()).collect();
        for col in own_links {
            self.table_mut(obj.table)?.link_mut(col)?.clear_row(slot);
        }

        self.erase_slot(obj.table, slot)?;

        for table in &plan.touched {
            self.bump_version(*table);
        }
        self.metrics.row_removed();
        self.metrics.links_nullified(plan.incoming.len() as u64);
        debug!(
            table = obj.table.0,
            row = obj.row.0,
            nullified = plan.incoming.len(),
            outgoing = plan.outgoing.len(),
            "row removed"
        );
        Ok(())
    }

    /// Removes every row of a table through the cascade.
    pub fn clear_table(&mut self, table: TableKey) -> Result<()> {
        loop {
            let Some(&row) = self.table(table)?.row_keys().last() else {
                return Ok(());
            };
            self.remove_row(ObjRef::new(table, row))?;
        }
    }

    fn plan_removal(&self, table_key: TableKey, slot: usize) -> Result<RemovalPlan> {
        let mut plan = RemovalPlan::default();
        plan.touched.insert(table_key);

        for (origin, origin_row, count) in self.checked_incoming(table_key, slot)? {
            plan.incoming
                .extend(std::iter::repeat((origin, origin_row)).take(count));
            plan.touched.insert(origin.table);
        }
        for (col, target, target_row, count) in self.checked_outgoing(table_key, slot)? {
            if target == table_key && target_row == slot {
                continue;
            }
            plan.outgoing
                .extend(std::iter::repeat((col, target_row)).take(count));
            plan.touched.insert(target);
        }

        // Rows that `erase_slot` will relocate.
        for moving in self.relocated_slots(table_key, slot)? {
            self.checked_incoming(table_key, moving)?;
            self.checked_outgoing(table_key, moving)?;
        }
        Ok(plan)
    }

    /// Slots whose rows `erase_slot` will move after `slot` is vacated.
    fn relocated_slots(&self, table: TableKey, slot: usize) -> Result<std::ops::Range<usize>> {
        let len = self.table(table)?.len();
        Ok(match self.options.removal {
            RemovalStrategy::SwapWithLast if slot + 1 < len => len - 1..len,
            RemovalStrategy::SwapWithLast => len..len,
            RemovalStrategy::OrderedErase => slot + 1..len,
        })
    }

    /// Backlink tuples naming `slot`, grouped by origin row, each matched against the
    /// forward references the origin row actually holds.
    fn checked_incoming(
        &self,
        table_key: TableKey,
        slot: usize,
    ) -> Result<Vec<(ColumnRef, usize, usize)>> {
        let table = self.table(table_key)?;
        let mut incoming = Vec::new();
        for backlink in table.backlinks() {
            let origin = backlink.origin()?;
            let link = self.link_column(origin)?;
            let counts = count_rows(backlink.origins(slot).iter().copied());
            for (origin_row, expected) in counts {
                let found = if origin_row < link.len() {
                    link.count_occurrences(origin_row, slot)
                } else {
                    0
                };
                if found != expected {
                    return Err(broken_invariant(format!(
                        "row {slot} of '{}' has {expected} backlink tuple(s) from {origin} row \
                         {origin_row} but {found} forward reference(s)",
                        table.name()
                    )));
                }
                incoming.push((origin, origin_row, expected));
            }
        }
        Ok(incoming)
    }

    /// Live forward references held by `slot`, grouped by target row, each matched
    /// against the backlink tuples recorded on the target.
    fn checked_outgoing(
        &self,
        table_key: TableKey,
        slot: usize,
    ) -> Result<Vec<(ColumnRef, TableKey, usize, usize)>> {
        let mut outgoing = Vec::new();
        for link in self.table(table_key)?.links() {
            let col = link.column_ref();
            let target = link.target()?;
            let backlink = self.paired_backlink(col)?;
            for (target_row, expected) in count_rows(link.live_targets(slot)) {
                let found = if target_row < backlink.len() {
                    backlink.count_origin(target_row, slot)
                } else {
                    0
                };
                if found != expected {
                    return Err(broken_invariant(format!(
                        "{col} row {slot} holds {expected} reference(s) to row {target_row} but \
                         {found} backlink tuple(s) exist"
                    )));
                }
                outgoing.push((col, target, target_row, expected));
            }
        }
        Ok(outgoing)
    }

    /// Closes the gap at `slot`, whose row has already been unlinked.
    fn erase_slot(&mut self, table: TableKey, slot: usize) -> Result<()> {
        let len = self.table(table)?.len();
        match self.options.removal {
            RemovalStrategy::SwapWithLast => {
                let last = len - 1;
                if slot != last {
                    self.move_row(table, last, slot)?;
                }
            }
            RemovalStrategy::OrderedErase => {
                for from in slot + 1..len {
                    self.move_row(table, from, from - 1)?;
                }
            }
        }
        self.table_mut(table)?.pop_row()?;
        Ok(())
    }

    /// Relocates the row at `old` into the vacated slot `new` and rewrites every forward
    /// reference and backlink tuple that named `old`.
    fn move_row(&mut self, table_key: TableKey, old: usize, new: usize) -> Result<()> {
        let moved = |row: usize, owner: TableKey| {
            if owner == table_key && row == old {
                new
            } else {
                row
            }
        };

        let mut incoming: BTreeSet<(ColumnRef, usize)> = BTreeSet::new();
        for backlink in self.table(table_key)?.backlinks() {
            let origin = backlink.origin()?;
            for &row in backlink.origins(old) {
                incoming.insert((origin, moved(row, origin.table)));
            }
        }

        self.table_mut(table_key)?.swap_slots(old, new);

        for (origin, origin_row) in incoming {
            if self.link_column_mut(origin)?.retarget(origin_row, old, new) == 0 {
                return Err(broken_invariant(format!(
                    "{origin} row {origin_row} is recorded as referencing row {old} but does not"
                )));
            }
        }

        let outgoing = self.outgoing_targets(table_key, &[new])?;
        for (col, rows) in outgoing {
            let backlink = self.paired_backlink_mut(col)?;
            for row in rows {
                if backlink.replace_origin(row, old, new) == 0 {
                    return Err(broken_invariant(format!(
                        "{col} target row {row} has no backlink from relocated row {old}"
                    )));
                }
            }
        }

        self.metrics.row_relocated();
        trace!(table = table_key.0, from = old, to = new, "row relocated");
        Ok(())
    }

    /// Distinct live targets, per link column of `table`, of the rows at `slots`.
    fn outgoing_targets(
        &self,
        table: TableKey,
        slots: &[usize],
    ) -> Result<Vec<(ColumnRef, BTreeSet<usize>)>> {
        let mut out = Vec::new();
        for link in self.table(table)?.links() {
            let rows: BTreeSet<usize> = slots
                .iter()
                .flat_map(|&slot| link.live_targets(slot))
                .collect();
            if !rows.is_empty() {
                out.push((link.column_ref(), rows));
            }
        }
        Ok(out)
    }

    /// Exchanges the physical slots of two rows, keeping every link pointing at the same
    /// logical rows.
    pub fn swap_rows(&mut self, table_key: TableKey, a: RowKey, b: RowKey) -> Result<()> {
        let table = self.table(table_key)?;
        let (sa, sb) = (table.slot(a)?, table.slot(b)?);
        if sa == sb {
            return Ok(());
        }
        let swapped = |row: usize, owner: TableKey| {
            if owner != table_key {
                row
            } else if row == sa {
                sb
            } else if row == sb {
                sa
            } else {
                row
            }
        };

        let mut incoming: BTreeSet<(ColumnRef, usize)> = BTreeSet::new();
        let mut touched: BTreeSet<TableKey> = BTreeSet::new();
        touched.insert(table_key);
        for backlink in table.backlinks() {
            let origin = backlink.origin()?;
            for &row in backlink.origins(sa).iter().chain(backlink.origins(sb)) {
                incoming.insert((origin, swapped(row, origin.table)));
                touched.insert(origin.table);
            }
        }

        self.table_mut(table_key)?.swap_slots(sa, sb);

        for (origin, origin_row) in incoming {
            self.link_column_mut(origin)?.swap_reference(origin_row, sa, sb);
        }
        for (col, rows) in self.outgoing_targets(table_key, &[sa, sb])? {
            touched.insert(self.link_column(col)?.target()?);
            let backlink = self.paired_backlink_mut(col)?;
            for row in rows {
                backlink.swap_origin(row, sa, sb);
            }
        }

        for table in touched {
            self.bump_version(table);
        }
        trace!(table = table_key.0, a = sa, b = sb, "rows swapped");
        Ok(())
    }
}
