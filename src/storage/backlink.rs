use smallvec::SmallVec;

use crate::error::{broken_invariant, LinkError, Result};
use crate::types::{ColKey, ColumnRef, TableKey};

pub(crate) type Origins = SmallVec<[usize; 4]>;

/// Reverse index paired with one link column: for each target row, the multiset of
/// origin rows referencing it. Hidden from the public schema.
#[derive(Clone, Debug)]
pub struct BacklinkColumn {
    key: ColKey,
    owner: TableKey,
    origin: Option<ColumnRef>,
    rows: Vec<Origins>,
}

impl BacklinkColumn {
    pub(crate) fn new(key: ColKey, owner: TableKey, rows: usize) -> Self {
        Self {
            key,
            owner,
            origin: None,
            rows: vec![Origins::new(); rows],
        }
    }

    /// Column key within the target table.
    pub fn key(&self) -> ColKey {
        self.key
    }

    /// Link column this index mirrors, once bound.
    pub fn origin_column(&self) -> Option<ColumnRef> {
        self.origin
    }

    pub(crate) fn origin(&self) -> Result<ColumnRef> {
        self.origin.ok_or_else(|| {
            LinkError::InvalidReference(format!(
                "backlink column {}.{} is not bound to a link column",
                self.owner, self.key
            ))
        })
    }

    pub(crate) fn bind_origin(&mut self, origin: ColumnRef) -> Result<()> {
        if self.origin.is_some() {
            return Err(LinkError::Logic("backlink column origin already bound"));
        }
        self.origin = Some(origin);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn add(&mut self, target_row: usize, origin_row: usize) {
        self.rows[target_row].push(origin_row);
    }

    /// Removes exactly one tuple naming `origin_row`.
    pub(crate) fn remove_one(&mut self, target_row: usize, origin_row: usize) -> Result<()> {
        let slot = &mut self.rows[target_row];
        match slot.iter().position(|&row| row == origin_row) {
            Some(pos) => {
                slot.swap_remove(pos);
                Ok(())
            }
            None => Err(broken_invariant(format!(
                "backlink column {}.{} has no entry for origin row {origin_row} on row {target_row}",
                self.owner, self.key
            ))),
        }
    }

    pub(crate) fn origins(&self, row: usize) -> &[usize] {
        &self.rows[row]
    }

    pub(crate) fn count(&self, row: usize) -> usize {
        self.rows[row].len()
    }

    pub(crate) fn count_origin(&self, row: usize, origin_row: usize) -> usize {
        self.rows[row].iter().filter(|&&r| r == origin_row).count()
    }

    pub(crate) fn total(&self) -> usize {
        self.rows.iter().map(|origins| origins.len()).sum()
    }

    pub(crate) fn take(&mut self, row: usize) -> Origins {
        std::mem::take(&mut self.rows[row])
    }

    /// Moves the tuples stored for `old_row` to the vacated `new_row`.
    pub(crate) fn retarget_row(&mut self, old_row: usize, new_row: usize) {
        self.rows.swap(old_row, new_row);
    }

    /// Rewrites every tuple on `row` naming `old_origin` so it names `new_origin`.
    pub(crate) fn replace_origin(&mut self, row: usize, old_origin: usize, new_origin: usize) -> usize {
        let mut replaced = 0;
        for origin in self.rows[row].iter_mut() {
            if *origin == old_origin {
                *origin = new_origin;
                replaced += 1;
            }
        }
        replaced
    }

    pub(crate) fn swap_origin(&mut self, row: usize, a: usize, b: usize) {
        for origin in self.rows[row].iter_mut() {
            if *origin == a {
                *origin = b;
            } else if *origin == b {
                *origin = a;
            }
        }
    }

    pub(crate) fn push_row(&mut self) {
        self.rows.push(Origins::new());
    }

    pub(crate) fn pop_row(&mut self) -> Result<()> {
        match self.rows.pop() {
            Some(origins) if origins.is_empty() => Ok(()),
            Some(origins) => Err(broken_invariant(format!(
                "backlink column {}.{} dropped a row still referenced {} time(s)",
                self.owner,
                self.key,
                origins.len()
            ))),
            None => Err(broken_invariant(format!(
                "backlink column {}.{} has no row to pop",
                self.owner, self.key
            ))),
        }
    }
}
