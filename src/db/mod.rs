//! Single-writer, multi-reader access to a [`Group`].
//!
//! Readers hold an immutable snapshot. A writer works on a private copy of the group
//! that is published atomically on commit, so a failed operation is never observable.

mod transaction;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::storage::{Group, GroupOptions};

pub use transaction::{ReadTxn, TxId, TxState, WriteTxn};

/// Shared handle around the current committed [`Group`].
pub struct Database {
    current: RwLock<Arc<Group>>,
    writer: Mutex<()>,
    next_tx: AtomicU64,
}

impl Database {
    /// Creates an empty database whose group uses `options`.
    pub fn new(options: GroupOptions) -> Self {
        Self::from_group(Group::with_options(options))
    }

    /// Wraps an existing group as the first committed state.
    pub fn from_group(group: Group) -> Self {
        Self {
            current: RwLock::new(Arc::new(group)),
            writer: Mutex::new(()),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Returns the latest committed group.
    pub fn snapshot(&self) -> Arc<Group> {
        Arc::clone(&self.current.read())
    }

    /// Starts a read transaction over the latest committed group.
    pub fn begin_read(&self) -> ReadTxn {
        ReadTxn::new(self.snapshot())
    }

    /// Starts a write transaction, blocking until no other writer is active.
    pub fn begin_write(&self) -> WriteTxn<'_> {
        let guard = self.writer.lock();
        WriteTxn::new(self, guard, self.allocate_tx())
    }

    /// Starts a write transaction if no other writer is active.
    pub fn try_begin_write(&self) -> Option<WriteTxn<'_>> {
        let guard = self.writer.try_lock()?;
        Some(WriteTxn::new(self, guard, self.allocate_tx()))
    }

    /// Runs `f` in a write transaction, committing on success and rolling back on error.
    pub fn update<T>(&self, f: impl FnOnce(&mut Group) -> Result<T>) -> Result<T> {
        let mut txn = self.begin_write();
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }

    fn allocate_tx(&self) -> TxId {
        self.next_tx.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, group: Group, tx: TxId) {
        *self.current.write() = Arc::new(group);
        debug!(tx_id = tx, "Group published");
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(GroupOptions::default())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("next_tx", &self.next_tx.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
