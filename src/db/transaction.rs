use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::MutexGuard;
use tracing::{debug, info, warn};

use super::Database;
use crate::admin::{verify, VerifyLevel};
use crate::error::{LinkError, Result};
use crate::storage::Group;

/// Identifier of a write transaction, unique per [`Database`].
pub type TxId = u64;

/// The state of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Transaction is active and can accept operations
    Active,
    /// Transaction has been successfully committed
    Committed,
    /// Transaction has been rolled back
    RolledBack,
}

/// Immutable snapshot of the committed group.
///
/// Later commits do not affect an open snapshot.
#[derive(Clone, Debug)]
pub struct ReadTxn {
    group: Arc<Group>,
}

impl ReadTxn {
    pub(super) fn new(group: Arc<Group>) -> Self {
        Self { group }
    }

    /// Returns the shared snapshot.
    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }
}

impl Deref for ReadTxn {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.group
    }
}

/// Exclusive write access to a private copy of the group.
///
/// Mutations go through `Deref<Target = Group>`/`DerefMut`. Nothing is visible to readers
/// until [`WriteTxn::commit`]; dropping the transaction without committing discards
/// every change.
///
/// # Example
///
/// ```rust
/// use linkstore::db::Database;
/// use linkstore::storage::{Link, LinkKind, LinkSpec};
///
/// let db = Database::default();
/// let mut txn = db.begin_write();
/// let person = txn.add_table("person")?;
/// let friends = txn.add_link_column(person, LinkSpec::strong("friends", LinkKind::List, person))?;
/// let alice = txn.create_row(person)?;
/// let bob = txn.create_row(person)?;
/// txn.list_push(alice, friends, Link::Row(bob.row))?;
/// txn.commit()?;
/// assert_eq!(db.begin_read().backlinks(bob)?.len(), 1);
/// # Ok::<(), linkstore::LinkError>(())
/// ```
pub struct WriteTxn<'db> {
    db: &'db Database,
    _guard: MutexGuard<'db, ()>,
    working: Group,
    id: TxId,
    state: TxState,
    start_time: Instant,
}

impl<'db> WriteTxn<'db> {
    pub(super) fn new(db: &'db Database, guard: MutexGuard<'db, ()>, id: TxId) -> Self {
        let working = Group::clone(&db.snapshot());
        debug!(tx_id = id, "Write transaction started");
        Self {
            db,
            _guard: guard,
            working,
            id,
            state: TxState::Active,
            start_time: Instant::now(),
        }
    }

    /// Returns the unique identifier for this transaction.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns the current state of the transaction.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Publishes the working copy.
    ///
    /// With `GroupOptions::verify_on_commit` the link graph is verified first and a graph
    /// with findings is discarded.
    ///
    /// # Errors
    /// * `LinkError::BrokenInvariant` - Verification found inconsistent links
    pub fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        if self.working.options().verify_on_commit {
            if let Err(err) = verify(&self.working, VerifyLevel::Full).into_result() {
                self.state = TxState::RolledBack;
                warn!(tx_id = self.id, "Commit rejected by verification");
                return Err(err);
            }
        }
        let group = std::mem::take(&mut self.working);
        self.db.publish(group, self.id);
        self.state = TxState::Committed;
        info!(
            tx_id = self.id,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Transaction committed"
        );
        Ok(())
    }

    /// Discards every change made in this transaction.
    pub fn rollback(mut self) {
        self.state = TxState::RolledBack;
        warn!(tx_id = self.id, "Transaction rolled back");
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(LinkError::InvalidArgument(
                "transaction is no longer active".into(),
            ));
        }
        Ok(())
    }
}

impl Deref for WriteTxn<'_> {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.working
    }
}

impl DerefMut for WriteTxn<'_> {
    fn deref_mut(&mut self) -> &mut Group {
        &mut self.working
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            debug!(tx_id = self.id, "Write transaction dropped, changes discarded");
        }
    }
}

impl std::fmt::Debug for WriteTxn<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTxn")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
