use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking link maintenance work performed by a [`super::Group`].
///
/// Implementations receive one call per forward reference recorded or dropped, per
/// reference nullified by a cascade, and per row removed or relocated.
pub trait LinkMetrics: Send + Sync {
    /// Records a forward reference together with its backlink tuple.
    fn link_added(&self);

    /// Records an explicit removal of a forward reference and its backlink tuple.
    fn link_removed(&self);

    /// Records references nullified because their target row was removed.
    fn links_nullified(&self, count: u64);

    /// Records the removal of a row.
    fn row_removed(&self);

    /// Records the relocation of a row into another physical slot.
    fn row_relocated(&self);
}

/// A no-op implementation of [`LinkMetrics`].
#[derive(Default)]
pub struct NoopMetrics;

impl LinkMetrics for NoopMetrics {
    fn link_added(&self) {}
    fn link_removed(&self) {}
    fn links_nullified(&self, _count: u64) {}
    fn row_removed(&self) {}
    fn row_relocated(&self) {}
}

/// A thread-safe counter-based implementation of [`LinkMetrics`].
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of forward references recorded.
    pub links_added: AtomicU64,

    /// Number of forward references explicitly removed.
    pub links_removed: AtomicU64,

    /// Number of references nullified by cascades.
    pub links_nullified: AtomicU64,

    /// Number of rows removed.
    pub rows_removed: AtomicU64,

    /// Number of row relocations.
    pub rows_relocated: AtomicU64,
}

impl LinkMetrics for CounterMetrics {
    fn link_added(&self) {
        self.links_added.fetch_add(1, Ordering::Relaxed);
    }

    fn link_removed(&self) {
        self.links_removed.fetch_add(1, Ordering::Relaxed);
    }

    fn links_nullified(&self, count: u64) {
        self.links_nullified.fetch_add(count, Ordering::Relaxed);
    }

    fn row_removed(&self) {
        self.rows_removed.fetch_add(1, Ordering::Relaxed);
    }

    fn row_relocated(&self) {
        self.rows_relocated.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation ([`NoopMetrics`]).
pub fn default_metrics() -> Arc<dyn LinkMetrics> {
    Arc::new(NoopMetrics)
}
