use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::metrics::LinkMetrics;

/// How the row store closes the gap left by a removed row.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalStrategy {
    /// The last row moves into the vacated slot.
    #[default]
    SwapWithLast,
    /// Every following row moves down one slot, preserving order.
    OrderedErase,
}

/// Configuration options supplied when creating a [`super::Group`].
#[derive(Clone, Default)]
pub struct GroupOptions {
    /// Row removal strategy
    pub removal: RemovalStrategy,
    /// Whether write transactions run the integrity verifier before publishing
    pub verify_on_commit: bool,
    /// Optional metrics collection implementation
    pub metrics: Option<Arc<dyn LinkMetrics>>,
}

impl GroupOptions {
    /// Creates a new GroupOptions with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the row removal strategy.
    pub fn removal(mut self, removal: RemovalStrategy) -> Self {
        self.removal = removal;
        self
    }

    /// Enables or disables verification on commit.
    pub fn verify_on_commit(mut self, enabled: bool) -> Self {
        self.verify_on_commit = enabled;
        self
    }

    /// Sets a custom metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn LinkMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
