//! In-memory table store and the link engine built on it.
//!
//! Tables own value columns, link columns and the hidden backlink columns paired with
//! them. The [`Group`] is the only mutation surface for links, so forward references and
//! their reverse index are always updated together, including when rows are removed or
//! relocated.

pub(crate) mod backlink;
mod group;
pub(crate) mod link;
mod metrics;
mod options;
mod table;
mod types;

/// Table hierarchy and link maintenance.
pub use group::Group;

/// Metrics for link maintenance.
pub use metrics::{default_metrics, CounterMetrics, LinkMetrics, NoopMetrics};

/// Group configuration options.
pub use options::{GroupOptions, RemovalStrategy};

/// Tables and their public schema description.
pub use table::{ColumnInfo, ColumnType, Table};

/// Values, link values and column specifications.
pub use types::{Backlink, Link, LinkKind, LinkSpec, PrimaryKey, Value, ValueKind};

/// Forward link storage and its paired reverse index.
pub use backlink::BacklinkColumn;
pub use link::LinkColumn;

pub(crate) use table::Column;
