//! Link integrity for an embedded columnar object store.
//!
//! Tables hold value columns and link columns. Every link column is paired with a
//! backlink column on its target table, and the two halves stay in agreement through
//! every mutation: setting and clearing links, removing rows (with cascading
//! nullification of incoming links), and relocating rows to other slots.
//!
//! The [`export`] module renders rows and their link neighborhood as JSON with a
//! depth bound and cycle protection.

pub mod admin;
pub mod cli;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod storage;
pub mod types;

pub use error::{ErrorKind, LinkError, Result};
pub use storage::{Group, GroupOptions, Link, LinkKind, LinkSpec, PrimaryKey, RemovalStrategy};
pub use types::{ColKey, ColumnRef, ObjRef, RowKey, TableKey};
