//! Error type shared by every link, backlink and cascade operation.

use thiserror::Error;
use tracing::error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors raised while maintaining the link graph.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LinkError {
    /// Forward references and backlink tuples disagree.
    #[error("broken invariant: {0}")]
    BrokenInvariant(String),
    /// A table cannot be removed while a strong link column elsewhere still targets it.
    #[error("table '{target}' is the target of strong link column '{origin}.{column}'")]
    CrossTableLinkTarget {
        /// Name of the table whose removal was rejected.
        target: String,
        /// Name of the table owning the strong link column.
        origin: String,
        /// Name of the strong link column.
        column: String,
    },
    /// Programming error such as binding a column twice.
    #[error("logic error: {0}")]
    Logic(&'static str),
    /// The table, row or column has been removed or was never attached.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    /// Wrong link variant, index out of range or value of the wrong type.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A row with this primary key already exists.
    #[error("duplicate primary key value: {0}")]
    DuplicatePrimaryKey(String),
    /// Table or column name collision.
    #[error("name already in use: {0}")]
    NameInUse(String),
    /// Rendering to JSON text failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a [`LinkError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Internal consistency failure; the enclosing transaction must be aborted.
    BrokenInvariant,
    /// A referential constraint rejected the operation.
    ReferentialConstraint,
    /// Misuse of the schema API.
    Logic,
    /// Stale or detached handle.
    InvalidReference,
    /// Bad input value.
    InvalidArgument,
}

impl LinkError {
    /// Returns the error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::BrokenInvariant(_) => ErrorKind::BrokenInvariant,
            LinkError::CrossTableLinkTarget { .. } => ErrorKind::ReferentialConstraint,
            LinkError::Logic(_) => ErrorKind::Logic,
            LinkError::InvalidReference(_) => ErrorKind::InvalidReference,
            LinkError::InvalidArgument(_)
            | LinkError::DuplicatePrimaryKey(_)
            | LinkError::NameInUse(_)
            | LinkError::Serialization(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Whether the error means the link graph can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::BrokenInvariant | ErrorKind::Logic)
    }

    /// Stable string code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::BrokenInvariant(_) => "BrokenInvariant",
            LinkError::CrossTableLinkTarget { .. } => "CrossTableLinkTarget",
            LinkError::Logic(_) => "LogicError",
            LinkError::InvalidReference(_) => "InvalidReference",
            LinkError::InvalidArgument(_) => "InvalidArgument",
            LinkError::DuplicatePrimaryKey(_) => "DuplicatePrimaryKeyValue",
            LinkError::NameInUse(_) => "NameInUse",
            LinkError::Serialization(_) => "SerializationError",
        }
    }
}

pub(crate) fn broken_invariant(message: impl Into<String>) -> LinkError {
    let message = message.into();
    error!(%message, "link graph invariant violated");
    LinkError::BrokenInvariant(message)
}
