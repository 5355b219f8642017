//! Error types for cluster records and the stores that hold them.
//!
//! Two layers:
//! - [`StoreError`]: failures reported by a document store backend
//! - [`Error`]: everything a cluster operation can fail with, store errors included
//!
//! `NotFound` is an ordinary outcome, distinct from a storage failure.

use thiserror::Error;

use crate::status::ClusterStatus;

/// Failures reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write would violate a unique index or lost a concurrent update
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend itself failed (connection, I/O, SQL)
    #[error("backend error: {0}")]
    Backend(String),

    /// A stored body could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Create a conflict error
    #[must_use]
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// Create a backend error
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend(reason.into())
    }

    /// Create a codec error
    #[must_use]
    pub fn codec(reason: impl Into<String>) -> Self {
        Self::Codec(reason.into())
    }

    /// Returns true for unique-index and concurrent-update conflicts
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by cluster construction, codecs and repository operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required constructor argument was missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No record matched the query
    #[error("not found: {0}")]
    NotFound(String),

    /// A status name or ordinal outside the six defined values
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// A status change the lifecycle does not permit
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ClusterStatus,
        to: ClusterStatus,
    },

    /// Decoding was asked to write into a null target
    #[error("cannot decode into a nil target")]
    NilTarget,

    /// A document could not be interpreted as a cluster
    #[error("type assertion error: {0}")]
    TypeAssertion(String),

    /// Stored data breaks a uniqueness guarantee (e.g. duplicated uuid)
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// Store failure, propagated verbatim
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create a not found error for an entity and its identifier
    #[must_use]
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} '{id}'"))
    }

    /// Create an invalid status error
    #[must_use]
    pub fn invalid_status(value: impl Into<String>) -> Self {
        Self::InvalidStatus(value.into())
    }

    /// Create a type assertion error
    #[must_use]
    pub fn type_assertion(reason: impl Into<String>) -> Self {
        Self::TypeAssertion(reason.into())
    }

    /// Returns true when the error only reports absence
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true when the store rejected a write as conflicting
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(StoreError::Conflict(_)))
    }
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, Error>;
