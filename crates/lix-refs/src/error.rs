//! Error types for version operations.

use lix_types::VersionId;
use thiserror::Error;

/// Errors that can occur during version operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version not found: {0}")]
    NotFound(VersionId),

    #[error("no version named '{0}'")]
    NameNotFound(String),

    #[error("version already exists: {0}")]
    AlreadyExists(VersionId),

    #[error("version name already taken: {0}")]
    NameTaken(String),

    #[error("invalid version name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The active version cannot be deleted; switch away first.
    #[error("cannot delete the active version: {0}")]
    DeleteActive(VersionId),

    #[error("the global version cannot be deleted")]
    DeleteGlobal,

    /// Other versions inherit from this one.
    #[error("version {version} is inherited by {dependent}")]
    HasDependents {
        version: VersionId,
        dependent: VersionId,
    },

    #[error("inheritance cycle through version {0}")]
    InheritanceCycle(VersionId),
}

/// Convenience type alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;
