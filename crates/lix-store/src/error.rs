use lix_schema::{SchemaError, SchemaValidationError};
use lix_types::{ChangeId, SnapshotId};

/// Errors from snapshot and change storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("change not found: {0}")]
    ChangeNotFound(ChangeId),

    /// A change with this id was already appended with different fields.
    #[error("change {0} already exists with different content")]
    DuplicateChange(ChangeId),

    /// Stored content does not hash to its id.
    #[error("hash mismatch for snapshot {id}: computed {computed}")]
    HashMismatch { id: SnapshotId, computed: SnapshotId },

    #[error(transparent)]
    Validation(#[from] SchemaValidationError),

    #[error(transparent)]
    Schema(SchemaError),
}

impl From<SchemaError> for StoreError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation(e) => Self::Validation(e),
            other => Self::Schema(other),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
