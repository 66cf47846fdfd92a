//! Error types for the merge engine.

use lix_types::{ChangeId, ConflictId, EntityKey, FileId, VersionId};

/// Errors that can occur while planning or applying a merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot merge version {0} into itself")]
    SameVersion(VersionId),

    /// The source history itself holds unmerged, different values.
    #[error("source entity {key} has divergent changes {change_ids:?}")]
    DivergentSource {
        key: EntityKey,
        change_ids: Vec<ChangeId>,
    },

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Store(#[from] lix_store::StoreError),

    #[error(transparent)]
    Dag(#[from] lix_dag::DagError),

    #[error(transparent)]
    Version(#[from] lix_refs::VersionError),
}

/// Conditions that reject a conflict resolution.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("conflict not found: {0}")]
    NotFound(ConflictId),

    /// The resolving change belongs to a different file than the conflict.
    #[error("conflict {conflict_id} is in file {expected}, resolution is in {actual}")]
    ResolutionInWrongFile {
        conflict_id: ConflictId,
        expected: FileId,
        actual: FileId,
    },

    /// The resolving change does not directly follow the conflicting change.
    #[error("change {change_id} is not a direct child of conflict {conflict_id}")]
    NotDirectChild {
        conflict_id: ConflictId,
        change_id: ChangeId,
    },

    #[error("conflict {conflict_id} was already resolved by {resolved_by}")]
    AlreadyResolved {
        conflict_id: ConflictId,
        resolved_by: ChangeId,
    },
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;

/// Convenience alias for conflict resolution results.
pub type ConflictResult<T> = Result<T, ConflictError>;
