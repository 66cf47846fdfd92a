use lix_types::{ChangeId, EntityKey, VersionId};

/// Errors from state resolution.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Unmerged histories left an entity with several different values.
    #[error("entity {key} diverges in version {version_id}: candidate changes {change_ids:?}")]
    Divergent {
        key: EntityKey,
        version_id: VersionId,
        change_ids: Vec<ChangeId>,
    },

    /// The cache was read while stale; callers refresh it first.
    #[error("state cache is stale")]
    Stale,

    #[error(transparent)]
    Store(#[from] lix_store::StoreError),

    #[error(transparent)]
    Dag(#[from] lix_dag::DagError),

    #[error(transparent)]
    Version(#[from] lix_refs::VersionError),
}

/// Result alias for state operations.
pub type StateResult<T> = Result<T, StateError>;
