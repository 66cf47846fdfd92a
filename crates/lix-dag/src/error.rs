//! Error types for the commit graph.

use lix_types::{ChangeSetId, CommitId};

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DagError {
    #[error("commit not found: {0}")]
    CommitNotFound(CommitId),

    #[error("change set not found: {0}")]
    ChangeSetNotFound(ChangeSetId),

    /// A parent reference points to a commit that does not exist.
    #[error("commit {commit} references missing parent {parent}")]
    DanglingParent { commit: CommitId, parent: CommitId },

    #[error("duplicate commit: {0}")]
    DuplicateCommit(CommitId),

    #[error("duplicate change set: {0}")]
    DuplicateChangeSet(ChangeSetId),

    /// An imported commit disagrees with the local commit of the same id.
    #[error("commit {0} differs from the existing commit with the same id")]
    ConflictingCommit(CommitId),

    /// The change set is already referenced by another commit.
    #[error("change set {change_set} already belongs to commit {commit}")]
    ChangeSetInUse {
        change_set: ChangeSetId,
        commit: CommitId,
    },
}

/// Convenience alias for commit graph results.
pub type DagResult<T> = Result<T, DagError>;
