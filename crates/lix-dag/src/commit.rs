use lix_types::{AccountId, ChangeSetId, CommitId, Timestamp};
use serde::{Deserialize, Serialize};

/// A point in history grouping the changes of one change set.
///
/// Parents are not stored on the commit; they are the [`CommitEdge`]s whose
/// `child_id` is this commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub change_set_id: ChangeSetId,
    /// Accounts that were active when the commit was created.
    pub author_account_ids: Vec<AccountId>,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

/// Parent link between two commits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitEdge {
    pub parent_id: CommitId,
    pub child_id: CommitId,
}
