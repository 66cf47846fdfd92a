//! Differences between two independently evolved copies of a database.

use std::collections::BTreeSet;

use lix_dag::{CommitGraph, LeafChange};
use lix_store::{Change, ChangeLog};
use lix_types::{CommitId, SnapshotId};
use tracing::debug;

/// What `theirs` holds that `ours` lacks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseDiff {
    /// Changes to import, in their log order.
    pub changes: Vec<Change>,
    /// Snapshots those changes reference. Never includes the tombstone.
    pub snapshots: BTreeSet<SnapshotId>,
    pub commits: Vec<CommitId>,
    /// Leaf changes of the compared heads that are missing from `ours`.
    pub leaves: Vec<LeafChange>,
}

impl DatabaseDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.commits.is_empty()
    }
}

/// One side of a database comparison.
#[derive(Clone, Copy)]
pub struct DatabaseSide<'a> {
    pub graph: &'a CommitGraph,
    pub changes: &'a ChangeLog,
}

/// Compare two databases.
///
/// `heads` are commits of `theirs` (usually its version heads) whose leaf
/// changes are reported when `ours` does not know them.
pub fn diff_databases<'a>(
    ours: DatabaseSide<'_>,
    theirs: DatabaseSide<'a>,
    heads: impl IntoIterator<Item = &'a CommitId>,
) -> DatabaseDiff {
    let mut diff = DatabaseDiff::default();
    for change in theirs.changes.iter() {
        if ours.changes.contains(&change.id) {
            continue;
        }
        if !change.snapshot_id.is_no_content() {
            diff.snapshots.insert(change.snapshot_id);
        }
        diff.changes.push(change.clone());
    }
    diff.commits = theirs
        .graph
        .full_topological_order()
        .into_iter()
        .filter(|id| !ours.graph.contains(id))
        .collect();

    let mut leaves = BTreeSet::new();
    for head in heads {
        for candidates in theirs.graph.leaf_changes(head).leaves.into_values() {
            leaves.extend(
                candidates
                    .into_iter()
                    .filter(|leaf| !ours.changes.contains(&leaf.change_id)),
            );
        }
    }
    diff.leaves = leaves.into_iter().collect();

    debug!(
        changes = diff.changes.len(),
        commits = diff.commits.len(),
        leaves = diff.leaves.len(),
        "diffed databases"
    );
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::fixture::History;
    use serde_json::json;

    #[test]
    fn finds_what_the_other_copy_added() {
        let mut ours = History::new();
        ours.commit("main", "c1", &[("n1", Some(json!({"text": "a"})))]);
        let mut theirs = History::new();
        theirs.commit("main", "c1", &[("n1", Some(json!({"text": "a"})))]);
        theirs.commit("main", "c2", &[("n1", None), ("n2", Some(json!({"text": "b"})))]);

        let head = theirs.versions.require(&"main".into()).unwrap().commit_id.clone();
        let diff = diff_databases(
            DatabaseSide {
                graph: &ours.graph,
                changes: &ours.changes,
            },
            DatabaseSide {
                graph: &theirs.graph,
                changes: &theirs.changes,
            },
            [&head],
        );

        assert_eq!(diff.commits, vec![CommitId::new("c2")]);
        assert_eq!(diff.changes.len(), 2);
        // The deletion references the tombstone, which is never shipped.
        assert_eq!(diff.snapshots.len(), 1);
        assert_eq!(diff.leaves.len(), 2);
    }

    #[test]
    fn identical_copies_have_no_diff() {
        let mut a = History::new();
        a.commit("main", "c1", &[("n1", Some(json!(1)))]);
        let side = DatabaseSide {
            graph: &a.graph,
            changes: &a.changes,
        };
        let head = CommitId::new("c1");
        assert!(diff_databases(side, side, [&head]).is_empty());
    }
}
