//! Version merge planning.
//!
//! A merge looks at every entity whose current change in the source is not
//! yet part of the target's history. If the target left that entity alone
//! since the merge base, the source change is adopted. A target leaf whose
//! change the source history already holds, brought in by an earlier merge,
//! is not a target edit. If both sides changed it to different content, the
//! target's change is kept and the pair is reported as a conflict. Either way the merge commit references
//! the winning change, so the entity has exactly one leaf afterwards.

use std::collections::HashSet;

use lix_dag::{ChangeSet, ChangeSetElement, Commit, CommitGraph, LeafChange};
use lix_refs::VersionStore;
use lix_store::{Change, ChangeLog};
use lix_types::{AccountId, ChangeId, ChangeSetId, CommitId, EntityKey, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MergeError, MergeResult};

/// Borrowed history a merge reads.
#[derive(Clone, Copy)]
pub struct MergeInput<'a> {
    pub graph: &'a CommitGraph,
    pub changes: &'a ChangeLog,
    pub versions: &'a VersionStore,
}

/// A change the merge commit will reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedChange {
    pub key: EntityKey,
    pub change_id: ChangeId,
}

/// Both sides changed one entity to different content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedConflict {
    pub key: EntityKey,
    /// Kept in the target.
    pub target_change_id: ChangeId,
    pub source_change_id: ChangeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    pub source_version_id: VersionId,
    pub target_version_id: VersionId,
    pub source_commit_id: CommitId,
    pub target_commit_id: CommitId,
    pub base_commit_id: Option<CommitId>,
    /// Source changes taken over by the target.
    pub adopted: Vec<MergedChange>,
    /// Target changes re-referenced to settle entities both sides touched.
    pub kept: Vec<MergedChange>,
    pub conflicts: Vec<PlannedConflict>,
    /// The source is already part of the target's history.
    pub up_to_date: bool,
}

impl MergePlan {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Every change the merge commit's change set holds.
    pub fn elements(&self) -> impl Iterator<Item = &MergedChange> {
        self.adopted.iter().chain(&self.kept)
    }
}

/// Ids and metadata for the commit a merge creates.
#[derive(Clone, Debug)]
pub struct MergeCommit {
    pub commit_id: CommitId,
    pub change_set_id: ChangeSetId,
    pub author_account_ids: Vec<AccountId>,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

/// Plan merging `source` into `target`.
pub fn plan_merge(
    input: MergeInput<'_>,
    source: &VersionId,
    target: &VersionId,
) -> MergeResult<MergePlan> {
    if source == target {
        return Err(MergeError::SameVersion(source.clone()));
    }
    let source_head = input.versions.require(source)?.commit_id.clone();
    let target_head = input.versions.require(target)?.commit_id.clone();

    let mut plan = plan_commits(input.graph, input.changes, &source_head, &target_head)?;
    plan.source_version_id = source.clone();
    plan.target_version_id = target.clone();
    debug!(
        source = %source,
        target = %target,
        adopted = plan.adopted.len(),
        conflicts = plan.conflicts.len(),
        up_to_date = plan.up_to_date,
        "planned merge"
    );
    Ok(plan)
}

/// Plan merging the history at `source_head` into the history at
/// `target_head`. Version ids on the result are left empty.
pub fn plan_commits(
    graph: &CommitGraph,
    changes: &ChangeLog,
    source_head: &CommitId,
    target_head: &CommitId,
) -> MergeResult<MergePlan> {
    graph.require(source_head)?;
    graph.require(target_head)?;

    let mut plan = MergePlan {
        source_version_id: VersionId::new(""),
        target_version_id: VersionId::new(""),
        source_commit_id: source_head.clone(),
        target_commit_id: target_head.clone(),
        base_commit_id: graph.common_ancestor(source_head, target_head),
        adopted: Vec::new(),
        kept: Vec::new(),
        conflicts: Vec::new(),
        up_to_date: false,
    };
    if graph.is_ancestor(source_head, target_head) {
        plan.up_to_date = true;
        return Ok(plan);
    }

    let target_history = graph.ancestors(target_head);
    let base_history: HashSet<CommitId> = plan
        .base_commit_id
        .as_ref()
        .map(|base| graph.ancestors(base))
        .unwrap_or_default();

    let source_known = changes_in(graph, &graph.ancestors(source_head));

    let source_leaves = graph.leaf_changes(source_head);
    let target_leaves = graph.leaf_changes(target_head);

    for (key, candidates) in &source_leaves.leaves {
        let fresh: Vec<&LeafChange> = candidates
            .iter()
            .filter(|leaf| !target_history.contains(&leaf.commit_id))
            .collect();
        if fresh.is_empty() {
            continue;
        }
        let Some(source_change) = settle(changes, key, &fresh)? else {
            continue;
        };

        let target_candidates: Vec<&LeafChange> = target_leaves.get(key).iter().collect();
        let target_changed = target_candidates.iter().any(|leaf| {
            !base_history.contains(&leaf.commit_id) && !source_known.contains(&leaf.change_id)
        });
        if !target_changed {
            plan.adopted.push(MergedChange {
                key: key.clone(),
                change_id: source_change.id.clone(),
            });
            continue;
        }

        let Some(target_change) = settle_target(changes, &target_candidates)? else {
            continue;
        };
        plan.kept.push(MergedChange {
            key: key.clone(),
            change_id: target_change.id.clone(),
        });
        if target_change.snapshot_id != source_change.snapshot_id {
            plan.conflicts.push(PlannedConflict {
                key: key.clone(),
                target_change_id: target_change.id.clone(),
                source_change_id: source_change.id.clone(),
            });
        }
    }
    Ok(plan)
}

/// Every change referenced by the change sets of `commits`.
fn changes_in(graph: &CommitGraph, commits: &HashSet<CommitId>) -> HashSet<ChangeId> {
    commits
        .iter()
        .filter_map(|id| graph.get(id))
        .flat_map(|commit| graph.elements(&commit.change_set_id))
        .map(|element| element.change_id.clone())
        .collect()
}

/// Pick one change among source candidates; different content is an error.
fn settle<'c>(
    changes: &'c ChangeLog,
    key: &EntityKey,
    candidates: &[&LeafChange],
) -> MergeResult<Option<&'c Change>> {
    let resolved = candidates
        .iter()
        .map(|leaf| changes.require(&leaf.change_id))
        .collect::<Result<Vec<_>, _>>()?;
    if resolved
        .windows(2)
        .any(|pair| pair[0].snapshot_id != pair[1].snapshot_id)
    {
        return Err(MergeError::DivergentSource {
            key: key.clone(),
            change_ids: resolved.iter().map(|c| c.id.clone()).collect(),
        });
    }
    Ok(latest(resolved))
}

/// Pick the target's current change. A target that is itself divergent
/// keeps its latest candidate; its own resolution reports the divergence.
fn settle_target<'c>(
    changes: &'c ChangeLog,
    candidates: &[&LeafChange],
) -> MergeResult<Option<&'c Change>> {
    let resolved = candidates
        .iter()
        .map(|leaf| changes.require(&leaf.change_id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(latest(resolved))
}

fn latest(changes: Vec<&Change>) -> Option<&Change> {
    changes
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
}

/// Write the merge commit for `plan` into `graph`.
///
/// The commit's parents are the target head then the source head. Returns
/// `None` without touching the graph when the plan is up to date.
pub fn apply_merge(
    graph: &mut CommitGraph,
    plan: &MergePlan,
    commit: MergeCommit,
) -> MergeResult<Option<CommitId>> {
    if plan.up_to_date {
        return Ok(None);
    }
    graph.add_change_set(ChangeSet {
        id: commit.change_set_id.clone(),
        name: None,
    })?;
    for element in plan.elements() {
        graph.add_element(ChangeSetElement {
            change_set_id: commit.change_set_id.clone(),
            change_id: element.change_id.clone(),
            entity_id: element.key.entity_id.clone(),
            schema_key: element.key.schema_key.clone(),
            file_id: element.key.file_id.clone(),
        })?;
    }
    let commit_id = commit.commit_id.clone();
    graph.add_commit(
        Commit {
            id: commit.commit_id,
            change_set_id: commit.change_set_id,
            author_account_ids: commit.author_account_ids,
            description: commit.description,
            created_at: commit.created_at,
        },
        &[plan.target_commit_id.clone(), plan.source_commit_id.clone()],
    )?;
    info!(
        commit_id = %commit_id,
        adopted = plan.adopted.len(),
        conflicts = plan.conflicts.len(),
        "merge commit created"
    );
    Ok(Some(commit_id))
}


#[cfg(test)]
mod tests {
    use super::fixture::History;
    use super::*;
    use serde_json::json;

    #[test]
    fn untouched_target_adopts_source_changes() {
        let mut h = History::new();
        h.commit("main", "c1", &[("n1", Some(json!({"text": "draft"})))]);
        h.merge("main", "feature", "m0");
        h.commit("feature", "c2", &[("n1", Some(json!({"text": "final"})))]);

        let plan = h.merge("feature", "main", "m1");
        assert!(!plan.up_to_date);
        assert_eq!(plan.adopted.len(), 1);
        assert_eq!(plan.adopted[0].change_id, ChangeId::new("ch-c2-n1"));
        assert!(!plan.has_conflicts());
        assert_eq!(
            h.graph.parents(&"m1".into()),
            [CommitId::new("c1"), CommitId::new("c2")].as_slice()
        );

        let leaves = h.graph.leaf_changes(&"m1".into());
        assert_eq!(leaves.get(&History::key("n1")).len(), 1);
    }

    #[test]
    fn merging_twice_adds_nothing() {
        let mut h = History::new();
        h.commit("feature", "c1", &[("n1", Some(json!({"text": "a"})))]);
        h.merge("feature", "main", "m1");
        let commits = h.graph.len();

        let again = h.merge("feature", "main", "m2");
        assert!(again.up_to_date);
        assert!(again.adopted.is_empty());
        assert_eq!(h.graph.len(), commits);
    }

    #[test]
    fn second_merge_adopts_newer_source_edit() {
        let mut h = History::new();
        h.commit("feature", "c1", &[("n1", Some(json!({"text": "a"})))]);
        h.merge("feature", "main", "m1");
        h.commit("feature", "c2", &[("n1", Some(json!({"text": "b"})))]);

        let plan = h.merge("feature", "main", "m2");
        assert!(!plan.has_conflicts());
        assert!(plan.kept.is_empty());
        assert_eq!(plan.adopted.len(), 1);
        assert_eq!(plan.adopted[0].change_id, ChangeId::new("ch-c2-n1"));

        let leaves = h.graph.leaf_changes(&"m2".into());
        let leaf = leaves.get(&History::key("n1"));
        assert_eq!(leaf.len(), 1);
        assert_eq!(leaf[0].change_id, ChangeId::new("ch-c2-n1"));
    }

    #[test]
    fn target_edit_after_merge_still_conflicts() {
        let mut h = History::new();
        h.commit("feature", "c1", &[("n1", Some(json!({"text": "a"})))]);
        h.merge("feature", "main", "m1");
        h.commit("main", "c2", &[("n1", Some(json!({"text": "main"})))]);
        h.commit("feature", "c3", &[("n1", Some(json!({"text": "feature"})))]);

        let plan = h.merge("feature", "main", "m2");
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].target_change_id, ChangeId::new("ch-c2-n1"));
    }

    #[test]
    fn divergent_edits_conflict_and_keep_target() {
        let mut h = History::new();
        h.commit("main", "c1", &[("n1", Some(json!({"text": "main"})))]);
        h.commit("feature", "c2", &[("n1", Some(json!({"text": "feature"})))]);

        let plan = h.merge("feature", "main", "m1");
        assert_eq!(plan.conflicts.len(), 1);
        let conflict = &plan.conflicts[0];
        assert_eq!(conflict.target_change_id, ChangeId::new("ch-c1-n1"));
        assert_eq!(conflict.source_change_id, ChangeId::new("ch-c2-n1"));

        let leaves = h.graph.leaf_changes(&"m1".into());
        let leaf = leaves.get(&History::key("n1"));
        assert_eq!(leaf.len(), 1);
        assert_eq!(leaf[0].change_id, ChangeId::new("ch-c1-n1"));
    }

    #[test]
    fn identical_edits_do_not_conflict() {
        let mut h = History::new();
        h.commit("main", "c1", &[("n1", Some(json!({"text": "same"})))]);
        h.commit("feature", "c2", &[("n1", Some(json!({"text": "same"})))]);

        let plan = h.merge("feature", "main", "m1");
        assert!(!plan.has_conflicts());
        assert_eq!(plan.kept.len(), 1);
        assert!(plan.adopted.is_empty());
    }

    #[test]
    fn deletion_against_edit_conflicts() {
        let mut h = History::new();
        h.commit("main", "c1", &[("n1", Some(json!({"text": "a"})))]);
        h.merge("main", "feature", "m0");
        h.commit("main", "c2", &[("n1", Some(json!({"text": "b"})))]);
        h.commit("feature", "c3", &[("n1", None)]);

        let plan = h.merge("feature", "main", "m1");
        assert_eq!(plan.conflicts.len(), 1);
    }

    #[test]
    fn self_merge_is_rejected() {
        let h = History::new();
        assert!(matches!(
            plan_merge(h.input(), &"main".into(), &"main".into()),
            Err(MergeError::SameVersion(_))
        ));
    }
}
