use std::collections::BTreeMap;

use lix_dag::CommitGraph;
use lix_store::Change;
use lix_types::{ChangeId, CommitId, ConflictId, EntityKey, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConflictError, ConflictResult};
use crate::plan::{MergePlan, PlannedConflict};

/// A conflict a merge recorded.
///
/// History is never rewritten to settle a conflict. A resolution is a new
/// change to the same entity written on top of the merge; the record only
/// remembers which change resolved it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: ConflictId,
    pub key: EntityKey,
    pub source_version_id: VersionId,
    pub target_version_id: VersionId,
    pub merge_commit_id: CommitId,
    pub target_change_id: ChangeId,
    pub source_change_id: ChangeId,
    pub resolved_by_change_id: Option<ChangeId>,
    pub created_at: Timestamp,
}

impl ConflictRecord {
    pub fn from_plan(
        id: ConflictId,
        plan: &MergePlan,
        conflict: &PlannedConflict,
        merge_commit_id: CommitId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            key: conflict.key.clone(),
            source_version_id: plan.source_version_id.clone(),
            target_version_id: plan.target_version_id.clone(),
            merge_commit_id,
            target_change_id: conflict.target_change_id.clone(),
            source_change_id: conflict.source_change_id.clone(),
            resolved_by_change_id: None,
            created_at,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_by_change_id.is_some()
    }

    fn involves(&self, change_id: &ChangeId) -> bool {
        *change_id == self.target_change_id || *change_id == self.source_change_id
    }
}

/// Recorded merge conflicts keyed by id.
#[derive(Clone, Debug, Default)]
pub struct ConflictStore {
    records: BTreeMap<ConflictId, ConflictRecord>,
}

impl ConflictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ConflictRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn insert(&mut self, record: ConflictRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &ConflictId) -> Option<&ConflictRecord> {
        self.records.get(id)
    }

    pub fn require(&self, id: &ConflictId) -> ConflictResult<&ConflictRecord> {
        self.records
            .get(id)
            .ok_or_else(|| ConflictError::NotFound(id.clone()))
    }

    pub fn all(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.records.values()
    }

    /// Conflicts not yet resolved.
    pub fn open(&self) -> impl Iterator<Item = &ConflictRecord> {
        self.records.values().filter(|r| !r.is_resolved())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check that `resolution` may resolve conflict `id`, then mark it.
    ///
    /// The resolution must be a committed change in the conflict's file,
    /// to the conflicting entity, whose commit directly follows a commit
    /// where one of the conflicting changes is the entity's current change.
    pub fn resolve(
        &mut self,
        id: &ConflictId,
        resolution: &Change,
        graph: &CommitGraph,
    ) -> ConflictResult<&ConflictRecord> {
        let record = self.require(id)?;
        check_resolution(record, resolution, graph)?;

        let Some(record) = self.records.get_mut(id) else {
            return Err(ConflictError::NotFound(id.clone()));
        };
        record.resolved_by_change_id = Some(resolution.id.clone());
        info!(conflict_id = %id, change_id = %resolution.id, "conflict resolved");
        Ok(record)
    }
}

fn check_resolution(
    record: &ConflictRecord,
    resolution: &Change,
    graph: &CommitGraph,
) -> ConflictResult<()> {
    if let Some(resolved_by) = &record.resolved_by_change_id {
        return Err(ConflictError::AlreadyResolved {
            conflict_id: record.id.clone(),
            resolved_by: resolved_by.clone(),
        });
    }
    if resolution.file_id != record.key.file_id {
        return Err(ConflictError::ResolutionInWrongFile {
            conflict_id: record.id.clone(),
            expected: record.key.file_id.clone(),
            actual: resolution.file_id.clone(),
        });
    }
    let not_child = || ConflictError::NotDirectChild {
        conflict_id: record.id.clone(),
        change_id: resolution.id.clone(),
    };
    if resolution.entity_key() != record.key || record.involves(&resolution.id) {
        return Err(not_child());
    }

    let follows_conflict = graph
        .commits_containing(&resolution.id)
        .into_iter()
        .flat_map(|commit| graph.parents(commit))
        .any(|parent| {
            graph
                .leaf_changes(parent)
                .get(&record.key)
                .iter()
                .any(|leaf| record.involves(&leaf.change_id))
        });
    if follows_conflict {
        Ok(())
    } else {
        Err(not_child())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::fixture::History;
    use serde_json::json;

    fn conflicted() -> (History, ConflictStore) {
        let mut h = History::new();
        h.commit("main", "c1", &[("n1", Some(json!({"text": "main"})))]);
        h.commit("feature", "c2", &[("n1", Some(json!({"text": "feature"})))]);
        let plan = h.merge("feature", "main", "m1");
        let mut store = ConflictStore::new();
        store.insert(ConflictRecord::from_plan(
            "k1".into(),
            &plan,
            &plan.conflicts[0],
            "m1".into(),
            Timestamp::zero(),
        ));
        (h, store)
    }

    #[test]
    fn resolution_on_top_of_merge_succeeds() {
        let (mut h, mut store) = conflicted();
        h.commit("main", "c3", &[("n1", Some(json!({"text": "both"})))]);
        let change = h.changes.require(&"ch-c3-n1".into()).unwrap().clone();

        let record = store.resolve(&"k1".into(), &change, &h.graph).unwrap();
        assert_eq!(record.resolved_by_change_id, Some(change.id.clone()));
        assert_eq!(store.open().count(), 0);
    }

    #[test]
    fn second_resolution_is_rejected() {
        let (mut h, mut store) = conflicted();
        h.commit("main", "c3", &[("n1", Some(json!({"text": "both"})))]);
        let change = h.changes.require(&"ch-c3-n1".into()).unwrap().clone();
        store.resolve(&"k1".into(), &change, &h.graph).unwrap();

        assert!(matches!(
            store.resolve(&"k1".into(), &change, &h.graph),
            Err(ConflictError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn resolution_in_another_file_is_rejected() {
        let (h, mut store) = conflicted();
        let mut change = h.changes.require(&"ch-c2-n1".into()).unwrap().clone();
        change.id = "elsewhere".into();
        change.file_id = "other-file".into();

        assert!(matches!(
            store.resolve(&"k1".into(), &change, &h.graph),
            Err(ConflictError::ResolutionInWrongFile { .. })
        ));
    }

    #[test]
    fn unrelated_change_is_not_a_child() {
        let (mut h, mut store) = conflicted();
        // Written on feature, which never saw the merge.
        h.commit("feature", "c4", &[("n1", Some(json!({"text": "later"})))]);
        h.commit("feature", "c5", &[("n1", Some(json!({"text": "later still"})))]);
        let change = h.changes.require(&"ch-c5-n1".into()).unwrap().clone();

        assert!(matches!(
            store.resolve(&"k1".into(), &change, &h.graph),
            Err(ConflictError::NotDirectChild { .. })
        ));
        // The conflicting change itself cannot resolve the conflict.
        let own = h.changes.require(&"ch-c2-n1".into()).unwrap().clone();
        assert!(matches!(
            store.resolve(&"k1".into(), &own, &h.graph),
            Err(ConflictError::NotDirectChild { .. })
        ));
    }
}
