use std::collections::{BTreeMap, HashMap};

use lix_dag::CommitGraph;
use lix_refs::VersionStore;
use lix_store::{Change, ChangeLog, SnapshotStore};
use lix_types::{ChangeId, CommitId, EntityKey, SchemaKey, SnapshotId, VersionId};

use crate::error::{StateError, StateResult};
use crate::row::LocalEntry;

/// A source of each version's local committed state.
pub trait LocalSource {
    /// Local entries of `version_id`, optionally limited to one schema.
    fn local(
        &self,
        version_id: &VersionId,
        schema: Option<&SchemaKey>,
    ) -> StateResult<BTreeMap<EntityKey, LocalEntry>>;
}

/// Borrowed view of everything history resolution reads.
#[derive(Clone, Copy)]
pub struct History<'a> {
    pub changes: &'a ChangeLog,
    pub snapshots: &'a dyn SnapshotStore,
    pub graph: &'a CommitGraph,
    pub versions: &'a VersionStore,
}

/// Resolves local state by walking the commit graph on every call.
pub struct HistoryResolver<'a> {
    history: History<'a>,
}

impl<'a> HistoryResolver<'a> {
    pub fn new(history: History<'a>) -> Self {
        Self { history }
    }

    /// Local state reachable from `head`, attributed to `version_id`.
    pub fn resolve_head(
        &self,
        version_id: &VersionId,
        head: &CommitId,
        schema: Option<&SchemaKey>,
    ) -> StateResult<BTreeMap<EntityKey, LocalEntry>> {
        let graph = self.history.graph;
        let ancestry = graph.ancestors(head);
        let order = graph.topological_order(&ancestry);
        let position: HashMap<&CommitId, usize> =
            order.iter().enumerate().map(|(i, id)| (id, i)).collect();

        // Every touch of every entity in history order.
        let mut timeline: HashMap<EntityKey, Vec<(usize, ChangeId)>> = HashMap::new();
        for (index, commit_id) in order.iter().enumerate() {
            let commit = graph.require(commit_id)?;
            for element in graph.elements(&commit.change_set_id) {
                if schema.is_some_and(|s| *s != element.schema_key) {
                    continue;
                }
                timeline
                    .entry(element.entity_key())
                    .or_default()
                    .push((index, element.change_id.clone()));
            }
        }

        let leaves = graph.leaf_changes(head);
        let mut out = BTreeMap::new();
        for (key, candidates) in &leaves.leaves {
            if schema.is_some_and(|s| *s != key.schema_key) {
                continue;
            }
            let mut resolved: Vec<(usize, &Change, &CommitId)> = Vec::with_capacity(candidates.len());
            for leaf in candidates {
                let change = self.history.changes.require(&leaf.change_id)?;
                let index = position.get(&leaf.commit_id).copied().unwrap_or(0);
                resolved.push((index, change, &leaf.commit_id));
            }
            let mut distinct: Vec<SnapshotId> = resolved.iter().map(|(_, c, _)| c.snapshot_id).collect();
            distinct.sort();
            distinct.dedup();
            if distinct.len() > 1 {
                return Err(StateError::Divergent {
                    key: key.clone(),
                    version_id: version_id.clone(),
                    change_ids: resolved.iter().map(|(_, c, _)| c.id.clone()).collect(),
                });
            }
            // Identical content on every candidate: take the latest in
            // history order so the choice is stable.
            let Some(&(chosen_index, change, commit_id)) = resolved
                .iter()
                .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)))
            else {
                continue;
            };

            let created_at = match timeline.get(key) {
                Some(touches) if !change.is_deletion() => {
                    self.created_at(touches, chosen_index, change)?
                }
                _ => change.created_at,
            };
            out.insert(
                key.clone(),
                LocalEntry {
                    key: key.clone(),
                    change_id: change.id.clone(),
                    commit_id: commit_id.clone(),
                    plugin_key: change.plugin_key.clone(),
                    schema_version: change.schema_version.clone(),
                    content: self.history.snapshots.content(&change.snapshot_id)?,
                    created_at,
                    updated_at: change.created_at,
                },
            );
        }
        Ok(out)
    }

    /// Creation time of the entity's current life: the first change after
    /// the most recent deletion that precedes the chosen change.
    fn created_at(
        &self,
        touches: &[(usize, ChangeId)],
        chosen_index: usize,
        chosen: &Change,
    ) -> StateResult<lix_types::Timestamp> {
        let mut created = chosen.created_at;
        for (index, change_id) in touches.iter().rev() {
            if *index > chosen_index {
                continue;
            }
            let change = self.history.changes.require(change_id)?;
            if change.is_deletion() {
                break;
            }
            created = created.min(change.created_at);
        }
        Ok(created)
    }
}

impl LocalSource for HistoryResolver<'_> {
    fn local(
        &self,
        version_id: &VersionId,
        schema: Option<&SchemaKey>,
    ) -> StateResult<BTreeMap<EntityKey, LocalEntry>> {
        let version = self.history.versions.require(version_id)?;
        self.resolve_head(version_id, &version.commit_id, schema)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! A small hand-built history shared by the state tests.

    use lix_dag::{ChangeSet, ChangeSetElement, Commit, CommitGraph};
    use lix_refs::{Version, VersionStore};
    use lix_schema::SchemaRegistry;
    use lix_store::{ChangeLog, InMemorySnapshotStore, NewChange};
    use lix_types::{ChangeSetId, CommitId, Timestamp, VersionId};
    use serde_json::{json, Value};

    pub struct Fixture {
        pub registry: SchemaRegistry,
        pub snapshots: InMemorySnapshotStore,
        pub changes: ChangeLog,
        pub graph: CommitGraph,
        pub versions: VersionStore,
        clock: u64,
    }

    impl Fixture {
        pub fn new() -> Self {
            let mut registry = SchemaRegistry::new();
            registry
                .register_value(&json!({
                    "type": "object",
                    "x-lix-key": "note",
                    "x-lix-version": "1.0",
                    "x-lix-primary-key": ["id"],
                    "properties": { "id": { "type": "string" }, "text": { "type": "string" } }
                }))
                .unwrap();
            let mut graph = CommitGraph::new();
            graph
                .add_change_set(ChangeSet {
                    id: "cs-root".into(),
                    name: None,
                })
                .unwrap();
            graph
                .add_commit(
                    Commit {
                        id: "root".into(),
                        change_set_id: "cs-root".into(),
                        author_account_ids: vec![],
                        description: None,
                        created_at: Timestamp::zero(),
                    },
                    &[],
                )
                .unwrap();
            for id in ["wcs-global", "wcs-main"] {
                graph
                    .add_change_set(ChangeSet {
                        id: id.into(),
                        name: None,
                    })
                    .unwrap();
            }
            let versions = VersionStore::new(
                vec![
                    Version {
                        id: "global".into(),
                        name: "global".into(),
                        commit_id: "root".into(),
                        working_change_set_id: "wcs-global".into(),
                        inherited_from_version_id: None,
                        hidden: true,
                    },
                    Version {
                        id: "main".into(),
                        name: "main".into(),
                        commit_id: "root".into(),
                        working_change_set_id: "wcs-main".into(),
                        inherited_from_version_id: Some("global".into()),
                        hidden: false,
                    },
                ],
                "main".into(),
            )
            .unwrap();
            Self {
                registry,
                snapshots: InMemorySnapshotStore::new(),
                changes: ChangeLog::new(),
                graph,
                versions,
                clock: 1,
            }
        }

        pub fn history(&self) -> super::History<'_> {
            super::History {
                changes: &self.changes,
                snapshots: &self.snapshots,
                graph: &self.graph,
                versions: &self.versions,
            }
        }

        /// Commit `writes` (entity, content) on top of `parents` and move
        /// `version` to the new commit.
        pub fn commit(
            &mut self,
            version: &str,
            id: &str,
            parents: &[&str],
            writes: &[(&str, Option<Value>)],
        ) {
            let cs = ChangeSetId::new(format!("cs-{id}"));
            self.graph
                .add_change_set(ChangeSet {
                    id: cs.clone(),
                    name: None,
                })
                .unwrap();
            for (entity, content) in writes {
                self.clock += 1;
                let change_id = format!("ch-{id}-{entity}");
                self.changes
                    .record_change(
                        &self.registry,
                        &self.snapshots,
                        NewChange {
                            id: change_id.clone().into(),
                            entity_id: (*entity).into(),
                            schema_key: "note".into(),
                            schema_version: "1.0".into(),
                            file_id: "lix".into(),
                            plugin_key: "lix_own_entity".into(),
                            version_id: version.into(),
                            created_at: Timestamp::from_millis(self.clock),
                            content: content.clone(),
                        },
                    )
                    .unwrap();
                self.graph
                    .add_element(ChangeSetElement {
                        change_set_id: cs.clone(),
                        change_id: change_id.into(),
                        entity_id: (*entity).into(),
                        schema_key: "note".into(),
                        file_id: "lix".into(),
                    })
                    .unwrap();
            }
            self.graph
                .add_commit(
                    Commit {
                        id: id.into(),
                        change_set_id: cs,
                        author_account_ids: vec![],
                        description: None,
                        created_at: Timestamp::from_millis(self.clock),
                    },
                    &parents.iter().map(|p| CommitId::new(*p)).collect::<Vec<_>>(),
                )
                .unwrap();
            self.versions
                .set_commit(&VersionId::new(version), id.into())
                .unwrap();
        }

        pub fn add_version(&mut self, id: &str, from_commit: &str, parent: Option<&str>) {
            let wcs = format!("wcs-{id}");
            self.graph
                .add_change_set(ChangeSet {
                    id: wcs.clone().into(),
                    name: None,
                })
                .unwrap();
            self.versions
                .insert(Version {
                    id: id.into(),
                    name: id.into(),
                    commit_id: from_commit.into(),
                    working_change_set_id: wcs.into(),
                    inherited_from_version_id: parent.map(VersionId::from),
                    hidden: false,
                })
                .unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::Fixture;
    use super::*;
    use serde_json::json;

    fn key(entity: &str) -> EntityKey {
        EntityKey::new(entity, "note", "lix")
    }

    #[test]
    fn resolves_latest_reachable_change() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1", "text": "draft"})))]);
        f.commit("main", "c2", &["c1"], &[("n1", Some(json!({"id": "n1", "text": "final"})))]);
        let resolver = HistoryResolver::new(f.history());
        let local = resolver.local(&"main".into(), None).unwrap();
        let entry = &local[&key("n1")];
        assert_eq!(entry.content, Some(json!({"id": "n1", "text": "final"})));
        assert_eq!(entry.commit_id.as_str(), "c2");
        assert!(entry.created_at < entry.updated_at);
    }

    #[test]
    fn tombstone_is_reported_locally() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1"})))]);
        f.commit("main", "c2", &["c1"], &[("n1", None)]);
        let local = HistoryResolver::new(f.history()).local(&"main".into(), None).unwrap();
        assert_eq!(local[&key("n1")].content, None);
    }

    #[test]
    fn reinsert_after_delete_starts_a_new_life() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1", "text": "a"})))]);
        f.commit("main", "c2", &["c1"], &[("n1", None)]);
        f.commit("main", "c3", &["c2"], &[("n1", Some(json!({"id": "n1", "text": "a"})))]);
        let local = HistoryResolver::new(f.history()).local(&"main".into(), None).unwrap();
        let entry = &local[&key("n1")];
        assert_eq!(entry.change_id.as_str(), "ch-c3-n1");
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[test]
    fn divergence_is_an_error() {
        let mut f = Fixture::new();
        f.commit("main", "l", &["root"], &[("n1", Some(json!({"id": "n1", "text": "left"})))]);
        f.commit("main", "r", &["root"], &[("n1", Some(json!({"id": "n1", "text": "right"})))]);
        f.commit("main", "m", &["l", "r"], &[]);
        let err = HistoryResolver::new(f.history())
            .local(&"main".into(), None)
            .unwrap_err();
        assert!(matches!(err, StateError::Divergent { .. }));
    }

    #[test]
    fn identical_candidates_are_not_divergent() {
        let mut f = Fixture::new();
        f.commit("main", "l", &["root"], &[("n1", Some(json!({"id": "n1", "text": "same"})))]);
        f.commit("main", "r", &["root"], &[("n1", Some(json!({"id": "n1", "text": "same"})))]);
        f.commit("main", "m", &["l", "r"], &[]);
        let local = HistoryResolver::new(f.history()).local(&"main".into(), None).unwrap();
        assert_eq!(local[&key("n1")].content, Some(json!({"id": "n1", "text": "same"})));
    }

    #[test]
    fn schema_filter_limits_results() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1"})))]);
        let resolver = HistoryResolver::new(f.history());
        assert_eq!(resolver.local(&"main".into(), Some(&"note".into())).unwrap().len(), 1);
        assert!(resolver.local(&"main".into(), Some(&"other".into())).unwrap().is_empty());
    }
}
