use std::collections::{BTreeMap, HashMap};

use lix_index::Staging;
use lix_refs::VersionStore;
use lix_types::{ChangeId, EntityKey, SchemaKey, StateKey, VersionId};
use tracing::trace;

use crate::error::StateResult;
use crate::resolve::LocalSource;
use crate::row::{LocalEntry, StateRow};
use crate::untracked::UntrackedStore;

/// `change_id` reported for untracked rows.
pub const UNTRACKED_CHANGE_ID: &str = "untracked";

/// The uncommitted layers stacked on top of committed state.
#[derive(Clone, Copy)]
pub struct Layers<'a> {
    pub staging: &'a Staging,
    pub untracked: &'a UntrackedStore,
    pub versions: &'a VersionStore,
}

/// Which rows to produce.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateFilter {
    /// Limit to one version; `None` produces rows for every version.
    pub version_id: Option<VersionId>,
    pub schema_key: Option<SchemaKey>,
}

impl StateFilter {
    pub fn version(version_id: impl Into<VersionId>) -> Self {
        Self {
            version_id: Some(version_id.into()),
            schema_key: None,
        }
    }

    pub fn with_schema(mut self, schema_key: impl Into<SchemaKey>) -> Self {
        self.schema_key = Some(schema_key.into());
        self
    }
}

/// What one layer says about a key: a visible row or a deletion.
enum Decision {
    Row(StateRow),
    Hidden,
}

/// Visible rows after applying staging, untracked rows, local state and
/// inheritance, ordered by version then entity key.
pub fn visible_rows(
    source: &dyn LocalSource,
    layers: &Layers<'_>,
    filter: &StateFilter,
) -> StateResult<Vec<StateRow>> {
    let targets: Vec<VersionId> = match &filter.version_id {
        Some(id) => vec![layers.versions.require(id)?.id.clone()],
        None => layers.versions.all().map(|v| v.id.clone()).collect(),
    };
    let schema = filter.schema_key.as_ref();
    let mut locals: HashMap<VersionId, BTreeMap<EntityKey, LocalEntry>> = HashMap::new();
    let mut out = Vec::new();

    for target in &targets {
        let mut chain = vec![target.clone()];
        chain.extend(layers.versions.inheritance_chain(target)?);
        let mut decided: BTreeMap<EntityKey, Decision> = BTreeMap::new();

        for layer in &chain {
            if !locals.contains_key(layer) {
                locals.insert(layer.clone(), source.local(layer, schema)?);
            }
            let inherited = (layer != target).then(|| layer.clone());
            for (key, decision) in own_view(layers, &locals[layer], layer, schema) {
                decided.entry(key).or_insert_with(|| match decision {
                    Decision::Row(mut row) => {
                        row.version_id = target.clone();
                        row.inherited_from_version_id = inherited.clone();
                        Decision::Row(row)
                    }
                    Decision::Hidden => Decision::Hidden,
                });
            }
        }

        let before = out.len();
        out.extend(decided.into_values().filter_map(|d| match d {
            Decision::Row(row) => Some(row),
            Decision::Hidden => None,
        }));
        trace!(version = %target, rows = out.len() - before, "resolved visible rows");
    }
    Ok(out)
}

/// The visible row for one key, if any.
pub fn visible_row(
    source: &dyn LocalSource,
    layers: &Layers<'_>,
    key: &StateKey,
) -> StateResult<Option<StateRow>> {
    let filter = StateFilter {
        version_id: Some(key.version_id.clone()),
        schema_key: Some(key.key.schema_key.clone()),
    };
    Ok(visible_rows(source, layers, &filter)?
        .into_iter()
        .find(|row| row.key == key.key))
}

/// A single version's own decisions, before inheritance.
fn own_view(
    layers: &Layers<'_>,
    local: &BTreeMap<EntityKey, LocalEntry>,
    version: &VersionId,
    schema: Option<&SchemaKey>,
) -> BTreeMap<EntityKey, Decision> {
    let in_schema = |key: &EntityKey| schema.map_or(true, |s| *s == key.schema_key);
    let mut view = BTreeMap::new();

    for (key, entry) in local {
        view.insert(key.clone(), local_decision(entry, version));
    }

    for row in layers.untracked.rows_for_version(version) {
        if !in_schema(&row.key.key) {
            continue;
        }
        view.insert(
            row.key.key.clone(),
            Decision::Row(StateRow {
                key: row.key.key.clone(),
                version_id: version.clone(),
                plugin_key: row.plugin_key.clone(),
                schema_version: row.schema_version.clone(),
                snapshot_content: row.content.clone(),
                change_id: ChangeId::new(UNTRACKED_CHANGE_ID),
                created_at: row.created_at,
                updated_at: row.updated_at,
                inherited_from_version_id: None,
                commit_id: None,
                untracked: true,
            }),
        );
    }

    for staged in layers.staging.rows_for_version(version) {
        let key = staged.entity_key();
        if !in_schema(key) {
            continue;
        }
        let decision = match (&staged.content, staged.untracked) {
            // Removing an untracked row uncovers the tracked value beneath.
            (None, true) => match local.get(key) {
                Some(entry) => local_decision(entry, version),
                None => {
                    view.remove(key);
                    continue;
                }
            },
            (None, false) => Decision::Hidden,
            (Some(content), untracked) => {
                let previous = view.get(key).and_then(|d| match d {
                    Decision::Row(row) => Some(row.created_at),
                    Decision::Hidden => None,
                });
                Decision::Row(StateRow {
                    key: key.clone(),
                    version_id: version.clone(),
                    plugin_key: staged.plugin_key.clone(),
                    schema_version: staged.schema_version.clone(),
                    snapshot_content: content.clone(),
                    change_id: if untracked {
                        ChangeId::new(UNTRACKED_CHANGE_ID)
                    } else {
                        staged.change_id.clone()
                    },
                    created_at: previous.unwrap_or(staged.created_at),
                    updated_at: staged.created_at,
                    inherited_from_version_id: None,
                    commit_id: None,
                    untracked,
                })
            }
        };
        view.insert(key.clone(), decision);
    }
    view
}

fn local_decision(entry: &LocalEntry, version: &VersionId) -> Decision {
    match &entry.content {
        Some(content) => Decision::Row(StateRow {
            key: entry.key.clone(),
            version_id: version.clone(),
            plugin_key: entry.plugin_key.clone(),
            schema_version: entry.schema_version.clone(),
            snapshot_content: content.clone(),
            change_id: entry.change_id.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            inherited_from_version_id: None,
            commit_id: Some(entry.commit_id.clone()),
            untracked: false,
        }),
        None => Decision::Hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::fixture::Fixture;
    use crate::resolve::HistoryResolver;
    use crate::untracked::UntrackedRow;
    use crate::StateCache;
    use lix_index::StagedRow;
    use lix_types::Timestamp;
    use serde_json::{json, Value};

    fn key(entity: &str) -> EntityKey {
        EntityKey::new(entity, "note", "lix")
    }

    fn staged(entity: &str, version: &str, content: Option<Value>, untracked: bool) -> StagedRow {
        StagedRow {
            key: key(entity).in_version(&VersionId::new(version)),
            schema_version: "1.0".into(),
            plugin_key: "lix_own_entity".into(),
            content,
            untracked,
            change_id: format!("staged-{entity}").into(),
            created_at: Timestamp::from_millis(100),
        }
    }

    fn rows_for(f: &Fixture, staging: &Staging, untracked: &UntrackedStore, version: &str) -> Vec<StateRow> {
        let layers = Layers {
            staging,
            untracked,
            versions: &f.versions,
        };
        visible_rows(
            &HistoryResolver::new(f.history()),
            &layers,
            &StateFilter::version(version),
        )
        .unwrap()
    }

    #[test]
    fn inherited_rows_are_attributed() {
        let mut f = Fixture::new();
        f.commit("global", "g1", &["root"], &[("shared", Some(json!({"id": "shared"})))]);
        let rows = rows_for(&f, &Staging::new(), &UntrackedStore::new(), "main");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version_id.as_str(), "main");
        assert_eq!(rows[0].inherited_from_version_id, Some("global".into()));
    }

    #[test]
    fn local_tombstone_hides_inherited_value() {
        let mut f = Fixture::new();
        f.commit("global", "g1", &["root"], &[("shared", Some(json!({"id": "shared"})))]);
        f.commit("main", "m1", &["root"], &[("shared", None)]);
        assert!(rows_for(&f, &Staging::new(), &UntrackedStore::new(), "main").is_empty());
        assert_eq!(rows_for(&f, &Staging::new(), &UntrackedStore::new(), "global").len(), 1);
    }

    #[test]
    fn staging_overrides_committed() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1", "text": "old"})))]);
        let mut staging = Staging::new();
        staging
            .stage(staged("n1", "main", Some(json!({"id": "n1", "text": "new"})), false))
            .unwrap();
        let rows = rows_for(&f, &staging, &UntrackedStore::new(), "main");
        assert_eq!(rows[0].snapshot_content["text"], "new");
        assert_eq!(rows[0].commit_id, None);
        assert!(rows[0].created_at < rows[0].updated_at);

        let mut staging = Staging::new();
        staging.stage(staged("n1", "main", None, false)).unwrap();
        assert!(rows_for(&f, &staging, &UntrackedStore::new(), "main").is_empty());
    }

    #[test]
    fn untracked_shadows_and_deleting_it_reveals_tracked() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1", "text": "tracked"})))]);
        let mut untracked = UntrackedStore::new();
        untracked.upsert(UntrackedRow {
            key: key("n1").in_version(&"main".into()),
            plugin_key: "lix_own_entity".into(),
            schema_version: "1.0".into(),
            content: json!({"id": "n1", "text": "local"}),
            created_at: Timestamp::from_millis(50),
            updated_at: Timestamp::from_millis(50),
        });
        let rows = rows_for(&f, &Staging::new(), &untracked, "main");
        assert!(rows[0].untracked);
        assert_eq!(rows[0].change_id.as_str(), UNTRACKED_CHANGE_ID);

        let mut staging = Staging::new();
        staging.stage(staged("n1", "main", None, true)).unwrap();
        let rows = rows_for(&f, &staging, &untracked, "main");
        assert!(!rows[0].untracked);
        assert_eq!(rows[0].snapshot_content["text"], "tracked");
    }

    #[test]
    fn cache_and_history_agree() {
        let mut f = Fixture::new();
        f.commit("global", "g1", &["root"], &[("a", Some(json!({"id": "a"})))]);
        f.commit("main", "m1", &["root"], &[("b", Some(json!({"id": "b"})))]);
        f.add_version("feature", "m1", Some("main"));
        let staging = Staging::new();
        let untracked = UntrackedStore::new();
        let layers = Layers {
            staging: &staging,
            untracked: &untracked,
            versions: &f.versions,
        };
        let mut cache = StateCache::new();
        cache.ensure_fresh(f.history()).unwrap();
        let filter = StateFilter::default();
        let from_cache = visible_rows(&cache, &layers, &filter).unwrap();
        let from_history =
            visible_rows(&HistoryResolver::new(f.history()), &layers, &filter).unwrap();
        assert_eq!(from_cache, from_history);

        let feature: Vec<_> = from_cache
            .iter()
            .filter(|r| r.version_id.as_str() == "feature")
            .map(|r| r.key.entity_id.to_string())
            .collect();
        assert_eq!(feature, vec!["a", "b"]);
    }

    #[test]
    fn single_row_lookup() {
        let mut f = Fixture::new();
        f.commit("main", "c1", &["root"], &[("n1", Some(json!({"id": "n1"})))]);
        let staging = Staging::new();
        let untracked = UntrackedStore::new();
        let layers = Layers {
            staging: &staging,
            untracked: &untracked,
            versions: &f.versions,
        };
        let resolver = HistoryResolver::new(f.history());
        let found = visible_row(&resolver, &layers, &key("n1").in_version(&"main".into())).unwrap();
        assert!(found.is_some());
        let missing = visible_row(&resolver, &layers, &key("n2").in_version(&"main".into())).unwrap();
        assert!(missing.is_none());
    }
}
