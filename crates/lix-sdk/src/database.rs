//! Everything one open database holds, and the operations that touch
//! several of its parts at once.

use std::collections::BTreeMap;

use lix_dag::{ChangeSet, ChangeSetElement, Commit, CommitGraph, GraphImage};
use lix_deterministic::{FunctionProvider, Mode, ProviderState};
use lix_index::{StagedRow, Staging};
use lix_merge::{apply_merge, ConflictRecord, ConflictStore, MergeCommit, MergePlan};
use lix_refs::{Version, VersionImage, VersionStore, GLOBAL_VERSION_ID, MAIN_VERSION_NAME};
use lix_schema::builtin::{self, keys, ACTIVE_ACCOUNT, KEY_VALUE};
use lix_schema::{EntityAccessor, LixEntity, SchemaRegistry};
use lix_state::{
    visible_row, visible_rows, History, HistoryResolver, Layers, StateCache, StateFilter,
    StateRow, UntrackedRow, UntrackedStore,
};
use lix_store::{Change, ChangeLog, InMemorySnapshotStore, NewChange, Snapshot};
use lix_types::{
    AccountId, ChangeSetId, CommitId, ConflictId, EntityKey, LixId, StateKey, VersionId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::entities::StoredSchema;
use crate::error::LixResult;

/// `file_id` of entities that do not belong to a file.
pub const DEFAULT_FILE_ID: &str = "lix";

/// `plugin_key` of entities written through views rather than a plugin.
pub const OWN_ENTITY_PLUGIN: &str = "lix_own_entity";

/// Serialisable form of a whole database, the payload of an exported blob.
///
/// Staged rows and the state cache are not part of it: an export happens
/// between transactions and the cache is rebuilt on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseImage {
    pub lix_id: LixId,
    pub snapshots: Vec<Snapshot>,
    pub changes: Vec<Change>,
    pub graph: GraphImage,
    pub versions: VersionImage,
    pub untracked: Vec<UntrackedRow>,
    pub conflicts: Vec<ConflictRecord>,
    pub provider: ProviderState,
}

/// What a merge did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The merge commit, `None` when the target already had everything.
    pub commit_id: Option<CommitId>,
    pub adopted: usize,
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Clone)]
pub(crate) struct Database {
    pub(crate) lix_id: LixId,
    pub(crate) registry: SchemaRegistry,
    pub(crate) snapshots: InMemorySnapshotStore,
    pub(crate) changes: ChangeLog,
    pub(crate) graph: CommitGraph,
    pub(crate) versions: VersionStore,
    pub(crate) staging: Staging,
    pub(crate) untracked: UntrackedStore,
    pub(crate) cache: StateCache,
    pub(crate) conflicts: ConflictStore,
    pub(crate) provider: FunctionProvider,
}

impl Database {
    /// A new database: built-in schemas, a root commit, the hidden
    /// `global` version and `main` inheriting from it.
    pub(crate) fn create(mode: Mode) -> LixResult<Self> {
        let mut provider = FunctionProvider::new(mode);
        let registry = builtin_registry()?;

        let mut graph = CommitGraph::new();
        let root_set = ChangeSetId::new(provider.uuid_v7());
        graph.add_change_set(ChangeSet {
            id: root_set.clone(),
            name: None,
        })?;
        let root = CommitId::new(provider.uuid_v7());
        graph.add_commit(
            Commit {
                id: root.clone(),
                change_set_id: root_set,
                author_account_ids: Vec::new(),
                description: None,
                created_at: provider.timestamp(),
            },
            &[],
        )?;

        let global_id = VersionId::new(GLOBAL_VERSION_ID);
        let global = Version {
            id: global_id.clone(),
            name: GLOBAL_VERSION_ID.to_string(),
            commit_id: root.clone(),
            working_change_set_id: new_working_set(&mut graph, &mut provider)?,
            inherited_from_version_id: None,
            hidden: true,
        };
        let main_id = VersionId::new(provider.nano_id());
        let main = Version {
            id: main_id.clone(),
            name: MAIN_VERSION_NAME.to_string(),
            commit_id: root,
            working_change_set_id: new_working_set(&mut graph, &mut provider)?,
            inherited_from_version_id: Some(global_id),
            hidden: false,
        };
        let versions = VersionStore::new(vec![global, main], main_id)?;
        let lix_id = LixId::new(provider.uuid_v7());
        info!(lix_id = %lix_id, deterministic = mode.is_deterministic(), "created database");

        Ok(Self {
            lix_id,
            registry,
            snapshots: InMemorySnapshotStore::new(),
            changes: ChangeLog::new(),
            graph,
            versions,
            staging: Staging::new(),
            untracked: UntrackedStore::new(),
            cache: StateCache::new(),
            conflicts: ConflictStore::new(),
            provider,
        })
    }

    /// Rebuild a database from an exported image, registering the
    /// schemas it stored.
    pub(crate) fn from_image(image: DatabaseImage) -> LixResult<Self> {
        let mut db = Self {
            lix_id: image.lix_id,
            registry: builtin_registry()?,
            snapshots: InMemorySnapshotStore::from_snapshots(image.snapshots)?,
            changes: ChangeLog::from_changes(image.changes)?,
            graph: CommitGraph::from_image(image.graph)?,
            versions: VersionStore::from_image(image.versions)?,
            staging: Staging::new(),
            untracked: UntrackedStore::from_rows(image.untracked),
            cache: StateCache::new(),
            conflicts: ConflictStore::from_records(image.conflicts),
            provider: FunctionProvider::from_state(image.provider),
        };
        db.register_stored_schemas()?;
        info!(lix_id = %db.lix_id, changes = db.changes.len(), commits = db.graph.len(), "opened database");
        Ok(db)
    }

    pub(crate) fn to_image(&self) -> DatabaseImage {
        DatabaseImage {
            lix_id: self.lix_id.clone(),
            snapshots: self.snapshots.all(),
            changes: self.changes.iter().cloned().collect(),
            graph: self.graph.to_image(),
            versions: self.versions.to_image(),
            untracked: self.untracked.rows().cloned().collect(),
            conflicts: self.conflicts.all().cloned().collect(),
            provider: self.provider.state(),
        }
    }

    pub(crate) fn register_stored_schemas(&mut self) -> LixResult<()> {
        let stored: Vec<StoredSchema> = self.entities_in(&VersionId::new(GLOBAL_VERSION_ID))?;
        for schema in stored {
            debug!(key = %schema.key, version = %schema.version, "re-registering stored schema");
            self.registry.register_value(&schema.value)?;
        }
        Ok(())
    }

    // ---- State reads ----

    pub(crate) fn history(&self) -> History<'_> {
        History {
            changes: &self.changes,
            snapshots: &self.snapshots,
            graph: &self.graph,
            versions: &self.versions,
        }
    }

    pub(crate) fn layers(&self) -> Layers<'_> {
        Layers {
            staging: &self.staging,
            untracked: &self.untracked,
            versions: &self.versions,
        }
    }

    /// Visible rows resolved by walking history.
    pub(crate) fn resolved_rows(&self, filter: &StateFilter) -> LixResult<Vec<StateRow>> {
        let resolver = HistoryResolver::new(self.history());
        Ok(visible_rows(&resolver, &self.layers(), filter)?)
    }

    /// Visible rows read through the state cache, rebuilding it first when
    /// a write left it stale.
    pub(crate) fn cached_rows(&mut self, filter: &StateFilter) -> LixResult<Vec<StateRow>> {
        let history = History {
            changes: &self.changes,
            snapshots: &self.snapshots,
            graph: &self.graph,
            versions: &self.versions,
        };
        self.cache.ensure_fresh(history)?;
        let layers = Layers {
            staging: &self.staging,
            untracked: &self.untracked,
            versions: &self.versions,
        };
        Ok(visible_rows(&self.cache, &layers, filter)?)
    }

    pub(crate) fn visible(&self, key: &StateKey) -> LixResult<Option<StateRow>> {
        let resolver = HistoryResolver::new(self.history());
        Ok(visible_row(&resolver, &self.layers(), key)?)
    }

    /// Version entities of `schema` are written to and read from when
    /// addressed from `requested`.
    pub(crate) fn home_version(&self, schema_key: &str, requested: &VersionId) -> VersionId {
        match self.registry.get(schema_key) {
            Some(schema) if schema.global => VersionId::new(GLOBAL_VERSION_ID),
            _ => requested.clone(),
        }
    }

    /// Typed entities visible in `version_id`.
    pub(crate) fn entities_in<T: LixEntity>(&self, version_id: &VersionId) -> LixResult<Vec<T>> {
        let accessor = EntityAccessor::<T>::bind(&self.registry)?;
        let filter = StateFilter::version(version_id.clone()).with_schema(T::SCHEMA_KEY);
        self.resolved_rows(&filter)?
            .iter()
            .map(|row| Ok(accessor.decode(&row.snapshot_content)?))
            .collect()
    }

    /// One typed entity visible in its home version as seen from the
    /// active version.
    pub(crate) fn entity<T: LixEntity>(&self, entity_id: &str) -> LixResult<Option<T>> {
        let accessor = EntityAccessor::<T>::bind(&self.registry)?;
        let version = self.home_version(T::SCHEMA_KEY, self.versions.active_id());
        let key = EntityKey::new(entity_id, T::SCHEMA_KEY, DEFAULT_FILE_ID).in_version(&version);
        match self.visible(&key)? {
            Some(row) => Ok(Some(accessor.decode(&row.snapshot_content)?)),
            None => Ok(None),
        }
    }

    /// Ids of the accounts marked active.
    pub(crate) fn active_account_ids(&self) -> LixResult<Vec<AccountId>> {
        let filter = StateFilter::version(GLOBAL_VERSION_ID).with_schema(ACTIVE_ACCOUNT);
        Ok(self
            .resolved_rows(&filter)?
            .iter()
            .filter_map(|row| row.snapshot_content.get("account_id").and_then(Value::as_str))
            .map(AccountId::new)
            .collect())
    }

    // ---- Commit ----

    /// Promote every staged row: untracked rows go to the untracked store,
    /// tracked rows become changes in one new commit per touched version.
    pub(crate) fn commit_staged(&mut self) -> LixResult<Vec<CommitId>> {
        if self.staging.is_empty() {
            return Ok(Vec::new());
        }
        let summary = self.staging.summary();
        let mut tracked: BTreeMap<VersionId, Vec<StagedRow>> = BTreeMap::new();
        for row in self.staging.drain() {
            if row.untracked {
                self.apply_untracked(row);
            } else {
                tracked.entry(row.key.version_id.clone()).or_default().push(row);
            }
        }
        if tracked.is_empty() {
            debug!(untracked = summary.untracked, "applied untracked rows");
            return Ok(Vec::new());
        }

        let authors = self.active_account_ids()?;
        let mut commits = Vec::with_capacity(tracked.len());
        for (version_id, rows) in tracked {
            commits.push(self.commit_version(&version_id, rows, authors.clone())?);
        }
        self.cache.mark_stale();
        self.sync_mode()?;
        info!(
            commits = commits.len(),
            tracked = summary.tracked,
            untracked = summary.untracked,
            deletions = summary.deletions,
            "transaction committed"
        );
        Ok(commits)
    }

    fn apply_untracked(&mut self, row: StagedRow) {
        match row.content {
            Some(content) => self.untracked.upsert(UntrackedRow {
                key: row.key,
                plugin_key: row.plugin_key,
                schema_version: row.schema_version,
                content,
                created_at: row.created_at,
                updated_at: row.created_at,
            }),
            None => {
                self.untracked.delete(&row.key);
            }
        }
    }

    fn commit_version(
        &mut self,
        version_id: &VersionId,
        rows: Vec<StagedRow>,
        authors: Vec<AccountId>,
    ) -> LixResult<CommitId> {
        let version = self.versions.require(version_id)?.clone();
        let change_set_id = ChangeSetId::new(self.provider.uuid_v7());
        self.graph.add_change_set(ChangeSet {
            id: change_set_id.clone(),
            name: None,
        })?;

        let count = rows.len();
        for row in rows {
            let change = self.changes.record_change(
                &self.registry,
                &self.snapshots,
                NewChange {
                    id: row.change_id,
                    entity_id: row.key.key.entity_id,
                    schema_key: row.key.key.schema_key,
                    schema_version: row.schema_version,
                    file_id: row.key.key.file_id,
                    plugin_key: row.plugin_key,
                    version_id: version_id.clone(),
                    created_at: row.created_at,
                    content: row.content,
                },
            )?;
            let element = element_for(&change_set_id, &change);
            self.graph.add_element(element)?;
            self.graph
                .add_element(element_for(&version.working_change_set_id, &change))?;
        }

        let commit_id = CommitId::new(self.provider.uuid_v7());
        self.graph.add_commit(
            Commit {
                id: commit_id.clone(),
                change_set_id,
                author_account_ids: authors,
                description: None,
                created_at: self.provider.timestamp(),
            },
            &[version.commit_id.clone()],
        )?;
        self.versions.set_commit(version_id, commit_id.clone())?;
        info!(commit = %commit_id, version = %version_id, changes = count, "created commit");
        Ok(commit_id)
    }

    /// Follow the deterministic-mode key-value entity.
    fn sync_mode(&mut self) -> LixResult<()> {
        let key = EntityKey::new(keys::DETERMINISTIC_MODE, KEY_VALUE, DEFAULT_FILE_ID)
            .in_version(&VersionId::new(GLOBAL_VERSION_ID));
        let Some(row) = self.visible(&key)? else {
            return Ok(());
        };
        let mode = Mode::from_value(row.snapshot_content.get("value").unwrap_or(&Value::Null))?;
        if mode != self.provider.mode() {
            info!(deterministic = mode.is_deterministic(), "deterministic mode changed");
            self.provider.set_mode(mode);
        }
        Ok(())
    }

    // ---- Merge ----

    /// Create the merge commit a plan describes, move the target version
    /// onto it and record the plan's conflicts.
    pub(crate) fn apply_plan(&mut self, plan: &MergePlan) -> LixResult<MergeOutcome> {
        if plan.up_to_date {
            debug!(source = %plan.source_version_id, target = %plan.target_version_id, "merge is up to date");
            return Ok(MergeOutcome::default());
        }
        let commit = MergeCommit {
            commit_id: CommitId::new(self.provider.uuid_v7()),
            change_set_id: ChangeSetId::new(self.provider.uuid_v7()),
            author_account_ids: self.active_account_ids()?,
            description: Some(format!(
                "merge {} into {}",
                plan.source_version_id, plan.target_version_id
            )),
            created_at: self.provider.timestamp(),
        };
        let Some(commit_id) = apply_merge(&mut self.graph, plan, commit)? else {
            return Ok(MergeOutcome::default());
        };
        self.versions
            .set_commit(&plan.target_version_id, commit_id.clone())?;

        let working = self
            .versions
            .require(&plan.target_version_id)?
            .working_change_set_id
            .clone();
        for adopted in &plan.adopted {
            self.graph.add_element(ChangeSetElement {
                change_set_id: working.clone(),
                change_id: adopted.change_id.clone(),
                entity_id: adopted.key.entity_id.clone(),
                schema_key: adopted.key.schema_key.clone(),
                file_id: adopted.key.file_id.clone(),
            })?;
        }

        let mut conflicts = Vec::with_capacity(plan.conflicts.len());
        for planned in &plan.conflicts {
            let record = ConflictRecord::from_plan(
                ConflictId::new(self.provider.nano_id()),
                plan,
                planned,
                commit_id.clone(),
                self.provider.timestamp(),
            );
            self.conflicts.insert(record.clone());
            conflicts.push(record);
        }
        self.cache.mark_stale();
        self.sync_mode()?;
        Ok(MergeOutcome {
            commit_id: Some(commit_id),
            adopted: plan.adopted.len(),
            conflicts,
        })
    }

    // ---- Versions ----

    /// A fresh, empty working change set.
    pub(crate) fn new_working_set(&mut self) -> LixResult<ChangeSetId> {
        new_working_set(&mut self.graph, &mut self.provider)
    }
}

fn builtin_registry() -> LixResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    for schema in builtin::schemas()? {
        registry.register(schema)?;
    }
    Ok(registry)
}

fn new_working_set(
    graph: &mut CommitGraph,
    provider: &mut FunctionProvider,
) -> LixResult<ChangeSetId> {
    let id = ChangeSetId::new(provider.uuid_v7());
    graph.add_change_set(ChangeSet {
        id: id.clone(),
        name: None,
    })?;
    Ok(id)
}

fn element_for(change_set_id: &ChangeSetId, change: &Change) -> ChangeSetElement {
    ChangeSetElement {
        change_set_id: change_set_id.clone(),
        change_id: change.id.clone(),
        entity_id: change.entity_id.clone(),
        schema_key: change.schema_key.clone(),
        file_id: change.file_id.clone(),
    }
}
