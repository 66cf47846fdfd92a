use std::collections::{BTreeMap, HashMap};

use lix_schema::SchemaRegistry;
use lix_types::{ChangeId, EntityKey};
use tracing::trace;

use crate::change::{Change, NewChange};
use crate::error::{StoreError, StoreResult};
use crate::traits::SnapshotStore;

/// Append-only change log.
///
/// Changes are kept in append order with an id index and a per-entity index.
/// Nothing in the log is ever updated or removed.
#[derive(Clone, Debug, Default)]
pub struct ChangeLog {
    changes: Vec<Change>,
    by_id: HashMap<ChangeId, usize>,
    by_entity: BTreeMap<EntityKey, Vec<usize>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from exported changes, preserving their order.
    pub fn from_changes(changes: Vec<Change>) -> StoreResult<Self> {
        let mut log = Self::new();
        for change in changes {
            log.append(change)?;
        }
        Ok(log)
    }

    /// Validate content, create its snapshot, and append the change.
    ///
    /// On a validation failure nothing is written: neither the snapshot nor
    /// the change.
    pub fn record_change(
        &mut self,
        registry: &SchemaRegistry,
        snapshots: &dyn SnapshotStore,
        new: NewChange,
    ) -> StoreResult<Change> {
        if let Some(content) = &new.content {
            registry.validate(new.schema_key.as_str(), &new.schema_version, content)?;
        }
        if self.by_id.contains_key(&new.id) {
            return Err(StoreError::DuplicateChange(new.id));
        }
        let snapshot = snapshots.create(new.content)?;
        let change = Change {
            id: new.id,
            entity_id: new.entity_id,
            schema_key: new.schema_key,
            schema_version: new.schema_version,
            file_id: new.file_id,
            plugin_key: new.plugin_key,
            snapshot_id: snapshot.id,
            version_id: new.version_id,
            created_at: new.created_at,
        };
        trace!(change_id = %change.id, entity = %change.entity_key(), "recorded change");
        self.append(change.clone())?;
        Ok(change)
    }

    /// Append a change that already exists elsewhere (import / merge).
    ///
    /// Appending a change identical to one already present is a no-op.
    pub fn append(&mut self, change: Change) -> StoreResult<bool> {
        if let Some(&index) = self.by_id.get(&change.id) {
            if self.changes[index] == change {
                return Ok(false);
            }
            return Err(StoreError::DuplicateChange(change.id));
        }
        let index = self.changes.len();
        self.by_id.insert(change.id.clone(), index);
        self.by_entity.entry(change.entity_key()).or_default().push(index);
        self.changes.push(change);
        Ok(true)
    }

    pub fn get(&self, id: &ChangeId) -> Option<&Change> {
        self.by_id.get(id).map(|&i| &self.changes[i])
    }

    pub fn require(&self, id: &ChangeId) -> StoreResult<&Change> {
        self.get(id)
            .ok_or_else(|| StoreError::ChangeNotFound(id.clone()))
    }

    pub fn contains(&self, id: &ChangeId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Changes to one entity in append order.
    pub fn for_entity(&self, key: &EntityKey) -> impl Iterator<Item = &Change> {
        self.by_entity
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.changes[i])
    }

    /// All changes in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
