use std::collections::HashMap;
use std::sync::RwLock;

use lix_types::SnapshotId;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::snapshot::Snapshot;
use crate::traits::SnapshotStore;

/// In-memory, `HashMap`-based snapshot store.
///
/// Snapshots are held behind a `RwLock`; reads clone. Cloning the store
/// clones its contents, which is how a transaction takes its restore point.
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<SnapshotId, Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored content snapshots (the tombstone is not counted).
    pub fn len(&self) -> usize {
        self.snapshots.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().expect("lock poisoned").is_empty()
    }

    /// All snapshots sorted by id.
    pub fn all(&self) -> Vec<Snapshot> {
        let map = self.snapshots.read().expect("lock poisoned");
        let mut out: Vec<Snapshot> = map.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Build a store from previously exported snapshots.
    pub fn from_snapshots(snapshots: Vec<Snapshot>) -> StoreResult<Self> {
        let store = Self::new();
        for snapshot in &snapshots {
            store.import(snapshot)?;
        }
        Ok(store)
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemorySnapshotStore {
    fn clone(&self) -> Self {
        let map = self.snapshots.read().expect("lock poisoned");
        Self {
            snapshots: RwLock::new(map.clone()),
        }
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn read(&self, id: &SnapshotId) -> StoreResult<Option<Snapshot>> {
        if id.is_no_content() {
            return Ok(Some(Snapshot::tombstone()));
        }
        let map = self.snapshots.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn create(&self, content: Option<Value>) -> StoreResult<Snapshot> {
        let snapshot = Snapshot::from_option(content);
        if snapshot.is_tombstone() {
            return Ok(snapshot);
        }
        let mut map = self.snapshots.write().expect("lock poisoned");
        Ok(map
            .entry(snapshot.id)
            .or_insert_with(|| snapshot.clone())
            .clone())
    }

    fn import(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let computed = snapshot.compute_id();
        if computed != snapshot.id {
            return Err(StoreError::HashMismatch {
                id: snapshot.id,
                computed,
            });
        }
        if snapshot.is_tombstone() {
            return Ok(());
        }
        let mut map = self.snapshots.write().expect("lock poisoned");
        map.entry(snapshot.id).or_insert_with(|| snapshot.clone());
        Ok(())
    }

    fn exists(&self, id: &SnapshotId) -> StoreResult<bool> {
        if id.is_no_content() {
            return Ok(true);
        }
        Ok(self.snapshots.read().expect("lock poisoned").contains_key(id))
    }
}

impl std::fmt::Debug for InMemorySnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySnapshotStore")
            .field("snapshot_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn create_deduplicates() {
        let store = InMemorySnapshotStore::new();
        let a = store.create(Some(json!({"a": 1, "b": 2}))).unwrap();
        let b = store.create(Some(json!({"b": 2, "a": 1}))).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tombstone_is_never_stored() {
        let store = InMemorySnapshotStore::new();
        let tomb = store.create(None).unwrap();
        assert!(tomb.is_tombstone());
        assert!(store.is_empty());
        assert!(store.exists(&tomb.id).unwrap());
        assert_eq!(store.content(&tomb.id).unwrap(), None);
    }

    #[test]
    fn concurrent_identical_writes_converge() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create(Some(json!({"same": true}))).unwrap().id)
            })
            .collect();
        let ids: Vec<SnapshotId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn import_rejects_tampered_snapshot() {
        let store = InMemorySnapshotStore::new();
        let mut snap = Snapshot::new(json!({"x": 1}));
        snap.content = Some(json!({"x": 2}));
        assert!(matches!(store.import(&snap), Err(StoreError::HashMismatch { .. })));
    }

    #[test]
    fn content_of_missing_snapshot_errors() {
        let store = InMemorySnapshotStore::new();
        let id = Snapshot::new(json!({"never": "stored"})).id;
        assert!(matches!(store.content(&id), Err(StoreError::SnapshotNotFound(_))));
    }

    #[test]
    fn clone_is_independent() {
        let store = InMemorySnapshotStore::new();
        store.create(Some(json!(1))).unwrap();
        let copy = store.clone();
        store.create(Some(json!(2))).unwrap();
        assert_eq!(copy.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
