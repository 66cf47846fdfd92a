use lix_types::SnapshotId;
use serde_json::Value;

use crate::error::StoreResult;
use crate::snapshot::Snapshot;

/// Content-addressed snapshot store.
///
/// Implementations must satisfy:
/// - Snapshots are immutable once written; the same content always yields
///   the same id, so concurrent identical writes converge on one row.
/// - The tombstone is always present and never stored as a row.
/// - The store never interprets content beyond hashing it.
pub trait SnapshotStore: Send + Sync {
    /// Read a snapshot by id. Returns `Ok(None)` if absent.
    fn read(&self, id: &SnapshotId) -> StoreResult<Option<Snapshot>>;

    /// Return the existing-or-new snapshot for `content`.
    fn create(&self, content: Option<Value>) -> StoreResult<Snapshot>;

    /// Insert a snapshot received from elsewhere, verifying its id.
    fn import(&self, snapshot: &Snapshot) -> StoreResult<()>;

    fn exists(&self, id: &SnapshotId) -> StoreResult<bool>;

    /// Read the content of a snapshot, `None` for the tombstone.
    fn content(&self, id: &SnapshotId) -> StoreResult<Option<Value>> {
        if id.is_no_content() {
            return Ok(None);
        }
        match self.read(id)? {
            Some(snapshot) => Ok(snapshot.content),
            None => Err(crate::error::StoreError::SnapshotNotFound(*id)),
        }
    }
}
