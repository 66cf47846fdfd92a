use lix_types::{ChangeId, EntityId, EntityKey, FileId, SchemaKey, SnapshotId, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable record that an entity held a snapshot (or was deleted).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub entity_id: EntityId,
    pub schema_key: SchemaKey,
    pub schema_version: String,
    pub file_id: FileId,
    pub plugin_key: String,
    pub snapshot_id: SnapshotId,
    /// Version the change was first written in.
    pub version_id: VersionId,
    pub created_at: Timestamp,
}

impl Change {
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            entity_id: self.entity_id.clone(),
            schema_key: self.schema_key.clone(),
            file_id: self.file_id.clone(),
        }
    }

    pub fn is_deletion(&self) -> bool {
        self.snapshot_id.is_no_content()
    }
}

/// Input to [`ChangeLog::record_change`](crate::ChangeLog::record_change).
#[derive(Clone, Debug, PartialEq)]
pub struct NewChange {
    pub id: ChangeId,
    pub entity_id: EntityId,
    pub schema_key: SchemaKey,
    pub schema_version: String,
    pub file_id: FileId,
    pub plugin_key: String,
    pub version_id: VersionId,
    pub created_at: Timestamp,
    /// `None` records a deletion.
    pub content: Option<Value>,
}
