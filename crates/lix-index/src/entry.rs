use lix_types::{ChangeId, EntityKey, StateKey, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pending write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagedRow {
    pub key: StateKey,
    pub schema_version: String,
    pub plugin_key: String,
    /// `None` stages a deletion.
    pub content: Option<Value>,
    /// Untracked rows bypass the change log on commit.
    pub untracked: bool,
    /// Id the change will receive on commit.
    pub change_id: ChangeId,
    pub created_at: Timestamp,
}

impl StagedRow {
    pub fn entity_key(&self) -> &EntityKey {
        &self.key.key
    }

    pub fn version_id(&self) -> &VersionId {
        &self.key.version_id
    }

    pub fn is_deletion(&self) -> bool {
        self.content.is_none()
    }
}
