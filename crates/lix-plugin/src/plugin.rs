use lix_types::{EntityId, FileId, SchemaKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PluginError, PluginResult};

/// A file as plugins see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub id: FileId,
    pub path: String,
    pub data: Vec<u8>,
}

/// A structured change a plugin found.
///
/// `snapshot_content` of `None` means the entity was removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedChange {
    pub entity_id: EntityId,
    pub schema_key: SchemaKey,
    pub snapshot_content: Option<Value>,
}

impl DetectedChange {
    pub fn is_removal(&self) -> bool {
        self.snapshot_content.is_none()
    }
}

/// Change detection for one file type.
///
/// Plugins are looked up by key and routed files by glob. Every change a
/// plugin emits is validated against its declared schemas before it is
/// stored.
pub trait Plugin: Send + Sync {
    /// Unique key, stored as the `plugin_key` of every change it produces.
    fn key(&self) -> &str;

    /// Glob of the file paths this plugin owns, e.g. `*.json`.
    fn glob(&self) -> &str;

    /// Schema documents of the entity types this plugin emits.
    fn schema_documents(&self) -> Vec<Value>;

    /// Interpret a file and emit the changes between `before` and `after`.
    /// `before` is `None` for a new file.
    fn detect_changes(
        &self,
        before: Option<&FileData>,
        after: &FileData,
    ) -> PluginResult<Vec<DetectedChange>>;

    /// Diff two values of one entity. Returning nothing means no change.
    fn diff(
        &self,
        schema_key: &str,
        _before: Option<&Value>,
        _after: Option<&Value>,
    ) -> PluginResult<Vec<DetectedChange>> {
        Err(PluginError::MissingDiff {
            plugin: self.key().to_string(),
            schema_key: schema_key.to_string(),
        })
    }
}
