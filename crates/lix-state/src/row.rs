use lix_types::{ChangeId, CommitId, EntityKey, Timestamp, VersionId};
use serde_json::{Map, Value};

/// A version's own committed value for one entity.
///
/// `content == None` is a tombstone: the entity was deleted locally and
/// inherited values must not show through.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalEntry {
    pub key: EntityKey,
    pub change_id: ChangeId,
    pub commit_id: CommitId,
    pub plugin_key: String,
    pub schema_version: String,
    pub content: Option<Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One visible entity row as seen from a version.
#[derive(Clone, Debug, PartialEq)]
pub struct StateRow {
    pub key: EntityKey,
    /// The version the row is visible in.
    pub version_id: VersionId,
    pub plugin_key: String,
    pub schema_version: String,
    pub snapshot_content: Value,
    pub change_id: ChangeId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set when the value comes from an inherited version.
    pub inherited_from_version_id: Option<VersionId>,
    /// `None` for staged and untracked rows.
    pub commit_id: Option<CommitId>,
    pub untracked: bool,
}

impl StateRow {
    /// Column map in the shape of the `state_all` view.
    pub fn to_columns(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("entity_id".into(), Value::String(self.key.entity_id.to_string()));
        row.insert("schema_key".into(), Value::String(self.key.schema_key.to_string()));
        row.insert("file_id".into(), Value::String(self.key.file_id.to_string()));
        row.insert("version_id".into(), Value::String(self.version_id.to_string()));
        row.insert("plugin_key".into(), Value::String(self.plugin_key.clone()));
        row.insert("schema_version".into(), Value::String(self.schema_version.clone()));
        row.insert("snapshot_content".into(), self.snapshot_content.clone());
        row.insert("change_id".into(), Value::String(self.change_id.to_string()));
        row.insert("created_at".into(), Value::String(self.created_at.to_iso()));
        row.insert("updated_at".into(), Value::String(self.updated_at.to_iso()));
        row.insert(
            "inherited_from_version_id".into(),
            self.inherited_from_version_id
                .as_ref()
                .map_or(Value::Null, |v| Value::String(v.to_string())),
        );
        row.insert(
            "commit_id".into(),
            self.commit_id
                .as_ref()
                .map_or(Value::Null, |c| Value::String(c.to_string())),
        );
        row.insert("untracked".into(), Value::Bool(self.untracked));
        row
    }
}

/// Column names of [`StateRow::to_columns`], in order.
pub const STATE_COLUMNS: &[&str] = &[
    "entity_id",
    "schema_key",
    "file_id",
    "version_id",
    "plugin_key",
    "schema_version",
    "snapshot_content",
    "change_id",
    "created_at",
    "updated_at",
    "inherited_from_version_id",
    "commit_id",
    "untracked",
];
