use lix_types::{ChangeId, ChangeSetId, EntityId, EntityKey, FileId, SchemaKey};
use serde::{Deserialize, Serialize};

/// A named grouping of changes belonging to a commit, a version's working
/// set, a proposal, or a checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: ChangeSetId,
    pub name: Option<String>,
}

/// Membership of one change in a change set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetElement {
    pub change_set_id: ChangeSetId,
    pub change_id: ChangeId,
    pub entity_id: EntityId,
    pub schema_key: SchemaKey,
    pub file_id: FileId,
}

impl ChangeSetElement {
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            entity_id: self.entity_id.clone(),
            schema_key: self.schema_key.clone(),
            file_id: self.file_id.clone(),
        }
    }
}
