use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, FileId, SchemaKey, VersionId};

/// Names one entity independent of version: `(entity_id, schema_key, file_id)`.
///
/// Ordering is schema first so that iteration over a `BTreeMap<EntityKey, _>`
/// groups entities of the same schema together.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub schema_key: SchemaKey,
    pub file_id: FileId,
    pub entity_id: EntityId,
}

impl EntityKey {
    pub fn new(
        entity_id: impl Into<EntityId>,
        schema_key: impl Into<SchemaKey>,
        file_id: impl Into<FileId>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            schema_key: schema_key.into(),
            file_id: file_id.into(),
        }
    }

    /// Pin this key to a version.
    pub fn in_version(&self, version_id: &VersionId) -> StateKey {
        StateKey {
            key: self.clone(),
            version_id: version_id.clone(),
        }
    }
}

impl PartialOrd for EntityKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.schema_key
            .cmp(&other.schema_key)
            .then_with(|| self.file_id.cmp(&other.file_id))
            .then_with(|| self.entity_id.cmp(&other.entity_id))
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityKey({}/{}/{})",
            self.schema_key, self.file_id, self.entity_id
        )
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.schema_key, self.file_id, self.entity_id)
    }
}

/// An [`EntityKey`] pinned to a version. This is the staging and cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub version_id: VersionId,
    pub key: EntityKey,
}

impl StateKey {
    pub fn new(key: EntityKey, version_id: VersionId) -> Self {
        Self { version_id, key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_groups_by_schema() {
        let a = EntityKey::new("z", "a_schema", "f");
        let b = EntityKey::new("a", "b_schema", "f");
        assert!(a < b);
    }

    #[test]
    fn state_key_orders_by_version_first() {
        let key = EntityKey::new("e", "s", "f");
        let a = key.in_version(&VersionId::new("a"));
        let b = key.in_version(&VersionId::new("b"));
        assert!(a < b);
    }

    #[test]
    fn display_format() {
        let key = EntityKey::new("n1", "note", "lix");
        assert_eq!(key.to_string(), "note:lix:n1");
    }
}
