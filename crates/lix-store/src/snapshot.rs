use lix_crypto::ContentHasher;
use lix_types::SnapshotId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable content blob keyed by the hash of its canonical form.
///
/// `content == None` is the no-content tombstone that records a deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub content: Option<Value>,
}

impl Snapshot {
    /// Build the snapshot for `content`, computing its id.
    pub fn new(content: Value) -> Self {
        Self {
            id: ContentHasher::SNAPSHOT.hash_json(&content),
            content: Some(content),
        }
    }

    pub fn tombstone() -> Self {
        Self {
            id: SnapshotId::no_content(),
            content: None,
        }
    }

    /// `Some(content)` builds a content snapshot, `None` the tombstone.
    pub fn from_option(content: Option<Value>) -> Self {
        content.map_or_else(Self::tombstone, Self::new)
    }

    pub fn is_tombstone(&self) -> bool {
        self.id.is_no_content()
    }

    /// Recompute the id from the content.
    pub fn compute_id(&self) -> SnapshotId {
        match &self.content {
            Some(content) => ContentHasher::SNAPSHOT.hash_json(content),
            None => SnapshotId::no_content(),
        }
    }
}
