use lix_types::SnapshotId;
use serde_json::Value;

use crate::canonical::canonical_bytes;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every hash computation, so snapshot content
/// and, say, a blob trailer with identical bytes never share an id.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for entity snapshot content.
    pub const SNAPSHOT: Self = Self {
        domain: "lix-snapshot-v1",
    };
    /// Hasher for whole-database blobs.
    pub const BLOB: Self = Self {
        domain: "lix-blob-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> SnapshotId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        let id = SnapshotId::from_hash(*hasher.finalize().as_bytes());
        // The all-zero id is reserved for the tombstone.
        if id.is_no_content() {
            return SnapshotId::from_bytes(data);
        }
        id
    }

    /// Hash a JSON value by its canonical encoding.
    pub fn hash_json(&self, value: &Value) -> SnapshotId {
        self.hash(&canonical_bytes(value))
    }

    /// Hash any serialisable value by first converting it to JSON.
    pub fn hash_serialize<T: serde::Serialize>(&self, value: &T) -> Result<SnapshotId, HasherError> {
        let json =
            serde_json::to_value(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash_json(&json))
    }

    /// Verify that data produces the expected id.
    pub fn verify(&self, data: &[u8], expected: &SnapshotId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn structurally_equal_content_shares_an_id() {
        let a = json!({"id": "n1", "text": "draft"});
        let b = json!({"text": "draft", "id": "n1"});
        assert_eq!(ContentHasher::SNAPSHOT.hash_json(&a), ContentHasher::SNAPSHOT.hash_json(&b));
    }

    #[test]
    fn different_content_differs() {
        let a = json!({"id": "n1", "text": "draft"});
        let b = json!({"id": "n1", "text": "final"});
        assert_ne!(ContentHasher::SNAPSHOT.hash_json(&a), ContentHasher::SNAPSHOT.hash_json(&b));
    }

    #[test]
    fn domains_separate() {
        assert_ne!(ContentHasher::SNAPSHOT.hash(b"x"), ContentHasher::BLOB.hash(b"x"));
    }

    #[test]
    fn never_produces_tombstone() {
        assert!(!ContentHasher::SNAPSHOT.hash(b"").is_no_content());
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &id));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &id));
    }

    proptest! {
        #[test]
        fn key_insertion_order_never_matters(pairs in proptest::collection::btree_map("[a-z]{1,6}", 0i64..1000, 0..8)) {
            let mut forward = serde_json::Map::new();
            for (k, v) in pairs.iter() {
                forward.insert(k.clone(), json!(v));
            }
            let mut backward = serde_json::Map::new();
            for (k, v) in pairs.iter().rev() {
                backward.insert(k.clone(), json!(v));
            }
            prop_assert_eq!(
                ContentHasher::SNAPSHOT.hash_json(&Value::Object(forward)),
                ContentHasher::SNAPSHOT.hash_json(&Value::Object(backward))
            );
        }
    }
}
