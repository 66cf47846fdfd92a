use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Textual form of the tombstone snapshot id.
pub const NO_CONTENT: &str = "no-content";

/// Content-addressed identifier of a snapshot.
///
/// A `SnapshotId` is the BLAKE3 hash of a snapshot's canonical content.
/// Structurally identical content always produces the same id, so snapshots
/// deduplicate across changes, versions, and databases.
///
/// The all-zero id is reserved for the "no-content" snapshot that marks a
/// deletion. It is rendered as `"no-content"` rather than as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId([u8; 32]);

impl SnapshotId {
    /// Compute a `SnapshotId` from raw bytes (no domain separation).
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a `SnapshotId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The tombstone id denoting deletion.
    pub const fn no_content() -> Self {
        Self([0u8; 32])
    }

    /// Returns `true` if this is the tombstone id.
    pub fn is_no_content(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string, or `"no-content"` for the tombstone.
    pub fn to_hex(&self) -> String {
        if self.is_no_content() {
            NO_CONTENT.to_string()
        } else {
            hex::encode(self.0)
        }
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        if self.is_no_content() {
            NO_CONTENT.to_string()
        } else {
            hex::encode(&self.0[..4])
        }
    }

    /// Parse from a hex string or the `"no-content"` marker.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s == NO_CONTENT {
            return Ok(Self::no_content());
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.short_hex())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for SnapshotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl From<[u8; 32]> for SnapshotId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let id1 = SnapshotId::from_bytes(b"hello world");
        let id2 = SnapshotId::from_bytes(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_data_produces_different_ids() {
        assert_ne!(SnapshotId::from_bytes(b"hello"), SnapshotId::from_bytes(b"world"));
    }

    #[test]
    fn no_content_renders_as_marker() {
        let tomb = SnapshotId::no_content();
        assert!(tomb.is_no_content());
        assert_eq!(tomb.to_hex(), "no-content");
        assert_eq!(SnapshotId::from_hex("no-content").unwrap(), tomb);
    }

    #[test]
    fn hex_roundtrip() {
        let id = SnapshotId::from_bytes(b"test");
        assert_eq!(SnapshotId::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(id.short_hex().len(), 8);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = SnapshotId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn serde_uses_text_form() {
        let id = SnapshotId::from_bytes(b"serde test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let parsed: SnapshotId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        let tomb: SnapshotId = serde_json::from_str("\"no-content\"").unwrap();
        assert!(tomb.is_no_content());
    }

    proptest::proptest! {
        #[test]
        fn only_full_hashes_parse(s in "[0-9a-f]{0,80}") {
            let parsed = SnapshotId::from_hex(&s);
            proptest::prop_assert_eq!(parsed.is_ok(), s.len() == 64);
            match parsed {
                Ok(id) if !id.is_no_content() => proptest::prop_assert_eq!(id.to_hex(), s),
                _ => {}
            }
        }
    }
}
