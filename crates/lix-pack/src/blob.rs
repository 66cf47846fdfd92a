//! Whole-database blob encoding.
//!
//! Layout:
//!
//! ```text
//! "LIXB" | version: u32 BE | varint id_len | lix_id (UTF-8)
//!        | varint uncompressed_len | varint compressed_len
//!        | zstd(JSON payload) | crc32(compressed): u32 BE
//!        | BLAKE3 trailer (32 bytes) over everything before it
//! ```
//!
//! The lix id sits uncompressed in the header so a server can identify a
//! blob without decoding the payload.

use lix_crypto::ContentHasher;
use lix_types::{LixId, SnapshotId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::varint::{decode_varint, encode_varint};

pub const MAGIC: &[u8; 4] = b"LIXB";
pub const FORMAT_VERSION: u32 = 1;

const TRAILER_LEN: usize = 32;
const CRC_LEN: usize = 4;
const ZSTD_LEVEL: i32 = 3;

/// The uncompressed front of a blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobHeader {
    pub format_version: u32,
    pub lix_id: LixId,
    /// Offset of the payload's size fields.
    payload_offset: usize,
}

/// Encode `payload` as a blob for database `lix_id`.
pub fn encode_blob<T: Serialize>(lix_id: &LixId, payload: &T) -> PackResult<Vec<u8>> {
    let json = serde_json::to_vec(payload).map_err(|e| PackError::Serialization(e.to_string()))?;
    let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
        .map_err(|e| PackError::CompressionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(compressed.len() + 64);
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    encode_varint(&mut blob, lix_id.as_str().len() as u64);
    blob.extend_from_slice(lix_id.as_str().as_bytes());
    encode_varint(&mut blob, json.len() as u64);
    encode_varint(&mut blob, compressed.len() as u64);
    blob.extend_from_slice(&compressed);
    blob.extend_from_slice(&crc32fast::hash(&compressed).to_be_bytes());

    let checksum = ContentHasher::BLOB.hash(&blob);
    blob.extend_from_slice(checksum.as_bytes());

    debug!(lix_id = %lix_id, raw = json.len(), compressed = compressed.len(), "encoded blob");
    Ok(blob)
}

/// Read the header without checking the payload.
pub fn read_header(blob: &[u8]) -> PackResult<BlobHeader> {
    if blob.len() < 8 + TRAILER_LEN {
        return Err(PackError::Corrupt {
            offset: 0,
            reason: "blob too short".into(),
        });
    }
    if &blob[0..4] != MAGIC {
        return Err(PackError::InvalidMagic {
            expected: String::from_utf8_lossy(MAGIC).into(),
            actual: String::from_utf8_lossy(&blob[0..4]).into(),
        });
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&blob[4..8]);
    let format_version = u32::from_be_bytes(version);
    if format_version != FORMAT_VERSION {
        return Err(PackError::UnsupportedVersion(format_version));
    }

    let mut pos = 8;
    let (id_len, consumed) = decode_varint(blob, pos)?;
    pos += consumed;
    let end = pos
        .checked_add(id_len as usize)
        .filter(|end| *end <= blob.len())
        .ok_or_else(|| PackError::Corrupt {
            offset: pos,
            reason: "lix id extends beyond blob".into(),
        })?;
    let lix_id = std::str::from_utf8(&blob[pos..end]).map_err(|e| PackError::Corrupt {
        offset: pos,
        reason: format!("lix id is not UTF-8: {e}"),
    })?;

    Ok(BlobHeader {
        format_version,
        lix_id: LixId::new(lix_id),
        payload_offset: end,
    })
}

/// Check the BLAKE3 trailer.
pub fn verify_blob(blob: &[u8]) -> PackResult<()> {
    if blob.len() < TRAILER_LEN {
        return Err(PackError::Corrupt {
            offset: 0,
            reason: "blob too short".into(),
        });
    }
    let (body, trailer) = blob.split_at(blob.len() - TRAILER_LEN);
    let mut expected = [0u8; 32];
    expected.copy_from_slice(trailer);
    if ContentHasher::BLOB.verify(body, &SnapshotId::from_hash(expected)) {
        Ok(())
    } else {
        Err(PackError::ChecksumMismatch)
    }
}

/// Verify and decode a blob.
pub fn decode_blob<T: DeserializeOwned>(blob: &[u8]) -> PackResult<(BlobHeader, T)> {
    let header = read_header(blob)?;
    verify_blob(blob)?;

    let mut pos = header.payload_offset;
    let (raw_len, consumed) = decode_varint(blob, pos)?;
    pos += consumed;
    let (compressed_len, consumed) = decode_varint(blob, pos)?;
    pos += consumed;

    let body_end = blob.len() - TRAILER_LEN;
    let end = pos
        .checked_add(compressed_len as usize)
        .filter(|end| end + CRC_LEN == body_end)
        .ok_or_else(|| PackError::Corrupt {
            offset: pos,
            reason: "payload length does not match blob size".into(),
        })?;
    let compressed = &blob[pos..end];

    let mut crc = [0u8; 4];
    crc.copy_from_slice(&blob[end..end + CRC_LEN]);
    if crc32fast::hash(compressed) != u32::from_be_bytes(crc) {
        return Err(PackError::CrcMismatch);
    }

    let json =
        zstd::decode_all(compressed).map_err(|e| PackError::DecompressionFailed(e.to_string()))?;
    if json.len() as u64 != raw_len {
        return Err(PackError::Corrupt {
            offset: pos,
            reason: format!("size mismatch: expected {raw_len}, got {}", json.len()),
        });
    }
    let payload =
        serde_json::from_slice(&json).map_err(|e| PackError::Serialization(e.to_string()))?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample() -> Value {
        json!({ "changes": [{ "id": "c1", "text": "draft" }], "versions": ["main"] })
    }

    #[test]
    fn header_is_readable_without_payload() {
        let blob = encode_blob(&LixId::new("lix-1"), &sample()).unwrap();
        let header = read_header(&blob).unwrap();
        assert_eq!(header.lix_id, LixId::new("lix-1"));
        assert_eq!(header.format_version, FORMAT_VERSION);
    }

    #[test]
    fn decodes_what_was_encoded() {
        let blob = encode_blob(&LixId::new("lix-1"), &sample()).unwrap();
        let (_, payload): (_, Value) = decode_blob(&blob).unwrap();
        assert_eq!(payload, sample());
    }

    #[test]
    fn large_payload_compresses() {
        let payload = json!({ "data": "a".repeat(100_000) });
        let blob = encode_blob(&LixId::new("x"), &payload).unwrap();
        assert!(blob.len() < 100_000);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut blob = encode_blob(&LixId::new("lix-1"), &sample()).unwrap();
        let middle = blob.len() / 2;
        blob[middle] ^= 0xFF;
        assert!(matches!(
            decode_blob::<Value>(&blob),
            Err(PackError::ChecksumMismatch)
        ));
    }

    #[test]
    fn bad_magic_and_version() {
        let mut blob = encode_blob(&LixId::new("lix-1"), &sample()).unwrap();
        blob[4..8].copy_from_slice(&99u32.to_be_bytes());
        assert!(matches!(read_header(&blob), Err(PackError::UnsupportedVersion(99))));

        blob[0..4].copy_from_slice(b"NOPE");
        assert!(matches!(read_header(&blob), Err(PackError::InvalidMagic { .. })));
    }

    #[test]
    fn short_input_is_corrupt() {
        assert!(matches!(read_header(&[1, 2, 3]), Err(PackError::Corrupt { .. })));
    }
}
