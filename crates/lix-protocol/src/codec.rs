use bytes::Bytes;
use lix_pack::read_header;
use lix_types::LixId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::MAX_BLOB_SIZE;

/// Encoding of request and response bodies.
pub struct SyncCodec;

impl SyncCodec {
    pub fn encode_json<T: Serialize>(body: &T) -> ProtocolResult<Bytes> {
        serde_json::to_vec(body)
            .map(Bytes::from)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> ProtocolResult<T> {
        serde_json::from_slice(body).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Check a blob's size and read the lix id from its header.
    pub fn identify_blob(blob: &[u8], max: usize) -> ProtocolResult<LixId> {
        if blob.len() > max {
            return Err(ProtocolError::BodyTooLarge {
                size: blob.len(),
                max,
            });
        }
        let header = read_header(blob)?;
        debug!(lix_id = %header.lix_id, bytes = blob.len(), "identified blob");
        Ok(header.lix_id)
    }

    /// [`identify_blob`](Self::identify_blob) with the protocol's size limit.
    pub fn identify(blob: &[u8]) -> ProtocolResult<LixId> {
        Self::identify_blob(blob, MAX_BLOB_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{GetRequest, NewResponse};
    use lix_pack::encode_blob;
    use serde_json::json;

    #[test]
    fn bodies_use_wire_field_names() {
        let body = SyncCodec::encode_json(&GetRequest {
            lix_id: LixId::new("abc"),
        })
        .unwrap();
        assert_eq!(&body[..], br#"{"lix_id":"abc"}"#);

        let response: NewResponse = SyncCodec::decode_json(br#"{"id":"abc"}"#).unwrap();
        assert_eq!(response.id, LixId::new("abc"));
    }

    #[test]
    fn identifies_blobs() {
        let blob = encode_blob(&LixId::new("lix-9"), &json!({})).unwrap();
        assert_eq!(SyncCodec::identify(&blob).unwrap(), LixId::new("lix-9"));
        assert!(matches!(
            SyncCodec::identify_blob(&blob, 4),
            Err(ProtocolError::BodyTooLarge { .. })
        ));
        assert!(matches!(
            SyncCodec::identify(b"not a blob at all, definitely not a database"),
            Err(ProtocolError::InvalidBlob(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            SyncCodec::decode_json::<GetRequest>(b"{"),
            Err(ProtocolError::Deserialization(_))
        ));
    }
}
