use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use lix_protocol::{SyncCodec, MAX_BLOB_SIZE};
use lix_types::LixId;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// A remote that stores whole database blobs keyed by lix id.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Store a blob. Fails with [`SyncError::AlreadyExists`] when the remote
    /// already has a database with the blob's lix id.
    async fn new_blob(&self, blob: Bytes) -> SyncResult<LixId>;

    /// Fetch the blob stored under `lix_id`, if any.
    async fn get_blob(&self, lix_id: &LixId) -> SyncResult<Option<Bytes>>;
}

/// A remote held in memory, for tests and single-process setups.
pub struct MemoryTransport {
    blobs: RwLock<HashMap<LixId, Bytes>>,
    max_blob_size: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_max_blob_size(MAX_BLOB_SIZE)
    }

    pub fn with_max_blob_size(max_blob_size: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            max_blob_size,
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncTransport for MemoryTransport {
    async fn new_blob(&self, blob: Bytes) -> SyncResult<LixId> {
        let lix_id = SyncCodec::identify_blob(&blob, self.max_blob_size)?;
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(&lix_id) {
            return Err(SyncError::AlreadyExists(lix_id));
        }
        debug!(lix_id = %lix_id, bytes = blob.len(), "stored blob");
        blobs.insert(lix_id.clone(), blob);
        Ok(lix_id)
    }

    async fn get_blob(&self, lix_id: &LixId) -> SyncResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(lix_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lix_protocol::ProtocolError;
    use lix_sdk::{Lix, OpenOptions};

    fn blob() -> (LixId, Bytes) {
        let lix = Lix::open(OpenOptions::new()).unwrap();
        (lix.lix_id().clone(), Bytes::from(lix.export().unwrap()))
    }

    #[tokio::test]
    async fn stores_once_per_lix_id() {
        let remote = MemoryTransport::new();
        let (lix_id, blob) = blob();

        assert_eq!(remote.new_blob(blob.clone()).await.unwrap(), lix_id);
        assert!(matches!(
            remote.new_blob(blob.clone()).await,
            Err(SyncError::AlreadyExists(id)) if id == lix_id
        ));
        assert_eq!(remote.get_blob(&lix_id).await.unwrap(), Some(blob));
        assert_eq!(remote.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_absent() {
        let remote = MemoryTransport::default();
        assert!(remote.get_blob(&LixId::new("nope")).await.unwrap().is_none());
        assert!(remote.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_and_corrupt_blobs_are_rejected() {
        let remote = MemoryTransport::with_max_blob_size(16);
        let (_, blob) = blob();
        assert!(matches!(
            remote.new_blob(blob).await,
            Err(SyncError::Protocol(ProtocolError::BodyTooLarge { .. }))
        ));
        assert!(matches!(
            remote.new_blob(Bytes::from_static(b"garbage")).await,
            Err(SyncError::Protocol(ProtocolError::InvalidBlob(_)))
        ));
    }
}
