//! Where the server keeps database blobs.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use lix_types::LixId;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::ServerResult;

/// Blob storage keyed by lix id. A stored blob is never replaced.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `blob` unless `lix_id` is taken. Returns whether it was stored.
    async fn insert(&self, lix_id: &LixId, blob: Bytes) -> ServerResult<bool>;

    async fn get(&self, lix_id: &LixId) -> ServerResult<Option<Bytes>>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<LixId, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn insert(&self, lix_id: &LixId, blob: Bytes) -> ServerResult<bool> {
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(lix_id) {
            return Ok(false);
        }
        blobs.insert(lix_id.clone(), blob);
        Ok(true)
    }

    async fn get(&self, lix_id: &LixId) -> ServerResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(lix_id).cloned())
    }
}

/// One file per blob under a directory, named by the hex of the lix id.
pub struct DirBlobStore {
    root: PathBuf,
    /// Serialises inserts so two uploads of one id cannot both win.
    writes: Mutex<()>,
}

impl DirBlobStore {
    pub async fn open(root: impl Into<PathBuf>) -> ServerResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            writes: Mutex::new(()),
        })
    }

    fn path(&self, lix_id: &LixId) -> PathBuf {
        self.root.join(format!("{}.lix", hex::encode(lix_id.as_str())))
    }
}

#[async_trait]
impl BlobStore for DirBlobStore {
    async fn insert(&self, lix_id: &LixId, blob: Bytes) -> ServerResult<bool> {
        let _guard = self.writes.lock().await;
        let path = self.path(lix_id);
        if tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, &blob).await?;
        tokio::fs::rename(&partial, &path).await?;
        debug!(lix_id = %lix_id, path = %path.display(), "wrote blob");
        Ok(true)
    }

    async fn get(&self, lix_id: &LixId) -> ServerResult<Option<Bytes>> {
        match tokio::fs::read(self.path(lix_id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
