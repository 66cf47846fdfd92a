use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;
use crate::storage::{BlobStore, DirBlobStore, MemoryBlobStore};

/// Hosts lix databases for whole-database sync.
pub struct LixServer {
    config: ServerConfig,
    store: Arc<dyn BlobStore>,
}

impl LixServer {
    /// Open the storage the config names.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let store: Arc<dyn BlobStore> = match &config.storage_dir {
            Some(dir) => Arc::new(DirBlobStore::open(dir).await?),
            None => Arc::new(MemoryBlobStore::new()),
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn BlobStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            store: Arc::clone(&self.store),
            max_blob_size: self.config.max_blob_size,
        })
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            storage = ?self.config.storage_dir,
            "lix server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_construction() {
        let server = LixServer::new(ServerConfig::default()).await.unwrap();
        assert_eq!(server.config().bind_addr, "127.0.0.1:3000".parse().unwrap());
        let _router = server.router();
    }

    #[tokio::test]
    async fn storage_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            storage_dir: Some(dir.path().join("store")),
            ..ServerConfig::default()
        };
        LixServer::new(config).await.unwrap();
        assert!(dir.path().join("store").is_dir());
    }
}
