use async_trait::async_trait;
use lix_sdk::OpenOptions;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::call::Call;
use crate::error::EnvironmentResult;
use crate::host::{Host, HostConfig};

/// Where an engine runs.
///
/// Callers see the same contract whether the database lives in their own
/// task or behind an actor. Calls from one caller are served in the order
/// they were made.
#[async_trait]
pub trait Environment: Send + Sync {
    async fn open(&self, options: OpenOptions) -> EnvironmentResult<()>;

    /// Open the database stored in `blob`.
    async fn create(&self, blob: Vec<u8>) -> EnvironmentResult<()>;

    async fn exists(&self) -> EnvironmentResult<bool>;

    async fn export(&self) -> EnvironmentResult<Vec<u8>>;

    async fn close(&self) -> EnvironmentResult<()>;

    async fn call(&self, call: Call) -> EnvironmentResult<Value>;
}

/// Runs the engine on the caller's task, one call at a time.
pub struct InProcessEnvironment {
    host: Mutex<Host>,
}

impl InProcessEnvironment {
    pub fn new(config: HostConfig) -> Self {
        Self {
            host: Mutex::new(Host::new(config)),
        }
    }
}

impl Default for InProcessEnvironment {
    fn default() -> Self {
        Self::new(HostConfig::in_memory())
    }
}

#[async_trait]
impl Environment for InProcessEnvironment {
    async fn open(&self, options: OpenOptions) -> EnvironmentResult<()> {
        self.host.lock().await.open(options)
    }

    async fn create(&self, blob: Vec<u8>) -> EnvironmentResult<()> {
        self.host.lock().await.create(blob)
    }

    async fn exists(&self) -> EnvironmentResult<bool> {
        Ok(self.host.lock().await.exists())
    }

    async fn export(&self) -> EnvironmentResult<Vec<u8>> {
        self.host.lock().await.export()
    }

    async fn close(&self) -> EnvironmentResult<()> {
        self.host.lock().await.close()
    }

    async fn call(&self, call: Call) -> EnvironmentResult<Value> {
        self.host.lock().await.call(call)
    }
}
