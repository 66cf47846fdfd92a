//! An environment whose engine runs on its own task.
//!
//! Every call becomes a message to the actor and a reply on a oneshot
//! channel. The mailbox is FIFO, so one caller's calls run in order.

use async_trait::async_trait;
use lix_sdk::OpenOptions;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::call::Call;
use crate::environment::Environment;
use crate::error::{EnvironmentError, EnvironmentResult};
use crate::host::{Host, HostConfig};

/// Messages queued before the sender waits.
const MAILBOX_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<EnvironmentResult<T>>;

enum Command {
    Open(OpenOptions, Reply<()>),
    Create(Vec<u8>, Reply<()>),
    Exists(Reply<bool>),
    Export(Reply<Vec<u8>>),
    /// Close the database and stop the actor.
    Close(Reply<()>),
    Call(Call, Reply<Value>),
}

/// Handle to an engine running on a spawned task.
///
/// After [`Environment::close`] the actor is gone and every further call
/// fails with [`EnvironmentError::Closed`].
pub struct ActorEnvironment {
    mailbox: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl ActorEnvironment {
    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(config: HostConfig) -> Self {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(run(Host::new(config), inbox));
        Self { mailbox, task }
    }

    /// Whether the actor task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> EnvironmentResult<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(command(reply))
            .await
            .map_err(|_| EnvironmentError::Closed)?;
        response.await.map_err(|_| EnvironmentError::Closed)?
    }
}

async fn run(mut host: Host, mut inbox: mpsc::Receiver<Command>) {
    debug!("environment actor started");
    while let Some(command) = inbox.recv().await {
        // A caller that stopped waiting drops its receiver; the reply is
        // discarded.
        match command {
            Command::Open(options, reply) => {
                let _ = reply.send(host.open(options));
            }
            Command::Create(blob, reply) => {
                let _ = reply.send(host.create(blob));
            }
            Command::Exists(reply) => {
                let _ = reply.send(Ok(host.exists()));
            }
            Command::Export(reply) => {
                let _ = reply.send(host.export());
            }
            Command::Call(call, reply) => {
                let _ = reply.send(host.call(call));
            }
            Command::Close(reply) => {
                let _ = reply.send(host.close());
                break;
            }
        }
    }
    info!("environment actor stopped");
}

#[async_trait]
impl Environment for ActorEnvironment {
    async fn open(&self, options: OpenOptions) -> EnvironmentResult<()> {
        self.request(|reply| Command::Open(options, reply)).await
    }

    async fn create(&self, blob: Vec<u8>) -> EnvironmentResult<()> {
        self.request(|reply| Command::Create(blob, reply)).await
    }

    async fn exists(&self) -> EnvironmentResult<bool> {
        self.request(Command::Exists).await
    }

    async fn export(&self) -> EnvironmentResult<Vec<u8>> {
        self.request(Command::Export).await
    }

    async fn close(&self) -> EnvironmentResult<()> {
        self.request(Command::Close).await
    }

    async fn call(&self, call: Call) -> EnvironmentResult<Value> {
        self.request(|reply| Command::Call(call, reply)).await
    }
}
