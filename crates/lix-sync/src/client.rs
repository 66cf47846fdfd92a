//! Push and pull whole databases between an environment and a remote.

use std::sync::Arc;

use bytes::Bytes;
use lix_protocol::SyncCodec;
use lix_sdk::{DatabaseMergeOutcome, OpenOptions};
use lix_types::LixId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::call::{from_reply, Call};
use crate::environment::Environment;
use crate::error::{EnvironmentError, SyncError, SyncResult};
use crate::transport::SyncTransport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    Created { lix_id: LixId },
    /// The remote kept its copy; nothing was uploaded.
    AlreadyExists { lix_id: LixId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullOutcome {
    /// No database was open; the remote copy was opened as is.
    Created { lix_id: LixId },
    /// The remote copy was merged into the open database.
    Merged {
        lix_id: LixId,
        outcome: DatabaseMergeOutcome,
    },
}

/// Moves database blobs between an [`Environment`] and a [`SyncTransport`].
pub struct SyncClient {
    transport: Arc<dyn SyncTransport>,
}

impl SyncClient {
    pub fn new(transport: Arc<dyn SyncTransport>) -> Self {
        Self { transport }
    }

    /// Upload the open database.
    pub async fn push(&self, env: &dyn Environment) -> SyncResult<PushOutcome> {
        let blob = Bytes::from(env.export().await?);
        let lix_id = SyncCodec::identify(&blob)?;
        match self.transport.new_blob(blob).await {
            Ok(stored) => {
                info!(lix_id = %stored, "pushed database");
                Ok(PushOutcome::Created { lix_id: stored })
            }
            Err(SyncError::AlreadyExists(_)) => {
                info!(lix_id = %lix_id, "remote already has database");
                Ok(PushOutcome::AlreadyExists { lix_id })
            }
            Err(err) => Err(err),
        }
    }

    /// Download `lix_id` and merge it into the open database, or open it
    /// when the environment has none.
    pub async fn pull(&self, env: &dyn Environment, lix_id: &LixId) -> SyncResult<PullOutcome> {
        let blob = self
            .transport
            .get_blob(lix_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(lix_id.clone()))?;

        if !env.exists().await? {
            env.create(blob.to_vec()).await?;
            info!(lix_id = %lix_id, "pulled new database");
            return Ok(PullOutcome::Created {
                lix_id: lix_id.clone(),
            });
        }

        // A file-backed environment may exist on disk without being open.
        let call = Call::MergeDatabase {
            blob: blob.to_vec(),
        };
        let reply = match env.call(call.clone()).await {
            Err(EnvironmentError::NotOpen) => {
                env.open(OpenOptions::new()).await?;
                env.call(call).await?
            }
            reply => reply?,
        };
        let outcome: DatabaseMergeOutcome = from_reply(reply)?;
        info!(
            lix_id = %lix_id,
            changes = outcome.imported_changes,
            commits = outcome.imported_commits,
            "pulled and merged database"
        );
        Ok(PullOutcome::Merged {
            lix_id: lix_id.clone(),
            outcome,
        })
    }
}
