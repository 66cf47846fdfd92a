use lix_protocol::ProtocolError;
use lix_sdk::LixError;
use lix_types::LixId;
use thiserror::Error;

/// The hosting boundary could not serve a call.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The environment was closed; its host is gone.
    #[error("environment is closed")]
    Closed,

    #[error("no database is open in this environment")]
    NotOpen,

    #[error("a database is already open in this environment")]
    AlreadyOpen,

    #[error(transparent)]
    Lix(#[from] LixError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type EnvironmentResult<T> = Result<T, EnvironmentError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The remote already stores a database with this id.
    #[error("remote already has lix {0}")]
    AlreadyExists(LixId),

    #[error("remote has no lix {0}")]
    NotFound(LixId),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
