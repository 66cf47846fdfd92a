use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The body is not a database blob.
    #[error("invalid blob: {0}")]
    InvalidBlob(#[from] lix_pack::PackError),

    #[error("remote error {status}: {message}")]
    Remote { status: u16, message: String },
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
