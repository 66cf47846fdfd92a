use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid blob magic: expected {expected}, got {actual}")]
    InvalidMagic { expected: String, actual: String },

    #[error("unsupported blob format version: {0}")]
    UnsupportedVersion(u32),

    /// The BLAKE3 trailer does not match the blob.
    #[error("blob checksum mismatch")]
    ChecksumMismatch,

    #[error("CRC32 mismatch in blob payload")]
    CrcMismatch,

    #[error("corrupt blob at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type PackResult<T> = Result<T, PackError>;
