use thiserror::Error;

/// Errors from the function provider.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeterministicError {
    /// A stored mode value could not be interpreted.
    #[error("invalid deterministic mode value: {0}")]
    InvalidMode(String),
}

/// Result alias for provider operations.
pub type DeterministicResult<T> = Result<T, DeterministicError>;
