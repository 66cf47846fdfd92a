use lix_types::StateKey;

/// Errors from staging operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StagingError {
    #[error("nothing staged for {0:?}")]
    NotStaged(StateKey),

    /// One key cannot be staged both tracked and untracked in a transaction.
    #[error("row {0:?} is staged as both tracked and untracked")]
    TrackingMismatch(StateKey),
}

/// Result alias for staging operations.
pub type StagingResult<T> = Result<T, StagingError>;
