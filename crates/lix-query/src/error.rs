use std::fmt;

/// Errors from tokenizing, parsing, rewriting or evaluating a statement.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The statement text could not be tokenized.
    #[error("syntax error at offset {offset}: {message}")]
    Tokenize { offset: usize, message: String },

    /// The token stream is not a supported statement.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("no such table: {0}")]
    UnknownTable(String),

    #[error("no such column: {0}")]
    UnknownColumn(String),

    /// A placeholder refers past the end of the bound parameters.
    #[error("missing parameter {index} ({bound} bound)")]
    MissingParameter { index: usize, bound: usize },

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A rewrite stage failed.
    #[error("rewrite error in '{stage}': {message}")]
    Rewrite { stage: String, message: String },
}

impl QueryError {
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    pub fn rewrite(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rewrite {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
