use lix_merge::{ConflictError, MergeError};
use lix_schema::{SchemaError, SchemaValidationError};
use lix_store::StoreError;
use lix_types::{EntityId, SchemaKey, VersionId};
use thiserror::Error;

/// A constraint was violated inside a transaction. The whole transaction
/// is rolled back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("{schema_key} entity '{entity_id}' already exists in version {version_id}")]
    UniqueViolation {
        schema_key: SchemaKey,
        entity_id: EntityId,
        version_id: VersionId,
    },

    #[error("{schema_key} entity '{entity_id}' references missing {references} '{referenced_id}'")]
    ForeignKeyViolation {
        schema_key: SchemaKey,
        entity_id: EntityId,
        references: SchemaKey,
        referenced_id: String,
    },

    #[error("{schema_key} content is missing its primary key")]
    MissingPrimaryKey { schema_key: SchemaKey },

    /// The target rejects writes: a read-only entity view or a history table.
    #[error("{0} is read-only")]
    ReadOnly(String),

    #[error("column {column} of {table} cannot be written: {reason}")]
    InvalidColumn {
        table: String,
        column: String,
        reason: String,
    },

    #[error("change proposal {id} is {status}, not open")]
    ProposalNotOpen { id: String, status: String },
}

/// Every error the engine surfaces.
///
/// The first four variants are the failure classes callers are expected
/// to handle; the rest wrap lower layers.
#[derive(Debug, Error)]
pub enum LixError {
    /// Content or a schema object failed validation. Nothing was written.
    #[error(transparent)]
    SchemaValidation(SchemaValidationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A plugin failed or lacks a required diff. Only the write that
    /// depended on it fails.
    #[error(transparent)]
    Plugin(#[from] lix_plugin::PluginError),

    #[error(transparent)]
    Schema(SchemaError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Staging(#[from] lix_index::StagingError),

    #[error(transparent)]
    Dag(#[from] lix_dag::DagError),

    #[error(transparent)]
    Version(#[from] lix_refs::VersionError),

    #[error(transparent)]
    State(#[from] lix_state::StateError),

    #[error(transparent)]
    Query(#[from] lix_query::QueryError),

    #[error(transparent)]
    Merge(MergeError),

    #[error(transparent)]
    Deterministic(#[from] lix_deterministic::DeterministicError),

    #[error("blob error: {0}")]
    Pack(#[from] lix_pack::PackError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl LixError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<SchemaValidationError> for LixError {
    fn from(err: SchemaValidationError) -> Self {
        Self::SchemaValidation(err)
    }
}

impl From<SchemaError> for LixError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation(inner) => Self::SchemaValidation(inner),
            other => Self::Schema(other),
        }
    }
}

impl From<StoreError> for LixError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(inner) => Self::SchemaValidation(inner),
            StoreError::Schema(inner) => inner.into(),
            other => Self::Store(other),
        }
    }
}

impl From<MergeError> for LixError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Conflict(inner) => Self::Conflict(inner),
            other => Self::Merge(other),
        }
    }
}

/// Result alias for engine operations.
pub type LixResult<T> = Result<T, LixError>;
