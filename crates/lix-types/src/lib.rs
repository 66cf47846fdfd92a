//! Foundation types for the Lix change-control engine.
//!
//! This crate provides the identifier, key, and temporal types shared by
//! every other Lix crate.
//!
//! # Key Types
//!
//! - [`SnapshotId`]: Content-addressed identifier of a snapshot (BLAKE3 hash);
//!   the all-zero id is the reserved "no-content" tombstone
//! - [`EntityKey`]: `(entity_id, schema_key, file_id)` triple naming one entity
//! - [`Timestamp`]: Millisecond timestamp rendered as ISO 8601
//! - [`ChangeId`], [`CommitId`], [`VersionId`], ...: String record identifiers

pub mod error;
pub mod ids;
pub mod key;
pub mod snapshot_id;
pub mod timestamp;

pub use error::TypeError;
pub use ids::{
    AccountId, ChangeId, ChangeProposalId, ChangeSetId, CommitId, ConflictId, EntityId, FileId,
    LabelId, LixId, SchemaKey, VersionId,
};
pub use key::{EntityKey, StateKey};
pub use snapshot_id::SnapshotId;
pub use timestamp::Timestamp;

/// File id used for entities that do not belong to a file.
pub const NO_FILE_ID: &str = "lix";

/// Plugin key recorded for changes written directly through entity views.
pub const OWN_PLUGIN_KEY: &str = "lix_own_entity";
