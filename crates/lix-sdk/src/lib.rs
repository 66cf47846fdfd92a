//! Embedded change-control engine.
//!
//! A [`Lix`] is a database of schema-described entities. Every write is
//! recorded as a change; changes are grouped into commits, and commits form
//! a graph that versions point into. Entities are read and written through
//! SQL against per-schema entity views, or through typed accessors.
//!
//! # Key Types
//!
//! - [`Lix`]: an open database; the entry point
//! - [`Transaction`]: a unit of writes, committed or rolled back as a whole
//! - [`OpenOptions`]: deterministic mode, rewrite toggle, blob to open
//! - [`LixError`]: every failure, with the schema, conflict, transaction
//!   and plugin classes callers usually match on
//!
//! # Quick Start
//!
//! ```no_run
//! use lix_sdk::{Lix, OpenOptions};
//! use serde_json::json;
//!
//! let mut lix = Lix::open(OpenOptions::new())?;
//! lix.register_schema(&json!({
//!     "type": "object",
//!     "x-lix-key": "note",
//!     "x-lix-version": "1.0",
//!     "x-lix-primary-key": ["id"],
//!     "properties": { "id": { "type": "string" }, "text": { "type": "string" } },
//!     "required": ["id"],
//!     "additionalProperties": false
//! }))?;
//! lix.execute("INSERT INTO note (id, text) VALUES (?, ?)", &[json!("n1"), json!("hi")])?;
//! let rows = lix.select("SELECT text FROM note WHERE id = 'n1'", &[])?;
//! assert_eq!(rows.value(0, "text"), Some(&json!("hi")));
//! # Ok::<(), lix_sdk::LixError>(())
//! ```

mod accounts;
mod catalog;
mod database;
pub mod entities;
pub mod error;
mod files;
mod lix;
mod merge;
pub mod options;
mod tables;
mod transaction;
mod versions;

pub use database::{MergeOutcome, DEFAULT_FILE_ID, OWN_ENTITY_PLUGIN};
pub use entities::{
    Account, ActiveAccount, ChangeProposal, ChangeSetLabel, FileRecord, KeyValue, Label,
    ProposalStatus, StoredSchema,
};
pub use error::{LixError, LixResult, TransactionError};
pub use lix::Lix;
pub use merge::DatabaseMergeOutcome;
pub use options::OpenOptions;
pub use transaction::{Transaction, WriteTarget};

// Re-export the types callers handle directly
pub use lix_deterministic::DeterministicConfig;
pub use lix_merge::{ConflictError, ConflictRecord};
pub use lix_plugin::{DetectedChange, FileData, JsonPlugin, Plugin, PluginError};
pub use lix_query::{QueryOutput, ResultSet};
pub use lix_refs::Version;
pub use lix_schema::{LixEntity, RegisterOutcome, SchemaValidationError};
pub use lix_state::CacheStats;
pub use lix_types::{ChangeId, ConflictId, EntityKey, FileId, LixId, VersionId};
