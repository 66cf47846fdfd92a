//! Transaction staging for lix.
//!
//! Writes made inside a transaction are buffered in a [`Staging`] area keyed
//! by `(entity_id, file_id, schema_key, version_id)`. Each key holds at most
//! one pending row; a later write to the same key replaces the earlier one.
//! On commit the engine drains the area into permanent changes, on rollback
//! it is discarded.

pub mod entry;
pub mod error;
pub mod staging;

pub use entry::StagedRow;
pub use error::{StagingError, StagingResult};
pub use staging::{Staging, StagingSummary};
