//! Versions for lix.
//!
//! A version is a movable, named pointer into the commit graph, analogous
//! to a git branch. Each version also owns a working change set that
//! accumulates the changes committed since its last checkpoint, and may
//! inherit entities from a parent version (copy-on-write).
//!
//! Exactly one version is active at a time. Switching the active version
//! only moves the pointer; no entity data is rewritten.
//!
//! # Modules
//!
//! - [`error`]: Error types for version operations
//! - [`version`]: The [`Version`] record
//! - [`store`]: [`VersionStore`] holding all versions and the active pointer
//! - [`names`]: Version name validation

pub mod error;
pub mod names;
pub mod store;
pub mod version;

pub use error::{VersionError, VersionResult};
pub use names::validate_version_name;
pub use store::{VersionImage, VersionStore};
pub use version::{Version, GLOBAL_VERSION_ID, MAIN_VERSION_NAME};
