//! Plugin contract for lix.
//!
//! A plugin owns the files matching its glob. When such a file is written
//! the engine hands the plugin the old and new content, and the plugin
//! answers with the structured entity changes it finds. Those changes go
//! through the same schema validation as any other write.
//!
//! # Key Types
//!
//! - [`Plugin`] -- the contract a file-type plugin implements
//! - [`PluginRegistry`] -- plugins by key, routed by glob
//! - [`JsonPlugin`] -- built-in plugin that tracks top-level JSON properties

pub mod error;
pub mod json;
pub mod plugin;
pub mod registry;

pub use error::{PluginError, PluginResult};
pub use json::{diff_properties, render_properties, JsonPlugin, PropertyChange};
pub use plugin::{DetectedChange, FileData, Plugin};
pub use registry::PluginRegistry;
