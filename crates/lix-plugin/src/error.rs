//! Error types for the plugin contract.

use lix_schema::SchemaError;

/// Errors raised by plugins or while routing files to them.
///
/// A plugin error fails only the write that depended on the plugin.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin already registered: {0}")]
    Duplicate(String),

    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("plugin {plugin} has an invalid glob {glob:?}: {message}")]
    InvalidGlob {
        plugin: String,
        glob: String,
        message: String,
    },

    /// The plugin owns no diff for an entity type it was asked about.
    #[error("plugin {plugin} has no diff for schema {schema_key}")]
    MissingDiff { plugin: String, schema_key: String },

    /// The plugin emitted a change for a schema it did not declare.
    #[error("plugin {plugin} emitted a change for undeclared schema {schema_key}")]
    UndeclaredSchema { plugin: String, schema_key: String },

    /// The plugin could not interpret the file content.
    #[error("plugin {plugin} rejected file {path}: {message}")]
    InvalidContent {
        plugin: String,
        path: String,
        message: String,
    },

    #[error("plugin schema is invalid: {0}")]
    Schema(#[from] SchemaError),
}

/// Convenience alias for plugin results.
pub type PluginResult<T> = Result<T, PluginError>;
