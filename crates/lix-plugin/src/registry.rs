use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ignore::overrides::{Override, OverrideBuilder};
use lix_schema::LixSchema;
use tracing::{debug, info};

use crate::error::{PluginError, PluginResult};
use crate::plugin::{DetectedChange, FileData, Plugin};

struct Registered {
    plugin: Arc<dyn Plugin>,
    matcher: Override,
    schemas: Vec<LixSchema>,
}

/// Plugins by key, with their globs compiled once at registration.
///
/// When several globs match a path, the plugin registered first wins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Registered>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> PluginResult<()> {
        let key = plugin.key().to_string();
        if self.get(&key).is_some() {
            return Err(PluginError::Duplicate(key));
        }
        let invalid_glob = |message: String| PluginError::InvalidGlob {
            plugin: key.clone(),
            glob: plugin.glob().to_string(),
            message,
        };
        let mut builder = OverrideBuilder::new("/");
        builder
            .add(plugin.glob())
            .map_err(|e| invalid_glob(e.to_string()))?;
        let matcher = builder.build().map_err(|e| invalid_glob(e.to_string()))?;
        let schemas = plugin
            .schema_documents()
            .iter()
            .map(LixSchema::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        info!(plugin = %key, glob = plugin.glob(), schemas = schemas.len(), "plugin registered");
        self.plugins.push(Registered {
            plugin,
            matcher,
            schemas,
        });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|r| r.plugin.key() == key)
            .map(|r| &r.plugin)
    }

    pub fn require(&self, key: &str) -> PluginResult<&Arc<dyn Plugin>> {
        self.get(key)
            .ok_or_else(|| PluginError::NotFound(key.to_string()))
    }

    /// The plugin owning `path`, if any.
    pub fn for_path(&self, path: &str) -> Option<&Arc<dyn Plugin>> {
        let path = Path::new(path);
        self.plugins
            .iter()
            .find(|r| r.matcher.matched(path, false).is_whitelist())
            .map(|r| &r.plugin)
    }

    /// Schemas every registered plugin declares.
    pub fn schemas(&self) -> impl Iterator<Item = &LixSchema> {
        self.plugins.iter().flat_map(|r| r.schemas.iter())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|r| r.plugin.key())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run the plugin owning `after.path`.
    ///
    /// Returns `None` when no plugin owns the path. Changes for schemas the
    /// plugin did not declare are rejected.
    pub fn detect(
        &self,
        before: Option<&FileData>,
        after: &FileData,
    ) -> PluginResult<Option<(Arc<dyn Plugin>, Vec<DetectedChange>)>> {
        let Some(registered) = self
            .plugins
            .iter()
            .find(|r| r.matcher.matched(Path::new(&after.path), false).is_whitelist())
        else {
            debug!(path = %after.path, "no plugin for file");
            return Ok(None);
        };
        let plugin = &registered.plugin;
        let changes = plugin.detect_changes(before, after)?;

        let declared: BTreeSet<&str> = registered.schemas.iter().map(|s| s.key.as_str()).collect();
        if let Some(stray) = changes
            .iter()
            .find(|c| !declared.contains(c.schema_key.as_str()))
        {
            return Err(PluginError::UndeclaredSchema {
                plugin: plugin.key().to_string(),
                schema_key: stray.schema_key.to_string(),
            });
        }
        info!(
            plugin = plugin.key(),
            path = %after.path,
            changes = changes.len(),
            "detected file changes"
        );
        Ok(Some((Arc::clone(plugin), changes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonPlugin;
    use serde_json::{json, Value};

    struct Markdown;

    impl Plugin for Markdown {
        fn key(&self) -> &str {
            "md"
        }

        fn glob(&self) -> &str {
            "*.md"
        }

        fn schema_documents(&self) -> Vec<Value> {
            Vec::new()
        }

        fn detect_changes(
            &self,
            _before: Option<&FileData>,
            after: &FileData,
        ) -> PluginResult<Vec<DetectedChange>> {
            Ok(vec![DetectedChange {
                entity_id: "para".into(),
                schema_key: "md_paragraph".into(),
                snapshot_content: Some(json!({ "text": String::from_utf8_lossy(&after.data) })),
            }])
        }
    }

    fn file(path: &str, data: &str) -> FileData {
        FileData {
            id: "f1".into(),
            path: path.into(),
            data: data.as_bytes().to_vec(),
        }
    }

    #[test]
    fn routes_by_glob() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(JsonPlugin)).unwrap();
        registry.register(Arc::new(Markdown)).unwrap();

        assert_eq!(registry.for_path("/settings.json").map(|p| p.key()), Some(JsonPlugin::KEY));
        assert_eq!(registry.for_path("/docs/deep/readme.md").map(|p| p.key()), Some("md"));
        assert!(registry.for_path("/image.png").is_none());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(JsonPlugin)).unwrap();
        assert!(matches!(
            registry.register(Arc::new(JsonPlugin)),
            Err(PluginError::Duplicate(_))
        ));
    }

    #[test]
    fn unowned_files_detect_nothing() {
        let registry = PluginRegistry::new();
        assert!(registry.detect(None, &file("/a.txt", "x")).unwrap().is_none());
    }

    #[test]
    fn undeclared_schemas_are_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Markdown)).unwrap();
        assert!(matches!(
            registry.detect(None, &file("/a.md", "hello")),
            Err(PluginError::UndeclaredSchema { .. })
        ));
    }

    #[test]
    fn missing_diff_is_a_contract_error() {
        assert!(matches!(
            Markdown.diff("md_paragraph", None, None),
            Err(PluginError::MissingDiff { .. })
        ));
    }
}
