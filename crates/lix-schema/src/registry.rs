use std::collections::BTreeMap;

use lix_types::SchemaKey;
use serde_json::Value;
use tracing::debug;

use crate::definition::LixSchema;
use crate::error::{SchemaError, SchemaResult, SchemaValidationError};
use crate::validate::validate_content;
use crate::view::{EntityViewDef, RESERVED_VIEW_NAMES};

/// Outcome of [`SchemaRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The identical schema was already registered; nothing changed.
    AlreadyRegistered,
}

/// The set of registered schemas, keyed by schema key and version.
///
/// The newest registered version of a key is the one its views expose.
/// Registration is idempotent.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaKey, BTreeMap<String, LixSchema>>,
    latest: BTreeMap<SchemaKey, String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a schema document.
    pub fn register_value(&mut self, value: &Value) -> SchemaResult<RegisterOutcome> {
        self.register(LixSchema::from_value(value)?)
    }

    /// Register a parsed schema.
    pub fn register(&mut self, schema: LixSchema) -> SchemaResult<RegisterOutcome> {
        let key = schema.key.clone();
        let def = EntityViewDef::for_schema(&schema);
        if RESERVED_VIEW_NAMES.contains(&def.view_name.as_str()) {
            return Err(SchemaError::Invalid(SchemaValidationError::new(
                key.as_str(),
                format!("view name '{}' is reserved", def.view_name),
            )));
        }
        if let Some(existing) = self.get_version(key.as_str(), &schema.version) {
            if existing.raw() == schema.raw() {
                return Ok(RegisterOutcome::AlreadyRegistered);
            }
            return Err(SchemaError::Conflict {
                key: key.to_string(),
                version: schema.version.clone(),
            });
        }
        if let Some((other_key, _)) = self.schemas.iter().find(|(k, versions)| {
            **k != key
                && versions
                    .values()
                    .any(|s| EntityViewDef::for_schema(s).view_name == def.view_name)
        }) {
            return Err(SchemaError::Invalid(SchemaValidationError::new(
                key.as_str(),
                format!("view name '{}' is already used by '{other_key}'", def.view_name),
            )));
        }

        debug!(schema_key = %key, version = %schema.version, "registered schema");
        let newer = self
            .latest
            .get(&key)
            .map_or(true, |current| version_cmp(&schema.version, current).is_gt());
        if newer {
            self.latest.insert(key.clone(), schema.version.clone());
        }
        self.schemas
            .entry(key)
            .or_default()
            .insert(schema.version.clone(), schema);
        Ok(RegisterOutcome::Registered)
    }

    /// The newest registered version of `key`.
    pub fn get(&self, key: &str) -> Option<&LixSchema> {
        let version = self.latest.get(key)?;
        self.get_version(key, version)
    }

    pub fn get_version(&self, key: &str, version: &str) -> Option<&LixSchema> {
        self.schemas.get(key)?.get(version)
    }

    /// Like [`get`](Self::get) but failing with [`SchemaError::NotFound`].
    pub fn require(&self, key: &str) -> SchemaResult<&LixSchema> {
        self.get(key).ok_or_else(|| SchemaError::NotFound {
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.latest.contains_key(key)
    }

    /// Validate content against a specific schema version.
    pub fn validate(&self, key: &str, version: &str, content: &Value) -> SchemaResult<()> {
        let schema = self.get_version(key, version).ok_or_else(|| SchemaError::NotFound {
            key: format!("{key}@{version}"),
        })?;
        validate_content(schema, content)?;
        Ok(())
    }

    /// Newest version of every registered schema, ordered by key.
    pub fn latest(&self) -> impl Iterator<Item = &LixSchema> {
        self.latest
            .iter()
            .filter_map(|(key, version)| self.get_version(key.as_str(), version))
    }

    /// View definitions for every registered schema.
    pub fn views(&self) -> Vec<EntityViewDef> {
        self.latest().map(EntityViewDef::for_schema).collect()
    }

    /// Find the schema whose generated view is named `name` (either variant).
    pub fn view_named(&self, name: &str) -> Option<(EntityViewDef, &LixSchema)> {
        self.latest().find_map(|schema| {
            let def = EntityViewDef::for_schema(schema);
            def.matches(name).then_some((def, schema))
        })
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Compare dotted version strings numerically where possible.
fn version_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |s: &str| -> Vec<u64> { s.split('.').map(|p| p.parse().unwrap_or(0)).collect() };
    parse(a).cmp(&parse(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(version: &str) -> Value {
        json!({
            "type": "object",
            "x-lix-key": "note",
            "x-lix-version": version,
            "x-lix-primary-key": ["id"],
            "properties": { "id": { "type": "string" }, "text": { "type": "string" } },
            "required": ["id"]
        })
    }

    #[test]
    fn registration_is_idempotent() {
        let mut reg = SchemaRegistry::new();
        assert_eq!(reg.register_value(&note("1.0")).unwrap(), RegisterOutcome::Registered);
        assert_eq!(
            reg.register_value(&note("1.0")).unwrap(),
            RegisterOutcome::AlreadyRegistered
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn conflicting_redefinition_fails() {
        let mut reg = SchemaRegistry::new();
        reg.register_value(&note("1.0")).unwrap();
        let mut changed = note("1.0");
        changed["required"] = json!(["id", "text"]);
        assert!(matches!(
            reg.register_value(&changed),
            Err(SchemaError::Conflict { .. })
        ));
    }

    #[test]
    fn newest_version_wins() {
        let mut reg = SchemaRegistry::new();
        reg.register_value(&note("2.0")).unwrap();
        reg.register_value(&note("1.10")).unwrap();
        assert_eq!(reg.get("note").unwrap().version, "2.0");
        assert!(reg.get_version("note", "1.10").is_some());
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut reg = SchemaRegistry::new();
        let mut doc = note("1.0");
        doc["x-lix-key"] = json!("commit");
        assert!(reg.register_value(&doc).is_err());
        doc["x-lix-key"] = json!("lix_version");
        assert!(reg.register_value(&doc).is_err());
    }

    #[test]
    fn view_lookup() {
        let mut reg = SchemaRegistry::new();
        reg.register_value(&note("1.0")).unwrap();
        let (def, schema) = reg.view_named("note_all").unwrap();
        assert_eq!(def.view_name, "note");
        assert_eq!(schema.key.as_str(), "note");
        assert!(reg.view_named("other").is_none());
    }

    #[test]
    fn validate_through_registry() {
        let mut reg = SchemaRegistry::new();
        reg.register_value(&note("1.0")).unwrap();
        reg.validate("note", "1.0", &json!({"id": "a"})).unwrap();
        assert!(matches!(
            reg.validate("note", "1.0", &json!({"id": 1})),
            Err(SchemaError::Validation(_))
        ));
        assert!(matches!(
            reg.validate("missing", "1.0", &json!({})),
            Err(SchemaError::NotFound { .. })
        ));
    }
}
