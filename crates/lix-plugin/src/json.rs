//! Built-in plugin for JSON files.
//!
//! Each top-level property of a JSON object file is one entity, keyed by
//! the property name. Nested values are stored whole.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::error::{PluginError, PluginResult};
use crate::plugin::{DetectedChange, FileData, Plugin};

pub struct JsonPlugin;

impl JsonPlugin {
    pub const KEY: &'static str = "lix_plugin_json";
    pub const PROPERTY_SCHEMA: &'static str = "lix_plugin_json_property";

    fn properties(&self, file: &FileData) -> PluginResult<BTreeMap<String, Value>> {
        if file.data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        let invalid = |message: String| PluginError::InvalidContent {
            plugin: Self::KEY.to_string(),
            path: file.path.clone(),
            message,
        };
        match serde_json::from_slice::<Value>(&file.data) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(_) => Err(invalid("top-level value must be an object".into())),
            Err(e) => Err(invalid(e.to_string())),
        }
    }

    fn change(property: &str, value: Option<&Value>) -> DetectedChange {
        DetectedChange {
            entity_id: property.into(),
            schema_key: Self::PROPERTY_SCHEMA.into(),
            snapshot_content: value.map(|v| json!({ "property": property, "value": v })),
        }
    }
}

/// One property-level difference.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyChange {
    Added { key: String, value: Value },
    Removed { key: String },
    Modified { key: String, new: Value },
}

/// Compare two property maps: keys only in `new` are added, keys only in
/// `old` removed, keys in both with different values modified.
pub fn diff_properties(
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> Vec<PropertyChange> {
    let mut changes = Vec::new();
    for (key, old_val) in old {
        match new.get(key) {
            Some(new_val) if new_val != old_val => changes.push(PropertyChange::Modified {
                key: key.clone(),
                new: new_val.clone(),
            }),
            Some(_) => {}
            None => changes.push(PropertyChange::Removed { key: key.clone() }),
        }
    }
    for (key, value) in new {
        if !old.contains_key(key) {
            changes.push(PropertyChange::Added {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    changes
}

impl Plugin for JsonPlugin {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn glob(&self) -> &str {
        "*.json"
    }

    fn schema_documents(&self) -> Vec<Value> {
        vec![json!({
            "type": "object",
            "x-lix-key": Self::PROPERTY_SCHEMA,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["property"],
            "properties": {
                "property": { "type": "string" },
                "value": {}
            },
            "required": ["property"],
            "additionalProperties": false
        })]
    }

    fn detect_changes(
        &self,
        before: Option<&FileData>,
        after: &FileData,
    ) -> PluginResult<Vec<DetectedChange>> {
        let old = match before {
            Some(file) => self.properties(file)?,
            None => BTreeMap::new(),
        };
        let new = self.properties(after)?;
        Ok(diff_properties(&old, &new)
            .into_iter()
            .map(|change| match change {
                PropertyChange::Added { key, value } | PropertyChange::Modified { key, new: value } => {
                    Self::change(&key, Some(&value))
                }
                PropertyChange::Removed { key } => Self::change(&key, None),
            })
            .collect())
    }

    fn diff(
        &self,
        schema_key: &str,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> PluginResult<Vec<DetectedChange>> {
        if schema_key != Self::PROPERTY_SCHEMA {
            return Err(PluginError::MissingDiff {
                plugin: Self::KEY.to_string(),
                schema_key: schema_key.to_string(),
            });
        }
        if before == after {
            return Ok(Vec::new());
        }
        let property = after
            .or(before)
            .and_then(|v| v.get("property"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(vec![Self::change(
            property,
            after.and_then(|v| v.get("value")),
        )])
    }
}

/// Render properties back into a JSON object file.
pub fn render_properties<'a>(entities: impl IntoIterator<Item = &'a Value>) -> Vec<u8> {
    let mut map = Map::new();
    for entity in entities {
        if let Some(property) = entity.get("property").and_then(Value::as_str) {
            map.insert(
                property.to_string(),
                entity.get("value").cloned().unwrap_or(Value::Null),
            );
        }
    }
    serde_json::to_vec_pretty(&Value::Object(map)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(data: &str) -> FileData {
        FileData {
            id: "f1".into(),
            path: "/config.json".into(),
            data: data.as_bytes().to_vec(),
        }
    }

    #[test]
    fn new_file_adds_every_property() {
        let changes = JsonPlugin
            .detect_changes(None, &file(r#"{"a": 1, "b": {"c": true}}"#))
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1].snapshot_content,
            Some(json!({"property": "b", "value": {"c": true}}))
        );
    }

    #[test]
    fn edits_report_only_what_changed() {
        let before = file(r#"{"keep": 1, "edit": "old", "drop": null}"#);
        let after = file(r#"{"keep": 1, "edit": "new", "add": [1]}"#);
        let changes = JsonPlugin.detect_changes(Some(&before), &after).unwrap();

        let ids: Vec<&str> = changes.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["drop", "edit", "add"]);
        assert!(changes[0].is_removal());
    }

    #[test]
    fn empty_file_is_empty_object() {
        assert!(JsonPlugin.detect_changes(None, &file("  \n")).unwrap().is_empty());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            JsonPlugin.detect_changes(None, &file("[1, 2]")),
            Err(PluginError::InvalidContent { .. })
        ));
    }

    #[test]
    fn entity_diff() {
        let a = json!({"property": "x", "value": 1});
        let b = json!({"property": "x", "value": 2});
        assert!(JsonPlugin
            .diff(JsonPlugin::PROPERTY_SCHEMA, Some(&a), Some(&a))
            .unwrap()
            .is_empty());
        let changes = JsonPlugin
            .diff(JsonPlugin::PROPERTY_SCHEMA, Some(&a), Some(&b))
            .unwrap();
        assert_eq!(changes[0].snapshot_content, Some(b));
        assert!(JsonPlugin.diff("other", None, None).is_err());
    }

    #[test]
    fn render_round_trips_properties() {
        let entities = [json!({"property": "a", "value": 1})];
        let data = render_properties(&entities);
        let parsed: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(parsed, json!({"a": 1}));
    }
}
