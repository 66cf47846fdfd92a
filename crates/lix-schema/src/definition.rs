use std::collections::BTreeMap;
use std::fmt;

use lix_types::SchemaKey;
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult, SchemaValidationError};
use crate::view::LIXCOL_PREFIX;

/// JSON value types a property may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "null" => Self::Null,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Null => value.is_null(),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default value generators for unspecified columns (`x-lix-generated`).
///
/// Every generator is served by the deterministic function provider, never
/// by platform randomness directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generator {
    UuidV7,
    NanoId,
    Timestamp,
}

impl Generator {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uuid_v7" => Self::UuidV7,
            "nano_id" => Self::NanoId,
            "timestamp" => Self::Timestamp,
            _ => return None,
        })
    }
}

/// One property of an entity schema.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySchema {
    /// Accepted types. Empty means any JSON value.
    pub types: Vec<JsonType>,
    pub nullable: bool,
    pub generated: Option<Generator>,
    pub enum_values: Option<Vec<Value>>,
}

impl PropertySchema {
    /// Whether `value` satisfies the declared type, nullability and enum.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() && (self.nullable || self.types.contains(&JsonType::Null)) {
            return true;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t.matches(value)) {
            return false;
        }
        match &self.enum_values {
            Some(options) => options.contains(value),
            None => true,
        }
    }
}

/// Reference from local properties to another schema's properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    pub properties: Vec<String>,
    pub references_schema: SchemaKey,
    pub references_properties: Vec<String>,
}

/// A parsed entity schema.
///
/// The original JSON document is kept in `raw` so schemas remain
/// introspectable and can be stored as entities themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct LixSchema {
    pub key: SchemaKey,
    pub version: String,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
    pub additional_properties: bool,
    /// Entities of a read-only schema reject writes through their views.
    pub read_only: bool,
    /// Entities of a global schema live in the `global` version.
    pub global: bool,
    /// Entities of an untracked schema bypass the change log.
    pub untracked: bool,
    raw: Value,
}

impl LixSchema {
    /// Parse a schema document, checking it against the meta-schema.
    pub fn from_value(value: &Value) -> SchemaResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("<unknown>", "schema must be a JSON object"))?;

        let key = match obj.get("x-lix-key") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(invalid("<unknown>", "missing string 'x-lix-key'")),
        };
        check_key(&key)?;

        let version = match obj.get("x-lix-version") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(invalid(&key, "missing string 'x-lix-version'")),
        };

        match obj.get("type") {
            Some(Value::String(t)) if t == "object" => {}
            _ => return Err(invalid(&key, "'type' must be \"object\"")),
        }

        let props_obj = match obj.get("properties") {
            Some(Value::Object(p)) => p,
            _ => return Err(invalid(&key, "'properties' must be an object")),
        };
        let mut properties = BTreeMap::new();
        for (name, prop) in props_obj {
            if name.starts_with(LIXCOL_PREFIX) {
                return Err(SchemaError::Invalid(
                    SchemaValidationError::new(&key, "property names must not use the lixcol_ prefix")
                        .at(name),
                ));
            }
            properties.insert(name.clone(), parse_property(&key, name, prop)?);
        }

        let primary_key = string_list(&key, obj, "x-lix-primary-key")?;
        if primary_key.is_empty() {
            return Err(invalid(&key, "'x-lix-primary-key' must name at least one property"));
        }
        for column in &primary_key {
            if !properties.contains_key(column) {
                return Err(SchemaError::Invalid(
                    SchemaValidationError::new(&key, "primary key column is not a property")
                        .at(column),
                ));
            }
        }

        let foreign_keys = parse_foreign_keys(&key, obj, &properties)?;

        let required = string_list(&key, obj, "required")?;
        for column in &required {
            if !properties.contains_key(column) {
                return Err(SchemaError::Invalid(
                    SchemaValidationError::new(&key, "required column is not a property").at(column),
                ));
            }
        }

        let additional_properties = match obj.get("additionalProperties") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(invalid(&key, "'additionalProperties' must be a boolean")),
        };

        Ok(Self {
            key: SchemaKey::new(key.clone()),
            version,
            primary_key,
            foreign_keys,
            properties,
            required,
            additional_properties,
            read_only: flag(&key, obj, "x-lix-read-only")?,
            global: flag(&key, obj, "x-lix-global")?,
            untracked: flag(&key, obj, "x-lix-untracked")?,
            raw: value.clone(),
        })
    }

    /// The schema document as it was registered.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Properties with a generator, in property order.
    pub fn generated_properties(&self) -> impl Iterator<Item = (&str, Generator)> {
        self.properties
            .iter()
            .filter_map(|(name, p)| p.generated.map(|g| (name.as_str(), g)))
    }

    /// Derive the entity id of `content` from its primary key values.
    ///
    /// Composite keys join their parts with `~`. Returns `None` when a
    /// primary key value is missing or null.
    pub fn entity_id_of(&self, content: &Value) -> Option<String> {
        let mut parts = Vec::with_capacity(self.primary_key.len());
        for column in &self.primary_key {
            match content.get(column) {
                None | Some(Value::Null) => return None,
                Some(Value::String(s)) => parts.push(s.clone()),
                Some(other) => parts.push(other.to_string()),
            }
        }
        Some(parts.join("~"))
    }
}

fn invalid(key: &str, reason: &str) -> SchemaError {
    SchemaError::Invalid(SchemaValidationError::new(key, reason))
}

fn check_key(key: &str) -> SchemaResult<()> {
    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid_start || !valid_rest {
        return Err(invalid(
            key,
            "'x-lix-key' must be lowercase snake_case starting with a letter",
        ));
    }
    if key.ends_with("_all") {
        return Err(invalid(key, "'x-lix-key' must not end with '_all'"));
    }
    Ok(())
}

fn flag(key: &str, obj: &Map<String, Value>, name: &str) -> SchemaResult<bool> {
    match obj.get(name) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(invalid(key, &format!("'{name}' must be a boolean"))),
    }
}

fn string_list(key: &str, obj: &Map<String, Value>, name: &str) -> SchemaResult<Vec<String>> {
    match obj.get(name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(key, &format!("'{name}' must contain only strings")))
            })
            .collect(),
        Some(_) => Err(invalid(key, &format!("'{name}' must be an array of strings"))),
    }
}

fn parse_property(key: &str, name: &str, prop: &Value) -> SchemaResult<PropertySchema> {
    let err = |reason: &str| SchemaError::Invalid(SchemaValidationError::new(key, reason).at(name));
    let obj = prop
        .as_object()
        .ok_or_else(|| err("property definition must be an object"))?;

    let types = match obj.get("type") {
        None => Vec::new(),
        Some(Value::String(t)) => vec![JsonType::parse(t).ok_or_else(|| err("unknown type"))?],
        Some(Value::Array(ts)) => ts
            .iter()
            .map(|t| t.as_str().and_then(JsonType::parse).ok_or_else(|| err("unknown type")))
            .collect::<SchemaResult<Vec<_>>>()?,
        Some(_) => return Err(err("'type' must be a string or array")),
    };

    let nullable = match obj.get("nullable") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(err("'nullable' must be a boolean")),
    };

    let generated = match obj.get("x-lix-generated") {
        None => None,
        Some(Value::String(g)) => Some(Generator::parse(g).ok_or_else(|| err("unknown generator"))?),
        Some(_) => return Err(err("'x-lix-generated' must be a string")),
    };

    let enum_values = match obj.get("enum") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => return Err(err("'enum' must be an array")),
    };

    Ok(PropertySchema {
        types,
        nullable,
        generated,
        enum_values,
    })
}

fn parse_foreign_keys(
    key: &str,
    obj: &Map<String, Value>,
    properties: &BTreeMap<String, PropertySchema>,
) -> SchemaResult<Vec<ForeignKey>> {
    let items = match obj.get("x-lix-foreign-keys") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid(key, "'x-lix-foreign-keys' must be an array")),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let fk = item
            .as_object()
            .ok_or_else(|| invalid(key, "foreign key must be an object"))?;
        let local = string_list(key, fk, "properties")?;
        let references = fk
            .get("references")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid(key, "foreign key needs a 'references' object"))?;
        let schema = references
            .get("schemaKey")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(key, "foreign key references need a 'schemaKey'"))?;
        let remote = string_list(key, references, "properties")?;
        if local.is_empty() || local.len() != remote.len() {
            return Err(invalid(key, "foreign key property lists must be non-empty and equal length"));
        }
        for column in &local {
            if !properties.contains_key(column) {
                return Err(SchemaError::Invalid(
                    SchemaValidationError::new(key, "foreign key column is not a property").at(column),
                ));
            }
        }
        out.push(ForeignKey {
            properties: local,
            references_schema: SchemaKey::new(schema),
            references_properties: remote,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note() -> Value {
        json!({
            "type": "object",
            "x-lix-key": "note",
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "properties": {
                "id": { "type": "string", "x-lix-generated": "uuid_v7" },
                "text": { "type": "string" },
                "rank": { "type": ["integer", "null"] }
            },
            "required": ["id", "text"],
            "additionalProperties": false
        })
    }

    #[test]
    fn parses_valid_schema() {
        let schema = LixSchema::from_value(&note()).unwrap();
        assert_eq!(schema.key.as_str(), "note");
        assert_eq!(schema.version, "1.0");
        assert_eq!(schema.primary_key, vec!["id"]);
        assert_eq!(schema.properties.len(), 3);
        assert!(!schema.additional_properties);
        assert_eq!(
            schema.generated_properties().collect::<Vec<_>>(),
            vec![("id", Generator::UuidV7)]
        );
    }

    #[test]
    fn rejects_missing_key() {
        let mut doc = note();
        doc.as_object_mut().unwrap().remove("x-lix-key");
        assert!(matches!(LixSchema::from_value(&doc), Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn rejects_lixcol_property() {
        let mut doc = note();
        doc["properties"]["lixcol_version_id"] = json!({"type": "string"});
        let err = LixSchema::from_value(&doc).unwrap_err();
        match err {
            SchemaError::Invalid(e) => assert_eq!(e.property.as_deref(), Some("lixcol_version_id")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_primary_key() {
        let mut doc = note();
        doc["x-lix-primary-key"] = json!(["missing"]);
        assert!(LixSchema::from_value(&doc).is_err());
    }

    #[test]
    fn rejects_bad_key_format() {
        let mut doc = note();
        doc["x-lix-key"] = json!("Note");
        assert!(LixSchema::from_value(&doc).is_err());
        doc["x-lix-key"] = json!("note_all");
        assert!(LixSchema::from_value(&doc).is_err());
    }

    #[test]
    fn rejects_unknown_generator() {
        let mut doc = note();
        doc["properties"]["id"]["x-lix-generated"] = json!("random");
        assert!(LixSchema::from_value(&doc).is_err());
    }

    #[test]
    fn parses_foreign_keys() {
        let doc = json!({
            "type": "object",
            "x-lix-key": "comment",
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "x-lix-foreign-keys": [
                { "properties": ["note_id"], "references": { "schemaKey": "note", "properties": ["id"] } }
            ],
            "properties": { "id": { "type": "string" }, "note_id": { "type": "string" } }
        });
        let schema = LixSchema::from_value(&doc).unwrap();
        assert_eq!(schema.foreign_keys.len(), 1);
        assert_eq!(schema.foreign_keys[0].references_schema.as_str(), "note");
    }

    #[test]
    fn composite_entity_id() {
        let doc = json!({
            "type": "object",
            "x-lix-key": "pair",
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["a", "b"],
            "properties": { "a": { "type": "string" }, "b": { "type": "integer" } }
        });
        let schema = LixSchema::from_value(&doc).unwrap();
        assert_eq!(schema.entity_id_of(&json!({"a": "x", "b": 2})).as_deref(), Some("x~2"));
        assert_eq!(schema.entity_id_of(&json!({"a": "x"})), None);
    }

    #[test]
    fn property_accepts() {
        let schema = LixSchema::from_value(&note()).unwrap();
        let rank = &schema.properties["rank"];
        assert!(rank.accepts(&json!(3)));
        assert!(rank.accepts(&json!(null)));
        assert!(!rank.accepts(&json!("3")));
        assert!(!rank.accepts(&json!(3.5)));
    }
}
