use serde_json::Value;

use crate::definition::LixSchema;
use crate::error::SchemaValidationError;

/// Validate snapshot content against a schema.
///
/// Content must be a JSON object whose properties satisfy their declared
/// types, with every required property present and no undeclared properties
/// unless the schema allows additional properties.
pub fn validate_content(schema: &LixSchema, content: &Value) -> Result<(), SchemaValidationError> {
    let key = schema.key.as_str();
    let obj = content
        .as_object()
        .ok_or_else(|| SchemaValidationError::new(key, "content must be a JSON object"))?;

    for column in &schema.required {
        match obj.get(column) {
            None => {
                return Err(SchemaValidationError::new(key, "required property is missing").at(column))
            }
            Some(Value::Null) if !schema.properties[column].accepts(&Value::Null) => {
                return Err(SchemaValidationError::new(key, "required property is null").at(column))
            }
            Some(_) => {}
        }
    }

    for column in &schema.primary_key {
        if matches!(obj.get(column), None | Some(Value::Null)) {
            return Err(SchemaValidationError::new(key, "primary key value is missing").at(column));
        }
    }

    for (name, value) in obj {
        match schema.properties.get(name) {
            Some(prop) => {
                if !prop.accepts(value) {
                    let expected = if prop.types.is_empty() {
                        "an allowed value".to_string()
                    } else {
                        prop.types
                            .iter()
                            .map(|t| t.as_str())
                            .collect::<Vec<_>>()
                            .join(" | ")
                    };
                    return Err(SchemaValidationError::new(
                        key,
                        format!("expected {expected}, got {}", describe(value)),
                    )
                    .at(name));
                }
            }
            None if !schema.additional_properties => {
                return Err(SchemaValidationError::new(key, "property is not declared").at(name));
            }
            None => {}
        }
    }
    Ok(())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
