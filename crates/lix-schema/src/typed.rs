use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::definition::LixSchema;
use crate::error::{SchemaError, SchemaResult};
use crate::registry::SchemaRegistry;
use crate::validate::validate_content;

/// A Rust type bound to an entity schema.
///
/// Implementors carry the schema document they were written against, so the
/// binding can be checked once when the accessor is created instead of on
/// every row.
pub trait LixEntity: Serialize + DeserializeOwned {
    const SCHEMA_KEY: &'static str;

    /// The schema document this type mirrors.
    fn schema() -> Value;
}

/// Typed read/write access to entities of one registered schema.
#[derive(Debug)]
pub struct EntityAccessor<T: LixEntity> {
    schema: LixSchema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: LixEntity> Clone for EntityAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: LixEntity> EntityAccessor<T> {
    /// Bind `T` to the registered schema, failing if it is missing or if
    /// `T::schema()` differs from what was registered.
    pub fn bind(registry: &SchemaRegistry) -> SchemaResult<Self> {
        let declared = LixSchema::from_value(&T::schema())?;
        if declared.key.as_str() != T::SCHEMA_KEY {
            return Err(SchemaError::TypeMismatch {
                key: T::SCHEMA_KEY.to_string(),
            });
        }
        let registered = registry
            .get_version(T::SCHEMA_KEY, &declared.version)
            .ok_or_else(|| SchemaError::NotFound {
                key: T::SCHEMA_KEY.to_string(),
            })?;
        if registered.raw() != declared.raw() {
            return Err(SchemaError::TypeMismatch {
                key: T::SCHEMA_KEY.to_string(),
            });
        }
        Ok(Self {
            schema: registered.clone(),
            _marker: PhantomData,
        })
    }

    pub fn schema(&self) -> &LixSchema {
        &self.schema
    }

    /// Decode snapshot content into `T`.
    pub fn decode(&self, content: &Value) -> SchemaResult<T> {
        serde_json::from_value(content.clone()).map_err(|e| SchemaError::Serialization(e.to_string()))
    }

    /// Encode `T` as snapshot content, validating it against the schema.
    pub fn encode(&self, value: &T) -> SchemaResult<Value> {
        let content =
            serde_json::to_value(value).map_err(|e| SchemaError::Serialization(e.to_string()))?;
        validate_content(&self.schema, &content)?;
        Ok(content)
    }

    /// Entity id of `value`, derived from the primary key.
    pub fn entity_id(&self, value: &T) -> SchemaResult<String> {
        let content = self.encode(value)?;
        self.schema.entity_id_of(&content).ok_or_else(|| {
            SchemaError::Validation(crate::error::SchemaValidationError::new(
                T::SCHEMA_KEY,
                "primary key value is missing",
            ))
        })
    }
}
