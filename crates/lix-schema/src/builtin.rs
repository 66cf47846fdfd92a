//! Schemas every database registers at initialisation.

use serde_json::{json, Value};

use crate::definition::LixSchema;
use crate::error::SchemaResult;

pub const LABEL: &str = "lix_label";
pub const CHANGE_SET_LABEL: &str = "lix_change_set_label";
pub const ACCOUNT: &str = "lix_account";
pub const ACTIVE_ACCOUNT: &str = "lix_active_account";
pub const CHANGE_PROPOSAL: &str = "lix_change_proposal";
pub const KEY_VALUE: &str = "lix_key_value";
pub const FILE: &str = "lix_file";
pub const STORED_SCHEMA: &str = "lix_stored_schema";

/// Key-value keys the engine itself maintains.
pub mod keys {
    pub const LIX_ID: &str = "lix_id";
    pub const LIX_NAME: &str = "lix_name";
    pub const DETERMINISTIC_MODE: &str = "lix_deterministic_mode";
}

/// Name of the label attached to checkpoint change sets.
pub const CHECKPOINT_LABEL: &str = "checkpoint";

/// All built-in schema documents, in registration order.
pub fn documents() -> Vec<Value> {
    vec![
        json!({
            "type": "object",
            "x-lix-key": LABEL,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "x-lix-global": true,
            "properties": {
                "id": { "type": "string", "x-lix-generated": "nano_id" },
                "name": { "type": "string" }
            },
            "required": ["id", "name"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": CHANGE_SET_LABEL,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["change_set_id", "label_id"],
            "x-lix-global": true,
            "x-lix-foreign-keys": [
                { "properties": ["label_id"], "references": { "schemaKey": LABEL, "properties": ["id"] } }
            ],
            "properties": {
                "change_set_id": { "type": "string" },
                "label_id": { "type": "string" }
            },
            "required": ["change_set_id", "label_id"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": ACCOUNT,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "x-lix-global": true,
            "properties": {
                "id": { "type": "string", "x-lix-generated": "nano_id" },
                "name": { "type": "string" }
            },
            "required": ["id", "name"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": ACTIVE_ACCOUNT,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["account_id"],
            "x-lix-global": true,
            "x-lix-untracked": true,
            "properties": {
                "account_id": { "type": "string" }
            },
            "required": ["account_id"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": CHANGE_PROPOSAL,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "x-lix-global": true,
            "properties": {
                "id": { "type": "string", "x-lix-generated": "uuid_v7" },
                "source_version_id": { "type": "string" },
                "target_version_id": { "type": "string" },
                "status": { "type": "string", "enum": ["open", "accepted", "rejected"] }
            },
            "required": ["id", "source_version_id", "target_version_id", "status"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": KEY_VALUE,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["key"],
            "x-lix-global": true,
            "properties": {
                "key": { "type": "string" },
                "value": {}
            },
            "required": ["key"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": FILE,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "properties": {
                "id": { "type": "string", "x-lix-generated": "nano_id" },
                "path": { "type": "string" },
                "data": { "type": "string" },
                "metadata": { "type": ["object", "null"] }
            },
            "required": ["id", "path", "data"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "x-lix-key": STORED_SCHEMA,
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["key", "version"],
            "x-lix-global": true,
            "x-lix-read-only": true,
            "properties": {
                "key": { "type": "string" },
                "version": { "type": "string" },
                "value": { "type": "object" }
            },
            "required": ["key", "version", "value"],
            "additionalProperties": false
        }),
    ]
}

/// Parsed built-in schemas.
pub fn schemas() -> SchemaResult<Vec<LixSchema>> {
    documents().iter().map(LixSchema::from_value).collect()
}

/// Whether `key` names a built-in schema.
pub fn is_builtin(key: &str) -> bool {
    [
        LABEL,
        CHANGE_SET_LABEL,
        ACCOUNT,
        ACTIVE_ACCOUNT,
        CHANGE_PROPOSAL,
        KEY_VALUE,
        FILE,
        STORED_SCHEMA,
    ]
    .contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;

    #[test]
    fn all_builtins_satisfy_the_meta_schema() {
        let mut reg = SchemaRegistry::new();
        for schema in schemas().unwrap() {
            assert!(is_builtin(schema.key.as_str()));
            reg.register(schema).unwrap();
        }
        assert_eq!(reg.len(), documents().len());
        assert!(reg.get(ACTIVE_ACCOUNT).unwrap().untracked);
        assert!(reg.get(STORED_SCHEMA).unwrap().read_only);
        assert!(!reg.get(FILE).unwrap().global);
    }
}
