use crate::definition::LixSchema;

/// Prefix of the engine-managed columns every entity view carries.
pub const LIXCOL_PREFIX: &str = "lixcol_";

/// Engine-managed view columns, without the `lixcol_` prefix.
pub const LIXCOL_COLUMNS: &[&str] = &[
    "entity_id",
    "schema_key",
    "file_id",
    "version_id",
    "plugin_key",
    "change_id",
    "created_at",
    "updated_at",
    "inherited_from_version_id",
    "commit_id",
    "untracked",
];

/// Names the engine reserves for its own tables and views.
pub const RESERVED_VIEW_NAMES: &[&str] = &[
    "state",
    "state_all",
    "change",
    "commit",
    "commit_edge",
    "change_set",
    "change_set_element",
    "version",
    "active_version",
    "change_conflict",
    "snapshot",
];

/// The logical view pair generated for a registered schema.
///
/// `view_name` shows entities in the active version; `all_view_name` shows
/// them in every version and exposes `lixcol_version_id` for filtering.
/// Built-in schemas drop their `lix_` prefix, so `lix_label` is read through
/// `label` and `label_all`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityViewDef {
    pub schema_key: String,
    pub view_name: String,
    pub all_view_name: String,
    pub property_columns: Vec<String>,
    pub read_only: bool,
}

impl EntityViewDef {
    pub fn for_schema(schema: &LixSchema) -> Self {
        let key = schema.key.as_str();
        let view_name = key.strip_prefix("lix_").unwrap_or(key).to_string();
        Self {
            schema_key: key.to_string(),
            all_view_name: format!("{view_name}_all"),
            view_name,
            property_columns: schema.properties.keys().cloned().collect(),
            read_only: schema.read_only,
        }
    }

    /// All columns of the view, properties first.
    pub fn columns(&self) -> Vec<String> {
        self.property_columns
            .iter()
            .cloned()
            .chain(LIXCOL_COLUMNS.iter().map(|c| format!("{LIXCOL_PREFIX}{c}")))
            .collect()
    }

    /// Whether `name` is one of this view's two names.
    pub fn matches(&self, name: &str) -> bool {
        name == self.view_name || name == self.all_view_name
    }

    pub fn is_property(&self, column: &str) -> bool {
        self.property_columns.iter().any(|c| c == column)
    }
}

/// Strip the `lixcol_` prefix, returning the state column it names.
pub fn lixcol_name(column: &str) -> Option<&str> {
    column
        .strip_prefix(LIXCOL_PREFIX)
        .filter(|rest| LIXCOL_COLUMNS.contains(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_views_drop_prefix() {
        let schema = LixSchema::from_value(&json!({
            "type": "object",
            "x-lix-key": "lix_label",
            "x-lix-version": "1.0",
            "x-lix-primary-key": ["id"],
            "properties": { "id": { "type": "string" }, "name": { "type": "string" } }
        }))
        .unwrap();
        let def = EntityViewDef::for_schema(&schema);
        assert_eq!(def.view_name, "label");
        assert_eq!(def.all_view_name, "label_all");
        assert!(def.matches("label_all"));
        assert!(def.columns().contains(&"lixcol_version_id".to_string()));
        assert_eq!(def.columns()[0], "id");
    }

    #[test]
    fn lixcol_names() {
        assert_eq!(lixcol_name("lixcol_version_id"), Some("version_id"));
        assert_eq!(lixcol_name("lixcol_bogus"), None);
        assert_eq!(lixcol_name("version_id"), None);
    }
}
