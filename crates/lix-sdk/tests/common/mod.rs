#![allow(dead_code)]

use lix_sdk::{Lix, OpenOptions};
use serde_json::{json, Value};

pub fn note_schema() -> Value {
    json!({
        "type": "object",
        "x-lix-key": "note",
        "x-lix-version": "1.0",
        "x-lix-primary-key": ["id"],
        "properties": {
            "id": { "type": "string" },
            "text": { "type": "string" }
        },
        "required": ["id"],
        "additionalProperties": false
    })
}

/// A database with the `note` schema registered.
pub fn open_with_notes(options: OpenOptions) -> Lix {
    let mut lix = Lix::open(options).unwrap();
    lix.register_schema(&note_schema()).unwrap();
    lix
}

pub fn insert_note(lix: &mut Lix, id: &str, text: &str) {
    lix.execute(
        "INSERT INTO note (id, text) VALUES (?, ?)",
        &[json!(id), json!(text)],
    )
    .unwrap();
}

pub fn set_text(lix: &mut Lix, id: &str, text: &str) {
    let out = lix
        .execute("UPDATE note SET text = ? WHERE id = ?", &[json!(text), json!(id)])
        .unwrap();
    assert_eq!(out.affected(), 1);
}

/// `(id, text)` of every note in the active version, by id.
pub fn notes(lix: &mut Lix) -> Vec<(String, String)> {
    let rows = lix.select("SELECT id, text FROM note ORDER BY id", &[]).unwrap();
    rows.rows
        .iter()
        .map(|r| {
            (
                r[0].as_str().unwrap_or_default().to_string(),
                r[1].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

pub fn note_text(lix: &mut Lix, id: &str) -> Option<String> {
    let rows = lix
        .select("SELECT text FROM note WHERE id = ?", &[json!(id)])
        .unwrap();
    rows.value(0, "text").and_then(Value::as_str).map(str::to_string)
}

/// Text of note `id` as `version` sees it, read through `note_all`.
pub fn note_text_in(lix: &mut Lix, version: &str, id: &str) -> Option<String> {
    let rows = lix
        .select(
            "SELECT text FROM note_all WHERE id = ? AND lixcol_version_id = ?",
            &[json!(id), json!(version)],
        )
        .unwrap();
    assert!(rows.len() <= 1);
    rows.value(0, "text").and_then(Value::as_str).map(str::to_string)
}

pub fn count(lix: &mut Lix, sql: &str) -> i64 {
    let rows = lix.select(sql, &[]).unwrap();
    rows.rows[0][0].as_i64().unwrap()
}
