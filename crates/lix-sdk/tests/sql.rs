mod common;

use common::*;
use lix_sdk::{LixError, OpenOptions, TransactionError};
use serde_json::json;

#[test]
fn delete_then_reinsert_keeps_full_history() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "one");
    let deleted = lix.execute("DELETE FROM note WHERE id = 'n1'", &[]).unwrap();
    assert_eq!(deleted.affected(), 1);
    assert!(notes(&mut lix).is_empty());

    insert_note(&mut lix, "n1", "two");
    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("two"));

    let history = lix
        .select(
            "SELECT snapshot_content FROM change WHERE entity_id = 'n1' AND schema_key = 'note'",
            &[],
        )
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(
        history.rows.iter().filter(|r| r[0].is_null()).count(),
        1,
        "one tombstone between the two inserts"
    );
}

#[test]
fn inserting_a_visible_entity_is_a_unique_violation() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "one");
    let err = lix
        .execute("INSERT INTO note (id, text) VALUES ('n1', 'again')", &[])
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::UniqueViolation { .. })
    ));
}

#[test]
fn failed_transaction_writes_nothing() {
    let mut lix = open_with_notes(OpenOptions::new());
    let changes_before = count(&mut lix, "SELECT count(*) FROM change");

    let err = lix
        .transaction(|tx| {
            tx.execute("INSERT INTO note (id, text) VALUES ('n1', 'fine')", &[])?;
            tx.execute("INSERT INTO note (id, text) VALUES ('n2', 42)", &[])
        })
        .unwrap_err();
    assert!(matches!(err, LixError::SchemaValidation(_)));

    assert!(notes(&mut lix).is_empty());
    assert_eq!(count(&mut lix, "SELECT count(*) FROM change"), changes_before);
}

#[test]
fn staged_rows_are_visible_inside_the_transaction() {
    let mut lix = open_with_notes(OpenOptions::new());
    let seen = lix
        .transaction(|tx| {
            tx.execute("INSERT INTO note (id, text) VALUES ('n1', 'pending')", &[])?;
            let rows = tx.select("SELECT text FROM note WHERE id = 'n1'", &[])?;
            Ok(rows.value(0, "text").cloned())
        })
        .unwrap();
    assert_eq!(seen, Some(json!("pending")));
}

#[test]
fn untracked_rows_leave_no_changes() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.execute(
        "INSERT INTO note (id, text, lixcol_untracked) VALUES ('u1', 'local', 1)",
        &[],
    )
    .unwrap();
    assert_eq!(note_text(&mut lix, "u1").as_deref(), Some("local"));
    assert_eq!(
        count(&mut lix, "SELECT count(*) FROM change WHERE entity_id = 'u1'"),
        0
    );
    let flag = lix
        .select("SELECT lixcol_untracked FROM note WHERE id = 'u1'", &[])
        .unwrap();
    assert_eq!(flag.value(0, "lixcol_untracked"), Some(&json!(true)));
}

#[test]
fn rewrite_does_not_change_results() {
    let ops = |lix: &mut lix_sdk::Lix| {
        insert_note(lix, "a", "1");
        insert_note(lix, "b", "2");
        set_text(lix, "a", "3");
        lix.execute("DELETE FROM note WHERE id = 'b'", &[]).unwrap();
        insert_note(lix, "c", "4");
    };
    let mut rewritten = open_with_notes(OpenOptions::new().deterministic(9));
    let mut direct = open_with_notes(OpenOptions::new().deterministic(9).rewrite_enabled(false));
    ops(&mut rewritten);
    ops(&mut direct);

    for sql in [
        "SELECT id, text FROM note ORDER BY id",
        "SELECT entity_id, snapshot_content FROM state WHERE schema_key = 'note' ORDER BY entity_id",
        "SELECT id, lixcol_version_id FROM note_all ORDER BY id",
        "SELECT count(*) FROM note WHERE text LIKE '%3%'",
    ] {
        assert_eq!(
            rewritten.select(sql, &[]).unwrap(),
            direct.select(sql, &[]).unwrap(),
            "{sql}"
        );
    }

    let main = rewritten.active_version().id.to_string();
    assert_eq!(main, direct.active_version().id.to_string());
    for sql in [
        "SELECT id, text FROM note_all WHERE lixcol_version_id = ? ORDER BY id",
        "SELECT entity_id FROM state_all WHERE version_id = ? AND schema_key = 'note' ORDER BY entity_id",
        "SELECT count(*) FROM internal_state_cache_note WHERE version_id = ?",
    ] {
        for version in [main.as_str(), "global", "no-such-version"] {
            assert_eq!(
                rewritten.select(sql, &[json!(version)]).unwrap(),
                direct.select(sql, &[json!(version)]).unwrap(),
                "{sql} with {version}"
            );
        }
    }
    assert_ne!(rewritten.explain("SELECT * FROM note").unwrap(), "SELECT * FROM note");
    assert_eq!(direct.explain("SELECT * FROM note").unwrap(), "SELECT * FROM note");
}

#[test]
fn cache_rebuilds_once_per_write() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "one");
    let before = lix.cache_stats().rebuilds;

    notes(&mut lix);
    notes(&mut lix);
    assert_eq!(lix.cache_stats().rebuilds, before + 1);
    assert!(!lix.cache_stats().stale);

    insert_note(&mut lix, "n2", "two");
    assert!(lix.cache_stats().stale);
    notes(&mut lix);
    assert_eq!(lix.cache_stats().rebuilds, before + 2);
}

#[test]
fn failed_read_keeps_the_rebuilt_cache() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "one");
    let before = lix.cache_stats().rebuilds;
    assert!(lix.cache_stats().stale);

    // the scan rebuilds the cache before LIMIT fails to evaluate
    assert!(lix.select("SELECT id FROM note LIMIT 'x'", &[]).is_err());
    assert_eq!(lix.cache_stats().rebuilds, before + 1);
    assert!(!lix.cache_stats().stale);

    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("one"));
    assert_eq!(lix.cache_stats().rebuilds, before + 1);
}

#[test]
fn reads_pinned_to_a_missing_version_are_empty() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "one");
    for sql in [
        "SELECT count(*) FROM note_all WHERE lixcol_version_id = 'gone'",
        "SELECT count(*) FROM state_all WHERE version_id = 'gone' AND schema_key = 'note'",
    ] {
        assert_eq!(count(&mut lix, sql), 0, "{sql}");
    }
    let main = lix.active_version().id;
    let rows = lix
        .select(
            "SELECT text FROM note_all WHERE lixcol_version_id = ? AND id = 'n1'",
            &[json!(main.to_string())],
        )
        .unwrap();
    assert_eq!(rows.value(0, "text"), Some(&json!("one")));
}

#[test]
fn history_tables_are_read_only() {
    let mut lix = open_with_notes(OpenOptions::new());
    let err = lix.execute("DELETE FROM change", &[]).unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::ReadOnly(_))
    ));
    let err = lix
        .execute("INSERT INTO stored_schema (key, version, value) VALUES ('x', '1', '{}')", &[])
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::ReadOnly(_))
    ));
}

#[test]
fn state_view_writes_reach_entity_views() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.execute(
        "INSERT INTO state (entity_id, schema_key, file_id, snapshot_content) VALUES ('n1', 'note', 'lix', ?)",
        &[json!(r#"{"id":"n1","text":"via state"}"#)],
    )
    .unwrap();
    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("via state"));

    let err = lix
        .execute(
            "UPDATE state SET file_id = 'other' WHERE entity_id = 'n1'",
            &[],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::InvalidColumn { .. })
    ));
}

#[test]
fn version_table_creates_and_renames_versions() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.execute("INSERT INTO version (id, name) VALUES ('v2', 'second')", &[])
        .unwrap();
    lix.execute("UPDATE version SET name = 'renamed' WHERE id = 'v2'", &[])
        .unwrap();
    let rows = lix
        .select("SELECT name FROM version WHERE id = 'v2'", &[])
        .unwrap();
    assert_eq!(rows.value(0, "name"), Some(&json!("renamed")));

    lix.execute("UPDATE active_version SET version_id = 'v2'", &[])
        .unwrap();
    assert_eq!(lix.active_version().id.as_str(), "v2");
}

#[test]
fn foreign_keys_are_checked() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.register_schema(&json!({
        "type": "object",
        "x-lix-key": "comment",
        "x-lix-version": "1.0",
        "x-lix-primary-key": ["id"],
        "x-lix-foreign-keys": [
            { "properties": ["note_id"], "references": { "schemaKey": "note", "properties": ["id"] } }
        ],
        "properties": {
            "id": { "type": "string" },
            "note_id": { "type": "string" }
        },
        "required": ["id", "note_id"],
        "additionalProperties": false
    }))
    .unwrap();

    let err = lix
        .execute("INSERT INTO comment (id, note_id) VALUES ('c1', 'missing')", &[])
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::ForeignKeyViolation { .. })
    ));

    insert_note(&mut lix, "n1", "x");
    lix.execute("INSERT INTO comment (id, note_id) VALUES ('c1', 'n1')", &[])
        .unwrap();
}
