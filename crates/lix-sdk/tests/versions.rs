mod common;

use common::*;
use lix_sdk::{LixError, OpenOptions, ProposalStatus, TransactionError};
use serde_json::json;

#[test]
fn draft_proposal_lands_in_main() {
    let mut lix = open_with_notes(OpenOptions::new().deterministic(1));
    insert_note(&mut lix, "n1", "first draft");
    let main = lix.active_version();

    let draft = lix.create_version(Some("draft"), None).unwrap();
    lix.switch_version(&draft.id).unwrap();
    set_text(&mut lix, "n1", "final");
    insert_note(&mut lix, "n2", "only in draft");

    // main is untouched until the proposal is accepted
    lix.switch_version(&main.id).unwrap();
    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("first draft"));
    lix.switch_version(&draft.id).unwrap();

    let proposal = lix
        .transaction(|tx| tx.create_change_proposal(&draft.id, &main.id))
        .unwrap();
    assert_eq!(proposal.status, ProposalStatus::Open);

    let outcome = lix
        .transaction(|tx| tx.accept_change_proposal(&proposal.id))
        .unwrap();
    assert!(outcome.commit_id.is_some());
    assert!(outcome.conflicts.is_empty());

    assert_eq!(lix.active_version().id, main.id);
    assert!(lix.versions().iter().all(|v| v.id != draft.id));
    assert_eq!(
        notes(&mut lix),
        vec![
            ("n1".to_string(), "final".to_string()),
            ("n2".to_string(), "only in draft".to_string()),
        ]
    );

    let stored = lix
        .transaction(|tx| tx.get::<lix_sdk::ChangeProposal>(&proposal.id))
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, ProposalStatus::Accepted);

    let err = lix
        .transaction(|tx| tx.reject_change_proposal(&proposal.id))
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::ProposalNotOpen { .. })
    ));
}

#[test]
fn merging_twice_is_a_no_op() {
    let mut lix = open_with_notes(OpenOptions::new());
    let main = lix.active_version();
    let branch = lix.create_version(None, None).unwrap();
    assert_eq!(branch.name, branch.id.to_string());

    lix.switch_version(&branch.id).unwrap();
    insert_note(&mut lix, "n1", "from branch");

    let first = lix.merge_version(&branch.id, &main.id).unwrap();
    assert_eq!(first.adopted, 1);
    let second = lix.merge_version(&branch.id, &main.id).unwrap();
    assert_eq!(second.commit_id, None);

    lix.switch_version(&main.id).unwrap();
    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("from branch"));
}

#[test]
fn merging_again_adopts_newer_source_edits() {
    let mut lix = open_with_notes(OpenOptions::new());
    let main = lix.active_version();
    let feature = lix.create_version(Some("feature"), None).unwrap();
    lix.switch_version(&feature.id).unwrap();

    insert_note(&mut lix, "n1", "a");
    lix.merge_version(&feature.id, &main.id).unwrap();
    set_text(&mut lix, "n1", "b");

    let second = lix.merge_version(&feature.id, &main.id).unwrap();
    assert!(second.conflicts.is_empty());
    assert_eq!(second.adopted, 1);
    assert_eq!(note_text_in(&mut lix, main.id.as_str(), "n1").as_deref(), Some("b"));
    assert_eq!(count(&mut lix, "SELECT count(*) FROM change_conflict"), 0);
}

#[test]
fn proposal_is_visible_per_version_through_the_all_view() {
    let mut lix = open_with_notes(OpenOptions::new().deterministic(5));
    insert_note(&mut lix, "n1", "draft");
    let main = lix.active_version();
    let feature = lix.create_version(Some("feature"), None).unwrap();
    lix.switch_version(&feature.id).unwrap();
    set_text(&mut lix, "n1", "final");

    assert_eq!(note_text_in(&mut lix, main.id.as_str(), "n1").as_deref(), Some("draft"));
    assert_eq!(note_text_in(&mut lix, feature.id.as_str(), "n1").as_deref(), Some("final"));

    let proposal = lix
        .transaction(|tx| tx.create_change_proposal(&feature.id, &main.id))
        .unwrap();
    lix.transaction(|tx| tx.accept_change_proposal(&proposal.id))
        .unwrap();

    assert_eq!(note_text_in(&mut lix, main.id.as_str(), "n1").as_deref(), Some("final"));
    assert_eq!(note_text_in(&mut lix, feature.id.as_str(), "n1"), None);
    let rows = lix
        .select(
            "SELECT count(*) FROM note_all WHERE lixcol_version_id = ?",
            &[json!(feature.id.to_string())],
        )
        .unwrap();
    assert_eq!(rows.rows[0][0], json!(0));
}

#[test]
fn writes_to_a_parent_never_change_a_local_override() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.execute("INSERT INTO version (id, name) VALUES ('a', 'a')", &[])
        .unwrap();
    lix.execute(
        "INSERT INTO version (id, name, inherited_from_version_id) VALUES ('b', 'b', 'a')",
        &[],
    )
    .unwrap();
    lix.execute(
        "INSERT INTO note_all (id, text, lixcol_version_id) VALUES ('n1', 'from a', 'a')",
        &[],
    )
    .unwrap();
    assert_eq!(note_text_in(&mut lix, "b", "n1").as_deref(), Some("from a"));

    let out = lix
        .execute(
            "UPDATE note_all SET text = 'own' WHERE id = 'n1' AND lixcol_version_id = 'b'",
            &[],
        )
        .unwrap();
    assert_eq!(out.affected(), 1);
    assert_eq!(note_text_in(&mut lix, "a", "n1").as_deref(), Some("from a"));

    lix.execute(
        "UPDATE note_all SET text = 'changed' WHERE id = 'n1' AND lixcol_version_id = 'a'",
        &[],
    )
    .unwrap();
    assert_eq!(note_text_in(&mut lix, "a", "n1").as_deref(), Some("changed"));
    assert_eq!(note_text_in(&mut lix, "b", "n1").as_deref(), Some("own"));

    lix.execute("DELETE FROM note_all WHERE id = 'n1' AND lixcol_version_id = 'a'", &[])
        .unwrap();
    assert_eq!(note_text_in(&mut lix, "a", "n1"), None);
    assert_eq!(note_text_in(&mut lix, "b", "n1").as_deref(), Some("own"));

    // entities b has no opinion on still come from a
    lix.execute(
        "INSERT INTO note_all (id, text, lixcol_version_id) VALUES ('n2', 'late', 'a')",
        &[],
    )
    .unwrap();
    assert_eq!(note_text_in(&mut lix, "b", "n2").as_deref(), Some("late"));
}

#[test]
fn merging_a_version_into_itself_fails() {
    let mut lix = open_with_notes(OpenOptions::new());
    let main = lix.active_version();
    assert!(matches!(
        lix.merge_version(&main.id, &main.id),
        Err(LixError::Merge(_))
    ));
}

#[test]
fn divergent_edits_conflict_and_keep_the_target_value() {
    let mut lix = open_with_notes(OpenOptions::new().deterministic(3));
    insert_note(&mut lix, "n1", "base");
    let main = lix.active_version();
    let branch = lix.create_version(Some("branch"), None).unwrap();

    lix.switch_version(&branch.id).unwrap();
    set_text(&mut lix, "n1", "theirs");
    lix.switch_version(&main.id).unwrap();
    set_text(&mut lix, "n1", "ours");

    let outcome = lix.merge_version(&branch.id, &main.id).unwrap();
    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = outcome.conflicts[0].clone();
    assert_eq!(conflict.key.entity_id.as_str(), "n1");
    assert_eq!(note_text(&mut lix, "n1").as_deref(), Some("ours"));
    assert_eq!(count(&mut lix, "SELECT count(*) FROM change_conflict"), 1);

    // the conflicting change itself cannot resolve it
    let err = lix
        .transaction(|tx| tx.resolve_conflict(&conflict.id, &conflict.source_change_id))
        .unwrap_err();
    assert!(matches!(err, LixError::Conflict(_)));

    set_text(&mut lix, "n1", "both");
    let rows = lix
        .select(
            "SELECT change_id FROM state WHERE schema_key = 'note' AND entity_id = 'n1'",
            &[],
        )
        .unwrap();
    let change_id = lix_sdk::ChangeId::new(rows.rows[0][0].as_str().unwrap());
    let resolved = lix
        .transaction(|tx| tx.resolve_conflict(&conflict.id, &change_id))
        .unwrap();
    assert_eq!(resolved.resolved_by_change_id, Some(change_id));
    assert!(lix.transaction(|tx| Ok(tx.open_conflicts())).unwrap().is_empty());
}

#[test]
fn global_entities_are_visible_in_every_version() {
    let mut lix = open_with_notes(OpenOptions::new());
    lix.transaction(|tx| tx.set_key_value("theme", json!("dark")))
        .unwrap();
    let other = lix.create_version(Some("other"), None).unwrap();
    lix.switch_version(&other.id).unwrap();
    let value = lix.transaction(|tx| tx.key_value("theme")).unwrap();
    assert_eq!(value, Some(json!("dark")));
}

#[test]
fn checkpoint_labels_the_working_change_set() {
    let mut lix = open_with_notes(OpenOptions::new());
    insert_note(&mut lix, "n1", "a");
    let before = lix.active_version().working_change_set_id;
    let labelled = lix.transaction(|tx| tx.create_checkpoint(None)).unwrap();
    assert_eq!(labelled, before);
    assert_ne!(lix.active_version().working_change_set_id, before);
    let labels = lix
        .transaction(|tx| tx.all::<lix_sdk::ChangeSetLabel>())
        .unwrap();
    assert!(labels.iter().any(|l| l.change_set_id == before.to_string()));
}

#[test]
fn active_version_moves_only_with_a_committed_transaction() {
    let mut lix = open_with_notes(OpenOptions::new());
    let main = lix.active_version();
    let other = lix.create_version(Some("other"), None).unwrap();

    let err = lix
        .transaction(|tx| {
            tx.switch_version(&other.id)?;
            tx.execute("DELETE FROM commit", &[])
        })
        .unwrap_err();
    assert!(matches!(
        err,
        LixError::Transaction(TransactionError::ReadOnly(_))
    ));
    assert_eq!(lix.active_version().id, main.id);

    lix.execute(
        "UPDATE active_version SET version_id = ?",
        &[json!(other.id.to_string())],
    )
    .unwrap();
    assert_eq!(lix.active_version().id, other.id);
    let rows = lix.select("SELECT version_id FROM active_version", &[]).unwrap();
    assert_eq!(rows.rows, vec![vec![json!(other.id.to_string())]]);

    let reopened = lix_sdk::Lix::open(OpenOptions::new().blob(lix.export().unwrap())).unwrap();
    assert_eq!(reopened.active_version().id, other.id);
}

#[test]
fn deleting_the_active_version_is_rejected() {
    let mut lix = open_with_notes(OpenOptions::new());
    let main = lix.active_version();
    let err = lix.transaction(|tx| tx.delete_version(&main.id)).unwrap_err();
    assert!(matches!(err, LixError::Version(_)));
}

#[test]
fn new_database_has_one_active_account() {
    let mut lix = open_with_notes(OpenOptions::new().account_name("ada"));
    let active = lix.transaction(|tx| tx.active_accounts()).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "ada");

    let other = lix.transaction(|tx| tx.create_account("grace")).unwrap();
    lix.transaction(|tx| tx.switch_account(&other.id)).unwrap();
    let active = lix.transaction(|tx| tx.active_accounts()).unwrap();
    assert_eq!(active, vec![other]);
}
