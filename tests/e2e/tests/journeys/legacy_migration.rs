//! Migration journey: documents written by old versions load, modernize,
//! and stay stable across repeated load cycles.

use lingolog_core::{Speaker, SCHEMA_VERSION};
use lingolog_e2e_tests::fixtures;
use lingolog_e2e_tests::harness::TestStoreManager;

#[test]
fn test_legacy_document_modernizes_on_load() {
    let mut manager = TestStoreManager::new();
    manager.seed_raw(&fixtures::legacy_document().to_string());
    manager.reopen();

    let doc = manager.store.document();
    assert_eq!(doc.version, SCHEMA_VERSION);

    // `liked` became `pinned`, `time` became `createdAt`.
    let first = doc.post(1).unwrap();
    assert!(first.pinned);
    assert_eq!(first.created_at, 1_600_000_000_000);
    assert!(!first.ref_id.is_empty(), "stable ids are backfilled");
    assert_eq!(first.tags, vec!["invite"], "duplicate tags collapse");

    // Bare-string texts and `person` both modernize.
    let second = doc.post(2).unwrap();
    assert_eq!(second.texts[0].content, "ja, gerne");
    assert_eq!(second.texts[0].speaker, Speaker::Partner);

    // The puzzle gets an id, its clue resolves, and its recorded meaning
    // marks it solved.
    let puzzle = &doc.puzzles[0];
    assert!(puzzle.id.starts_with("puzzle_"));
    assert!(puzzle.is_solved);
    assert_eq!(puzzle.post_refs[0].post_id, Some(1));
    assert_eq!(puzzle.post_refs[0].ref_id, first.ref_id);
}

#[test]
fn test_no_legacy_keys_survive_a_save() {
    let mut manager = TestStoreManager::new();
    manager.seed_raw(&fixtures::legacy_document().to_string());
    manager.reopen();
    manager.store.persist().unwrap();

    let saved = manager.store.export_document().unwrap().to_string();
    for legacy_key in ["\"liked\"", "\"time\"", "\"person\""] {
        assert!(!saved.contains(legacy_key), "{legacy_key} leaked into a save");
    }
}

#[test]
fn test_migration_is_idempotent() {
    let mut manager = TestStoreManager::new();
    manager.seed_raw(&fixtures::legacy_document().to_string());
    manager.reopen();
    manager.store.persist().unwrap();
    let first_save = manager.store.export_document().unwrap();

    // Loading the saved form again changes nothing.
    manager.reopen();
    let second_save = manager.store.export_document().unwrap();
    assert_eq!(first_save, second_save);
}

#[test]
fn test_garbage_resets_without_failing() {
    let mut manager = TestStoreManager::new();
    for garbage in ["{truncated", "[]", "\"a string\"", "42"] {
        manager.seed_raw(garbage);
        manager.reopen();
        let doc = manager.store.document();
        assert_eq!(doc.version, SCHEMA_VERSION);
        assert!(doc.posts.is_empty());
    }
}

#[test]
fn test_partial_records_are_repaired_not_dropped() {
    let mut manager = TestStoreManager::new();
    manager.seed_raw(
        &serde_json::json!({
            "posts": [
                {"texts": [{"content": "no id at all"}]},
                {"id": 9, "refId": "shared", "texts": ["a"]},
                {"id": 10, "refId": "SHARED", "texts": ["b"]}
            ]
        })
        .to_string(),
    );
    manager.reopen();

    let doc = manager.store.document();
    assert_eq!(doc.posts.len(), 3);
    assert!(doc.posts.iter().all(|p| p.id > 0));

    // Case-insensitive duplicate ref ids are regenerated, not shared.
    let mut ref_ids: Vec<String> = doc.posts.iter().map(|p| p.ref_id.to_lowercase()).collect();
    ref_ids.sort();
    ref_ids.dedup();
    assert_eq!(ref_ids.len(), 3);
}
