//! Puzzle journey: cut a phrase from the timeline, study it, solve it, and
//! keep the card usable after its source disappears.

use lingolog_core::{PuzzleDraft, RefQuery};
use lingolog_e2e_tests::fixtures;
use lingolog_e2e_tests::harness::TestStoreManager;

fn puzzle_from(post_id: i64, text: &str) -> PuzzleDraft {
    PuzzleDraft {
        text: text.to_string(),
        sources: vec![RefQuery::by_post(post_id)],
        ..Default::default()
    }
}

#[test]
fn test_cut_solve_and_reload() {
    let mut manager = TestStoreManager::new();
    let post = manager
        .store
        .create_post(fixtures::post("das ist mir Wurst"))
        .unwrap();
    let puzzle = manager
        .store
        .create_puzzle(puzzle_from(post.id, "mir Wurst"))
        .unwrap();

    // Source post and card are linked both ways.
    assert_eq!(puzzle.post_refs[0].post_id, Some(post.id));
    assert_eq!(puzzle.post_refs[0].ref_id, post.ref_id);
    assert!(manager
        .store
        .document()
        .post(post.id)
        .unwrap()
        .linked_puzzle_ids
        .contains(&puzzle.id));

    manager
        .store
        .solve_puzzle(&puzzle.id, "I don't care".to_string(), vec![], vec![])
        .unwrap();
    manager.store.add_puzzle_note(&puzzle.id, "idiom, not food".to_string()).unwrap();

    manager.reopen();
    let loaded = manager.store.document().puzzle(&puzzle.id).unwrap();
    assert!(loaded.is_solved);
    assert_eq!(loaded.meaning.as_deref(), Some("I don't care"));
    assert_eq!(loaded.notes.len(), 1);
}

#[test]
fn test_ref_tokens_round_trip() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("guten Rutsch")).unwrap();

    let token = manager.store.ref_token(&RefQuery::by_post(post.id)).unwrap();
    assert_eq!(token, format!("{}.0", post.ref_id));

    let resolved = manager.store.resolve_token(&token).unwrap();
    assert_eq!(resolved.post_id, Some(post.id));
    assert_eq!(manager.store.display_ref(&resolved), "guten Rutsch");
}

#[test]
fn test_clue_survives_source_deletion() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("short-lived")).unwrap();
    let puzzle = manager
        .store
        .create_puzzle(puzzle_from(post.id, "short-lived"))
        .unwrap();

    manager.store.delete_post(post.id).unwrap();
    manager.reopen();

    // The clue dangles but keeps its stable id and still renders something.
    let loaded = manager.store.document().puzzle(&puzzle.id).unwrap();
    let clue = loaded.post_refs[0].clone();
    assert_eq!(clue.ref_id, post.ref_id);
    let label = manager.store.display_ref(&clue);
    assert!(!label.is_empty());
}

#[test]
fn test_relations_and_deletion_cleanup() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("Ohrwurm im Kopf")).unwrap();
    let a = manager.store.create_puzzle(puzzle_from(post.id, "Ohrwurm")).unwrap();
    let b = manager.store.create_puzzle(puzzle_from(post.id, "im Kopf")).unwrap();

    manager.store.relate_puzzles(&a.id, &b.id).unwrap();
    manager.reopen();
    let loaded = manager.store.document().puzzle(&a.id).unwrap();
    assert_eq!(loaded.related_puzzle_ids, vec![b.id.clone()]);

    manager.store.delete_puzzle(&a.id).unwrap();
    manager.reopen();
    assert!(manager.store.document().puzzle(&a.id).is_none());
    let linked = &manager.store.document().post(post.id).unwrap().linked_puzzle_ids;
    assert_eq!(linked, &vec![b.id.clone()], "only the deleted card is unlinked");
}

#[test]
fn test_lookup_is_case_insensitive() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("hallo")).unwrap();
    let puzzle = manager.store.create_puzzle(puzzle_from(post.id, "hallo")).unwrap();

    let upper = puzzle.id.to_uppercase();
    assert!(manager.store.document().puzzle(&upper).is_some());
    assert!(manager
        .store
        .document()
        .post_by_ref(&post.ref_id.to_uppercase())
        .is_some());
}
