//! Import/export journey: conversation imports, scoped exports, and
//! two-device reconciliation through document merges.

use lingolog_core::StoreError;
use lingolog_e2e_tests::fixtures;
use lingolog_e2e_tests::harness::TestStoreManager;

#[test]
fn test_conversation_import() {
    let mut manager = TestStoreManager::new();
    let outcome = manager
        .store
        .import_messages(fixtures::conversation(&["hallo", "hallo zusammen", "wie geht's"]))
        .unwrap();

    manager.reopen();
    let doc = manager.store.document();
    let post = doc.post(outcome.post_id).unwrap();
    assert_eq!(post.texts[0].content, "hallo");
    let replies = doc.replies_of(post.id);
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|r| r.post_id == post.id));
}

#[test]
fn test_invalid_conversation_leaves_no_trace() {
    let mut manager = TestStoreManager::new();
    let result = manager
        .store
        .import_messages(serde_json::json!([
            {"content": "valid"},
            {"content": ""}
        ]));
    assert!(matches!(result, Err(StoreError::Invalid(_))));

    manager.reopen();
    assert!(manager.store.document().posts.is_empty());
}

#[test]
fn test_two_device_reconciliation() {
    let mut device_a = TestStoreManager::new();
    let mut device_b = TestStoreManager::new();

    let post = device_a.store.create_post(fixtures::post("original")).unwrap();
    let snapshot = device_a.store.export_document().unwrap();

    // Device B receives the snapshot, then edits the post.
    device_b.store.import_document(snapshot.clone()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    device_b
        .store
        .update_post(post.id, fixtures::post("edited on b"))
        .unwrap();

    // The edit flows back to device A.
    let edited = device_b.store.export_document().unwrap();
    device_a.store.import_document(edited).unwrap();
    assert_eq!(
        device_a.store.document().post(post.id).unwrap().texts[0].content,
        "edited on b"
    );

    // Replaying the stale snapshot changes nothing.
    device_a.store.import_document(snapshot).unwrap();
    assert_eq!(
        device_a.store.document().post(post.id).unwrap().texts[0].content,
        "edited on b"
    );
}

#[test]
fn test_merge_is_an_id_union() {
    let mut manager = TestStoreManager::new();
    manager.store.create_post(fixtures::post("mine")).unwrap();

    let report = manager
        .store
        .import_document(fixtures::remote_document(50, "post-remote-aaaaaa", "theirs", 5))
        .unwrap();
    assert_eq!(report.posts.added, 1);

    let doc = manager.store.document();
    assert_eq!(doc.posts.len(), 2);
    assert!(doc.post(50).is_some());

    // Ids assigned after the merge clear the imported range.
    let fresh = manager.store.create_post(fixtures::post("later")).unwrap();
    assert!(fresh.id > 50);
}

#[test]
fn test_scoped_exports_partition_the_document() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post_with_image("mit Bild", 2000)).unwrap();
    manager
        .store
        .create_puzzle(lingolog_core::PuzzleDraft {
            text: "Bild".to_string(),
            sources: vec![lingolog_core::RefQuery::by_post(post.id)],
            ..Default::default()
        })
        .unwrap();

    let timeline = manager.store.export_timeline().unwrap();
    assert_eq!(timeline["posts"].as_array().unwrap().len(), 1);
    assert_eq!(timeline["images"].as_object().unwrap().len(), 1);
    assert!(timeline.get("puzzles").is_none());

    let puzzles = manager.store.export_puzzles().unwrap();
    assert_eq!(puzzles["puzzles"].as_array().unwrap().len(), 1);
    assert!(puzzles.get("posts").is_none());

    // A puzzle export imports cleanly into an empty store.
    let mut other = TestStoreManager::new();
    other.store.import_puzzles(puzzles).unwrap();
    assert_eq!(other.store.document().puzzles.len(), 1);
}

#[test]
fn test_import_rejects_scalars() {
    let mut manager = TestStoreManager::new();
    assert!(matches!(
        manager.store.import_value(serde_json::json!("plain string")),
        Err(StoreError::Invalid(_))
    ));
    assert!(matches!(
        manager.store.import_value(serde_json::json!(17)),
        Err(StoreError::Invalid(_))
    ));
}
