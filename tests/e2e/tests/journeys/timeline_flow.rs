//! Timeline journey: a user writes, edits, pins, and deletes journal entries
//! across real file-backed sessions.

use lingolog_e2e_tests::fixtures;
use lingolog_e2e_tests::harness::TestStoreManager;
use lingolog_core::Speaker;

#[test]
fn test_write_and_reload_session() {
    let mut manager = TestStoreManager::new();

    let post = manager
        .store
        .create_post(fixtures::spoken_post("kommst du mit?", "de", Speaker::Partner))
        .unwrap();
    let reply = manager
        .store
        .add_reply(post.id, fixtures::post("ja, gerne"))
        .unwrap();

    // A later session sees exactly what the first one wrote.
    manager.reopen();
    let doc = manager.store.document();
    let loaded = doc.post(post.id).unwrap();
    assert_eq!(loaded.texts[0].content, "kommst du mit?");
    assert_eq!(loaded.texts[0].speaker, Speaker::Partner);
    assert_eq!(loaded.ref_id, post.ref_id);
    let replies = doc.replies_of(post.id);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, reply.id);
}

#[test]
fn test_edit_bumps_update_stamp() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("rough draft")).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(5));
    let edited = manager
        .store
        .update_post(post.id, fixtures::post("polished"))
        .unwrap();
    assert_eq!(edited.texts[0].content, "polished");
    assert!(edited.updated_at > post.updated_at);
    assert_eq!(edited.created_at, post.created_at);
    assert_eq!(edited.ref_id, post.ref_id, "edits never change the stable id");
}

#[test]
fn test_pin_survives_reload() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("merken!")).unwrap();
    manager.store.set_post_pinned(post.id, true).unwrap();

    manager.reopen();
    let loaded = manager.store.document().post(post.id).unwrap();
    assert!(loaded.pinned);
    assert!(loaded.pinned_at.is_some());

    manager.store.set_post_pinned(post.id, false).unwrap();
    manager.reopen();
    let loaded = manager.store.document().post(post.id).unwrap();
    assert!(!loaded.pinned);
    assert_eq!(loaded.pinned_at, None);
}

#[test]
fn test_delete_tombstones_only_while_replies_exist() {
    let mut manager = TestStoreManager::new();
    let post = manager.store.create_post(fixtures::post("parent")).unwrap();
    let reply = manager.store.add_reply(post.id, fixtures::post("child")).unwrap();

    manager.store.delete_post(post.id).unwrap();
    manager.reopen();
    let doc = manager.store.document();
    let tombstone = doc.post(post.id).unwrap();
    assert!(tombstone.is_deleted);
    assert!(tombstone.visible_texts().is_empty());
    assert_eq!(doc.replies_of(post.id).len(), 1);

    // Search never surfaces the tombstone.
    assert!(manager.store.search("parent").posts.is_empty());
    assert_eq!(manager.store.search("child").posts.len(), 1);

    manager.store.delete_reply(reply.id).unwrap();
    manager.store.delete_post(post.id).unwrap();
    manager.reopen();
    assert!(manager.store.document().post(post.id).is_none());
}

#[test]
fn test_ids_stay_unique_across_sessions() {
    let mut manager = TestStoreManager::new();
    let first = manager.store.create_post(fixtures::post("one")).unwrap();
    manager.reopen();
    let second = manager.store.create_post(fixtures::post("two")).unwrap();
    assert!(second.id > first.id);
    assert_ne!(first.ref_id, second.ref_id);
}
