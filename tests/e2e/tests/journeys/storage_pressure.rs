//! Storage-pressure journey: image dedup, garbage collection, and budget
//! eviction against a real file backend.

use lingolog_e2e_tests::fixtures;
use lingolog_e2e_tests::harness::TestStoreManager;

#[test]
fn test_identical_images_share_one_payload() {
    let mut manager = TestStoreManager::new();
    let payload = fixtures::image_payload(2000, 'A');

    let mut drafts = fixtures::post("erstes Foto");
    drafts.image = Some(payload.clone());
    let first = manager.store.create_post(drafts).unwrap();

    let mut drafts = fixtures::post("gleiches Foto");
    drafts.image = Some(payload);
    let second = manager.store.create_post(drafts).unwrap();

    let doc = manager.store.document();
    assert_eq!(doc.images.len(), 1);
    assert_eq!(
        doc.post(first.id).unwrap().image_id,
        doc.post(second.id).unwrap().image_id
    );

    // Deleting one owner keeps the shared payload alive.
    manager.store.delete_post(first.id).unwrap();
    assert_eq!(manager.store.document().images.len(), 1);

    manager.store.delete_post(second.id).unwrap();
    assert!(manager.store.document().images.is_empty());
}

#[test]
fn test_clearing_an_image_collects_it() {
    let mut manager = TestStoreManager::new();
    let post = manager
        .store
        .create_post(fixtures::post_with_image("Foto weg", 2000))
        .unwrap();
    assert_eq!(manager.store.document().images.len(), 1);

    manager.store.set_post_image(post.id, None).unwrap();
    manager.reopen();
    let doc = manager.store.document();
    assert_eq!(doc.post(post.id).unwrap().image_id, None);
    assert!(doc.images.is_empty());
}

#[test]
fn test_budget_evicts_oldest_posts_first() {
    let mut manager = TestStoreManager::with_budget(6000);

    let oldest = manager
        .store
        .create_post(fixtures::post_with_image("alt", 4000))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newest = manager
        .store
        .create_post(fixtures::post_with_image("neu", 4000))
        .unwrap();

    let doc = manager.store.document();
    let evicted = doc.post(oldest.id).unwrap();
    assert_eq!(evicted.image_id, None);
    assert!(evicted.image_removed, "eviction is marked, not silent");

    // The newest post keeps its image as long as it fits.
    let survivor = doc.post(newest.id).unwrap();
    assert!(survivor.image_id.is_some());
    assert!(!survivor.image_removed);
}

#[test]
fn test_eviction_marker_survives_reload() {
    let mut manager = TestStoreManager::with_budget(6000);
    let post = manager
        .store
        .create_post(fixtures::post_with_image("a", 4000))
        .unwrap();
    manager
        .store
        .create_post(fixtures::post_with_image("b", 4000))
        .unwrap();

    // Reload on the default budget: the marker was persisted, the payload
    // is gone for good.
    manager.reopen();
    let loaded = manager.store.document().post(post.id).unwrap();
    assert!(loaded.image_removed);
    assert_eq!(loaded.image_id, None);
}

#[test]
fn test_text_only_documents_never_evict() {
    let mut manager = TestStoreManager::with_budget(500);
    for i in 0..20 {
        manager
            .store
            .create_post(fixtures::post(&format!("Eintrag {i}")))
            .unwrap();
    }
    // Over budget with nothing evictable: everything stays.
    let doc = manager.store.document();
    assert_eq!(doc.posts.len(), 20);
    assert!(doc.posts.iter().all(|p| !p.image_removed));
}
