//! Test Store Manager
//!
//! Provides isolated file-backed stores for testing:
//! - Temporary data directories that are automatically cleaned up
//! - Reopen support to exercise the load path against real files

use lingolog_core::{FileStore, Store};
use tempfile::TempDir;

/// Manager for file-backed test stores
///
/// Each instance owns a temporary data directory, so tests never interfere
/// with each other or with a real installation. `reopen` drops the in-memory
/// state and loads again from disk, exercising the full normalize-on-load
/// path.
///
/// # Example
///
/// ```rust,ignore
/// let mut manager = TestStoreManager::new();
/// manager.store.create_post(...)?;
/// manager.reopen();
/// assert_eq!(manager.store.document().posts.len(), 1);
/// ```
pub struct TestStoreManager {
    /// The store under test
    pub store: Store<FileStore>,
    /// Temporary directory (kept alive to prevent premature deletion)
    temp_dir: TempDir,
}

impl TestStoreManager {
    /// Create a store in a fresh temporary directory
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let backend = FileStore::open(temp_dir.path()).expect("open file store");
        Self {
            store: Store::open(backend),
            temp_dir,
        }
    }

    /// Create a store with a custom storage budget
    pub fn with_budget(budget: usize) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let backend = FileStore::open(temp_dir.path()).expect("open file store");
        Self {
            store: Store::open_with_budget(backend, budget),
            temp_dir,
        }
    }

    /// Discard in-memory state and reload from the same directory
    pub fn reopen(&mut self) {
        let backend = FileStore::open(self.temp_dir.path()).expect("reopen file store");
        self.store = Store::open(backend);
    }

    /// Write raw text directly to the document file, bypassing the store
    pub fn seed_raw(&self, text: &str) {
        let path = self
            .temp_dir
            .path()
            .join(format!("{}.json", lingolog_core::DOCUMENT_KEY));
        std::fs::write(path, text).expect("seed raw document");
    }
}

impl Default for TestStoreManager {
    fn default() -> Self {
        Self::new()
    }
}
