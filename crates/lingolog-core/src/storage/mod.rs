//! Storage module - persistence gate and backends
//!
//! `Store` is the only write path: mutations go through it, it persists the
//! whole document after each one, and it enforces the storage budget.

mod backend;
mod store;

pub use backend::{FileStore, MemoryStore, TextStore, DOCUMENT_KEY};
pub use store::{
    MessageImport, PostDraft, PuzzleDraft, Result, SearchHits, Store, StoreError, TextDraft,
};
