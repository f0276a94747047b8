//! # Lingolog Core
//!
//! Data engine for a personal language-learning journal. One JSON document
//! holds the whole corpus: a timeline of posts and replies, puzzle cards cut
//! from them, and a shared image store, all sized for a small synchronous
//! key-value backend.
//!
//! - **Schema normalizer**: loads any historical document shape and migrates
//!   it to the current schema; loading never fails on drift
//! - **Stable identifiers**: collision-resistant string ids next to the
//!   legacy numeric counter
//! - **Reference resolver**: puzzle clues point into the timeline by stable
//!   id and fragment index, with copyable `refId.index` tokens
//! - **Image store**: content-deduplicated payloads with ingestion-time
//!   downscaling and oldest-first eviction under a storage budget
//! - **Merge engine**: keyed last-write-wins reconciliation for imports
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lingolog_core::{MemoryStore, PostDraft, Store, TextDraft};
//!
//! let mut store = Store::open(MemoryStore::new());
//!
//! let post = store.create_post(PostDraft {
//!     texts: vec![TextDraft::new("Guten Morgen")],
//!     ..Default::default()
//! })?;
//!
//! let hits = store.search("morgen");
//! assert_eq!(hits.posts[0].id, post.id);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod ident;
pub mod images;
pub mod merge;
pub mod model;
pub mod refs;
pub mod schema;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Document model
pub use model::{
    Document, DocumentStats, Post, PostText, Puzzle, PuzzleNote, Reply, ReviewEntry, ReviewState,
    Speaker, TextRef, SCHEMA_VERSION,
};

// Schema normalizer
pub use schema::{document_from_value, normalize_document};

// References
pub use refs::{Fragment, RefQuery};

// Images
pub use images::{EvictionReport, ImageError, STORAGE_BUDGET_BYTES};

// Merge engine
pub use merge::{merge_documents, MergeCounts, MergeReport};

// Storage layer
pub use storage::{
    FileStore, MemoryStore, MessageImport, PostDraft, PuzzleDraft, Result, SearchHits, Store,
    StoreError, TextDraft, TextStore, DOCUMENT_KEY,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
