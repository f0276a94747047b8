//! The document - everything the app persists, as one value
//!
//! A single in-memory structure owns all collections. There is no database;
//! the whole document is serialized to the text store after each logical
//! mutation and reloaded on open.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::post::{Post, Reply};
use super::puzzle::Puzzle;

/// Current schema version, bumped on every persisted-shape change
pub const SCHEMA_VERSION: u32 = 4;

// ============================================================================
// DOCUMENT
// ============================================================================

/// The persisted document: all posts, replies, puzzles, and images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Schema version tag for migration
    pub version: u32,
    /// Monotonic counter backing numeric id assignment; always >= the
    /// largest numeric id present in posts and replies
    pub last_id: i64,
    /// Timeline entries
    #[serde(default)]
    pub posts: Vec<Post>,
    /// Replies, keyed to posts by `post_id`
    #[serde(default)]
    pub replies: Vec<Reply>,
    /// Puzzle cards
    #[serde(default)]
    pub puzzles: Vec<Puzzle>,
    /// Embedded images: image id -> data-URL payload
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            last_id: 0,
            posts: vec![],
            replies: vec![],
            puzzles: vec![],
            images: BTreeMap::new(),
        }
    }
}

impl Document {
    /// Mint the next numeric id, advancing the counter
    pub fn next_numeric_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Largest numeric id present in posts, replies, and puzzle notes
    pub fn max_numeric_id(&self) -> i64 {
        let posts = self.posts.iter().map(|p| p.id);
        let replies = self.replies.iter().map(|r| r.id);
        let notes = self
            .puzzles
            .iter()
            .flat_map(|p| p.notes.iter().map(|n| n.id));
        posts.chain(replies).chain(notes).max().unwrap_or(0)
    }

    // ========== Lookups (all return Option, never panic) ==========

    /// Find a post by numeric id
    pub fn post(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Find a post by numeric id, mutably
    pub fn post_mut(&mut self, id: i64) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == id)
    }

    /// Find a post by stable reference id (ASCII case-insensitive)
    pub fn post_by_ref(&self, ref_id: &str) -> Option<&Post> {
        self.posts
            .iter()
            .find(|p| !p.ref_id.is_empty() && p.ref_id.eq_ignore_ascii_case(ref_id))
    }

    /// Find a reply by numeric id
    pub fn reply(&self, id: i64) -> Option<&Reply> {
        self.replies.iter().find(|r| r.id == id)
    }

    /// Find a reply by numeric id, mutably
    pub fn reply_mut(&mut self, id: i64) -> Option<&mut Reply> {
        self.replies.iter_mut().find(|r| r.id == id)
    }

    /// Find a reply by stable reference id (ASCII case-insensitive)
    pub fn reply_by_ref(&self, ref_id: &str) -> Option<&Reply> {
        self.replies
            .iter()
            .find(|r| !r.ref_id.is_empty() && r.ref_id.eq_ignore_ascii_case(ref_id))
    }

    /// Replies belonging to a post, in creation order
    pub fn replies_of(&self, post_id: i64) -> Vec<&Reply> {
        let mut replies: Vec<&Reply> = self
            .replies
            .iter()
            .filter(|r| r.post_id == post_id)
            .collect();
        replies.sort_by_key(|r| (r.created_at, r.id));
        replies
    }

    /// Find a puzzle by its string id or its stable reference id
    pub fn puzzle(&self, key: &str) -> Option<&Puzzle> {
        self.puzzles.iter().find(|p| {
            p.id.eq_ignore_ascii_case(key)
                || (!p.ref_id.is_empty() && p.ref_id.eq_ignore_ascii_case(key))
        })
    }

    /// Find a puzzle by its string id or stable reference id, mutably
    pub fn puzzle_mut(&mut self, key: &str) -> Option<&mut Puzzle> {
        self.puzzles.iter_mut().find(|p| {
            p.id.eq_ignore_ascii_case(key)
                || (!p.ref_id.is_empty() && p.ref_id.eq_ignore_ascii_case(key))
        })
    }

    /// Gather statistics for display
    pub fn stats(&self) -> DocumentStats {
        let solved = self.puzzles.iter().filter(|p| p.is_solved).count();
        DocumentStats {
            posts: self.posts.iter().filter(|p| !p.is_deleted).count(),
            tombstones: self.posts.iter().filter(|p| p.is_deleted).count(),
            replies: self.replies.len(),
            puzzles: self.puzzles.len(),
            solved_puzzles: solved,
            images: self.images.len(),
            image_bytes: self.images.values().map(String::len).sum(),
        }
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Counts over the document, for the stats surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    /// Live (non-tombstoned) posts
    pub posts: usize,
    /// Tombstoned posts retained for their replies
    pub tombstones: usize,
    /// Replies across all posts
    pub replies: usize,
    /// Puzzle cards
    pub puzzles: usize,
    /// Puzzles with a recorded solution
    pub solved_puzzles: usize,
    /// Stored images
    pub images: usize,
    /// Total bytes of encoded image payloads
    pub image_bytes: usize,
}

// ============================================================================
// TESTS
// ============================================================================
