//! Store - the persistence gate and the high-level API
//!
//! One `Store` owns the in-memory document and a text-store backend. Every
//! mutating operation completes fully in memory, then the whole document is
//! serialized in a single write and the storage budget is enforced. Loading
//! never fails: corruption degrades to a default document with a warning.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::ident::{now_millis, stable_id};
use crate::images::{
    self, enforce_storage_budget, ensure_image_id, ingest_payload, remove_if_unused,
    ImageError, STORAGE_BUDGET_BYTES,
};
use crate::merge::{merge_documents, MergeReport};
use crate::model::{
    Document, DocumentStats, Post, PostText, Puzzle, PuzzleNote, Reply, Speaker, TextRef,
    SCHEMA_VERSION,
};
use crate::refs::{self, RefQuery};
use crate::schema::{document_from_value, normalize_document};

use super::backend::{FileStore, TextStore, DOCUMENT_KEY};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend IO error
    #[error("storage backend error: {0}")]
    Io(#[from] std::io::Error),
    /// Document serialization error
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Image ingestion error
    #[error("image error: {0}")]
    Image(#[from] ImageError),
    /// Record not found
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid input or import payload; the one family of errors callers
    /// must surface to the user
    #[error("invalid input: {0}")]
    Invalid(String),
}

/// Store result type
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for one text fragment
#[derive(Debug, Clone, Default)]
pub struct TextDraft {
    /// Fragment content
    pub content: String,
    /// Language tag
    pub language: Option<String>,
    /// Reading aid
    pub pronunciation: Option<String>,
    /// Who said it
    pub speaker: Speaker,
}

impl TextDraft {
    /// Plain fragment with no metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    fn into_text(self) -> PostText {
        PostText {
            content: self.content,
            language: self.language.filter(|s| !s.is_empty()),
            pronunciation: self.pronunciation.filter(|s| !s.is_empty()),
            speaker: self.speaker,
        }
    }
}

/// Input for creating or editing a post or reply
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    /// Ordered fragments; at least one non-empty content required
    pub texts: Vec<TextDraft>,
    /// Tags, deduplicated on normalization
    pub tags: Vec<String>,
    /// Image payload (data URL); downscaled if oversized
    pub image: Option<String>,
    /// Source link
    pub source_url: Option<String>,
}

/// Input for creating a puzzle card
#[derive(Debug, Clone, Default)]
pub struct PuzzleDraft {
    /// The phrase under study; required
    pub text: String,
    /// Language tag
    pub language: Option<String>,
    /// Reading aid
    pub pronunciation: Option<String>,
    /// Who said it
    pub speaker: Speaker,
    /// Clue references into the timeline
    pub sources: Vec<RefQuery>,
    /// Tags
    pub tags: Vec<String>,
}

/// Outcome of a message-array import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageImport {
    /// Id of the post created from the first message
    pub post_id: i64,
    /// Ids of the replies created from the remaining messages
    pub reply_ids: Vec<i64>,
}

/// Search hits over posts and puzzles
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    /// Matching live posts
    pub posts: Vec<Post>,
    /// Matching puzzles
    pub puzzles: Vec<Puzzle>,
}

// ============================================================================
// SCOPED EXPORTS
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimelineExport<'a> {
    version: u32,
    last_id: i64,
    posts: &'a [Post],
    replies: &'a [Reply],
    images: &'a std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PuzzleExport<'a> {
    version: u32,
    last_id: i64,
    puzzles: &'a [Puzzle],
}

// ============================================================================
// STORE
// ============================================================================

/// The document plus its backend: every mutation persists before returning
pub struct Store<S: TextStore> {
    backend: S,
    document: Document,
    budget: usize,
}

impl Store<FileStore> {
    /// Open the store in the platform data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(FileStore::open_default()?))
    }
}

impl<S: TextStore> Store<S> {
    /// Load from the backend, normalizing whatever is found
    ///
    /// Unreadable or malformed state degrades to a default document with a
    /// warning; this never fails on corruption.
    pub fn open(backend: S) -> Self {
        let document = match backend.read(DOCUMENT_KEY) {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => document_from_value(value),
                Err(err) => {
                    warn!(error = %err, "persisted document is not valid JSON, starting fresh");
                    document_from_value(Value::Null)
                }
            },
            Ok(None) => {
                // First run: nothing stored yet.
                let mut doc = Document::default();
                normalize_document(&mut doc);
                doc
            }
            Err(err) => {
                warn!(error = %err, "could not read persisted document, starting fresh");
                document_from_value(Value::Null)
            }
        };
        Self {
            backend,
            document,
            budget: STORAGE_BUDGET_BYTES,
        }
    }

    /// Open with a custom storage budget (tests, constrained targets)
    pub fn open_with_budget(backend: S, budget: usize) -> Self {
        let mut store = Self::open(backend);
        store.budget = budget;
        store
    }

    /// Read access to the document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Serialize the document to the backend and enforce the storage budget
    ///
    /// Eviction and the follow-up write happen inside the same logical
    /// operation, so the persisted state is always the post-eviction one.
    pub fn persist(&mut self) -> Result<()> {
        let serialized = serde_json::to_string(&self.document)?;
        self.backend.write(DOCUMENT_KEY, &serialized)?;

        let report = enforce_storage_budget(&mut self.document, self.budget);
        if !report.is_empty() {
            info!(
                evicted = report.evicted_posts.len(),
                size = report.final_size,
                "storage budget eviction ran"
            );
            let serialized = serde_json::to_string(&self.document)?;
            self.backend.write(DOCUMENT_KEY, &serialized)?;
        }
        Ok(())
    }

    fn validated_texts(&self, texts: Vec<TextDraft>) -> Result<Vec<PostText>> {
        if !texts.iter().any(|t| !t.content.trim().is_empty()) {
            return Err(StoreError::Invalid(
                "at least one non-empty text is required".to_string(),
            ));
        }
        Ok(texts.into_iter().map(TextDraft::into_text).collect())
    }

    fn store_image(&mut self, payload: Option<String>) -> Result<Option<String>> {
        match payload {
            Some(payload) => {
                let prepared = ingest_payload(&payload)?;
                Ok(Some(ensure_image_id(&mut self.document, &prepared)))
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // TIMELINE
    // ========================================================================

    /// Create a post and persist
    pub fn create_post(&mut self, draft: PostDraft) -> Result<Post> {
        let texts = self.validated_texts(draft.texts)?;
        let image_id = self.store_image(draft.image)?;
        let now = now_millis();
        let post = Post {
            id: self.document.next_numeric_id(),
            ref_id: stable_id("post"),
            texts,
            tags: draft.tags,
            image_id,
            created_at: now,
            updated_at: now,
            source_url: draft.source_url.filter(|s| !s.is_empty()),
            ..Default::default()
        };
        let id = post.id;
        self.document.posts.push(post);
        normalize_document(&mut self.document);
        self.persist()?;
        // Return the record as stored, after normalization (tag dedup etc.)
        self.document
            .post(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))
    }

    /// Replace a post's texts, tags, and source link, and persist
    pub fn update_post(&mut self, id: i64, draft: PostDraft) -> Result<Post> {
        let texts = self.validated_texts(draft.texts)?;
        let image_id = self.store_image(draft.image)?;
        let previous_image = {
            let post = self
                .document
                .post_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
            let previous = post.image_id.clone();
            post.texts = texts;
            post.tags = draft.tags;
            post.source_url = draft.source_url.filter(|s| !s.is_empty());
            if let Some(image_id) = image_id {
                post.image_id = Some(image_id);
                post.image_removed = false;
            }
            post.updated_at = now_millis();
            previous
        };
        if let Some(previous) = previous_image {
            remove_if_unused(&mut self.document, &previous);
        }
        normalize_document(&mut self.document);
        self.persist()?;
        self.document
            .post(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))
    }

    /// Delete a post and persist
    ///
    /// A post that still has replies becomes a tombstone: it keeps its ids
    /// and timestamps, loses its texts and image, and stays in the document
    /// for referential integrity. A reply-less post is removed physically.
    pub fn delete_post(&mut self, id: i64) -> Result<()> {
        if self.document.post(id).is_none() {
            return Err(StoreError::NotFound(format!("post {id}")));
        }
        let has_replies = self.document.replies.iter().any(|r| r.post_id == id);
        let image_id = if has_replies {
            let post = self
                .document
                .post_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
            post.is_deleted = true;
            post.texts.clear();
            post.updated_at = now_millis();
            post.image_removed = false;
            post.image_id.take()
        } else {
            let post = self
                .document
                .posts
                .iter()
                .position(|p| p.id == id)
                .map(|i| self.document.posts.remove(i))
                .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
            post.image_id
        };
        if let Some(image_id) = image_id {
            remove_if_unused(&mut self.document, &image_id);
        }
        self.persist()
    }

    /// Create a reply under a post and persist
    ///
    /// The parent is a strong reference: it must exist, though it may be a
    /// tombstone (replying keeps a deleted post's thread alive).
    pub fn add_reply(&mut self, post_id: i64, draft: PostDraft) -> Result<Reply> {
        if self.document.post(post_id).is_none() {
            return Err(StoreError::NotFound(format!("post {post_id}")));
        }
        let texts = self.validated_texts(draft.texts)?;
        let image_id = self.store_image(draft.image)?;
        let now = now_millis();
        let reply = Reply {
            id: self.document.next_numeric_id(),
            ref_id: stable_id("reply"),
            post_id,
            texts,
            tags: draft.tags,
            image_id,
            created_at: now,
            updated_at: now,
        };
        let id = reply.id;
        self.document.replies.push(reply);
        normalize_document(&mut self.document);
        self.persist()?;
        // Return the record as stored, after normalization (tag dedup etc.)
        self.document
            .reply(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("reply {id}")))
    }

    /// Replace a reply's texts and tags, and persist
    pub fn update_reply(&mut self, id: i64, draft: PostDraft) -> Result<Reply> {
        let texts = self.validated_texts(draft.texts)?;
        let image_id = self.store_image(draft.image)?;
        let previous_image = {
            let reply = self
                .document
                .reply_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("reply {id}")))?;
            let previous = reply.image_id.clone();
            reply.texts = texts;
            reply.tags = draft.tags;
            if let Some(image_id) = image_id {
                reply.image_id = Some(image_id);
            }
            reply.updated_at = now_millis();
            previous
        };
        // The usage scan keeps the payload when this reply (or anyone else)
        // still points at it, so this is safe even without a replacement.
        if let Some(previous) = previous_image {
            remove_if_unused(&mut self.document, &previous);
        }
        normalize_document(&mut self.document);
        self.persist()?;
        self.document
            .reply(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("reply {id}")))
    }

    /// Delete a reply and persist; independent of its parent's state
    pub fn delete_reply(&mut self, id: i64) -> Result<()> {
        let reply = self
            .document
            .replies
            .iter()
            .position(|r| r.id == id)
            .map(|i| self.document.replies.remove(i))
            .ok_or_else(|| StoreError::NotFound(format!("reply {id}")))?;
        if let Some(image_id) = reply.image_id {
            remove_if_unused(&mut self.document, &image_id);
        }
        self.persist()
    }

    /// Attach, replace, or clear a post's image, and persist
    pub fn set_post_image(&mut self, id: i64, payload: Option<String>) -> Result<()> {
        let new_id = self.store_image(payload)?;
        let previous = {
            let post = self
                .document
                .post_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
            let previous = post.image_id.take();
            post.image_id = new_id;
            post.image_removed = false;
            post.updated_at = now_millis();
            previous
        };
        if let Some(previous) = previous {
            remove_if_unused(&mut self.document, &previous);
        }
        self.persist()
    }

    /// Attach, replace, or clear a reply's image, and persist
    pub fn set_reply_image(&mut self, id: i64, payload: Option<String>) -> Result<()> {
        let new_id = self.store_image(payload)?;
        let previous = {
            let reply = self
                .document
                .reply_mut(id)
                .ok_or_else(|| StoreError::NotFound(format!("reply {id}")))?;
            let previous = reply.image_id.take();
            reply.image_id = new_id;
            reply.updated_at = now_millis();
            previous
        };
        if let Some(previous) = previous {
            remove_if_unused(&mut self.document, &previous);
        }
        self.persist()
    }

    /// Pin or unpin a post, and persist
    pub fn set_post_pinned(&mut self, id: i64, pinned: bool) -> Result<()> {
        let post = self
            .document
            .post_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
        post.pinned = pinned;
        post.pinned_at = pinned.then(now_millis);
        post.updated_at = now_millis();
        self.persist()
    }

    // ========================================================================
    // TAGS
    // ========================================================================

    /// Add tags to a post and persist; duplicates collapse case-insensitively
    pub fn add_post_tags(&mut self, id: i64, tags: Vec<String>) -> Result<()> {
        let post = self
            .document
            .post_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
        post.tags.extend(tags);
        post.updated_at = now_millis();
        normalize_document(&mut self.document);
        self.persist()
    }

    /// Remove a tag from a post and persist (ASCII case-insensitive)
    pub fn remove_post_tag(&mut self, id: i64, tag: &str) -> Result<()> {
        let post = self
            .document
            .post_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;
        post.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        post.updated_at = now_millis();
        self.persist()
    }

    /// Add tags to a puzzle and persist
    pub fn add_puzzle_tags(&mut self, key: &str, tags: Vec<String>) -> Result<()> {
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        puzzle.tags.extend(tags);
        puzzle.updated_at = now_millis();
        normalize_document(&mut self.document);
        self.persist()
    }

    /// Remove a tag from a puzzle and persist (ASCII case-insensitive)
    pub fn remove_puzzle_tag(&mut self, key: &str, tag: &str) -> Result<()> {
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        puzzle.tags.retain(|t| !t.eq_ignore_ascii_case(tag));
        puzzle.updated_at = now_millis();
        self.persist()
    }

    /// Every tag in use across posts, replies, and puzzles, first-seen
    /// casing kept, sorted case-insensitively
    pub fn all_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut tags: Vec<String> = self
            .document
            .posts
            .iter()
            .flat_map(|p| p.tags.iter())
            .chain(self.document.replies.iter().flat_map(|r| r.tags.iter()))
            .chain(self.document.puzzles.iter().flat_map(|p| p.tags.iter()))
            .filter(|t| seen.insert(t.to_ascii_lowercase()))
            .cloned()
            .collect();
        tags.sort_by_key(|t| t.to_ascii_lowercase());
        tags
    }

    // ========================================================================
    // PUZZLES
    // ========================================================================

    /// Create a puzzle card and persist
    ///
    /// Each resolvable clue source also links the target post back to the
    /// new puzzle, keeping the two weak directions in step by convention.
    pub fn create_puzzle(&mut self, draft: PuzzleDraft) -> Result<Puzzle> {
        if draft.text.trim().is_empty() {
            return Err(StoreError::Invalid("puzzle text is required".to_string()));
        }
        let clues: Vec<TextRef> = draft
            .sources
            .iter()
            .map(|query| refs::normalize(&self.document, query).unwrap_or_else(TextRef::placeholder))
            .collect();
        let n = self.document.next_numeric_id();
        let now = now_millis();
        let puzzle = Puzzle {
            id: format!("puzzle_{n}"),
            ref_id: stable_id("puzzle"),
            text: draft.text,
            language: draft.language.filter(|s| !s.is_empty()),
            pronunciation: draft.pronunciation.filter(|s| !s.is_empty()),
            speaker: draft.speaker,
            post_refs: clues.clone(),
            tags: draft.tags,
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        for clue in &clues {
            if let Some(post) = clue.post_id.and_then(|pid| self.document.post_mut(pid)) {
                if !post.linked_puzzle_ids.contains(&puzzle.id) {
                    post.linked_puzzle_ids.push(puzzle.id.clone());
                }
            }
        }
        let id = puzzle.id.clone();
        self.document.puzzles.push(puzzle);
        normalize_document(&mut self.document);
        self.persist()?;
        // Return the record as stored, after normalization (tag dedup etc.)
        self.document
            .puzzle(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {id}")))
    }

    /// Replace a puzzle's study fields and persist
    ///
    /// An empty `sources` list keeps the existing clues; a non-empty one
    /// replaces them and re-links the affected posts.
    pub fn update_puzzle(&mut self, key: &str, draft: PuzzleDraft) -> Result<Puzzle> {
        if draft.text.trim().is_empty() {
            return Err(StoreError::Invalid("puzzle text is required".to_string()));
        }
        let new_clues: Option<Vec<TextRef>> = if draft.sources.is_empty() {
            None
        } else {
            Some(
                draft
                    .sources
                    .iter()
                    .map(|query| {
                        refs::normalize(&self.document, query)
                            .unwrap_or_else(TextRef::placeholder)
                    })
                    .collect(),
            )
        };
        let updated = {
            let puzzle = self
                .document
                .puzzle_mut(key)
                .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
            puzzle.text = draft.text;
            puzzle.language = draft.language.filter(|s| !s.is_empty());
            puzzle.pronunciation = draft.pronunciation.filter(|s| !s.is_empty());
            puzzle.speaker = draft.speaker;
            puzzle.tags = draft.tags;
            if let Some(clues) = new_clues {
                puzzle.post_refs = clues;
            }
            puzzle.updated_at = now_millis();
            puzzle.clone()
        };
        // Re-derive the post-side back-links from the current clue set.
        for post in &mut self.document.posts {
            post.linked_puzzle_ids
                .retain(|id| !id.eq_ignore_ascii_case(&updated.id));
        }
        for clue in &updated.post_refs {
            if let Some(post) = clue.post_id.and_then(|pid| self.document.post_mut(pid)) {
                if !post.linked_puzzle_ids.contains(&updated.id) {
                    post.linked_puzzle_ids.push(updated.id.clone());
                }
            }
        }
        normalize_document(&mut self.document);
        self.persist()?;
        self.document
            .puzzle(&updated.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {}", updated.id)))
    }

    /// Delete a puzzle and persist; links pointing at it are left to dangle
    pub fn delete_puzzle(&mut self, key: &str) -> Result<()> {
        let position = self
            .document
            .puzzles
            .iter()
            .position(|p| p.id.eq_ignore_ascii_case(key) || p.ref_id.eq_ignore_ascii_case(key))
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        let puzzle = self.document.puzzles.remove(position);
        for post in &mut self.document.posts {
            post.linked_puzzle_ids
                .retain(|id| !id.eq_ignore_ascii_case(&puzzle.id));
        }
        self.persist()
    }

    /// Record a puzzle's solution and persist
    pub fn solve_puzzle(
        &mut self,
        key: &str,
        meaning: String,
        alternatives: Vec<String>,
        examples: Vec<String>,
    ) -> Result<Puzzle> {
        if meaning.trim().is_empty() {
            return Err(StoreError::Invalid("meaning is required".to_string()));
        }
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        puzzle.is_solved = true;
        puzzle.meaning = Some(meaning);
        puzzle.alternatives = alternatives;
        puzzle.examples = examples;
        puzzle.updated_at = now_millis();
        let solved = puzzle.clone();
        self.persist()?;
        Ok(solved)
    }

    /// Append a note to a puzzle and persist
    pub fn add_puzzle_note(&mut self, key: &str, text: String) -> Result<PuzzleNote> {
        if text.trim().is_empty() {
            return Err(StoreError::Invalid("note text is required".to_string()));
        }
        if self.document.puzzle(key).is_none() {
            return Err(StoreError::NotFound(format!("puzzle {key}")));
        }
        let note = PuzzleNote {
            id: self.document.next_numeric_id(),
            text,
            created_at: now_millis(),
        };
        if let Some(puzzle) = self.document.puzzle_mut(key) {
            puzzle.notes.push(note.clone());
            puzzle.updated_at = note.created_at;
        }
        self.persist()?;
        Ok(note)
    }

    /// Record that one puzzle relates to another, and persist
    ///
    /// Stored one-directionally on the first puzzle; the relation is treated
    /// as symmetric by convention when rendered.
    pub fn relate_puzzles(&mut self, key: &str, other_key: &str) -> Result<()> {
        let other_id = self
            .document
            .puzzle(other_key)
            .map(|p| p.id.clone())
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {other_key}")))?;
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        if !puzzle.related_puzzle_ids.contains(&other_id) {
            puzzle.related_puzzle_ids.push(other_id);
            puzzle.updated_at = now_millis();
        }
        self.persist()
    }

    /// Remove a recorded relation between two puzzles, and persist
    pub fn unrelate_puzzles(&mut self, key: &str, other_key: &str) -> Result<()> {
        let other_id = self
            .document
            .puzzle(other_key)
            .map(|p| p.id.clone())
            .unwrap_or_else(|| other_key.to_string());
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        let before = puzzle.related_puzzle_ids.len();
        puzzle
            .related_puzzle_ids
            .retain(|id| !id.eq_ignore_ascii_case(&other_id));
        if puzzle.related_puzzle_ids.len() != before {
            puzzle.updated_at = now_millis();
        }
        self.persist()
    }

    /// Pin or unpin a puzzle, and persist
    pub fn set_puzzle_pinned(&mut self, key: &str, pinned: bool) -> Result<()> {
        let puzzle = self
            .document
            .puzzle_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("puzzle {key}")))?;
        puzzle.pinned = pinned;
        puzzle.pinned_at = pinned.then(now_millis);
        puzzle.updated_at = now_millis();
        self.persist()
    }

    // ========================================================================
    // REFERENCES
    // ========================================================================

    /// Copyable token for a fragment reference; `None` if unresolvable
    pub fn ref_token(&self, query: &RefQuery) -> Option<String> {
        refs::normalize(&self.document, query).map(|r| refs::format_token(&r))
    }

    /// Parse a token back into a normalized reference
    pub fn resolve_token(&self, token: &str) -> Option<TextRef> {
        refs::parse_token(&self.document, token)
    }

    /// Display text for a stored reference, with dangling fallback
    pub fn display_ref(&self, r: &TextRef) -> String {
        refs::display_text(&self.document, r)
    }

    // ========================================================================
    // SEARCH AND STATS
    // ========================================================================

    /// Case-insensitive substring search over post texts and puzzle content
    pub fn search(&self, query: &str) -> SearchHits {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return SearchHits::default();
        }
        let reply_matches: std::collections::HashSet<i64> = self
            .document
            .replies
            .iter()
            .filter(|r| {
                r.texts
                    .iter()
                    .any(|t| t.content.to_lowercase().contains(&needle))
            })
            .map(|r| r.post_id)
            .collect();
        let posts = self
            .document
            .posts
            .iter()
            .filter(|p| !p.is_deleted)
            .filter(|p| {
                reply_matches.contains(&p.id)
                    || p.texts
                        .iter()
                        .any(|t| t.content.to_lowercase().contains(&needle))
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        let puzzles = self
            .document
            .puzzles
            .iter()
            .filter(|p| {
                p.text.to_lowercase().contains(&needle)
                    || p.meaning
                        .as_deref()
                        .is_some_and(|m| m.to_lowercase().contains(&needle))
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        SearchHits { posts, puzzles }
    }

    /// Document statistics plus the current serialized size
    pub fn stats(&self) -> (DocumentStats, usize) {
        (self.document.stats(), images::serialized_size(&self.document))
    }

    // ========================================================================
    // IMPORT / EXPORT
    // ========================================================================

    /// Import a payload, dispatching on its top-level shape
    ///
    /// Arrays are treated as conversation-message imports; objects as full
    /// (or partial) documents to merge. Anything else is invalid.
    pub fn import_value(&mut self, value: Value) -> Result<MergeReport> {
        match value {
            Value::Array(_) => {
                self.import_messages(value)?;
                Ok(MergeReport::default())
            }
            value @ Value::Object(_) => self.import_document(value),
            _ => Err(StoreError::Invalid(
                "import payload must be a JSON object or array".to_string(),
            )),
        }
    }

    /// Merge a full or partial document payload and persist
    pub fn import_document(&mut self, value: Value) -> Result<MergeReport> {
        if !value.is_object() {
            return Err(StoreError::Invalid(
                "import payload must be a JSON object".to_string(),
            ));
        }
        // Incoming records merge as raw JSON so that conflicts overlay onto
        // the existing record field by field; the combined result is
        // normalized once inside the merge.
        let report = merge_documents(&mut self.document, value);
        self.persist()?;
        Ok(report)
    }

    /// Import a bare message array: first message becomes a post, the rest
    /// become its replies, and persist
    pub fn import_messages(&mut self, value: Value) -> Result<MessageImport> {
        let items = match value {
            Value::Array(items) => items,
            _ => {
                return Err(StoreError::Invalid(
                    "conversation import must be a JSON array".to_string(),
                ))
            }
        };
        if items.is_empty() {
            return Err(StoreError::Invalid(
                "conversation import is empty".to_string(),
            ));
        }
        let mut drafts = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let Value::Object(map) = item else {
                return Err(StoreError::Invalid(format!(
                    "message {i} is not an object"
                )));
            };
            let content = map
                .get("content")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if content.is_empty() {
                return Err(StoreError::Invalid(format!("message {i} has no content")));
            }
            let field = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            drafts.push(TextDraft {
                content: content.to_string(),
                language: field("language"),
                pronunciation: field("pronunciation"),
                speaker: field("speaker")
                    .map(|s| Speaker::parse_name(&s))
                    .unwrap_or_default(),
            });
        }

        let mut drafts = drafts.into_iter();
        let first = drafts.next().ok_or_else(|| {
            StoreError::Invalid("conversation import is empty".to_string())
        })?;
        let post = self.create_post(PostDraft {
            texts: vec![first],
            ..Default::default()
        })?;
        let mut outcome = MessageImport {
            post_id: post.id,
            reply_ids: vec![],
        };
        for draft in drafts {
            let reply = self.add_reply(
                post.id,
                PostDraft {
                    texts: vec![draft],
                    ..Default::default()
                },
            )?;
            outcome.reply_ids.push(reply.id);
        }
        Ok(outcome)
    }

    /// Import puzzles: a bare puzzle array or `{"puzzles": [...]}`, and
    /// persist
    pub fn import_puzzles(&mut self, value: Value) -> Result<MergeReport> {
        let wrapped = match value {
            Value::Array(items) => serde_json::json!({ "puzzles": items }),
            value @ Value::Object(_) => {
                if value.get("puzzles").map(Value::is_array) != Some(true) {
                    return Err(StoreError::Invalid(
                        "puzzle import must contain a puzzles array".to_string(),
                    ));
                }
                value
            }
            _ => {
                return Err(StoreError::Invalid(
                    "puzzle import must be a JSON array or object".to_string(),
                ))
            }
        };
        self.import_document(wrapped)
    }

    /// Export the full document
    pub fn export_document(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.document)?)
    }

    /// Export the timeline scope: posts, replies, and the shared image map
    pub fn export_timeline(&self) -> Result<Value> {
        Ok(serde_json::to_value(TimelineExport {
            version: SCHEMA_VERSION,
            last_id: self.document.last_id,
            posts: &self.document.posts,
            replies: &self.document.replies,
            images: &self.document.images,
        })?)
    }

    /// Export the puzzle scope
    pub fn export_puzzles(&self) -> Result<Value> {
        Ok(serde_json::to_value(PuzzleExport {
            version: SCHEMA_VERSION,
            last_id: self.document.last_id,
            puzzles: &self.document.puzzles,
        })?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
