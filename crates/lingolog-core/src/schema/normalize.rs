//! Schema normalizer
//!
//! Runs on every load and after every import-merge. Repairs schema drift:
//! backfills stable ref ids, unifies speaker aliases, copies retired legacy
//! fields forward (`liked` -> `pinned`, `time` -> `createdAt`), coerces
//! malformed arrays to empty defaults, and re-normalizes puzzle clue
//! references through the resolver. Idempotent: a second run over its own
//! output changes nothing.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::ident::{now_millis, stable_id};
use crate::model::{
    Document, Post, PostText, Puzzle, PuzzleNote, Reply, ReviewEntry, ReviewState, Speaker,
    TextRef, SCHEMA_VERSION,
};
use crate::refs::{self, RefQuery};

use super::raw::{
    record_list, string_list, RawDocument, RawNote, RawPost, RawPuzzle, RawRef, RawReply,
    RawReview, RawText,
};

// ============================================================================
// TOP-LEVEL ENTRY
// ============================================================================

/// Build a canonical document from an untrusted JSON value
///
/// A top-level value that is not an object resets to the empty default with a
/// warning; recoverable fields of a partially-broken object are kept. This
/// never returns an error.
pub fn document_from_value(value: Value) -> Document {
    if !value.is_object() {
        warn!("persisted document is not a JSON object, resetting to default");
        return normalized_default();
    }
    let raw: RawDocument = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "unreadable persisted document, resetting to default");
            return normalized_default();
        }
    };

    let mut doc = Document {
        version: raw.version.unwrap_or(0).max(0) as u32,
        last_id: raw.last_id.unwrap_or(0).max(0),
        posts: record_list::<RawPost>(raw.posts)
            .into_iter()
            .map(post_from_raw)
            .collect(),
        replies: record_list::<RawReply>(raw.replies)
            .into_iter()
            .map(reply_from_raw)
            .collect(),
        puzzles: record_list::<RawPuzzle>(raw.puzzles)
            .into_iter()
            .map(puzzle_from_raw)
            .collect(),
        images: match raw.images {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
            _ => Default::default(),
        },
    };
    normalize_document(&mut doc);
    doc
}

fn normalized_default() -> Document {
    let mut doc = Document::default();
    normalize_document(&mut doc);
    doc
}

// ============================================================================
// RAW -> CANONICAL
// ============================================================================

fn speaker_from_raw(speaker: Option<String>, person: Option<String>) -> Speaker {
    // The modern key wins over the legacy duplicate.
    speaker
        .or(person)
        .map(|s| Speaker::parse_name(&s))
        .unwrap_or_default()
}

fn texts_from_value(value: Option<Value>) -> Vec<PostText> {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return vec![],
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            // Oldest documents stored bare strings.
            Value::String(content) => Some(PostText::new(content)),
            item @ Value::Object(_) => {
                let raw: RawText = serde_json::from_value(item).ok()?;
                Some(PostText {
                    content: raw.content.unwrap_or_default(),
                    language: raw.language.filter(|s| !s.is_empty()),
                    pronunciation: raw.pronunciation.filter(|s| !s.is_empty()),
                    speaker: speaker_from_raw(raw.speaker, raw.person),
                })
            }
            _ => None,
        })
        .collect()
}

/// Copy the most specific timestamp forward: modern key, legacy `time`, then
/// the other timestamp
fn stamps_from_raw(
    created_at: Option<i64>,
    time: Option<i64>,
    updated_at: Option<i64>,
) -> (i64, i64) {
    let created = created_at.or(time).or(updated_at).unwrap_or(0);
    let updated = updated_at.unwrap_or(created);
    (created, updated)
}

pub(crate) fn post_from_raw(raw: RawPost) -> Post {
    let (created_at, updated_at) = stamps_from_raw(raw.created_at, raw.time, raw.updated_at);
    Post {
        id: raw.id.unwrap_or(0),
        ref_id: raw.ref_id.unwrap_or_default(),
        texts: texts_from_value(raw.texts),
        tags: string_list(raw.tags),
        image_id: raw.image_id.filter(|s| !s.is_empty()),
        image_removed: raw.image_removed.unwrap_or(false),
        created_at,
        updated_at,
        pinned: raw.pinned.or(raw.liked).unwrap_or(false),
        pinned_at: raw.pinned_at,
        is_deleted: raw.is_deleted.unwrap_or(false),
        source_url: raw.source_url.filter(|s| !s.is_empty()),
        linked_puzzle_ids: string_list(raw.linked_puzzle_ids),
    }
}

pub(crate) fn reply_from_raw(raw: RawReply) -> Reply {
    let (created_at, updated_at) = stamps_from_raw(raw.created_at, raw.time, raw.updated_at);
    Reply {
        id: raw.id.unwrap_or(0),
        ref_id: raw.ref_id.unwrap_or_default(),
        post_id: raw.post_id.unwrap_or(0),
        texts: texts_from_value(raw.texts),
        tags: string_list(raw.tags),
        image_id: raw.image_id.filter(|s| !s.is_empty()),
        created_at,
        updated_at,
    }
}

fn notes_from_value(value: Option<Value>) -> Vec<PuzzleNote> {
    record_list::<RawNote>(value)
        .into_iter()
        .map(|raw| PuzzleNote {
            id: raw.id.unwrap_or(0),
            text: raw.text.unwrap_or_default(),
            created_at: raw.created_at.or(raw.time).unwrap_or(0),
        })
        .collect()
}

fn review_from_raw(raw: Option<RawReview>) -> ReviewState {
    let raw = raw.unwrap_or_default();
    ReviewState {
        interval_index: raw.interval_index.unwrap_or(0).max(0) as u32,
        next_review: raw.next_review,
        history: record_list::<ReviewEntry>(raw.history),
    }
}

/// A raw clue ref carried over as-is; resolution happens once the whole
/// document is assembled
fn text_ref_from_raw(raw: RawRef) -> TextRef {
    // A reply ref id with no generic ref id still names the fragment: the
    // resolver accepts reply ref ids in the same slot.
    let ref_id = raw
        .ref_id
        .filter(|s| !s.is_empty())
        .or(raw.reply_ref_id.filter(|s| !s.is_empty()))
        .unwrap_or_default();
    TextRef {
        post_id: raw.post_id,
        ref_id,
        reply_id: raw.reply_id,
        text_index: raw.text_index.unwrap_or(0).max(0) as u32,
    }
}

pub(crate) fn puzzle_from_raw(raw: RawPuzzle) -> Puzzle {
    let (created_at, updated_at) = stamps_from_raw(raw.created_at, raw.time, raw.updated_at);
    Puzzle {
        id: raw.id.unwrap_or_default(),
        ref_id: raw.ref_id.unwrap_or_default(),
        text: raw.text.unwrap_or_default(),
        language: raw.language.filter(|s| !s.is_empty()),
        pronunciation: raw.pronunciation.filter(|s| !s.is_empty()),
        speaker: speaker_from_raw(raw.speaker, raw.person),
        post_refs: record_list::<RawRef>(raw.post)
            .into_iter()
            .map(text_ref_from_raw)
            .collect(),
        related_puzzle_ids: string_list(raw.related_puzzle_ids),
        notes: notes_from_value(raw.notes),
        is_solved: raw.is_solved.unwrap_or(false),
        meaning: raw.meaning.filter(|s| !s.is_empty()),
        alternatives: string_list(raw.alternatives),
        examples: string_list(raw.examples),
        tags: string_list(raw.tags),
        pinned: raw.pinned.or(raw.liked).unwrap_or(false),
        pinned_at: raw.pinned_at,
        created_at,
        updated_at,
        review: review_from_raw(raw.review),
    }
}

// ============================================================================
// CANONICAL NORMALIZATION
// ============================================================================

/// Dedup a string list in place, keeping first-seen order
fn dedup_strings(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.to_ascii_lowercase()));
}

/// Normalize a canonical document in place
///
/// Safe to run any number of times; the second run over its own output is a
/// no-op. Also invoked after import-merge, where incoming records may lack
/// ref ids or carry clue references that no longer resolve.
pub fn normalize_document(doc: &mut Document) {
    doc.version = SCHEMA_VERSION;
    doc.last_id = doc.last_id.max(doc.max_numeric_id());

    let mut seen_refs: HashSet<String> = HashSet::new();
    let mut claim = |ref_id: &mut String, prefix: &str| {
        if ref_id.is_empty() || !seen_refs.insert(ref_id.to_ascii_lowercase()) {
            // Missing, or duplicated by a bad import: mint a fresh one.
            loop {
                let candidate = stable_id(prefix);
                if seen_refs.insert(candidate.to_ascii_lowercase()) {
                    *ref_id = candidate;
                    break;
                }
            }
        }
    };

    let now = now_millis();

    for i in 0..doc.posts.len() {
        if doc.posts[i].id == 0 {
            let id = doc.next_numeric_id();
            doc.posts[i].id = id;
        }
        let post = &mut doc.posts[i];
        claim(&mut post.ref_id, "post");
        dedup_strings(&mut post.tags);
        dedup_strings(&mut post.linked_puzzle_ids);
        if post.created_at == 0 {
            post.created_at = now;
        }
        if post.updated_at == 0 {
            post.updated_at = post.created_at;
        }
        if !post.pinned {
            post.pinned_at = None;
        }
    }

    for i in 0..doc.replies.len() {
        if doc.replies[i].id == 0 {
            let id = doc.next_numeric_id();
            doc.replies[i].id = id;
        }
        let reply = &mut doc.replies[i];
        claim(&mut reply.ref_id, "reply");
        dedup_strings(&mut reply.tags);
        if reply.created_at == 0 {
            reply.created_at = now;
        }
        if reply.updated_at == 0 {
            reply.updated_at = reply.created_at;
        }
    }

    for i in 0..doc.puzzles.len() {
        if doc.puzzles[i].id.is_empty() {
            let n = doc.next_numeric_id();
            doc.puzzles[i].id = format!("puzzle_{n}");
        }
        for j in 0..doc.puzzles[i].notes.len() {
            if doc.puzzles[i].notes[j].id == 0 {
                let id = doc.next_numeric_id();
                doc.puzzles[i].notes[j].id = id;
            }
        }
        let puzzle = &mut doc.puzzles[i];
        claim(&mut puzzle.ref_id, "puzzle");
        dedup_strings(&mut puzzle.tags);
        dedup_strings(&mut puzzle.related_puzzle_ids);
        if puzzle.created_at == 0 {
            puzzle.created_at = now;
        }
        if puzzle.updated_at == 0 {
            puzzle.updated_at = puzzle.created_at;
        }
        if !puzzle.pinned {
            puzzle.pinned_at = None;
        }
        // A recorded meaning implies the puzzle was solved.
        if puzzle.meaning.is_some() {
            puzzle.is_solved = true;
        }
        for note in &mut puzzle.notes {
            if note.created_at == 0 {
                note.created_at = puzzle.created_at;
            }
        }
    }

    renormalize_puzzle_refs(doc);
}

/// Re-resolve every puzzle clue reference against the assembled document,
/// replacing references that fail resolution with the placeholder
fn renormalize_puzzle_refs(doc: &mut Document) {
    // Puzzles are taken out so the resolver can borrow the document; clue
    // resolution only consults posts and replies.
    let mut puzzles = std::mem::take(&mut doc.puzzles);
    for puzzle in &mut puzzles {
        for clue in &mut puzzle.post_refs {
            let query = RefQuery {
                post_id: clue.post_id,
                ref_id: Some(clue.ref_id.clone()).filter(|s| !s.is_empty()),
                reply_id: clue.reply_id,
                reply_ref_id: None,
                text_index: Some(clue.text_index as i64),
            };
            *clue = match refs::normalize(doc, &query) {
                Some(resolved) => resolved,
                None => {
                    warn!(puzzle = %puzzle.id, "clue reference failed resolution, storing placeholder");
                    TextRef::placeholder()
                }
            };
        }
    }
    doc.puzzles = puzzles;
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_value() -> Value {
        json!({
            "version": 1,
            "lastId": 2,
            "posts": [
                {
                    "id": 1,
                    "liked": true,
                    "time": 1000,
                    "tags": "not-an-array",
                    "texts": [
                        "bare string text",
                        {"content": "typed", "person": "partner"}
                    ]
                }
            ],
            "replies": [
                {"id": 2, "postId": 1, "time": 2000, "texts": [{"content": "ok"}]}
            ],
            "puzzles": [
                {
                    "text": "kikitori",
                    "meaning": "listening comprehension",
                    "post": [{"postId": 1, "textIndex": 1}, {"postId": 99}]
                }
            ],
            "images": {"img-1": "data:image/png;base64,AAAA", "bad": 7}
        })
    }

    #[test]
    fn test_legacy_migration() {
        let doc = document_from_value(legacy_value());

        let post = doc.post(1).unwrap();
        assert!(post.pinned, "liked must migrate to pinned");
        assert_eq!(post.created_at, 1000, "time must migrate to createdAt");
        assert!(post.tags.is_empty(), "malformed tags coerce to empty");
        assert_eq!(post.texts.len(), 2);
        assert_eq!(post.texts[1].speaker, Speaker::Partner);
        assert!(!post.ref_id.is_empty());

        let reply = doc.reply(2).unwrap();
        assert_eq!(reply.created_at, 2000);
        assert!(!reply.ref_id.is_empty());

        let puzzle = &doc.puzzles[0];
        assert!(puzzle.is_solved, "meaning implies solved");
        assert!(puzzle.id.starts_with("puzzle_"));
        // First clue resolves and picks up the post's ref id.
        assert_eq!(puzzle.post_refs[0].post_id, Some(1));
        assert_eq!(puzzle.post_refs[0].ref_id, post.ref_id);
        assert_eq!(puzzle.post_refs[0].text_index, 1);
        // Second clue points nowhere and becomes the placeholder.
        assert!(puzzle.post_refs[1].is_placeholder());

        assert_eq!(doc.images.len(), 1, "non-string image payload dropped");
        assert!(doc.last_id >= 2);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = document_from_value(legacy_value());
        let mut twice = once.clone();
        normalize_document(&mut twice);
        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn test_ref_ids_unique_after_normalization() {
        let doc = document_from_value(json!({
            "posts": [
                {"id": 1, "refId": "dup-ref-abc123"},
                {"id": 2, "refId": "dup-ref-abc123"}
            ]
        }));
        assert_ne!(doc.posts[0].ref_id, doc.posts[1].ref_id);
        assert_eq!(doc.posts[0].ref_id, "dup-ref-abc123");
    }

    #[test]
    fn test_non_object_document_resets_to_default() {
        for value in [json!([1, 2, 3]), json!("text"), json!(42), Value::Null] {
            let doc = document_from_value(value);
            assert!(doc.posts.is_empty());
            assert_eq!(doc.version, SCHEMA_VERSION);
            assert_eq!(doc.last_id, 0);
        }
    }

    #[test]
    fn test_missing_ids_assigned_above_last_id() {
        let doc = document_from_value(json!({
            "lastId": 10,
            "posts": [{"texts": [{"content": "no id"}]}]
        }));
        assert_eq!(doc.posts[0].id, 11);
        assert_eq!(doc.last_id, 11);
    }

    #[test]
    fn test_legacy_keys_do_not_survive_serialization() {
        let doc = document_from_value(legacy_value());
        let serialized = serde_json::to_string(&doc).unwrap();
        assert!(!serialized.contains("\"liked\""));
        assert!(!serialized.contains("\"time\""));
        assert!(!serialized.contains("\"person\""));
    }

    #[test]
    fn test_tag_dedup_keeps_first_seen_order() {
        let doc = document_from_value(json!({
            "posts": [{"id": 1, "tags": ["food", "Travel", "food", "travel"]}]
        }));
        assert_eq!(doc.posts[0].tags, vec!["food", "Travel"]);
    }
}
