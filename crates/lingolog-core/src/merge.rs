//! Merge engine
//!
//! Reconciles an externally supplied document payload with the local one:
//! keyed union per collection, last-write-wins by update timestamp at record
//! granularity. Conflicts resolve by shallow overlay at the JSON level with
//! the existing record as the base, so fields the incoming payload omits
//! (stable ref ids, pins, tags) are preserved instead of reset to defaults.
//! Images merge additively and are never overwritten - a stored payload is
//! immutable. The merged result runs through the normalizer once at the end,
//! repairing anything the incoming records were missing.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{Document, Post, Puzzle, Reply};
use crate::schema::normalize::{post_from_raw, puzzle_from_raw, reply_from_raw};
use crate::schema::normalize_document;
use crate::schema::raw::{RawPost, RawPuzzle, RawReply};

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// A record that can participate in a keyed last-write-wins union
pub trait MergeRecord: Serialize {
    /// Key type (numeric id for posts/replies, string id for puzzles)
    type Key: std::hash::Hash + Eq;

    /// The record's key; `None` excludes it from merging entirely
    fn merge_key(&self) -> Option<Self::Key>;

    /// Timestamp compared for conflicts: `updated_at`, falling back to
    /// `created_at`, falling back to 0
    fn merge_stamp(&self) -> i64;

    /// The key as carried by a raw incoming JSON record
    fn key_from_value(value: &Value) -> Option<Self::Key>;

    /// Canonicalize a raw incoming JSON record through the schema layer;
    /// `None` drops a malformed record instead of replacing data with
    /// defaults
    fn from_value(value: Value) -> Option<Self>
    where
        Self: Sized;
}

/// Conflict stamp of a raw incoming record, same fallbacks as `merge_stamp`
/// plus the legacy `time` key
fn stamp_from_value(value: &Value) -> i64 {
    let read = |key: &str| value.get(key).and_then(Value::as_i64).filter(|s| *s != 0);
    read("updatedAt")
        .or_else(|| read("createdAt"))
        .or_else(|| read("time"))
        .unwrap_or(0)
}

impl MergeRecord for Post {
    type Key = i64;
    fn merge_key(&self) -> Option<i64> {
        (self.id != 0).then_some(self.id)
    }
    fn merge_stamp(&self) -> i64 {
        Post::merge_stamp(self)
    }
    fn key_from_value(value: &Value) -> Option<i64> {
        value.get("id").and_then(Value::as_i64).filter(|id| *id != 0)
    }
    fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value::<RawPost>(value).ok().map(post_from_raw)
    }
}

impl MergeRecord for Reply {
    type Key = i64;
    fn merge_key(&self) -> Option<i64> {
        (self.id != 0).then_some(self.id)
    }
    fn merge_stamp(&self) -> i64 {
        Reply::merge_stamp(self)
    }
    fn key_from_value(value: &Value) -> Option<i64> {
        value.get("id").and_then(Value::as_i64).filter(|id| *id != 0)
    }
    fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value::<RawReply>(value).ok().map(reply_from_raw)
    }
}

impl MergeRecord for Puzzle {
    type Key = String;
    fn merge_key(&self) -> Option<String> {
        (!self.id.is_empty()).then(|| self.id.clone())
    }
    fn merge_stamp(&self) -> i64 {
        Puzzle::merge_stamp(self)
    }
    fn key_from_value(value: &Value) -> Option<String> {
        value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
    fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value::<RawPuzzle>(value).ok().map(puzzle_from_raw)
    }
}

// ============================================================================
// COLLECTION MERGE
// ============================================================================

/// Counts from one merge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCounts {
    /// Records inserted under new keys
    pub added: usize,
    /// Existing records overlaid by strictly newer incoming ones
    pub updated: usize,
    /// Incoming records discarded as not newer, keyless, or malformed
    pub kept: usize,
}

/// Shallow merge: the existing record serialized as the base, incoming keys
/// overwrite
fn overlay<T: Serialize>(existing: &T, incoming: Value) -> Value {
    match (serde_json::to_value(existing), incoming) {
        (Ok(Value::Object(mut base)), Value::Object(incoming)) => {
            for (key, value) in incoming {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

/// Merge raw incoming records into a collection: keyed union, last-write-wins
///
/// Existing records keep their position; new keys append in incoming order
/// and immediately join the key index, so a duplicate key later in the same
/// payload competes on its timestamp instead of inserting twice. An incoming
/// record overlays an existing one only when its timestamp is strictly
/// greater - ties keep the existing record untouched, and fields the incoming
/// record omits keep their existing values.
pub fn merge_collection<T: MergeRecord>(existing: &mut Vec<T>, incoming: Vec<Value>) -> MergeCounts {
    let mut counts = MergeCounts::default();
    let mut index: HashMap<T::Key, usize> = existing
        .iter()
        .enumerate()
        .filter_map(|(i, record)| record.merge_key().map(|key| (key, i)))
        .collect();

    for value in incoming {
        let Some(key) = T::key_from_value(&value) else {
            counts.kept += 1;
            continue;
        };
        match index.get(&key).copied() {
            Some(i) => {
                if stamp_from_value(&value) > existing[i].merge_stamp() {
                    match T::from_value(overlay(&existing[i], value)) {
                        Some(merged) => {
                            existing[i] = merged;
                            counts.updated += 1;
                        }
                        None => counts.kept += 1,
                    }
                } else {
                    counts.kept += 1;
                }
            }
            None => match T::from_value(value) {
                Some(record) => {
                    index.insert(key, existing.len());
                    existing.push(record);
                    counts.added += 1;
                }
                None => counts.kept += 1,
            },
        }
    }
    counts
}

// ============================================================================
// DOCUMENT MERGE
// ============================================================================

/// Per-collection outcome of a document merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Post merge counts
    pub posts: MergeCounts,
    /// Reply merge counts
    pub replies: MergeCounts,
    /// Puzzle merge counts
    pub puzzles: MergeCounts,
    /// Image payloads added (never overwritten)
    pub images_added: usize,
}

/// Merge an incoming document payload into the local one and re-normalize
///
/// `last_id` becomes the maximum of both counters and every numeric id seen,
/// so ids assigned after the merge can never collide with imported ones.
pub fn merge_documents(doc: &mut Document, incoming: Value) -> MergeReport {
    let mut incoming = match incoming {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let list = |value: Option<Value>| match value {
        Some(Value::Array(items)) => items,
        _ => vec![],
    };

    let mut report = MergeReport {
        posts: merge_collection(&mut doc.posts, list(incoming.remove("posts"))),
        replies: merge_collection(&mut doc.replies, list(incoming.remove("replies"))),
        puzzles: merge_collection(&mut doc.puzzles, list(incoming.remove("puzzles"))),
        ..Default::default()
    };

    if let Some(Value::Object(images)) = incoming.remove("images") {
        for (id, payload) in images {
            let Value::String(payload) = payload else { continue };
            doc.images.entry(id).or_insert_with(|| {
                report.images_added += 1;
                payload
            });
        }
    }

    let incoming_last_id = incoming
        .remove("lastId")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    doc.last_id = doc
        .last_id
        .max(incoming_last_id)
        .max(doc.max_numeric_id());
    normalize_document(doc);
    report
}

// ============================================================================
// TESTS
// ============================================================================
