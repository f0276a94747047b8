//! Raw record layer - what older documents may actually contain
//!
//! Every field is optional or defaulted, and retired legacy fields (`liked`,
//! `time`, `person`) are still accepted here. The normalizer migrates these
//! into canonical records and the legacy keys never survive a save, because
//! the canonical structs cannot express them.

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// RAW RECORDS
// ============================================================================

/// Raw persisted document, any schema version
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub version: Option<i64>,
    pub last_id: Option<i64>,
    pub posts: Option<Value>,
    pub replies: Option<Value>,
    pub puzzles: Option<Value>,
    pub images: Option<Value>,
}

/// Raw text fragment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawText {
    pub content: Option<String>,
    pub language: Option<String>,
    pub pronunciation: Option<String>,
    pub speaker: Option<String>,
    /// Legacy duplicate of `speaker`
    pub person: Option<String>,
}

/// Raw post record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPost {
    pub id: Option<i64>,
    pub ref_id: Option<String>,
    pub texts: Option<Value>,
    pub tags: Option<Value>,
    pub image_id: Option<String>,
    pub image_removed: Option<bool>,
    pub created_at: Option<i64>,
    /// Legacy creation timestamp field
    pub time: Option<i64>,
    pub updated_at: Option<i64>,
    pub pinned: Option<bool>,
    /// Legacy name for `pinned`
    pub liked: Option<bool>,
    pub pinned_at: Option<i64>,
    pub is_deleted: Option<bool>,
    pub source_url: Option<String>,
    pub linked_puzzle_ids: Option<Value>,
}

/// Raw reply record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReply {
    pub id: Option<i64>,
    pub ref_id: Option<String>,
    pub post_id: Option<i64>,
    pub texts: Option<Value>,
    pub tags: Option<Value>,
    pub image_id: Option<String>,
    pub created_at: Option<i64>,
    /// Legacy creation timestamp field
    pub time: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Raw clue reference inside a puzzle's `post` list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRef {
    pub post_id: Option<i64>,
    pub ref_id: Option<String>,
    pub reply_id: Option<i64>,
    pub reply_ref_id: Option<String>,
    pub text_index: Option<i64>,
}

/// Raw puzzle note
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNote {
    pub id: Option<i64>,
    pub text: Option<String>,
    pub created_at: Option<i64>,
    /// Legacy creation timestamp field
    pub time: Option<i64>,
}

/// Raw review scaffold
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReview {
    pub interval_index: Option<i64>,
    pub next_review: Option<i64>,
    pub history: Option<Value>,
}

/// Raw puzzle record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPuzzle {
    pub id: Option<String>,
    pub ref_id: Option<String>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub pronunciation: Option<String>,
    pub speaker: Option<String>,
    /// Legacy duplicate of `speaker`
    pub person: Option<String>,
    pub post: Option<Value>,
    pub related_puzzle_ids: Option<Value>,
    pub notes: Option<Value>,
    pub is_solved: Option<bool>,
    pub meaning: Option<String>,
    pub alternatives: Option<Value>,
    pub examples: Option<Value>,
    pub tags: Option<Value>,
    pub pinned: Option<bool>,
    /// Legacy name for `pinned`
    pub liked: Option<bool>,
    pub pinned_at: Option<i64>,
    pub created_at: Option<i64>,
    /// Legacy creation timestamp field
    pub time: Option<i64>,
    pub updated_at: Option<i64>,
    pub review: Option<RawReview>,
}

// ============================================================================
// COERCION HELPERS
// ============================================================================

/// Coerce a loose value to a string list; anything that is not an array of
/// strings contributes nothing
pub fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => vec![],
    }
}

/// Coerce a loose value to a list of records, dropping elements that fail to
/// deserialize instead of failing the whole collection
pub fn record_list<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => vec![],
    }
}

// ============================================================================
// TESTS
// ============================================================================
