//! Test Data Factory
//!
//! Utilities for generating realistic test data:
//! - Post and puzzle drafts with various properties
//! - Legacy-shaped document payloads for migration tests
//! - Oversized image payloads for storage-pressure tests

use lingolog_core::{PostDraft, Speaker, TextDraft};
use serde_json::{json, Value};

/// A plain one-fragment post draft
pub fn post(content: &str) -> PostDraft {
    PostDraft {
        texts: vec![TextDraft::new(content)],
        ..Default::default()
    }
}

/// A post draft with language metadata and a speaker
pub fn spoken_post(content: &str, language: &str, speaker: Speaker) -> PostDraft {
    PostDraft {
        texts: vec![TextDraft {
            content: content.to_string(),
            language: Some(language.to_string()),
            pronunciation: None,
            speaker,
        }],
        ..Default::default()
    }
}

/// A post draft carrying an image payload of roughly `size` encoded bytes
pub fn post_with_image(content: &str, size: usize) -> PostDraft {
    PostDraft {
        texts: vec![TextDraft::new(content)],
        image: Some(image_payload(size, 'A')),
        ..Default::default()
    }
}

/// A fake data-URL payload of roughly `size` bytes
///
/// Kept below the ingest downscale threshold in practice, so the bytes are
/// never decoded as a real image.
pub fn image_payload(size: usize, fill: char) -> String {
    format!(
        "data:image/png;base64,{}",
        fill.to_string().repeat(size.saturating_sub(22))
    )
}

/// A conversation payload in the message-array import shape
pub fn conversation(messages: &[&str]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|content| json!({ "content": content }))
            .collect(),
    )
}

/// A document in the oldest known legacy shape
///
/// Uses `liked`, `time`, and `person` keys, bare-string texts, no `refId`,
/// and no version marker. Migration has to modernize all of it.
pub fn legacy_document() -> Value {
    json!({
        "lastId": 2,
        "posts": [
            {
                "id": 1,
                "texts": ["kommst du mit?"],
                "time": 1_600_000_000_000_i64,
                "liked": true,
                "tags": ["invite", "invite"]
            },
            {
                "id": 2,
                "texts": [{"content": "ja, gerne", "person": "partner"}],
                "time": 1_600_000_100_000_i64
            }
        ],
        "puzzles": [
            {
                "text": "mitkommen",
                "post": [{"postId": 1, "textIndex": 0}],
                "meaning": "to come along"
            }
        ]
    })
}

/// A modern partial document with one post, for merge tests
pub fn remote_document(post_id: i64, ref_id: &str, content: &str, updated_at: i64) -> Value {
    json!({
        "version": 4,
        "lastId": post_id,
        "posts": [{
            "id": post_id,
            "refId": ref_id,
            "texts": [{"content": content}],
            "createdAt": 1_600_000_000_000_i64,
            "updatedAt": updated_at
        }]
    })
}
