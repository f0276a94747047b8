//! Timeline entries - posts and their replies
//!
//! A post is an ordered sequence of text fragments (one per language or
//! speaker turn), a tag set, and an optional embedded image. Replies share
//! the same text/tag/image shape and hold a strong reference to their parent.

use serde::{Deserialize, Serialize};

// ============================================================================
// SPEAKER CATEGORY
// ============================================================================

/// Who produced a text fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The journal owner
    Me,
    /// The conversation partner
    Partner,
    /// Someone else (overheard, quoted)
    Other,
    /// No speaker recorded
    #[default]
    Unspecified,
}

impl Speaker {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Me => "me",
            Speaker::Partner => "partner",
            Speaker::Other => "other",
            Speaker::Unspecified => "unspecified",
        }
    }

    /// Parse from string name, defaulting to `Unspecified`
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "me" | "self" => Speaker::Me,
            "partner" => Speaker::Partner,
            "other" => Speaker::Other,
            _ => Speaker::Unspecified,
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TEXT FRAGMENT
// ============================================================================

/// One text fragment inside a post or reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostText {
    /// The fragment content
    pub content: String,
    /// BCP-47-ish language tag ("ja", "de", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Reading aid (furigana, romanization, IPA)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    /// Who said it
    #[serde(default)]
    pub speaker: Speaker,
}

impl PostText {
    /// Create a plain fragment with no language or speaker metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// POST
// ============================================================================

/// A timeline entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Locally-unique numeric id, assigned from the document counter
    pub id: i64,
    /// Globally-stable reference id, assigned once, never reused
    pub ref_id: String,
    /// Ordered text fragments
    #[serde(default)]
    pub texts: Vec<PostText>,
    /// Tag set (deduplicated, insertion order kept for display)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Weak reference into the document image map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Set when the storage budget evicted this post's image
    #[serde(default)]
    pub image_removed: bool,
    /// Creation timestamp, epoch milliseconds
    pub created_at: i64,
    /// Last-modified timestamp, epoch milliseconds
    pub updated_at: i64,
    /// Pinned to the top of the timeline
    #[serde(default)]
    pub pinned: bool,
    /// When the post was pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<i64>,
    /// Tombstone: logically deleted but retained while replies exist
    #[serde(default)]
    pub is_deleted: bool,
    /// Where the content came from (article URL, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Weak references to puzzles carved out of this post
    #[serde(default)]
    pub linked_puzzle_ids: Vec<String>,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            id: 0,
            ref_id: String::new(),
            texts: vec![],
            tags: vec![],
            image_id: None,
            image_removed: false,
            created_at: 0,
            updated_at: 0,
            pinned: false,
            pinned_at: None,
            is_deleted: false,
            source_url: None,
            linked_puzzle_ids: vec![],
        }
    }
}

impl Post {
    /// Fragments as shown on the timeline; a tombstone renders nothing
    pub fn visible_texts(&self) -> &[PostText] {
        if self.is_deleted { &[] } else { &self.texts }
    }

    /// Timestamp used for last-write-wins comparison
    pub fn merge_stamp(&self) -> i64 {
        if self.updated_at != 0 {
            self.updated_at
        } else {
            self.created_at
        }
    }
}

// ============================================================================
// REPLY
// ============================================================================

/// A reply beneath a post
///
/// Created only through its parent post; deleted independently of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Locally-unique numeric id
    pub id: i64,
    /// Globally-stable reference id
    pub ref_id: String,
    /// Parent post id (strong reference, must resolve)
    pub post_id: i64,
    /// Ordered text fragments
    #[serde(default)]
    pub texts: Vec<PostText>,
    /// Tag set
    #[serde(default)]
    pub tags: Vec<String>,
    /// Weak reference into the document image map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Creation timestamp, epoch milliseconds
    pub created_at: i64,
    /// Last-modified timestamp, epoch milliseconds
    pub updated_at: i64,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            id: 0,
            ref_id: String::new(),
            post_id: 0,
            texts: vec![],
            tags: vec![],
            image_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl Reply {
    /// Timestamp used for last-write-wins comparison
    pub fn merge_stamp(&self) -> i64 {
        if self.updated_at != 0 {
            self.updated_at
        } else {
            self.created_at
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
