//! Puzzle cards - language-learning items carved out of the timeline
//!
//! A puzzle captures one phrase worth studying: its text, optional clue
//! references back into posts/replies, and a solution (meaning, alternatives,
//! examples) once solved. Review scheduling state is carried but dormant.

use serde::{Deserialize, Serialize};

use super::post::Speaker;

// ============================================================================
// TEXT REFERENCE
// ============================================================================

/// A normalized reference to one text fragment in a post's thread
///
/// Weak by design: either side may be dangling after merges or deletions, and
/// consumers degrade to a fallback label instead of failing. `text_index`
/// addresses the flat fragment space of the post's own texts followed by each
/// reply's texts in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRef {
    /// Numeric id of the target post, when resolvable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    /// Stable reference id of the most specific target (reply over post);
    /// empty when only a numeric post id is known
    #[serde(default)]
    pub ref_id: String,
    /// Numeric id of the target reply, when the fragment lives in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<i64>,
    /// Flat fragment index within the post's thread
    #[serde(default)]
    pub text_index: u32,
}

impl Default for TextRef {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl TextRef {
    /// The sentinel stored when a reference failed to resolve at load time
    pub fn placeholder() -> Self {
        Self {
            post_id: None,
            ref_id: String::new(),
            reply_id: None,
            text_index: 0,
        }
    }

    /// True when this reference carries no lookup key at all
    pub fn is_placeholder(&self) -> bool {
        self.ref_id.is_empty() && self.post_id.is_none() && self.reply_id.is_none()
    }
}

// ============================================================================
// NOTES AND REVIEW STATE
// ============================================================================

/// A freeform note attached to a puzzle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleNote {
    /// Numeric note id, drawn from the document counter
    pub id: i64,
    /// Note body
    pub text: String,
    /// Creation timestamp, epoch milliseconds
    pub created_at: i64,
}

/// One entry in a puzzle's review history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    /// When the review happened, epoch milliseconds
    pub reviewed_at: i64,
    /// Whether the answer was recalled
    pub remembered: bool,
}

/// Spaced-repetition scaffold
///
/// Carried and persisted for forward compatibility; nothing in this crate
/// schedules reviews from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    /// Index into an interval ladder
    #[serde(default)]
    pub interval_index: u32,
    /// Next scheduled review, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<i64>,
    /// Past reviews, oldest first
    #[serde(default)]
    pub history: Vec<ReviewEntry>,
}

// ============================================================================
// PUZZLE
// ============================================================================

/// A language puzzle card
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    /// String id, format `puzzle_<n>` with `<n>` from the document counter
    pub id: String,
    /// Globally-stable reference id
    pub ref_id: String,
    /// The phrase under study (single field, not a sequence)
    #[serde(default)]
    pub text: String,
    /// Language tag of the phrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Reading aid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    /// Who said it
    #[serde(default)]
    pub speaker: Speaker,
    /// Ordered clue references into posts/replies
    #[serde(default, rename = "post")]
    pub post_refs: Vec<TextRef>,
    /// Weak links to related puzzles (stored one-directionally)
    #[serde(default)]
    pub related_puzzle_ids: Vec<String>,
    /// Freeform notes, oldest first
    #[serde(default)]
    pub notes: Vec<PuzzleNote>,
    /// Whether the puzzle has been solved; gates `meaning`
    #[serde(default)]
    pub is_solved: bool,
    /// The solution, present once solved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
    /// Alternative phrasings of the solution
    #[serde(default)]
    pub alternatives: Vec<String>,
    /// Example sentences
    #[serde(default)]
    pub examples: Vec<String>,
    /// Tag set
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pinned to the top of the puzzle list
    #[serde(default)]
    pub pinned: bool,
    /// When the puzzle was pinned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<i64>,
    /// Creation timestamp, epoch milliseconds
    pub created_at: i64,
    /// Last-modified timestamp, epoch milliseconds
    pub updated_at: i64,
    /// Dormant spaced-repetition state
    #[serde(default)]
    pub review: ReviewState,
}

impl Default for Puzzle {
    fn default() -> Self {
        Self {
            id: String::new(),
            ref_id: String::new(),
            text: String::new(),
            language: None,
            pronunciation: None,
            speaker: Speaker::Unspecified,
            post_refs: vec![],
            related_puzzle_ids: vec![],
            notes: vec![],
            is_solved: false,
            meaning: None,
            alternatives: vec![],
            examples: vec![],
            tags: vec![],
            pinned: false,
            pinned_at: None,
            created_at: 0,
            updated_at: 0,
            review: ReviewState::default(),
        }
    }
}

impl Puzzle {
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
