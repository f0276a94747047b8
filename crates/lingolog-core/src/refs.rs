//! Reference resolver
//!
//! Links a puzzle clue, or a short copyable "ref token", to one specific text
//! fragment inside a post's thread. The indirection buys three things: a clue
//! can point at a single sentence within a multi-text post or reply, the link
//! survives renumbering from merges (stable ref ids do not collide across
//! devices), and the user sees a short string instead of an opaque compound
//! key.
//!
//! Every lookup here returns `Option`. Dangling references are expected
//! after merges and deletions and must degrade, never fail.
//!
//! Fragment indexing convention: a post's own texts occupy indices
//! `[0, texts.len())`; each reply's texts continue the same flat index space,
//! offset by the cumulative text count of the post and all earlier replies in
//! creation order.

use tracing::warn;

use crate::model::{Document, Post, PostText, Reply, TextRef};

// ============================================================================
// QUERIES
// ============================================================================

/// A loose reference as received from user input or legacy data
///
/// Any subset of keys may be present; `normalize` turns it into a canonical
/// [`TextRef`] or reports it unresolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefQuery {
    /// Numeric post id
    pub post_id: Option<i64>,
    /// Stable reference id of a post or reply
    pub ref_id: Option<String>,
    /// Numeric reply id
    pub reply_id: Option<i64>,
    /// Stable reference id known to name a reply
    pub reply_ref_id: Option<String>,
    /// Fragment index; defaults to 0
    pub text_index: Option<i64>,
}

impl RefQuery {
    /// Query by stable reference id alone
    pub fn by_ref(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: Some(ref_id.into()),
            ..Default::default()
        }
    }

    /// Query by numeric post id alone
    pub fn by_post(post_id: i64) -> Self {
        Self {
            post_id: Some(post_id),
            ..Default::default()
        }
    }
}

// ============================================================================
// NORMALIZE / FORMAT / PARSE
// ============================================================================

/// Normalize a loose reference against the document
///
/// Resolution order: an explicit reply key first, then the post (directly, or
/// through the resolved reply's parent). The final `ref_id` is the explicit
/// input ref id, else the resolved reply's, else the resolved post's. Returns
/// `None` only when neither a ref id nor a resolvable numeric post id can be
/// produced - the "unresolvable reference" signal.
pub fn normalize(doc: &Document, query: &RefQuery) -> Option<TextRef> {
    let input_ref = query
        .ref_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    // (a) explicit reply keys, or an input ref id that names a reply
    let reply: Option<&Reply> = query
        .reply_id
        .and_then(|id| doc.reply(id))
        .or_else(|| {
            query
                .reply_ref_id
                .as_deref()
                .and_then(|r| doc.reply_by_ref(r))
        })
        .or_else(|| input_ref.and_then(|r| doc.reply_by_ref(r)));

    // (b) the post, directly or through the reply's parent
    let post: Option<&Post> = query
        .post_id
        .and_then(|id| doc.post(id))
        .or_else(|| input_ref.and_then(|r| doc.post_by_ref(r)))
        .or_else(|| reply.and_then(|r| doc.post(r.post_id)));

    // (c) most specific available ref id
    let ref_id = input_ref
        .map(str::to_string)
        .or_else(|| reply.map(|r| r.ref_id.clone()).filter(|s| !s.is_empty()))
        .or_else(|| post.map(|p| p.ref_id.clone()).filter(|s| !s.is_empty()));

    if ref_id.is_none() && post.is_none() {
        return None;
    }

    // (d) coerce the index
    let text_index = query.text_index.unwrap_or(0).max(0) as u32;

    Some(TextRef {
        post_id: post.map(|p| p.id),
        ref_id: ref_id.unwrap_or_default(),
        reply_id: reply.map(|r| r.id),
        text_index,
    })
}

/// Serialize a normalized reference to its copyable token
///
/// Token shape: `{refId-or-"post"+postId}.{textIndex}`. A placeholder
/// reference yields the empty string.
pub fn format_token(r: &TextRef) -> String {
    if !r.ref_id.is_empty() {
        format!("{}.{}", r.ref_id, r.text_index)
    } else if let Some(post_id) = r.post_id {
        format!("post{}.{}", post_id, r.text_index)
    } else {
        String::new()
    }
}

/// Parse a token back into a normalized reference
///
/// Grammar: `<word chars and hyphens> "." <digits>`, ASCII case-insensitive.
/// The left part is tried as a stable-id lookup first; a leading `post`
/// prefix falls back to a bare numeric post id. Malformed tokens yield
/// `None`, never an error.
pub fn parse_token(doc: &Document, token: &str) -> Option<TextRef> {
    let (left, right) = token.trim().rsplit_once('.')?;
    if left.is_empty()
        || right.is_empty()
        || !left
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        || !right.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let text_index: i64 = right.parse().ok()?;

    // Stable ids win over the numeric fallback.
    if doc.post_by_ref(left).is_some() || doc.reply_by_ref(left).is_some() {
        return normalize(
            doc,
            &RefQuery {
                ref_id: Some(left.to_string()),
                text_index: Some(text_index),
                ..Default::default()
            },
        );
    }

    if let Some(rest) = left.to_ascii_lowercase().strip_prefix("post") {
        if let Ok(post_id) = rest.parse::<i64>() {
            if let Some(resolved) = normalize(
                doc,
                &RefQuery {
                    post_id: Some(post_id),
                    text_index: Some(text_index),
                    ..Default::default()
                },
            ) {
                return Some(resolved);
            }
        }
    }

    // Well-formed but unresolved: keep the stable id so callers can still
    // render a fallback label for it.
    normalize(
        doc,
        &RefQuery {
            ref_id: Some(left.to_string()),
            text_index: Some(text_index),
            ..Default::default()
        },
    )
}

// ============================================================================
// FRAGMENT RESOLUTION
// ============================================================================

/// A resolved text fragment with its containing records
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    /// The post anchoring the thread
    pub post: &'a Post,
    /// The reply holding the fragment, when the index lands past the post
    pub reply: Option<&'a Reply>,
    /// The fragment itself
    pub text: &'a PostText,
}

/// Resolve a normalized reference to the fragment it points at
///
/// Walks the flat index space of the post's texts followed by each reply's
/// texts in creation order. Returns `None` when the target record is gone or
/// the index runs past the thread.
pub fn resolve_fragment<'a>(doc: &'a Document, r: &TextRef) -> Option<Fragment<'a>> {
    let post = r
        .post_id
        .and_then(|id| doc.post(id))
        .or_else(|| {
            if r.ref_id.is_empty() {
                None
            } else {
                doc.post_by_ref(&r.ref_id)
            }
        })
        .or_else(|| {
            let reply = r
                .reply_id
                .and_then(|id| doc.reply(id))
                .or_else(|| doc.reply_by_ref(&r.ref_id))?;
            doc.post(reply.post_id)
        })?;

    let mut index = r.text_index as usize;
    if index < post.texts.len() {
        return Some(Fragment {
            post,
            reply: None,
            text: &post.texts[index],
        });
    }
    index -= post.texts.len();

    for reply in doc.replies_of(post.id) {
        if index < reply.texts.len() {
            return Some(Fragment {
                post,
                reply: Some(reply),
                text: &reply.texts[index],
            });
        }
        index -= reply.texts.len();
    }
    None
}

/// Text for display: the fragment's content, or the literal token as a
/// fallback when the reference dangles
pub fn display_text(doc: &Document, r: &TextRef) -> String {
    match resolve_fragment(doc, r) {
        Some(fragment) => fragment.text.content.clone(),
        None => {
            let token = format_token(r);
            warn!(token = %token, "unresolved text reference, rendering fallback");
            token
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
