//! Identifier service
//!
//! Two id families: numeric ids from the document's monotonic counter (see
//! [`crate::model::Document::next_numeric_id`]), local to one document, and
//! stable string reference ids minted here. Stable ids survive merges from
//! other devices, where numeric ids could collide, so every cross-entity
//! reference that must outlive a merge uses them.

use chrono::Utc;
use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix in a stable id
const SUFFIX_LEN: usize = 6;

/// Mint a stable reference id: `{prefix}-{timestampBase36}-{random base36}`
///
/// Collisions are probabilistic and accepted as negligible; no uniqueness
/// check is performed against existing ids.
pub fn stable_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!("{}-{}-{}", prefix, to_base36(millis), random_suffix())
}

/// Current wall clock as epoch milliseconds, the document timestamp unit
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..36)] as char)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
