//! Image store
//!
//! Images are un-owned: any number of posts and replies may reference one
//! image id, so there is no refcount field - liveness is decided by scanning
//! usage. Dedup is exact-match over stored payloads, O(n) over a small local
//! collection. Under storage pressure the budget enforcer evicts images from
//! the oldest posts first, marking each post so the UI can say "image
//! removed" instead of losing it silently.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::{debug, info};

use crate::ident::stable_id;
use crate::model::Document;

/// Serialized-document size ceiling before eviction starts (5 MiB)
pub const STORAGE_BUDGET_BYTES: usize = 5 * 1024 * 1024;

/// Payloads above this size are downscaled at ingestion time
pub const DOWNSCALE_THRESHOLD_BYTES: usize = 256 * 1024;

/// Maximum width after downscaling
pub const MAX_IMAGE_WIDTH: u32 = 1024;

/// Fixed JPEG quality for downscaled images
pub const JPEG_QUALITY: u8 = 80;

// ============================================================================
// ERRORS
// ============================================================================

/// Image ingestion error
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Payload is not a `data:` URL with a base64 body
    #[error("not a base64 data URL")]
    InvalidDataUrl,
    /// Base64 body failed to decode
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Image bytes failed to decode or re-encode
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

// ============================================================================
// DEDUP AND USAGE SCAN
// ============================================================================

/// Store a payload, reusing the id of a byte-identical existing payload
///
/// Linear scan by design: the collection is small and exact-match dedup
/// needs no index.
pub fn ensure_image_id(doc: &mut Document, payload: &str) -> String {
    if let Some((id, _)) = doc.images.iter().find(|(_, stored)| *stored == payload) {
        return id.clone();
    }
    let id = stable_id("img");
    doc.images.insert(id.clone(), payload.to_string());
    id
}

/// Delete a stored payload if no post or reply references its id
///
/// Must run whenever an entry's `image_id` changes or is cleared, including
/// deletion and edit-time replacement. Returns true if the payload was
/// deleted.
pub fn remove_if_unused(doc: &mut Document, image_id: &str) -> bool {
    let used = doc
        .posts
        .iter()
        .any(|p| p.image_id.as_deref() == Some(image_id))
        || doc
            .replies
            .iter()
            .any(|r| r.image_id.as_deref() == Some(image_id));
    if used {
        return false;
    }
    doc.images.remove(image_id).is_some()
}

// ============================================================================
// STORAGE BUDGET
// ============================================================================

/// Outcome of one budget-enforcement pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Posts whose image was evicted, oldest first
    pub evicted_posts: Vec<i64>,
    /// Image payloads actually deleted from the store
    pub removed_images: Vec<String>,
    /// Serialized size after the pass
    pub final_size: usize,
}

impl EvictionReport {
    /// True when nothing was evicted
    pub fn is_empty(&self) -> bool {
        self.evicted_posts.is_empty()
    }
}

/// Current serialized size of the document
pub fn serialized_size(doc: &Document) -> usize {
    serde_json::to_string(doc).map(|s| s.len()).unwrap_or(0)
}

/// Evict images from the oldest posts until the document fits the budget
///
/// Best-effort: terminates when no post has an evictable image left, even if
/// still over budget. Each evicted post ends with `image_id` cleared and
/// `image_removed` set.
pub fn enforce_storage_budget(doc: &mut Document, budget: usize) -> EvictionReport {
    let mut report = EvictionReport::default();
    loop {
        report.final_size = serialized_size(doc);
        if report.final_size <= budget {
            break;
        }
        let target = doc
            .posts
            .iter()
            .filter(|p| p.image_id.is_some())
            .min_by_key(|p| (p.created_at, p.id))
            .map(|p| p.id);
        let Some(post_id) = target else {
            debug!(
                size = report.final_size,
                budget, "over budget with no evictable images left"
            );
            break;
        };
        let Some(post) = doc.post_mut(post_id) else {
            break;
        };
        let image_id = post.image_id.take();
        post.image_removed = true;
        report.evicted_posts.push(post_id);
        if let Some(image_id) = image_id {
            info!(post = post_id, image = %image_id, "evicting image to fit storage budget");
            if remove_if_unused(doc, &image_id) {
                report.removed_images.push(image_id);
            }
        }
    }
    report
}

// ============================================================================
// INGESTION-TIME DOWNSCALE
// ============================================================================

/// Prepare a payload for storage, downscaling oversized images
///
/// Payloads at or under the size threshold pass through untouched. Larger
/// ones are decoded, clamped to [`MAX_IMAGE_WIDTH`], and re-encoded as JPEG
/// at a fixed quality. One-way and lossy, applied at ingestion only.
pub fn ingest_payload(payload: &str) -> Result<String, ImageError> {
    if payload.len() <= DOWNSCALE_THRESHOLD_BYTES {
        return Ok(payload.to_string());
    }
    downscale(payload)
}

fn downscale(payload: &str) -> Result<String, ImageError> {
    let body = payload
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, body)| body)
        .ok_or(ImageError::InvalidDataUrl)?;
    let bytes = BASE64.decode(body)?;
    let decoded = image::load_from_memory(&bytes)?;

    let resized = if decoded.width() > MAX_IMAGE_WIDTH {
        let height = (decoded.height() as u64 * MAX_IMAGE_WIDTH as u64 / decoded.width() as u64)
            .max(1) as u32;
        decoded.resize_exact(MAX_IMAGE_WIDTH, height, image::imageops::FilterType::Triangle)
    } else {
        decoded
    };

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(
        Cursor::new(&mut out),
        JPEG_QUALITY,
    ))?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(out)))
}

// ============================================================================
// TESTS
// ============================================================================
