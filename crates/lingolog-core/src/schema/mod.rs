//! Schema module - drift-tolerant loading and migration
//!
//! The raw layer accepts any historical document shape; the normalizer
//! migrates it to the current canonical schema.

pub mod normalize;
pub mod raw;

pub use normalize::{document_from_value, normalize_document};
