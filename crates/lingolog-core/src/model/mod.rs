//! Model module - canonical typed document and records
//!
//! The canonical structs never carry legacy fields; anything tolerant lives
//! in the schema layer and is migrated forward on load.

mod document;
mod post;
mod puzzle;

pub use document::{Document, DocumentStats, SCHEMA_VERSION};
pub use post::{Post, PostText, Reply, Speaker};
pub use puzzle::{Puzzle, PuzzleNote, ReviewEntry, ReviewState, TextRef};
