//! Content chunk domain module
//!
//! Ingested course material, retrieved as grounding context during
//! answer synthesis.

mod chunk;
mod repository;

pub use chunk::{ContentChunk, ScoredChunk};
pub use repository::ContentRepository;
