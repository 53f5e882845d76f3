//! Repository trait for content chunks

use async_trait::async_trait;

use crate::error::Result;

use super::chunk::{ContentChunk, ScoredChunk};

/// Repository trait for content chunk persistence and retrieval
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Save a chunk (insert or update)
    async fn save(&self, chunk: &ContentChunk) -> Result<()>;

    /// Get a chunk by ID
    async fn get(&self, id: &str) -> Result<Option<ContentChunk>>;

    /// Keyword search over chunk text, best match first
    async fn search_keyword(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Embedding similarity search, most similar first
    ///
    /// Chunks without an embedding are skipped; matches below
    /// `min_similarity` are dropped.
    async fn search_semantic(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Count ingested chunks
    async fn count(&self) -> Result<u64>;
}
