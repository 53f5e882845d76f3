//! Content chunk types
//!
//! Textbook and course material is ingested as chunks. Retrieval ranks
//! chunks against a question, by embedding similarity when available
//! and keyword match otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A retrievable piece of educational content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    /// Unique identifier
    pub id: String,
    /// The chunk text
    pub content: String,
    /// Concept the chunk primarily explains
    #[serde(default)]
    pub concept: String,
    /// Chapter or section the chunk came from
    #[serde(default)]
    pub chapter: String,
    /// Source document or course name
    #[serde(default)]
    pub source: String,
    /// Position of the chunk within its source
    #[serde(default)]
    pub chunk_index: u32,
    /// Embedding vector, present once the chunk has been indexed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// When the chunk was ingested
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ContentChunk {
    /// Create a new chunk
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            concept: String::new(),
            chapter: String::new(),
            source: String::new(),
            chunk_index: 0,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Set the concept the chunk explains
    pub fn with_concept(mut self, concept: impl Into<String>) -> Self {
        self.concept = concept.into();
        self
    }

    /// Set the originating chapter
    pub fn with_chapter(mut self, chapter: impl Into<String>) -> Self {
        self.chapter = chapter.into();
        self
    }

    /// Set the source document
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the position within the source
    pub fn with_index(mut self, index: u32) -> Self {
        self.chunk_index = index;
        self
    }

    /// Attach an embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A chunk paired with its retrieval score
///
/// Scores from embedding retrieval are cosine similarities in
/// [-1.0, 1.0]; keyword retrieval reports a rank-derived score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: ContentChunk,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_builder() {
        let chunk = ContentChunk::new("The limit of f(x) as x approaches a...")
            .with_concept("limits")
            .with_chapter("2.1")
            .with_source("calculus-vol1")
            .with_index(4);

        assert!(!chunk.id.is_empty());
        assert_eq!(chunk.concept, "limits");
        assert_eq!(chunk.chunk_index, 4);
        assert!(chunk.embedding.is_none());
    }
}
