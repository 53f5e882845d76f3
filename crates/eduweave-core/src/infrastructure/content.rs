//! SQLite implementation of the content chunk repository
//!
//! Keyword retrieval goes through the FTS5 mirror table; semantic
//! retrieval scans stored embedding BLOBs and ranks by cosine
//! similarity in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::context::{ContentChunk, ContentRepository, ScoredChunk};
use crate::error::Result;

/// SQLite-backed content chunk repository
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    async fn save(&self, chunk: &ContentChunk) -> Result<()> {
        let embedding_bytes = chunk.embedding.as_ref().map(|v| embedding_to_bytes(v));

        sqlx::query(
            r#"
            INSERT INTO content_chunks
                (id, content, concept, chapter, source, chunk_index, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                concept = excluded.concept,
                chapter = excluded.chapter,
                source = excluded.source,
                chunk_index = excluded.chunk_index,
                embedding = excluded.embedding
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.content)
        .bind(&chunk.concept)
        .bind(&chunk.chapter)
        .bind(&chunk.source)
        .bind(chunk.chunk_index as i64)
        .bind(embedding_bytes)
        .bind(chunk.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(chunk_id = %chunk.id, "Saved content chunk");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ContentChunk>> {
        let row: Option<ChunkRow> = sqlx::query_as(
            "SELECT id, content, concept, chapter, source, chunk_index, embedding, created_at
             FROM content_chunks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_chunk()))
    }

    async fn search_keyword(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let match_expr = fts_match_expression(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<RankedChunkRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.content, c.concept, c.chapter, c.source, c.chunk_index,
                   c.embedding, c.created_at, bm25(content_chunks_fts) AS rank
            FROM content_chunks c
            JOIN content_chunks_fts fts ON c.rowid = fts.rowid
            WHERE content_chunks_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(query = %query, results = rows.len(), "Keyword search");

        // bm25 ranks are negative with better matches more negative
        Ok(rows
            .into_iter()
            .map(|row| {
                let score = -row.rank as f32;
                ScoredChunk {
                    chunk: row.chunk.into_chunk(),
                    score,
                }
            })
            .collect())
    }

    async fn search_semantic(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let rows: Vec<ChunkRow> = sqlx::query_as(
            "SELECT id, content, concept, chapter, source, chunk_index, embedding, created_at
             FROM content_chunks WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<ScoredChunk> = rows
            .into_iter()
            .filter_map(|row| {
                let chunk = row.into_chunk();
                let embedding = chunk.embedding.as_deref()?;
                let score = cosine_similarity(query_embedding, embedding);
                if score >= min_similarity {
                    Some(ScoredChunk { chunk, score })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!(results = scored.len(), "Semantic search");
        Ok(scored)
    }

    async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }
}

/// Build an FTS5 MATCH expression from free-form question text
///
/// Question punctuation is FTS5 syntax, so each word is quoted and the
/// words are OR-joined to rank partial matches instead of requiring
/// every term.
fn fts_match_expression(query: &str) -> String {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2)
        .map(|w| format!("\"{}\"", w.to_lowercase()))
        .collect();

    words.join(" OR ")
}

fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn embedding_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Database row for a content chunk
#[derive(Debug, FromRow)]
struct ChunkRow {
    id: String,
    content: String,
    concept: String,
    chapter: String,
    source: String,
    chunk_index: i64,
    embedding: Option<Vec<u8>>,
    created_at: String,
}

impl ChunkRow {
    fn into_chunk(self) -> ContentChunk {
        ContentChunk {
            id: self.id,
            content: self.content,
            concept: self.concept,
            chapter: self.chapter,
            source: self.source,
            chunk_index: self.chunk_index.max(0) as u32,
            embedding: self.embedding.as_deref().map(embedding_from_bytes),
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

/// Chunk row with an FTS rank column
#[derive(Debug, FromRow)]
struct RankedChunkRow {
    #[sqlx(flatten)]
    chunk: ChunkRow,
    rank: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_repo() -> SqliteContentRepository {
        let db = Database::in_memory().await.expect("in-memory db");
        SqliteContentRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repo = test_repo().await;
        let chunk = ContentChunk::new("The derivative measures the rate of change.")
            .with_concept("derivatives")
            .with_embedding(vec![0.1, 0.2, 0.3]);

        repo.save(&chunk).await.unwrap();

        let loaded = repo.get(&chunk.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, chunk.content);
        assert_eq!(loaded.embedding, Some(vec![0.1, 0.2, 0.3]));
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_matches() {
        let repo = test_repo().await;
        repo.save(
            &ContentChunk::new("The derivative of a function measures instantaneous change")
                .with_concept("derivatives"),
        )
        .await
        .unwrap();
        repo.save(&ContentChunk::new("A limit describes the value a function approaches"))
            .await
            .unwrap();

        let results = repo
            .search_keyword("what is a derivative?", 5)
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert!(results[0].chunk.content.contains("derivative"));
    }

    #[tokio::test]
    async fn test_keyword_search_empty_query() {
        let repo = test_repo().await;
        let results = repo.search_keyword("?!", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_search_orders_by_similarity() {
        let repo = test_repo().await;
        repo.save(&ContentChunk::new("close match").with_embedding(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        repo.save(&ContentChunk::new("far match").with_embedding(vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        repo.save(&ContentChunk::new("no embedding")).await.unwrap();

        let results = repo
            .search_semantic(&[0.9, 0.1, 0.0], 10, 0.0)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "close match");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_semantic_search_min_similarity_filter() {
        let repo = test_repo().await;
        repo.save(&ContentChunk::new("orthogonal").with_embedding(vec![0.0, 1.0]))
            .await
            .unwrap();

        let results = repo.search_semantic(&[1.0, 0.0], 10, 0.5).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_fts_match_expression() {
        assert_eq!(
            fts_match_expression("What is a derivative?"),
            "\"what\" OR \"is\" OR \"derivative\""
        );
        assert_eq!(fts_match_expression("x + y"), "");
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let original = vec![0.5_f32, -2.25, 100.0];
        let bytes = embedding_to_bytes(&original);
        assert_eq!(embedding_from_bytes(&bytes), original);
    }
}
