//! SQLite implementation of the answer cache repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::answer::{AnswerCacheRepository, AnswerRecord};
use crate::error::Result;

/// SQLite-backed answer cache repository
pub struct SqliteAnswerCacheRepository {
    pool: SqlitePool,
}

impl SqliteAnswerCacheRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnswerCacheRepository for SqliteAnswerCacheRepository {
    async fn get(&self, fingerprint: &str) -> Result<Option<AnswerRecord>> {
        let row: Option<AnswerRow> = sqlx::query_as(
            "SELECT fingerprint, question, identified_concepts, learning_path,
                    context_snippets, explanation, resources, created_at
             FROM answer_records WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record()))
    }

    async fn put(&self, record: &AnswerRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO answer_records
                (fingerprint, question, identified_concepts, learning_path,
                 context_snippets, explanation, resources, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(fingerprint) DO UPDATE SET
                question = excluded.question,
                identified_concepts = excluded.identified_concepts,
                learning_path = excluded.learning_path,
                context_snippets = excluded.context_snippets,
                explanation = excluded.explanation,
                resources = excluded.resources,
                created_at = excluded.created_at
            "#,
        )
        .bind(&record.fingerprint)
        .bind(&record.question)
        .bind(serde_json::to_string(&record.identified_concepts).unwrap_or_default())
        .bind(serde_json::to_string(&record.learning_path).unwrap_or_default())
        .bind(serde_json::to_string(&record.context_snippets).unwrap_or_default())
        .bind(&record.explanation)
        .bind(serde_json::to_string(&record.resources).unwrap_or_default())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(fingerprint = %record.fingerprint, "Cached answer");
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<AnswerRecord>> {
        let rows: Vec<AnswerRow> = sqlx::query_as(
            "SELECT fingerprint, question, identified_concepts, learning_path,
                    context_snippets, explanation, resources, created_at
             FROM answer_records ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_record()).collect())
    }

    async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM answer_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }
}

/// Database row for a cached answer
#[derive(Debug, FromRow)]
struct AnswerRow {
    fingerprint: String,
    question: String,
    identified_concepts: String,
    learning_path: String,
    context_snippets: String,
    explanation: String,
    resources: String,
    created_at: String,
}

impl AnswerRow {
    fn into_record(self) -> AnswerRecord {
        AnswerRecord {
            fingerprint: self.fingerprint,
            question: self.question,
            identified_concepts: serde_json::from_str(&self.identified_concepts)
                .unwrap_or_default(),
            learning_path: serde_json::from_str(&self.learning_path).unwrap_or_default(),
            context_snippets: serde_json::from_str(&self.context_snippets).unwrap_or_default(),
            explanation: self.explanation,
            resources: serde_json::from_str(&self.resources).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}
