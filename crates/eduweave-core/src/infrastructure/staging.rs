//! SQLite implementation of the staged concept repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::staging::{StagedConcept, StagedConceptRepository, StagedStatus, StagingStats};
use crate::error::{Error, Result};

/// SQLite-backed staged concept repository
pub struct SqliteStagedConceptRepository {
    pool: SqlitePool,
}

impl SqliteStagedConceptRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, concept_name: &str) -> Result<Option<StagedRow>> {
        let row: Option<StagedRow> = sqlx::query_as(
            "SELECT concept_name, description, suggested_prerequisites, confidence,
                    difficulty_level, category, reasoning, status, occurrence_count,
                    related_fingerprints, source_question, reviewed_by, reviewed_at,
                    review_notes, approved_concept_id, first_seen_at, updated_at
             FROM staged_concepts WHERE concept_name = ?",
        )
        .bind(concept_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl StagedConceptRepository for SqliteStagedConceptRepository {
    async fn get(&self, concept_name: &str) -> Result<Option<StagedConcept>> {
        Ok(self.fetch(concept_name).await?.map(|r| r.into_staged()))
    }

    async fn save(&self, staged: &StagedConcept) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO staged_concepts
                (concept_name, description, suggested_prerequisites, confidence,
                 difficulty_level, category, reasoning, status, occurrence_count,
                 related_fingerprints, source_question, reviewed_by, reviewed_at,
                 review_notes, approved_concept_id, first_seen_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(concept_name) DO UPDATE SET
                description = excluded.description,
                suggested_prerequisites = excluded.suggested_prerequisites,
                confidence = excluded.confidence,
                difficulty_level = excluded.difficulty_level,
                category = excluded.category,
                reasoning = excluded.reasoning,
                status = excluded.status,
                occurrence_count = excluded.occurrence_count,
                related_fingerprints = excluded.related_fingerprints,
                source_question = excluded.source_question,
                reviewed_by = excluded.reviewed_by,
                reviewed_at = excluded.reviewed_at,
                review_notes = excluded.review_notes,
                approved_concept_id = excluded.approved_concept_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&staged.concept_name)
        .bind(&staged.description)
        .bind(serde_json::to_string(&staged.suggested_prerequisites).unwrap_or_default())
        .bind(staged.confidence as f64)
        .bind(staged.difficulty_level as i64)
        .bind(&staged.category)
        .bind(&staged.reasoning)
        .bind(staged.status.as_str())
        .bind(staged.occurrence_count as i64)
        .bind(serde_json::to_string(&staged.related_fingerprints).unwrap_or_default())
        .bind(&staged.source_question)
        .bind(&staged.reviewed_by)
        .bind(staged.reviewed_at.map(|dt| dt.to_rfc3339()))
        .bind(&staged.review_notes)
        .bind(&staged.approved_concept_id)
        .bind(staged.first_seen_at.to_rfc3339())
        .bind(staged.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(concept_name = %staged.concept_name, status = %staged.status, "Saved staged concept");
        Ok(())
    }

    async fn increment_occurrence(&self, concept_name: &str, fingerprint: &str) -> Result<bool> {
        let Some(row) = self.fetch(concept_name).await? else {
            return Ok(false);
        };

        let mut fingerprints: Vec<String> =
            serde_json::from_str(&row.related_fingerprints).unwrap_or_default();
        if !fingerprints.iter().any(|f| f == fingerprint) {
            fingerprints.push(fingerprint.to_string());
        }

        sqlx::query(
            "UPDATE staged_concepts
             SET occurrence_count = occurrence_count + 1,
                 related_fingerprints = ?,
                 updated_at = ?
             WHERE concept_name = ?",
        )
        .bind(serde_json::to_string(&fingerprints).unwrap_or_default())
        .bind(Utc::now().to_rfc3339())
        .bind(concept_name)
        .execute(&self.pool)
        .await?;

        debug!(concept_name = %concept_name, "Recorded staged concept occurrence");
        Ok(true)
    }

    async fn list_by_status(
        &self,
        status: StagedStatus,
        limit: usize,
    ) -> Result<Vec<StagedConcept>> {
        let rows: Vec<StagedRow> = sqlx::query_as(
            "SELECT concept_name, description, suggested_prerequisites, confidence,
                    difficulty_level, category, reasoning, status, occurrence_count,
                    related_fingerprints, source_question, reviewed_by, reviewed_at,
                    review_notes, approved_concept_id, first_seen_at, updated_at
             FROM staged_concepts WHERE status = ?
             ORDER BY occurrence_count DESC, concept_name ASC
             LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_staged()).collect())
    }

    async fn mark_reviewed(
        &self,
        concept_name: &str,
        status: StagedStatus,
        reviewed_by: &str,
        notes: Option<&str>,
        approved_concept_id: Option<&str>,
    ) -> Result<StagedConcept> {
        let now = Utc::now().to_rfc3339();

        // Guard in SQL: only pending entries can change status, so
        // review decisions never revert
        let result = sqlx::query(
            "UPDATE staged_concepts
             SET status = ?, reviewed_by = ?, reviewed_at = ?,
                 review_notes = ?, approved_concept_id = ?, updated_at = ?
             WHERE concept_name = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(reviewed_by)
        .bind(&now)
        .bind(notes)
        .bind(approved_concept_id)
        .bind(&now)
        .bind(concept_name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.fetch(concept_name).await? {
                None => Err(Error::StagedConceptNotFound(concept_name.to_string())),
                Some(row) => Err(Error::StagedConceptNotPending(
                    concept_name.to_string(),
                    row.status,
                )),
            };
        }

        debug!(concept_name = %concept_name, status = %status, "Reviewed staged concept");

        self.fetch(concept_name)
            .await?
            .map(|r| r.into_staged())
            .ok_or_else(|| Error::StagedConceptNotFound(concept_name.to_string()))
    }

    async fn stats(&self) -> Result<StagingStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM staged_concepts GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = StagingStats::default();
        for (status, count) in rows {
            let count = count as u64;
            match StagedStatus::parse(&status) {
                Some(StagedStatus::Pending) => stats.pending = count,
                Some(StagedStatus::Approved) => stats.approved = count,
                Some(StagedStatus::Rejected) => stats.rejected = count,
                Some(StagedStatus::Merged) => stats.merged = count,
                None => {}
            }
        }
        Ok(stats)
    }
}

/// Database row for a staged concept
#[derive(Debug, FromRow)]
struct StagedRow {
    concept_name: String,
    description: String,
    suggested_prerequisites: String,
    confidence: f64,
    difficulty_level: i64,
    category: String,
    reasoning: String,
    status: String,
    occurrence_count: i64,
    related_fingerprints: String,
    source_question: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<String>,
    review_notes: Option<String>,
    approved_concept_id: Option<String>,
    first_seen_at: String,
    updated_at: String,
}

impl StagedRow {
    fn into_staged(self) -> StagedConcept {
        StagedConcept {
            concept_name: self.concept_name,
            description: self.description,
            suggested_prerequisites: serde_json::from_str(&self.suggested_prerequisites)
                .unwrap_or_default(),
            confidence: self.confidence as f32,
            difficulty_level: self.difficulty_level.clamp(1, 5) as u8,
            category: self.category,
            reasoning: self.reasoning,
            status: StagedStatus::parse(&self.status).unwrap_or(StagedStatus::Pending),
            occurrence_count: self.occurrence_count.max(0) as u64,
            related_fingerprints: serde_json::from_str(&self.related_fingerprints)
                .unwrap_or_default(),
            source_question: self.source_question,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at.as_deref().map(parse_datetime),
            review_notes: self.review_notes,
            approved_concept_id: self.approved_concept_id,
            first_seen_at: parse_datetime(&self.first_seen_at),
            updated_at: parse_datetime(&self.updated_at),
        }
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_repo() -> SqliteStagedConceptRepository {
        let db = Database::in_memory().await.expect("in-memory db");
        SqliteStagedConceptRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repo = test_repo().await;
        let staged = StagedConcept::new("implicit differentiation")
            .with_source_question("How do I differentiate x^2 + y^2 = 1?")
            .with_fingerprint("fp-1");

        repo.save(&staged).await.unwrap();

        let loaded = repo.get("implicit differentiation").await.unwrap().unwrap();
        assert_eq!(loaded.status, StagedStatus::Pending);
        assert_eq!(loaded.occurrence_count, 1);
        assert_eq!(loaded.related_fingerprints, vec!["fp-1"]);
    }

    #[tokio::test]
    async fn test_increment_occurrence() {
        let repo = test_repo().await;
        repo.save(&StagedConcept::new("tensors").with_fingerprint("fp-1"))
            .await
            .unwrap();

        assert!(repo.increment_occurrence("tensors", "fp-2").await.unwrap());
        assert!(repo.increment_occurrence("tensors", "fp-2").await.unwrap());
        assert!(!repo.increment_occurrence("missing", "fp-3").await.unwrap());

        let loaded = repo.get("tensors").await.unwrap().unwrap();
        assert_eq!(loaded.occurrence_count, 3);
        assert_eq!(loaded.related_fingerprints, vec!["fp-1", "fp-2"]);
    }

    #[tokio::test]
    async fn test_list_by_status_orders_by_occurrences() {
        let repo = test_repo().await;

        let mut popular = StagedConcept::new("popular");
        popular.occurrence_count = 7;
        repo.save(&popular).await.unwrap();
        repo.save(&StagedConcept::new("rare")).await.unwrap();

        let pending = repo.list_by_status(StagedStatus::Pending, 10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].concept_name, "popular");

        let approved = repo.list_by_status(StagedStatus::Approved, 10).await.unwrap();
        assert!(approved.is_empty());
    }

    #[tokio::test]
    async fn test_mark_reviewed_transitions() {
        let repo = test_repo().await;
        repo.save(&StagedConcept::new("tensors")).await.unwrap();

        let reviewed = repo
            .mark_reviewed(
                "tensors",
                StagedStatus::Approved,
                "alice",
                Some("good addition"),
                Some("tensors"),
            )
            .await
            .unwrap();

        assert_eq!(reviewed.status, StagedStatus::Approved);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("alice"));
        assert_eq!(reviewed.approved_concept_id.as_deref(), Some("tensors"));
        assert!(reviewed.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_reviewed_is_monotonic() {
        let repo = test_repo().await;
        repo.save(&StagedConcept::new("tensors")).await.unwrap();

        repo.mark_reviewed("tensors", StagedStatus::Rejected, "alice", None, None)
            .await
            .unwrap();

        let again = repo
            .mark_reviewed("tensors", StagedStatus::Approved, "bob", None, None)
            .await;
        assert!(matches!(again, Err(Error::StagedConceptNotPending(_, _))));

        // Still rejected
        let loaded = repo.get("tensors").await.unwrap().unwrap();
        assert_eq!(loaded.status, StagedStatus::Rejected);
    }

    #[tokio::test]
    async fn test_mark_reviewed_missing_entry() {
        let repo = test_repo().await;
        let result = repo
            .mark_reviewed("ghost", StagedStatus::Approved, "alice", None, None)
            .await;
        assert!(matches!(result, Err(Error::StagedConceptNotFound(_))));
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let repo = test_repo().await;
        repo.save(&StagedConcept::new("a")).await.unwrap();
        repo.save(&StagedConcept::new("b")).await.unwrap();
        repo.mark_reviewed("a", StagedStatus::Approved, "alice", None, None)
            .await
            .unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.total(), 2);
    }
}
