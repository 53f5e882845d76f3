//! SQLite implementation of the resource repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::resource::{
    EducationalResource, ResourceDifficulty, ResourceKind, ResourceRepository,
};
use crate::error::{Error, Result};

/// SQLite-backed resource repository
pub struct SqliteResourceRepository {
    pool: SqlitePool,
}

impl SqliteResourceRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the concept links for one resource
    async fn concepts_for(&self, resource_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT concept_id FROM resource_concepts WHERE resource_id = ? ORDER BY concept_id",
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Attach concept links to a batch of fetched rows
    async fn hydrate(&self, rows: Vec<ResourceRow>) -> Result<Vec<EducationalResource>> {
        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            let concepts = self.concepts_for(&row.id).await?;
            resources.push(row.into_resource(concepts));
        }
        Ok(resources)
    }
}

#[async_trait]
impl ResourceRepository for SqliteResourceRepository {
    async fn save(&self, resource: &EducationalResource) -> Result<()> {
        if resource.concepts.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Resource '{}' must cover at least one concept",
                resource.title
            )));
        }

        // Resources are deduplicated by URL; a conflicting insert
        // refreshes the catalog entry but keeps the original ID
        sqlx::query(
            r#"
            INSERT INTO educational_resources
                (id, title, url, description, kind, difficulty_level,
                 quality_score, source_domain, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                kind = excluded.kind,
                difficulty_level = excluded.difficulty_level,
                quality_score = excluded.quality_score,
                source_domain = excluded.source_domain
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.title)
        .bind(&resource.url)
        .bind(&resource.description)
        .bind(resource.kind.as_str())
        .bind(resource.difficulty.as_str())
        .bind(resource.quality_score as f64)
        .bind(&resource.source_domain)
        .bind(resource.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        // Look the ID back up in case the URL already existed
        let (stored_id,): (String,) =
            sqlx::query_as("SELECT id FROM educational_resources WHERE url = ?")
                .bind(&resource.url)
                .fetch_one(&self.pool)
                .await?;

        sqlx::query("DELETE FROM resource_concepts WHERE resource_id = ?")
            .bind(&stored_id)
            .execute(&self.pool)
            .await?;

        for concept_id in &resource.concepts {
            sqlx::query(
                "INSERT OR IGNORE INTO resource_concepts (resource_id, concept_id) VALUES (?, ?)",
            )
            .bind(&stored_id)
            .bind(concept_id)
            .execute(&self.pool)
            .await?;
        }

        debug!(resource_id = %stored_id, url = %resource.url, "Saved resource");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<EducationalResource>> {
        let row: Option<ResourceRow> = sqlx::query_as(
            "SELECT id, title, url, description, kind, difficulty_level,
                    quality_score, source_domain, created_at
             FROM educational_resources WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let concepts = self.concepts_for(&row.id).await?;
                Ok(Some(row.into_resource(concepts)))
            }
            None => Ok(None),
        }
    }

    async fn find_for_concepts(
        &self,
        concept_ids: &[String],
        limit: usize,
    ) -> Result<Vec<EducationalResource>> {
        if concept_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<ResourceRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT r.id, r.title, r.url, r.description, r.kind,
                   r.difficulty_level, r.quality_score, r.source_domain, r.created_at
            FROM educational_resources r
            JOIN resource_concepts rc ON rc.resource_id = r.id
            WHERE rc.concept_id IN (SELECT value FROM json_each(?))
            ORDER BY r.quality_score DESC, r.title ASC
            LIMIT ?
            "#,
        )
        .bind(serde_json::to_string(concept_ids)?)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            concepts = concept_ids.len(),
            results = rows.len(),
            "Resource lookup"
        );
        self.hydrate(rows).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<EducationalResource>> {
        let rows: Vec<ResourceRow> = sqlx::query_as(
            "SELECT id, title, url, description, kind, difficulty_level,
                    quality_score, source_domain, created_at
             FROM educational_resources
             ORDER BY quality_score DESC, title ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM educational_resources")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 as u64)
    }
}

/// Database row for an educational resource
#[derive(Debug, FromRow)]
struct ResourceRow {
    id: String,
    title: String,
    url: String,
    description: String,
    kind: String,
    difficulty_level: String,
    quality_score: f64,
    source_domain: String,
    created_at: String,
}

impl ResourceRow {
    fn into_resource(self, concepts: Vec<String>) -> EducationalResource {
        EducationalResource {
            id: self.id,
            title: self.title,
            url: self.url,
            description: self.description,
            kind: ResourceKind::parse(&self.kind).unwrap_or(ResourceKind::Article),
            difficulty: ResourceDifficulty::parse(&self.difficulty_level)
                .unwrap_or(ResourceDifficulty::Beginner),
            quality_score: self.quality_score as f32,
            concepts,
            source_domain: self.source_domain,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn test_repo() -> SqliteResourceRepository {
        let db = Database::in_memory().await.expect("in-memory db");
        SqliteResourceRepository::new(db.pool().clone())
    }

    fn limits_video(quality: f32) -> EducationalResource {
        EducationalResource::new("Intro to Limits", "https://example.com/limits-video")
            .with_kind(ResourceKind::Video)
            .with_quality(quality)
            .with_concepts(vec!["limits".into()])
    }

    #[tokio::test]
    async fn test_save_requires_concepts() {
        let repo = test_repo().await;
        let resource = EducationalResource::new("Orphan", "https://example.com/orphan");

        let result = repo.save(&resource).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repo = test_repo().await;
        let resource = limits_video(0.8);

        repo.save(&resource).await.unwrap();

        let loaded = repo.get(&resource.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Intro to Limits");
        assert_eq!(loaded.kind, ResourceKind::Video);
        assert_eq!(loaded.concepts, vec!["limits".to_string()]);
        assert!((loaded.quality_score - 0.8).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_save_deduplicates_by_url() {
        let repo = test_repo().await;
        repo.save(&limits_video(0.5)).await.unwrap();

        // Same URL, different ID and metadata
        let updated = EducationalResource::new("Limits, revisited", "https://example.com/limits-video")
            .with_quality(0.9)
            .with_concepts(vec!["limits".into(), "derivatives".into()]);
        repo.save(&updated).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);

        let all = repo.list(10).await.unwrap();
        assert_eq!(all[0].title, "Limits, revisited");
        assert_eq!(all[0].concepts.len(), 2);
    }

    #[tokio::test]
    async fn test_find_for_concepts_quality_order() {
        let repo = test_repo().await;

        let low = EducationalResource::new("Okay article", "https://example.com/a")
            .with_quality(0.4)
            .with_concepts(vec!["derivatives".into()]);
        let high = EducationalResource::new("Great video", "https://example.com/b")
            .with_quality(0.95)
            .with_concepts(vec!["derivatives".into()]);
        let unrelated = EducationalResource::new("Geometry", "https://example.com/c")
            .with_quality(0.99)
            .with_concepts(vec!["triangles".into()]);

        for r in [&low, &high, &unrelated] {
            repo.save(r).await.unwrap();
        }

        let found = repo
            .find_for_concepts(&["derivatives".to_string()], 10)
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Great video");
        assert_eq!(found[1].title, "Okay article");
    }

    #[tokio::test]
    async fn test_find_for_concepts_respects_limit() {
        let repo = test_repo().await;
        for i in 0..5 {
            let r = EducationalResource::new(
                format!("Resource {}", i),
                format!("https://example.com/{}", i),
            )
            .with_quality(0.1 * i as f32)
            .with_concepts(vec!["limits".into()]);
            repo.save(&r).await.unwrap();
        }

        let found = repo
            .find_for_concepts(&["limits".to_string()], 3)
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
    }
}
