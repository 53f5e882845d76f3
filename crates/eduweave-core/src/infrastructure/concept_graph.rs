//! SQLite implementation of the concept graph repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::concept::{
    slug_id, BatchResolution, Concept, ConceptDetail, ConceptGraphRepository, GraphStats,
    LearningPath, PathNode, PathRole, PrerequisiteEdge, ResolvedConcept,
};
use crate::error::{Error, Result};

/// SQLite-backed concept graph repository
pub struct SqliteConceptGraphRepository {
    pool: SqlitePool,
}

impl SqliteConceptGraphRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConceptGraphRepository for SqliteConceptGraphRepository {
    async fn save(&self, concept: &Concept) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO concepts (id, name, description, difficulty_level, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                difficulty_level = excluded.difficulty_level,
                tags = excluded.tags,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&concept.id)
        .bind(&concept.name)
        .bind(&concept.description)
        .bind(concept.difficulty_level as i64)
        .bind(serde_json::to_string(&concept.tags).unwrap_or_default())
        .bind(concept.created_at.to_rfc3339())
        .bind(concept.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(concept_id = %concept.id, "Saved concept");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Concept>> {
        let row: Option<ConceptRow> = sqlx::query_as(
            "SELECT id, name, description, difficulty_level, tags, created_at, updated_at
             FROM concepts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_concept()).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Concept>> {
        let row: Option<ConceptRow> = sqlx::query_as(
            "SELECT id, name, description, difficulty_level, tags, created_at, updated_at
             FROM concepts WHERE lower(name) = lower(?) ORDER BY name LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_concept()).transpose()
    }

    async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let slug = slug_id(name);
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM concepts WHERE lower(name) = lower(?) OR id = ?",
        )
        .bind(name)
        .bind(&slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0 > 0)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Concept>> {
        let rows: Vec<ConceptRow> = sqlx::query_as(
            "SELECT id, name, description, difficulty_level, tags, created_at, updated_at
             FROM concepts ORDER BY name LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_concept()).collect()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM concepts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_edge(&self, edge: &PrerequisiteEdge) -> Result<()> {
        if edge.is_self_loop() {
            return Err(Error::InvalidInput(format!(
                "Concept '{}' cannot be its own prerequisite",
                edge.from_id
            )));
        }

        for id in [&edge.from_id, &edge.to_id] {
            let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM concepts WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            if exists.0 == 0 {
                return Err(Error::InvalidInput(format!(
                    "Edge references unknown concept '{}'",
                    id
                )));
            }
        }

        sqlx::query(
            "INSERT OR IGNORE INTO prerequisite_edges (from_id, to_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(&edge.from_id)
        .bind(&edge.to_id)
        .bind(edge.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(from = %edge.from_id, to = %edge.to_id, "Saved prerequisite edge");
        Ok(())
    }

    async fn list_edges(&self) -> Result<Vec<PrerequisiteEdge>> {
        let rows: Vec<EdgeRow> = sqlx::query_as(
            "SELECT from_id, to_id, created_at FROM prerequisite_edges ORDER BY from_id, to_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_edge()).collect())
    }

    async fn resolve_batch(&self, names: &[String]) -> Result<BatchResolution> {
        let requested: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        if requested.is_empty() {
            return Ok(BatchResolution {
                resolved: Vec::new(),
                unmatched: names.to_vec(),
            });
        }

        // One query for the whole batch. A name matches on exact ID,
        // case-insensitive name equality, or name substring, in that
        // order of preference.
        let rows: Vec<ResolutionRow> = sqlx::query_as(
            r#"
            SELECT req.value AS requested,
                   c.id AS concept_id,
                   c.name AS name,
                   CASE WHEN c.id = req.value THEN 0
                        WHEN lower(c.name) = lower(req.value) THEN 1
                        ELSE 2 END AS quality
            FROM json_each(?) AS req
            JOIN concepts c
              ON c.id = req.value
              OR lower(c.name) = lower(req.value)
              OR instr(lower(c.name), lower(req.value)) > 0
            ORDER BY req.key ASC, quality ASC, c.name ASC
            "#,
        )
        .bind(serde_json::to_string(&requested)?)
        .fetch_all(&self.pool)
        .await?;

        // First row per requested name is the best match
        let mut best: HashMap<String, (String, String)> = HashMap::new();
        for row in rows {
            best.entry(row.requested)
                .or_insert((row.concept_id, row.name));
        }

        let mut resolution = BatchResolution::default();
        for name in names {
            let trimmed = name.trim();
            match best.get(trimmed) {
                Some((concept_id, concept_name)) => resolution.resolved.push(ResolvedConcept {
                    requested: name.clone(),
                    concept_id: concept_id.clone(),
                    name: concept_name.clone(),
                }),
                None => resolution.unmatched.push(name.clone()),
            }
        }

        debug!(
            requested = names.len(),
            resolved = resolution.resolved.len(),
            unmatched = resolution.unmatched.len(),
            "Resolved concept batch"
        );
        Ok(resolution)
    }

    async fn prerequisite_path(
        &self,
        target_ids: &[String],
        max_depth: u32,
        max_nodes: usize,
    ) -> Result<LearningPath> {
        if target_ids.is_empty() || max_nodes == 0 {
            return Ok(LearningPath::new());
        }

        // Walk prerequisite edges backwards from the targets. The walk
        // is bounded by depth, guards against cycles via the visited
        // path string, and the node cap keeps the targets plus the
        // prerequisites closest to them.
        let rows: Vec<PathWalkRow> = sqlx::query_as(
            r#"
            WITH RECURSIVE walk(id, depth, path) AS (
                SELECT c.id, 0, '/' || c.id || '/'
                FROM concepts c
                WHERE c.id IN (SELECT value FROM json_each(?))
                UNION ALL
                SELECT e.from_id, w.depth + 1, w.path || e.from_id || '/'
                FROM prerequisite_edges e
                JOIN walk w ON e.to_id = w.id
                WHERE w.depth < ?
                  AND w.path NOT LIKE '%/' || e.from_id || '/%'
            )
            SELECT c.id, c.name, c.description, c.difficulty_level,
                   MIN(w.depth) AS min_depth,
                   MAX(w.depth) AS max_depth
            FROM walk w
            JOIN concepts c ON c.id = w.id
            GROUP BY c.id, c.name, c.description, c.difficulty_level
            ORDER BY min_depth ASC, c.name ASC
            LIMIT ?
            "#,
        )
        .bind(serde_json::to_string(target_ids)?)
        .bind(max_depth as i64)
        .bind(max_nodes as i64)
        .fetch_all(&self.pool)
        .await?;

        // Deepest prerequisites first approximates a topological order
        // within the traversal bound
        let mut rows = rows;
        rows.sort_by(|a, b| b.max_depth.cmp(&a.max_depth).then(a.name.cmp(&b.name)));

        let nodes = rows
            .into_iter()
            .map(|row| PathNode {
                concept_id: row.id,
                name: row.name,
                description: row.description,
                difficulty_level: row.difficulty_level.clamp(1, 5) as u8,
                role: if row.min_depth == 0 {
                    PathRole::Target
                } else {
                    PathRole::Prerequisite
                },
            })
            .collect();

        Ok(LearningPath { nodes })
    }

    async fn concept_detail(&self, id: &str) -> Result<Option<ConceptDetail>> {
        let Some(concept) = self.get(id).await? else {
            return Ok(None);
        };

        let prerequisite_rows: Vec<ConceptRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.difficulty_level, c.tags, c.created_at, c.updated_at
            FROM concepts c
            JOIN prerequisite_edges e ON e.from_id = c.id
            WHERE e.to_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let leads_to_rows: Vec<ConceptRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.difficulty_level, c.tags, c.created_at, c.updated_at
            FROM concepts c
            JOIN prerequisite_edges e ON e.to_id = c.id
            WHERE e.from_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let prerequisites = prerequisite_rows
            .into_iter()
            .map(|r| r.into_concept())
            .collect::<Result<Vec<_>>>()?;
        let leads_to = leads_to_rows
            .into_iter()
            .map(|r| r.into_concept())
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ConceptDetail {
            concept,
            prerequisites,
            leads_to,
        }))
    }

    async fn stats(&self) -> Result<GraphStats> {
        let concepts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM concepts")
            .fetch_one(&self.pool)
            .await?;
        let edges: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prerequisite_edges")
            .fetch_one(&self.pool)
            .await?;

        Ok(GraphStats {
            concept_count: concepts.0 as u64,
            edge_count: edges.0 as u64,
        })
    }
}

/// Database row for a concept
#[derive(Debug, FromRow)]
struct ConceptRow {
    id: String,
    name: String,
    description: String,
    difficulty_level: i64,
    tags: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConceptRow {
    fn into_concept(self) -> Result<Concept> {
        Ok(Concept {
            id: self.id,
            name: self.name,
            description: self.description,
            difficulty_level: self.difficulty_level.clamp(1, 5) as u8,
            tags: self
                .tags
                .as_deref()
                .map(|t| serde_json::from_str(t).unwrap_or_default())
                .unwrap_or_default(),
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        })
    }
}

/// Database row for a prerequisite edge
#[derive(Debug, FromRow)]
struct EdgeRow {
    from_id: String,
    to_id: String,
    created_at: String,
}

impl EdgeRow {
    fn into_edge(self) -> PrerequisiteEdge {
        PrerequisiteEdge {
            from_id: self.from_id,
            to_id: self.to_id,
            created_at: parse_datetime(&self.created_at),
        }
    }
}

/// Database row for a batch resolution match
#[derive(Debug, FromRow)]
struct ResolutionRow {
    requested: String,
    concept_id: String,
    name: String,
    #[allow(dead_code)]
    quality: i64,
}

/// Database row for a traversal step
#[derive(Debug, FromRow)]
struct PathWalkRow {
    id: String,
    name: String,
    description: String,
    difficulty_level: i64,
    min_depth: i64,
    max_depth: i64,
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

    async fn test_repo() -> SqliteConceptGraphRepository {
        let db = Database::in_memory().await.expect("in-memory db");
        SqliteConceptGraphRepository::new(db.pool().clone())
    }

    async fn seed_calculus(repo: &SqliteConceptGraphRepository) {
        for (id, name) in [
            ("algebra", "Algebra"),
            ("limits", "Limits"),
            ("derivatives", "Derivatives"),
            ("chain_rule", "Chain Rule"),
        ] {
            repo.save(
                &Concept::new(name)
                    .with_id(id)
                    .with_description(format!("About {}", name)),
            )
            .await
            .unwrap();
        }
        for (from, to) in [
            ("algebra", "limits"),
            ("limits", "derivatives"),
            ("derivatives", "chain_rule"),
        ] {
            repo.save_edge(&PrerequisiteEdge::new(from, to)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_save_and_get_concept() {
        let repo = test_repo().await;
        let concept = Concept::new("Derivatives")
            .with_description("Rates of change")
            .with_difficulty(2)
            .with_tags(vec!["calculus".into()]);

        repo.save(&concept).await.unwrap();

        let loaded = repo.get("derivatives").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Derivatives");
        assert_eq!(loaded.difficulty_level, 2);
        assert_eq!(loaded.tags, vec!["calculus".to_string()]);
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = test_repo().await;
        repo.save(&Concept::new("Limits")).await.unwrap();
        repo.save(&Concept::new("Limits").with_description("Approaching values"))
            .await
            .unwrap();

        let loaded = repo.get("limits").await.unwrap().unwrap();
        assert_eq!(loaded.description, "Approaching values");

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.concept_count, 1);
    }

    #[tokio::test]
    async fn test_get_by_name_case_insensitive() {
        let repo = test_repo().await;
        repo.save(&Concept::new("Chain Rule")).await.unwrap();

        let loaded = repo.get_by_name("chain rule").await.unwrap();
        assert!(loaded.is_some());
        assert!(repo.exists_by_name("CHAIN RULE").await.unwrap());
        assert!(!repo.exists_by_name("integrals").await.unwrap());
    }

    #[tokio::test]
    async fn test_edge_validation() {
        let repo = test_repo().await;
        repo.save(&Concept::new("Limits")).await.unwrap();

        let self_loop = repo
            .save_edge(&PrerequisiteEdge::new("limits", "limits"))
            .await;
        assert!(matches!(self_loop, Err(Error::InvalidInput(_))));

        let unknown = repo
            .save_edge(&PrerequisiteEdge::new("limits", "derivatives"))
            .await;
        assert!(matches!(unknown, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_edge_save_idempotent() {
        let repo = test_repo().await;
        repo.save(&Concept::new("Limits")).await.unwrap();
        repo.save(&Concept::new("Derivatives")).await.unwrap();

        let edge = PrerequisiteEdge::new("limits", "derivatives");
        repo.save_edge(&edge).await.unwrap();
        repo.save_edge(&edge).await.unwrap();

        assert_eq!(repo.stats().await.unwrap().edge_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_batch_matching_tiers() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let names = vec![
            "chain_rule".to_string(), // exact ID
            "LIMITS".to_string(),     // case-insensitive name
            "deriv".to_string(),      // substring
            "quantum field theory".to_string(),
        ];
        let resolution = repo.resolve_batch(&names).await.unwrap();

        assert_eq!(resolution.resolved.len(), 3);
        assert_eq!(resolution.resolved[0].concept_id, "chain_rule");
        assert_eq!(resolution.resolved[1].concept_id, "limits");
        assert_eq!(resolution.resolved[2].concept_id, "derivatives");
        assert_eq!(resolution.unmatched, vec!["quantum field theory"]);
    }

    #[tokio::test]
    async fn test_resolve_batch_empty_names() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let resolution = repo
            .resolve_batch(&["  ".to_string()])
            .await
            .unwrap();
        assert!(resolution.resolved.is_empty());
        assert_eq!(resolution.unmatched.len(), 1);
    }

    #[tokio::test]
    async fn test_prerequisite_path_full_chain() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let path = repo
            .prerequisite_path(&["chain_rule".to_string()], 5, 100)
            .await
            .unwrap();

        let ids: Vec<&str> = path.nodes.iter().map(|n| n.concept_id.as_str()).collect();
        assert_eq!(ids, vec!["algebra", "limits", "derivatives", "chain_rule"]);
        assert_eq!(path.nodes[3].role, PathRole::Target);
        assert!(path.nodes[..3].iter().all(|n| n.role == PathRole::Prerequisite));
    }

    #[tokio::test]
    async fn test_prerequisite_path_depth_bound() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let path = repo
            .prerequisite_path(&["chain_rule".to_string()], 1, 100)
            .await
            .unwrap();

        let ids: Vec<&str> = path.nodes.iter().map(|n| n.concept_id.as_str()).collect();
        assert_eq!(ids, vec!["derivatives", "chain_rule"]);
    }

    #[tokio::test]
    async fn test_prerequisite_path_node_cap_keeps_targets() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let path = repo
            .prerequisite_path(&["chain_rule".to_string()], 5, 2)
            .await
            .unwrap();

        assert_eq!(path.len(), 2);
        assert!(path.nodes.iter().any(|n| n.concept_id == "chain_rule"));
        assert_eq!(path.nodes.last().unwrap().role, PathRole::Target);
    }

    #[tokio::test]
    async fn test_prerequisite_path_survives_cycles() {
        let repo = test_repo().await;
        repo.save(&Concept::new("A")).await.unwrap();
        repo.save(&Concept::new("B")).await.unwrap();
        repo.save_edge(&PrerequisiteEdge::new("a", "b")).await.unwrap();
        repo.save_edge(&PrerequisiteEdge::new("b", "a")).await.unwrap();

        let path = repo
            .prerequisite_path(&["b".to_string()], 5, 100)
            .await
            .unwrap();

        // Both nodes appear exactly once despite the cycle
        assert_eq!(path.len(), 2);
    }

    #[tokio::test]
    async fn test_concept_detail_neighborhood() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        let detail = repo.concept_detail("derivatives").await.unwrap().unwrap();
        assert_eq!(detail.concept.name, "Derivatives");
        assert_eq!(detail.prerequisites.len(), 1);
        assert_eq!(detail.prerequisites[0].id, "limits");
        assert_eq!(detail.leads_to.len(), 1);
        assert_eq!(detail.leads_to[0].id, "chain_rule");

        assert!(repo.concept_detail("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades_edges() {
        let repo = test_repo().await;
        seed_calculus(&repo).await;

        assert!(repo.delete("limits").await.unwrap());

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.concept_count, 3);
        // Edges touching "limits" are gone
        assert_eq!(stats.edge_count, 1);
    }
}
