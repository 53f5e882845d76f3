//! Health and statistics
//!
//! Diagnostic surface consumed by the CLI: a cheap liveness probe, a
//! per-dependency health report, and system-wide counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, LlmConfig};
use crate::domain::answer::AnswerCacheRepository;
use crate::domain::concept::ConceptGraphRepository;
use crate::domain::context::ContentRepository;
use crate::domain::resource::ResourceRepository;
use crate::domain::staging::{StagedConceptRepository, StagingStats};
use crate::error::Result;
use crate::infrastructure::{
    SqliteAnswerCacheRepository, SqliteConceptGraphRepository, SqliteContentRepository,
    SqliteResourceRepository, SqliteStagedConceptRepository,
};
use crate::storage::Database;

/// Pending review backlog size that starts to warrant attention
const STAGED_BACKLOG_WARNING: u64 = 50;

/// Health status of one dependency, or of the system as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

impl HealthStatus {
    fn severity(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }

    /// The worse of two statuses
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Result of probing one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthCheck {
    fn ok(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Ok,
            detail: Some(detail.into()),
            latency_ms: None,
        }
    }

    fn warning(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Warning,
            detail: Some(detail.into()),
            latency_ms: None,
        }
    }

    fn error(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Error,
            detail: Some(detail.into()),
            latency_ms: None,
        }
    }

    fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Rolled-up report over all dependency checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Whether the system can serve queries at all
    pub fn is_healthy(&self) -> bool {
        self.overall_status != HealthStatus::Error
    }
}

/// Cheap liveness probe: one round trip to the database
pub async fn health(db: &Database) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(db.pool()).await?;
    Ok(())
}

/// Probe every dependency and roll the results up.
///
/// Never fails; a dependency that cannot be probed shows up as an error
/// check in the report instead.
pub async fn health_detailed(db: &Database, llm: &LlmConfig) -> HealthReport {
    let checks = vec![
        check_database(db).await,
        check_graph(db).await,
        check_cache(db).await,
        check_resources(db).await,
        check_staging(db).await,
        check_llm(llm),
    ];

    let overall_status = checks
        .iter()
        .fold(HealthStatus::Ok, |acc, check| acc.worst(check.status));

    HealthReport {
        overall_status,
        checks,
        timestamp: Utc::now(),
    }
}

async fn check_database(db: &Database) -> HealthCheck {
    let started = std::time::Instant::now();
    match sqlx::query("SELECT 1").fetch_one(db.pool()).await {
        Ok(_) => HealthCheck::ok("database", "connected and responsive")
            .with_latency(started.elapsed().as_millis() as u64),
        Err(e) => HealthCheck::error("database", format!("query failed: {e}")),
    }
}

async fn check_graph(db: &Database) -> HealthCheck {
    let graph = SqliteConceptGraphRepository::new(db.pool().clone());
    match graph.stats().await {
        Ok(stats) if stats.concept_count == 0 => HealthCheck::warning(
            "concept_graph",
            "graph is empty; run `eduweave demo-seed` or `eduweave import`",
        ),
        Ok(stats) => HealthCheck::ok(
            "concept_graph",
            format!(
                "{} concepts, {} edges",
                stats.concept_count, stats.edge_count
            ),
        ),
        Err(e) => HealthCheck::error("concept_graph", format!("stats query failed: {e}")),
    }
}

async fn check_cache(db: &Database) -> HealthCheck {
    let cache = SqliteAnswerCacheRepository::new(db.pool().clone());
    match cache.count().await {
        Ok(count) => HealthCheck::ok("answer_cache", format!("{count} cached answers")),
        Err(e) => HealthCheck::error("answer_cache", format!("count query failed: {e}")),
    }
}

async fn check_resources(db: &Database) -> HealthCheck {
    let resources = SqliteResourceRepository::new(db.pool().clone());
    match resources.count().await {
        Ok(count) => HealthCheck::ok("resources", format!("{count} known resources")),
        Err(e) => HealthCheck::error("resources", format!("count query failed: {e}")),
    }
}

async fn check_staging(db: &Database) -> HealthCheck {
    let staging = SqliteStagedConceptRepository::new(db.pool().clone());
    match staging.stats().await {
        Ok(stats) if stats.pending > STAGED_BACKLOG_WARNING => HealthCheck::warning(
            "staging",
            format!("{} concepts awaiting review", stats.pending),
        ),
        Ok(stats) => {
            HealthCheck::ok("staging", format!("{} concepts awaiting review", stats.pending))
        }
        Err(e) => HealthCheck::error("staging", format!("stats query failed: {e}")),
    }
}

fn check_llm(llm: &LlmConfig) -> HealthCheck {
    match llm.resolved_api_key() {
        Ok(Some(_)) => HealthCheck::ok(
            "llm",
            format!("API key present, model {}", llm.default_model),
        ),
        Ok(None) => HealthCheck::warning(
            "llm",
            "no API key; set EDUWEAVE_API_KEY or OPENROUTER_API_KEY",
        ),
        Err(e) => HealthCheck::error("llm", e.to_string()),
    }
}

/// System-wide entity counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    pub concepts: u64,
    pub edges: u64,
    pub cached_answers: u64,
    pub content_chunks: u64,
    pub resources: u64,
    pub staged: StagingStats,
}

/// Count everything the system stores
pub async fn system_stats(db: &Database) -> Result<SystemStats> {
    let graph = SqliteConceptGraphRepository::new(db.pool().clone());
    let cache = SqliteAnswerCacheRepository::new(db.pool().clone());
    let content = SqliteContentRepository::new(db.pool().clone());
    let resources = SqliteResourceRepository::new(db.pool().clone());
    let staging = SqliteStagedConceptRepository::new(db.pool().clone());

    let graph_stats = graph.stats().await?;
    Ok(SystemStats {
        concepts: graph_stats.concept_count,
        edges: graph_stats.edge_count,
        cached_answers: cache.count().await?,
        content_chunks: content.count().await?,
        resources: resources.count().await?,
        staged: staging.stats().await?,
    })
}

/// Installation paths and version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub database_path: Option<String>,
    pub config_path: Option<String>,
}

/// Version and path information for diagnostics
pub fn get_system_info() -> SystemInfo {
    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_path: Config::config_dir()
            .ok()
            .map(|dir| dir.join("eduweave.db").display().to_string()),
        config_path: Config::config_path()
            .ok()
            .map(|path| path.display().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concept::Concept;

    #[tokio::test]
    async fn test_health_probe_succeeds_on_live_database() {
        let db = Database::in_memory().await.expect("in-memory db");
        assert!(health(&db).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_graph_reports_warning() {
        let db = Database::in_memory().await.expect("in-memory db");
        let report = health_detailed(&db, &LlmConfig::default()).await;

        assert!(report.is_healthy());
        let graph_check = report
            .checks
            .iter()
            .find(|c| c.name == "concept_graph")
            .expect("graph check");
        assert_eq!(graph_check.status, HealthStatus::Warning);

        let db_check = report
            .checks
            .iter()
            .find(|c| c.name == "database")
            .expect("database check");
        assert_eq!(db_check.status, HealthStatus::Ok);
        assert!(db_check.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_seeded_graph_reports_ok() {
        let db = Database::in_memory().await.expect("in-memory db");
        let graph = SqliteConceptGraphRepository::new(db.pool().clone());
        graph.save(&Concept::new("limits")).await.unwrap();

        let report = health_detailed(&db, &LlmConfig::default()).await;
        let graph_check = report
            .checks
            .iter()
            .find(|c| c.name == "concept_graph")
            .unwrap();
        assert_eq!(graph_check.status, HealthStatus::Ok);
        assert_eq!(graph_check.detail.as_deref(), Some("1 concepts, 0 edges"));
    }

    #[tokio::test]
    async fn test_system_stats_counts_everything() {
        let db = Database::in_memory().await.expect("in-memory db");
        let graph = SqliteConceptGraphRepository::new(db.pool().clone());
        graph.save(&Concept::new("limits")).await.unwrap();
        graph.save(&Concept::new("derivatives")).await.unwrap();

        let stats = system_stats(&db).await.unwrap();
        assert_eq!(stats.concepts, 2);
        assert_eq!(stats.edges, 0);
        assert_eq!(stats.cached_answers, 0);
        assert_eq!(stats.staged.total(), 0);
    }

    #[test]
    fn test_status_rollup_takes_the_worst() {
        assert_eq!(
            HealthStatus::Ok.worst(HealthStatus::Warning),
            HealthStatus::Warning
        );
        assert_eq!(
            HealthStatus::Warning.worst(HealthStatus::Error),
            HealthStatus::Error
        );
        assert_eq!(
            HealthStatus::Error.worst(HealthStatus::Ok),
            HealthStatus::Error
        );
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
