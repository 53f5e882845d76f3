//! Database migrations
//!
//! This module manages SQLite schema migrations for eduweave.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Concept graph and answer cache
const MIGRATION_V1: &str = r#"
    -- Curated concepts
    CREATE TABLE IF NOT EXISTS concepts (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        difficulty_level INTEGER NOT NULL DEFAULT 1,
        tags TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_concepts_name ON concepts(name);
    CREATE INDEX IF NOT EXISTS idx_concepts_name_lower ON concepts(lower(name));

    -- Directed prerequisite edges: from_id must be mastered before to_id
    CREATE TABLE IF NOT EXISTS prerequisite_edges (
        from_id TEXT NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        to_id TEXT NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (from_id, to_id)
    );

    CREATE INDEX IF NOT EXISTS idx_prerequisite_edges_to_id ON prerequisite_edges(to_id);

    -- Cached answers keyed by question fingerprint
    CREATE TABLE IF NOT EXISTS answer_records (
        fingerprint TEXT PRIMARY KEY NOT NULL,
        question TEXT NOT NULL,
        identified_concepts TEXT NOT NULL DEFAULT '[]',
        learning_path TEXT NOT NULL DEFAULT '[]',
        context_snippets TEXT NOT NULL DEFAULT '[]',
        explanation TEXT NOT NULL DEFAULT '',
        resources TEXT NOT NULL DEFAULT '[]',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_answer_records_created_at ON answer_records(created_at);
"#;

/// Migration 2: Content chunks for semantic retrieval
///
/// Chunks carry an optional embedding BLOB (f32 little-endian) for cosine
/// ranking; the FTS5 mirror serves keyword retrieval when no embedding
/// model is configured.
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS content_chunks (
        id TEXT PRIMARY KEY NOT NULL,
        content TEXT NOT NULL,
        concept TEXT NOT NULL DEFAULT '',
        chapter TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        chunk_index INTEGER NOT NULL DEFAULT 0,
        embedding BLOB,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_content_chunks_concept ON content_chunks(concept);

    CREATE VIRTUAL TABLE IF NOT EXISTS content_chunks_fts USING fts5(
        content, concept,
        content='content_chunks',
        content_rowid='rowid'
    );

    -- Triggers to keep FTS index in sync
    CREATE TRIGGER IF NOT EXISTS content_chunks_ai AFTER INSERT ON content_chunks BEGIN
        INSERT INTO content_chunks_fts(rowid, content, concept)
        VALUES (NEW.rowid, NEW.content, NEW.concept);
    END;

    CREATE TRIGGER IF NOT EXISTS content_chunks_ad AFTER DELETE ON content_chunks BEGIN
        INSERT INTO content_chunks_fts(content_chunks_fts, rowid, content, concept)
        VALUES ('delete', OLD.rowid, OLD.content, OLD.concept);
    END;

    CREATE TRIGGER IF NOT EXISTS content_chunks_au AFTER UPDATE ON content_chunks BEGIN
        INSERT INTO content_chunks_fts(content_chunks_fts, rowid, content, concept)
        VALUES ('delete', OLD.rowid, OLD.content, OLD.concept);
        INSERT INTO content_chunks_fts(rowid, content, concept)
        VALUES (NEW.rowid, NEW.content, NEW.concept);
    END;
"#;

/// Migration 3: Educational resources and staged concepts
const MIGRATION_V3: &str = r#"
    CREATE TABLE IF NOT EXISTS educational_resources (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        kind TEXT NOT NULL DEFAULT 'article' CHECK (kind IN (
            'video', 'article', 'tutorial', 'example', 'practice'
        )),
        difficulty_level TEXT NOT NULL DEFAULT 'beginner' CHECK (difficulty_level IN (
            'beginner', 'intermediate', 'advanced'
        )),
        quality_score REAL NOT NULL DEFAULT 0.5 CHECK (quality_score >= 0.0 AND quality_score <= 1.0),
        source_domain TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_educational_resources_quality
        ON educational_resources(quality_score);

    -- A resource covers one or more concepts
    CREATE TABLE IF NOT EXISTS resource_concepts (
        resource_id TEXT NOT NULL REFERENCES educational_resources(id) ON DELETE CASCADE,
        concept_id TEXT NOT NULL,
        PRIMARY KEY (resource_id, concept_id)
    );

    CREATE INDEX IF NOT EXISTS idx_resource_concepts_concept_id
        ON resource_concepts(concept_id);

    -- Concepts seen in queries but absent from the curated graph
    CREATE TABLE IF NOT EXISTS staged_concepts (
        concept_name TEXT PRIMARY KEY NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        suggested_prerequisites TEXT NOT NULL DEFAULT '[]',
        confidence REAL NOT NULL DEFAULT 0.5,
        difficulty_level INTEGER NOT NULL DEFAULT 1,
        category TEXT NOT NULL DEFAULT '',
        reasoning TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN (
            'pending', 'approved', 'rejected', 'merged'
        )),
        occurrence_count INTEGER NOT NULL DEFAULT 1,
        related_fingerprints TEXT NOT NULL DEFAULT '[]',
        source_question TEXT NOT NULL DEFAULT '',
        reviewed_by TEXT,
        reviewed_at TIMESTAMP,
        review_notes TEXT,
        approved_concept_id TEXT,
        first_seen_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_staged_concepts_status ON staged_concepts(status);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    // Get the latest version
    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    // Apply migrations in order
    if current_version < 1 {
        tracing::info!("Applying migration v1: Concept graph and answer cache");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Content chunks for semantic retrieval");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    if current_version < 3 {
        tracing::info!("Applying migration v3: Educational resources and staged concepts");
        sqlx::raw_sql(MIGRATION_V3).execute(pool).await?;
        record_migration(pool, 3).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        // Should start with no migrations
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        // Run migrations
        run_migrations(&pool).await.unwrap();

        // Should be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        // Run migrations twice
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        // Should still be at current version
        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables = vec![
            "concepts",
            "prerequisite_edges",
            "answer_records",
            "content_chunks",
            "educational_resources",
            "resource_concepts",
            "staged_concepts",
        ];

        for table in tables {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_quality_score_bounds_enforced() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO educational_resources (id, title, url, quality_score) VALUES (?, ?, ?, ?)",
        )
        .bind("r1")
        .bind("Bad resource")
        .bind("https://example.com/bad")
        .bind(1.5)
        .execute(&pool)
        .await;

        assert!(result.is_err(), "quality_score above 1.0 must be rejected");
    }

    #[tokio::test]
    async fn test_staged_status_values_enforced() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let result =
            sqlx::query("INSERT INTO staged_concepts (concept_name, status) VALUES (?, ?)")
                .bind("tensors")
                .bind("on-hold")
                .execute(&pool)
                .await;

        assert!(result.is_err(), "unknown staged status must be rejected");
    }

    #[tokio::test]
    async fn test_fts_triggers_sync() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO content_chunks (id, content, concept) VALUES (?, ?, ?)")
            .bind("c1")
            .bind("The derivative measures instantaneous rate of change")
            .bind("derivatives")
            .execute(&pool)
            .await
            .unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM content_chunks_fts WHERE content_chunks_fts MATCH 'derivative'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        sqlx::query("DELETE FROM content_chunks WHERE id = 'c1'")
            .execute(&pool)
            .await
            .unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM content_chunks_fts WHERE content_chunks_fts MATCH 'derivative'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);
    }
}
