//! Eduweave CLI - ask questions, walk prerequisite paths, curate the graph

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eduweave_core::api;
use eduweave_core::config::Config;
use eduweave_core::domain::concept::{
    lookup_concept_detail, ConceptGraphRepository, GraphDocument, PrerequisiteEdge,
};
use eduweave_core::domain::context::{ContentChunk, ContentRepository};
use eduweave_core::domain::resource::{
    EducationalResource, ResourceDifficulty, ResourceKind, ResourceRepository,
};
use eduweave_core::domain::staging::{StagedConcept, StagedReviewService, StagedStatus};
use eduweave_core::infrastructure::{
    SqliteAnswerCacheRepository, SqliteConceptGraphRepository, SqliteContentRepository,
    SqliteResourceRepository, SqliteStagedConceptRepository,
};
use eduweave_core::llm::LlmClient;
use eduweave_core::orchestrator::{
    ConceptGrowthNotifier, FetchCoordinator, GraphPathResolver, KnownResourceFinder,
    LlmConceptExtractor, LlmSynthesizer, LoggingDiscoveryTrigger, QueryOrchestrator, QueryResponse,
    QueryStreamEvent, ResourceDiscovery, SemanticContextRetriever,
};
use eduweave_core::storage::{Database, DatabaseConfig};
use futures_util::StreamExt;

#[derive(Parser)]
#[command(name = "eduweave")]
#[command(author, version, about = "Cache-first question answering with prerequisite learning paths", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    Ask {
        /// The question text
        question: String,
        /// Stream the answer as it is assembled
        #[arg(short, long)]
        stream: bool,
    },

    /// Explain one concept (cached like a question)
    Concept {
        /// Concept name
        name: String,
    },

    /// Show a concept with its direct prerequisites and dependents
    Detail {
        /// Concept ID or name
        key: String,
    },

    /// List concepts in the graph
    Concepts {
        /// Maximum number to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Review concepts staged from unanswered questions
    Staged {
        #[command(subcommand)]
        action: StagedAction,
    },

    /// Import a concept graph from a JSON document
    Import {
        /// Path to the graph document
        file: PathBuf,
    },

    /// Seed the demo calculus graph
    DemoSeed,

    /// Show storage statistics
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health checks
    Doctor,
}

#[derive(Subcommand)]
enum StagedAction {
    /// List staged concepts
    List {
        /// Status to filter by (pending, approved, rejected, merged)
        #[arg(short, long, default_value = "pending")]
        status: String,
        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one staged concept
    Show { name: String },
    /// Promote a staged concept into the graph
    Approve {
        name: String,
        /// Reviewer recorded on the decision
        #[arg(short, long, default_value = "cli")]
        reviewer: String,
        /// Review notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Reject a staged concept
    Reject {
        name: String,
        /// Reviewer recorded on the decision
        #[arg(short, long, default_value = "cli")]
        reviewer: String,
        /// Review notes
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Mark a staged concept as a duplicate of an existing one
    Merge {
        name: String,
        /// Existing concept ID or name to merge into
        into: String,
        /// Reviewer recorded on the decision
        #[arg(short, long, default_value = "cli")]
        reviewer: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so `--format json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eduweave=info".parse()?)
                .add_directive("eduweave_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that touch storage open the database lazily
    let get_db = || async {
        let path = Config::config_dir()?.join("eduweave.db");
        Database::new(DatabaseConfig::with_path(path)).await
    };

    match cli.command {
        Commands::Ask { question, stream } => {
            let db = get_db().await?;
            cmd_ask(&db, &question, stream, cli.format, cli.quiet).await
        }

        Commands::Concept { name } => {
            let db = get_db().await?;
            cmd_concept(&db, &name, cli.format, cli.quiet).await
        }

        Commands::Detail { key } => {
            let db = get_db().await?;
            cmd_detail(&db, &key, cli.format).await
        }

        Commands::Concepts { limit } => {
            let db = get_db().await?;
            cmd_concepts(&db, limit, cli.format, cli.quiet).await
        }

        Commands::Staged { action } => {
            let db = get_db().await?;
            cmd_staged(&db, action, cli.format, cli.quiet).await
        }

        Commands::Import { file } => {
            let db = get_db().await?;
            cmd_import(&db, &file, cli.quiet).await
        }

        Commands::DemoSeed => {
            let db = get_db().await?;
            cmd_demo_seed(&db, cli.quiet).await
        }

        Commands::Stats => {
            let db = get_db().await?;
            cmd_stats(&db, cli.format).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        // Doctor diagnoses a broken database instead of dying on it
        Commands::Doctor => cmd_doctor(get_db().await, cli.format, cli.quiet).await,
    }
}

/// Wire the full query pipeline over an open database.
///
/// Requires an API key in the environment; every non-LLM command works
/// without one.
fn build_orchestrator(db: &Database, config: &Config) -> anyhow::Result<Arc<QueryOrchestrator>> {
    let pool = db.pool().clone();
    let cache = Arc::new(SqliteAnswerCacheRepository::new(pool.clone()));
    let graph: Arc<dyn ConceptGraphRepository> =
        Arc::new(SqliteConceptGraphRepository::new(pool.clone()));
    let content = Arc::new(SqliteContentRepository::new(pool.clone()));
    let resources = Arc::new(SqliteResourceRepository::new(pool.clone()));
    let staging = Arc::new(SqliteStagedConceptRepository::new(pool));

    let client = Arc::new(LlmClient::from_env(config.llm.clone())?);

    let extractor = Arc::new(LlmConceptExtractor::new(
        Arc::clone(&client),
        config.llm.extraction_temperature,
    ));
    let synthesizer = Arc::new(LlmSynthesizer::new(
        Arc::clone(&client),
        config.llm.synthesis_temperature,
    ));

    let resolver = Arc::new(GraphPathResolver::new(
        Arc::clone(&graph),
        config.orchestrator.max_traversal_depth,
        config.orchestrator.max_path_nodes as usize,
    ));
    let retriever = Arc::new(SemanticContextRetriever::new(
        content,
        Some(Arc::clone(&client)),
    ));
    let discovery: Arc<dyn ResourceDiscovery> = Arc::new(
        KnownResourceFinder::new(resources).with_trigger(Arc::new(LoggingDiscoveryTrigger)),
    );

    let coordinator = FetchCoordinator::new(
        resolver,
        retriever,
        Arc::clone(&discovery),
        config.orchestrator.fetch_deadline(),
    )
    .with_limits(
        config.orchestrator.context_limit as usize,
        config.orchestrator.resource_limit as usize,
    );

    let notifier = Arc::new(
        ConceptGrowthNotifier::new(Arc::clone(&graph), staging, config.notifier.clone())
            .with_llm_client(Arc::clone(&client), config.llm.extraction_temperature),
    );

    Ok(Arc::new(
        QueryOrchestrator::new(cache, extractor, coordinator, synthesizer, graph)
            .with_cache_ttl(config.orchestrator.cache_ttl())
            .with_notifier(notifier)
            .with_resource_refresh(discovery, config.orchestrator.resource_limit as usize),
    ))
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ask(
    db: &Database,
    question: &str,
    stream: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let orchestrator = build_orchestrator(db, &config)?;

    if stream {
        let mut events = orchestrator.process_query_stream(question);
        while let Some(event) = events.next().await {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
                OutputFormat::Text => print_stream_event(&event, quiet)?,
            }
        }
        return Ok(());
    }

    let response = orchestrator.process_query(question).await?;
    print_response(&response, format, quiet)
}

async fn cmd_concept(
    db: &Database,
    name: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let orchestrator = build_orchestrator(db, &config)?;

    let response = orchestrator.concept_query(name).await?;
    print_response(&response, format, quiet)
}

async fn cmd_detail(db: &Database, key: &str, format: OutputFormat) -> anyhow::Result<()> {
    let graph = SqliteConceptGraphRepository::new(db.pool().clone());
    let detail = lookup_concept_detail(&graph, key).await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let c = &detail.concept;
    println!("{} (id: {})", c.name, c.id);
    println!("  Difficulty: {}/5", c.difficulty_level);
    if !c.tags.is_empty() {
        println!("  Tags: {}", c.tags.join(", "));
    }
    if !c.description.is_empty() {
        println!("  {}", c.description);
    }

    if detail.prerequisites.is_empty() {
        println!("\nNo prerequisites.");
    } else {
        println!("\nPrerequisites:");
        for p in &detail.prerequisites {
            println!("  {}  {}", p.id, p.name);
        }
    }

    if !detail.leads_to.is_empty() {
        println!("\nLeads to:");
        for n in &detail.leads_to {
            println!("  {}  {}", n.id, n.name);
        }
    }

    Ok(())
}

async fn cmd_concepts(
    db: &Database,
    limit: usize,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let graph = SqliteConceptGraphRepository::new(db.pool().clone());
    let concepts = graph.list(limit).await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&concepts)?);
        return Ok(());
    }

    if concepts.is_empty() {
        if !quiet {
            println!("No concepts in the graph.");
            println!("\nSeed one with: eduweave demo-seed or eduweave import <file.json>");
        }
        return Ok(());
    }

    if !quiet {
        println!("Concepts:");
    }
    for c in &concepts {
        println!("  {}  {} (difficulty {}/5)", c.id, c.name, c.difficulty_level);
    }
    Ok(())
}

async fn cmd_staged(
    db: &Database,
    action: StagedAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let pool = db.pool().clone();
    let service = StagedReviewService::new(
        Arc::new(SqliteStagedConceptRepository::new(pool.clone())),
        Arc::new(SqliteConceptGraphRepository::new(pool)),
    );

    match action {
        StagedAction::List { status, limit } => {
            let status = StagedStatus::parse(&status).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown status '{}'. Use pending, approved, rejected, or merged.",
                    status
                )
            })?;
            let entries = service.list(status, limit).await?;

            if let OutputFormat::Json = format {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                if !quiet {
                    println!("No {} staged concepts.", status.as_str());
                }
                return Ok(());
            }

            if !quiet {
                println!("Staged concepts ({}):", status.as_str());
            }
            for s in &entries {
                println!(
                    "  {}  seen {}x  confidence {:.2}",
                    s.concept_name, s.occurrence_count, s.confidence
                );
            }
            Ok(())
        }

        StagedAction::Show { name } => {
            let staged = service.get(&name).await?.ok_or_else(|| {
                anyhow::anyhow!(
                    "Staged concept '{}' not found. Run `eduweave staged list` to see pending entries.",
                    name
                )
            })?;

            if let OutputFormat::Json = format {
                println!("{}", serde_json::to_string_pretty(&staged)?);
                return Ok(());
            }

            print_staged(&staged);
            Ok(())
        }

        StagedAction::Approve {
            name,
            reviewer,
            notes,
        } => {
            let result = service.approve(&name, &reviewer, notes.as_deref()).await?;
            if !quiet {
                println!("Approved '{}'", result.staged.concept_name);
                println!("  Concept ID: {}", result.concept.id);
                if !result.linked_prerequisites.is_empty() {
                    println!(
                        "  Linked prerequisites: {}",
                        result.linked_prerequisites.join(", ")
                    );
                }
                if !result.skipped_prerequisites.is_empty() {
                    println!(
                        "  Skipped (not in graph): {}",
                        result.skipped_prerequisites.join(", ")
                    );
                }
                println!("\nSee it with: eduweave detail {}", result.concept.id);
            }
            Ok(())
        }

        StagedAction::Reject {
            name,
            reviewer,
            notes,
        } => {
            let staged = service.reject(&name, &reviewer, notes.as_deref()).await?;
            if !quiet {
                println!("Rejected '{}'", staged.concept_name);
            }
            Ok(())
        }

        StagedAction::Merge {
            name,
            into,
            reviewer,
        } => {
            let staged = service.merge(&name, &into, &reviewer, None).await?;
            if !quiet {
                println!(
                    "Merged '{}' into '{}'",
                    staged.concept_name,
                    staged.approved_concept_id.as_deref().unwrap_or(into.as_str())
                );
            }
            Ok(())
        }
    }
}

fn print_staged(s: &StagedConcept) {
    println!("{} [{}]", s.concept_name, s.status.as_str());
    println!(
        "  Seen: {}x across {} question(s)",
        s.occurrence_count,
        s.related_fingerprints.len()
    );
    println!("  Confidence: {:.2}", s.confidence);
    println!("  Difficulty: {}/5", s.difficulty_level);
    if !s.category.is_empty() {
        println!("  Category: {}", s.category);
    }
    if !s.description.is_empty() {
        println!("  Description: {}", s.description);
    }
    if !s.suggested_prerequisites.is_empty() {
        println!(
            "  Suggested prerequisites: {}",
            s.suggested_prerequisites.join(", ")
        );
    }
    if !s.reasoning.is_empty() {
        println!("  Reasoning: {}", s.reasoning);
    }
    if !s.source_question.is_empty() {
        println!("  First asked in: \"{}\"", s.source_question);
    }
    println!(
        "  First seen: {}",
        s.first_seen_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(reviewer) = &s.reviewed_by {
        println!("  Reviewed by: {}", reviewer);
        if let Some(at) = s.reviewed_at {
            println!("  Reviewed at: {}", at.format("%Y-%m-%d %H:%M:%S"));
        }
        if let Some(notes) = &s.review_notes {
            println!("  Notes: {}", notes);
        }
        if let Some(id) = &s.approved_concept_id {
            println!("  Concept ID: {}", id);
        }
    }
}

async fn cmd_import(db: &Database, file: &PathBuf, quiet: bool) -> anyhow::Result<()> {
    use anyhow::Context;

    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read graph document: {}", file.display()))?;
    let document: GraphDocument = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse graph document: {}", file.display()))?;

    if !quiet {
        println!("Importing graph from {}...", file.display());
    }

    let graph = SqliteConceptGraphRepository::new(db.pool().clone());

    let concept_count = document.concepts.len();
    for entry in document.concepts {
        let concept = entry.into_concept();
        graph
            .save(&concept)
            .await
            .with_context(|| format!("Failed to import concept '{}'", concept.id))?;
    }

    let edge_count = document.edges.len();
    for entry in document.edges {
        let edge = entry.into_edge();
        graph.save_edge(&edge).await.with_context(|| {
            format!(
                "Failed to import edge {} -> {}",
                edge.from_id, edge.to_id
            )
        })?;
    }

    if !quiet {
        println!("  Concepts upserted: {}", concept_count);
        println!("  Edges inserted: {}", edge_count);
        println!("Import complete.");
    }
    Ok(())
}

async fn cmd_demo_seed(db: &Database, quiet: bool) -> anyhow::Result<()> {
    let pool = db.pool().clone();
    let graph = SqliteConceptGraphRepository::new(pool.clone());
    let content = SqliteContentRepository::new(pool.clone());
    let resources = SqliteResourceRepository::new(pool);

    let document: GraphDocument = serde_json::from_str(DEMO_GRAPH)?;
    for entry in document.concepts {
        graph.save(&entry.into_concept()).await?;
    }
    for (from, to) in [
        ("limits", "continuity"),
        ("continuity", "derivatives"),
        ("derivatives", "integrals"),
    ] {
        graph.save_edge(&PrerequisiteEdge::new(from, to)).await?;
    }

    let chunks = [
        (
            "limits",
            "A limit describes the value a function approaches as its input approaches a point, \
             whether or not the function is defined there.",
        ),
        (
            "continuity",
            "A function is continuous at a point when its limit there exists and equals the \
             function's value; continuity means no jumps, holes, or asymptotes.",
        ),
        (
            "derivatives",
            "A derivative measures the instantaneous rate of change of a function, defined as \
             the limit of the difference quotient as the interval shrinks to zero.",
        ),
        (
            "integrals",
            "An integral accumulates a quantity over an interval; the definite integral of a \
             rate of change recovers the total change.",
        ),
    ];
    for (i, (concept, text)) in chunks.iter().enumerate() {
        let mut chunk = ContentChunk::new(*text)
            .with_concept(*concept)
            .with_chapter("Calculus fundamentals")
            .with_source("demo-seed")
            .with_index(i as u32);
        // Stable IDs keep a re-seed from duplicating chunks
        chunk.id = format!("demo_{concept}");
        content.save(&chunk).await?;
    }

    let demo_resources = [
        EducationalResource::new(
            "The essence of the derivative",
            "https://example.org/derivative-intro",
        )
        .with_kind(ResourceKind::Video)
        .with_difficulty(ResourceDifficulty::Beginner)
        .with_quality(0.9)
        .with_concepts(vec!["derivatives".to_string(), "limits".to_string()]),
        EducationalResource::new(
            "Limits, step by step",
            "https://example.org/limits-walkthrough",
        )
        .with_kind(ResourceKind::Tutorial)
        .with_difficulty(ResourceDifficulty::Beginner)
        .with_quality(0.8)
        .with_concepts(vec!["limits".to_string()]),
        EducationalResource::new(
            "Integration practice problems",
            "https://example.org/integration-practice",
        )
        .with_kind(ResourceKind::Practice)
        .with_difficulty(ResourceDifficulty::Intermediate)
        .with_quality(0.75)
        .with_concepts(vec!["integrals".to_string()]),
    ];
    for resource in &demo_resources {
        resources.save(resource).await?;
    }

    if !quiet {
        println!("Seeded the demo calculus graph.");
        println!("  Concepts: limits, continuity, derivatives, integrals");
        println!("  Edges: 3  Content chunks: 4  Resources: 3");
        println!("\nTry: eduweave ask \"What is the derivative of x^2?\"");
    }
    Ok(())
}

/// Concepts for the demo calculus chain; edges are inserted separately so
/// seeding exercises the same validation as a real import.
const DEMO_GRAPH: &str = r#"{
    "concepts": [
        {
            "name": "Limits",
            "description": "The value a function approaches as its input approaches a point",
            "difficulty_level": 2,
            "tags": ["calculus"]
        },
        {
            "name": "Continuity",
            "description": "Functions without jumps, holes, or asymptotes",
            "difficulty_level": 2,
            "tags": ["calculus"]
        },
        {
            "name": "Derivatives",
            "description": "Instantaneous rates of change",
            "difficulty_level": 3,
            "tags": ["calculus"]
        },
        {
            "name": "Integrals",
            "description": "Accumulation of quantities over an interval",
            "difficulty_level": 4,
            "tags": ["calculus"]
        }
    ]
}"#;

async fn cmd_stats(db: &Database, format: OutputFormat) -> anyhow::Result<()> {
    let stats = api::system_stats(db).await?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Eduweave storage:");
    println!("  Concepts: {}", stats.concepts);
    println!("  Prerequisite edges: {}", stats.edges);
    println!("  Cached answers: {}", stats.cached_answers);
    println!("  Content chunks: {}", stats.content_chunks);
    println!("  Resources: {}", stats.resources);
    println!(
        "  Staged concepts: {} pending, {} approved, {} rejected, {} merged",
        stats.staged.pending, stats.staged.approved, stats.staged.rejected, stats.staged.merged
    );
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(
    db: anyhow::Result<Database>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if !quiet {
        println!("Eduweave Health Check");
        println!("=====================");
        println!();
    }

    let db = match db {
        Ok(db) => db,
        Err(e) => {
            if let OutputFormat::Json = format {
                return Err(e);
            }
            if !quiet {
                println!("[!!] Database: Failed to open - {}", e);
                println!();
                println!("Some checks failed. See above for details.");
            }
            return Ok(());
        }
    };

    let config = Config::load()?;
    let report = api::health_detailed(&db, &config.llm).await;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !quiet {
        let info = api::get_system_info();
        println!("[OK] Version: {}", info.version);
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
        println!("     Database: {}", db.path().display());

        match db.migration_status().await {
            Ok(status) if status.needs_migration => println!(
                "[!!] Schema: migrations pending (v{} -> v{})",
                status.current_version, status.target_version
            ),
            Ok(status) => println!("[OK] Schema: v{}", status.current_version),
            Err(e) => println!("[!!] Schema: check failed - {}", e),
        }

        println!();
        for check in &report.checks {
            let marker = match check.status {
                api::HealthStatus::Ok => "[OK]",
                api::HealthStatus::Warning => "[--]",
                api::HealthStatus::Error => "[!!]",
            };
            let detail = check.detail.as_deref().unwrap_or("");
            match check.latency_ms {
                Some(ms) => println!("{} {}: {} ({}ms)", marker, check.name, detail, ms),
                None => println!("{} {}: {}", marker, check.name, detail),
            }
        }

        println!();
        if report.is_healthy() {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

// ============================================================================
// Output Helpers
// ============================================================================

fn print_response(
    response: &QueryResponse,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if !quiet {
        if !response.concepts.is_empty() {
            println!("Concepts: {}", response.concepts.join(", "));
        }
        if !response.learning_path.is_empty() {
            println!("Learning path: {}", response.learning_path.display_sequence());
        }
        if !response.concepts.is_empty() || !response.learning_path.is_empty() {
            println!();
        }
    }

    println!("{}", response.explanation);

    if !quiet {
        if !response.resources.is_empty() {
            println!("\nResources:");
            for (i, r) in response.resources.iter().enumerate() {
                println!(
                    "  {}. {} ({}, {})",
                    i + 1,
                    r.title,
                    r.kind.as_str(),
                    r.difficulty.as_str()
                );
                println!("     {}", r.url);
            }
        }

        if !response.degraded_sources.is_empty() {
            println!(
                "\nNote: partial answer; unavailable sources: {}",
                response.degraded_sources.join(", ")
            );
        }

        println!();
        match response.cache_age_secs {
            Some(age) => println!(
                "Served from cache ({}s old) in {}ms",
                age, response.processing_ms
            ),
            None => println!("Processed in {}ms", response.processing_ms),
        }
    }

    Ok(())
}

fn print_stream_event(event: &QueryStreamEvent, quiet: bool) -> anyhow::Result<()> {
    match event {
        QueryStreamEvent::Start { fingerprint, .. } => {
            if !quiet {
                println!("Fingerprint: {}", &fingerprint[..12.min(fingerprint.len())]);
            }
        }
        QueryStreamEvent::Progress { stage, message } => {
            if !quiet {
                println!("[{}] {}", stage, message);
            }
        }
        QueryStreamEvent::Concepts { concepts, .. } => {
            if !quiet && !concepts.is_empty() {
                println!("Concepts: {}", concepts.join(", "));
            }
        }
        QueryStreamEvent::Prerequisites { path, .. } => {
            if !quiet && !path.is_empty() {
                println!("Learning path: {}", path.display_sequence());
            }
        }
        QueryStreamEvent::Context { count, .. } => {
            if !quiet {
                println!("Context snippets: {}", count);
            }
        }
        QueryStreamEvent::Resources { count, .. } => {
            if !quiet {
                println!("Resources: {}", count);
                println!();
            }
        }
        QueryStreamEvent::ExplanationChunk { chunk, .. } => {
            print!("{}", chunk);
            std::io::stdout().flush()?;
        }
        QueryStreamEvent::ExplanationComplete { .. } => {
            println!();
        }
        QueryStreamEvent::Complete {
            source,
            processing_ms,
            ..
        } => {
            if !quiet {
                println!();
                println!("Done ({}, {}ms)", source, processing_ms);
            }
        }
        QueryStreamEvent::Error { code, message } => {
            return Err(anyhow::anyhow!("[{}] {}", code, message));
        }
    }
    Ok(())
}
