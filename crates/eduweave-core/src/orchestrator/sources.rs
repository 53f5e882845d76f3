//! Fetch sources for the parallel fan-out
//!
//! Each source wraps one subsystem behind a narrow trait so the coordinator
//! can run them concurrently and tests can substitute slow or failing
//! doubles. Sources propagate their errors; deciding what a failure means
//! for the answer is the coordinator's job, never theirs.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::concept::{slug_id, ConceptGraphRepository, LearningPath};
use crate::domain::context::ContentRepository;
use crate::domain::resource::{EducationalResource, ResourceRepository};
use crate::error::Result;
use crate::llm::LlmClient;

/// Similarity floor for embedding search hits
const MIN_SIMILARITY: f32 = 0.15;

/// Resolves concept names to a prerequisite learning path
#[async_trait]
pub trait PathResolver: Send + Sync {
    async fn resolve_path(&self, concept_names: &[String]) -> Result<LearningPath>;
}

/// Retrieves grounding text snippets for a question
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, question: &str, limit: usize) -> Result<Vec<String>>;
}

/// Returns already-known learning resources for concepts
#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    async fn find(
        &self,
        concept_names: &[String],
        limit: usize,
    ) -> Result<Vec<EducationalResource>>;
}

/// Hook invoked for concepts that have no stored resources yet.
///
/// Discovery internals (multi-source search, scoring, rate limiting) live
/// behind this seam; the default implementation only records the request.
pub trait DiscoveryTrigger: Send + Sync {
    fn trigger(&self, concept_ids: Vec<String>);
}

/// Default trigger that logs uncovered concepts and nothing else
#[derive(Debug, Default)]
pub struct LoggingDiscoveryTrigger;

impl DiscoveryTrigger for LoggingDiscoveryTrigger {
    fn trigger(&self, concept_ids: Vec<String>) {
        debug!(
            concepts = ?concept_ids,
            "Discovery requested for uncovered concepts"
        );
    }
}

// ========== Graph-backed path resolution ==========

/// Two-phase resolver over the prerequisite graph.
///
/// Phase 1 batch-matches all names in one query; phase 2 walks prerequisite
/// edges backward from the matched ids, bounded by depth and node count.
/// Names that match nothing are dropped silently, and an empty match set
/// short-circuits to an empty path.
pub struct GraphPathResolver {
    graph: Arc<dyn ConceptGraphRepository>,
    max_depth: u32,
    max_nodes: usize,
}

impl GraphPathResolver {
    pub fn new(graph: Arc<dyn ConceptGraphRepository>, max_depth: u32, max_nodes: usize) -> Self {
        Self {
            graph,
            max_depth,
            max_nodes,
        }
    }
}

#[async_trait]
impl PathResolver for GraphPathResolver {
    async fn resolve_path(&self, concept_names: &[String]) -> Result<LearningPath> {
        let resolution = self.graph.resolve_batch(concept_names).await?;
        if !resolution.unmatched.is_empty() {
            debug!(
                unmatched = ?resolution.unmatched,
                "Some concepts are not in the graph"
            );
        }

        let ids = resolution.concept_ids();
        if ids.is_empty() {
            return Ok(LearningPath::default());
        }

        self.graph
            .prerequisite_path(&ids, self.max_depth, self.max_nodes)
            .await
    }
}

// ========== Content-store context retrieval ==========

/// Retriever over the ingested content chunks.
///
/// Uses embedding similarity when a client is available, dropping to FTS
/// keyword search when embedding the question fails or no client is
/// configured.
pub struct SemanticContextRetriever {
    content: Arc<dyn ContentRepository>,
    llm: Option<Arc<LlmClient>>,
}

impl SemanticContextRetriever {
    pub fn new(content: Arc<dyn ContentRepository>, llm: Option<Arc<LlmClient>>) -> Self {
        Self { content, llm }
    }
}

#[async_trait]
impl ContextRetriever for SemanticContextRetriever {
    async fn retrieve(&self, question: &str, limit: usize) -> Result<Vec<String>> {
        if let Some(client) = &self.llm {
            match client.embed(question).await {
                Ok(embedding) => {
                    let scored = self
                        .content
                        .search_semantic(&embedding.vector, limit, MIN_SIMILARITY)
                        .await?;
                    return Ok(scored.into_iter().map(|s| s.chunk.content).collect());
                }
                Err(e) => {
                    warn!(error = %e, "Question embedding failed, falling back to keyword search");
                }
            }
        }

        let scored = self.content.search_keyword(question, limit).await?;
        Ok(scored.into_iter().map(|s| s.chunk.content).collect())
    }
}

// ========== Repository-backed resource discovery ==========

/// Immediate lookup of known resources plus a detached discovery trigger.
///
/// Extracted concept names are slugged to graph ids before the lookup.
/// Concepts with no coverage are handed to the trigger; the call never
/// waits on discovery.
pub struct KnownResourceFinder {
    resources: Arc<dyn ResourceRepository>,
    trigger: Arc<dyn DiscoveryTrigger>,
}

impl KnownResourceFinder {
    pub fn new(resources: Arc<dyn ResourceRepository>) -> Self {
        Self {
            resources,
            trigger: Arc::new(LoggingDiscoveryTrigger),
        }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn DiscoveryTrigger>) -> Self {
        self.trigger = trigger;
        self
    }
}

#[async_trait]
impl ResourceDiscovery for KnownResourceFinder {
    async fn find(
        &self,
        concept_names: &[String],
        limit: usize,
    ) -> Result<Vec<EducationalResource>> {
        let ids: Vec<String> = concept_names
            .iter()
            .map(|name| slug_id(name))
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = self.resources.find_for_concepts(&ids, limit).await?;

        let covered: HashSet<&str> = found
            .iter()
            .flat_map(|r| r.concepts.iter().map(String::as_str))
            .collect();
        let uncovered: Vec<String> = ids
            .into_iter()
            .filter(|id| !covered.contains(id.as_str()))
            .collect();
        if !uncovered.is_empty() {
            self.trigger.trigger(uncovered);
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::concept::{Concept, PrerequisiteEdge};
    use crate::domain::context::ContentChunk;
    use crate::domain::resource::ResourceKind;
    use crate::infrastructure::{
        SqliteConceptGraphRepository, SqliteContentRepository, SqliteResourceRepository,
    };
    use crate::storage::Database;
    use std::sync::Mutex;

    async fn test_db() -> Database {
        Database::in_memory().await.expect("in-memory db")
    }

    #[tokio::test]
    async fn test_path_resolver_empty_match_skips_traversal() {
        let db = test_db().await;
        let graph = Arc::new(SqliteConceptGraphRepository::new(db.pool().clone()));
        let resolver = GraphPathResolver::new(graph, 5, 100);

        let path = resolver
            .resolve_path(&["nothing here".to_string()])
            .await
            .unwrap();
        assert!(path.is_empty());
    }

    #[tokio::test]
    async fn test_path_resolver_walks_prerequisites() {
        let db = test_db().await;
        let graph = Arc::new(SqliteConceptGraphRepository::new(db.pool().clone()));
        graph.save(&Concept::new("limits")).await.unwrap();
        graph.save(&Concept::new("derivatives")).await.unwrap();
        graph
            .save_edge(&PrerequisiteEdge::new("limits", "derivatives"))
            .await
            .unwrap();

        let resolver = GraphPathResolver::new(graph, 5, 100);
        let path = resolver
            .resolve_path(&["derivatives".to_string(), "unknown".to_string()])
            .await
            .unwrap();

        assert_eq!(path.names(), vec!["limits", "derivatives"]);
    }

    #[tokio::test]
    async fn test_retriever_keyword_fallback_without_client() {
        let db = test_db().await;
        let content = Arc::new(SqliteContentRepository::new(db.pool().clone()));
        content
            .save(&ContentChunk::new("A derivative measures instantaneous change."))
            .await
            .unwrap();

        let retriever = SemanticContextRetriever::new(content, None);
        let snippets = retriever.retrieve("what is a derivative?", 5).await.unwrap();

        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].contains("instantaneous"));
    }

    struct RecordingTrigger(Mutex<Vec<Vec<String>>>);

    impl DiscoveryTrigger for RecordingTrigger {
        fn trigger(&self, concept_ids: Vec<String>) {
            self.0.lock().unwrap().push(concept_ids);
        }
    }

    #[tokio::test]
    async fn test_resource_finder_triggers_discovery_for_uncovered() {
        let db = test_db().await;
        let repo = Arc::new(SqliteResourceRepository::new(db.pool().clone()));
        let resource = EducationalResource::new(
            "Derivative basics",
            "https://example.org/derivatives",
        )
        .with_kind(ResourceKind::Article)
        .with_concepts(vec!["derivatives".to_string()]);
        repo.save(&resource).await.unwrap();

        let trigger = Arc::new(RecordingTrigger(Mutex::new(Vec::new())));
        let finder = KnownResourceFinder::new(repo).with_trigger(trigger.clone());

        let found = finder
            .find(&["Derivatives".to_string(), "Chain Rule".to_string()], 10)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        let triggered = trigger.0.lock().unwrap();
        assert_eq!(triggered.as_slice(), &[vec!["chain_rule".to_string()]]);
    }
}
