//! Repository trait for the concept graph
//!
//! Abstracts concept and prerequisite edge storage plus the two
//! traversal-shaped queries the query pipeline depends on: batch name
//! resolution and bounded prerequisite path construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::entity::{slug_id, Concept, PrerequisiteEdge};
use super::path::LearningPath;

/// Repository trait for concept graph persistence
#[async_trait]
pub trait ConceptGraphRepository: Send + Sync {
    // ========== Concept Operations ==========

    /// Save a concept (insert or update)
    async fn save(&self, concept: &Concept) -> Result<()>;

    /// Get a concept by ID
    async fn get(&self, id: &str) -> Result<Option<Concept>>;

    /// Get a concept by exact name match (case-insensitive)
    async fn get_by_name(&self, name: &str) -> Result<Option<Concept>>;

    /// Whether any concept matches the given name (case-insensitive)
    async fn exists_by_name(&self, name: &str) -> Result<bool>;

    /// List concepts ordered by name
    async fn list(&self, limit: usize) -> Result<Vec<Concept>>;

    /// Delete a concept and its edges
    async fn delete(&self, id: &str) -> Result<bool>;

    // ========== Edge Operations ==========

    /// Save a prerequisite edge (insert, idempotent)
    ///
    /// Fails with `InvalidInput` for self-loops and for edges that
    /// reference concepts not present in the graph.
    async fn save_edge(&self, edge: &PrerequisiteEdge) -> Result<()>;

    /// List all edges
    async fn list_edges(&self) -> Result<Vec<PrerequisiteEdge>>;

    // ========== Resolution and Traversal ==========

    /// Resolve extracted concept names to graph concepts in one batch
    ///
    /// A name matches a concept when it equals the concept ID, equals
    /// the concept name case-insensitively, or appears as a substring
    /// of the concept name. Names that match nothing are reported in
    /// [`BatchResolution::unmatched`] rather than failing the batch.
    async fn resolve_batch(&self, names: &[String]) -> Result<BatchResolution>;

    /// Build a learning path for the given target concepts
    ///
    /// Walks prerequisite edges backwards from each target, at most
    /// `max_depth` hops deep and `max_nodes` nodes total. The returned
    /// path lists prerequisites before the concepts that need them.
    async fn prerequisite_path(
        &self,
        target_ids: &[String],
        max_depth: u32,
        max_nodes: usize,
    ) -> Result<LearningPath>;

    /// Get a concept with its direct prerequisites and dependents
    async fn concept_detail(&self, id: &str) -> Result<Option<ConceptDetail>>;

    // ========== Statistics ==========

    /// Count concepts and edges
    async fn stats(&self) -> Result<GraphStats>;
}

/// One successfully resolved concept name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConcept {
    /// The name as it was requested
    pub requested: String,
    /// The matched concept ID
    pub concept_id: String,
    /// The matched concept's canonical name
    pub name: String,
}

/// Result of a batch name resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResolution {
    /// Names that matched a concept, in request order
    pub resolved: Vec<ResolvedConcept>,
    /// Names that matched nothing
    pub unmatched: Vec<String>,
}

impl BatchResolution {
    /// Matched concept IDs in request order, deduplicated
    pub fn concept_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.resolved
            .iter()
            .filter(|r| seen.insert(r.concept_id.clone()))
            .map(|r| r.concept_id.clone())
            .collect()
    }
}

/// A concept with its one-hop neighborhood
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptDetail {
    /// The concept itself
    pub concept: Concept,
    /// Concepts that must be learned first
    pub prerequisites: Vec<Concept>,
    /// Concepts this one unlocks
    pub leads_to: Vec<Concept>,
}

/// Concept graph statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of concepts in the graph
    pub concept_count: u64,
    /// Number of prerequisite edges
    pub edge_count: u64,
}

/// Resolve a concept tolerantly and fetch its one-hop neighborhood.
///
/// Tries the slugified key as an id first, then falls back to batch name
/// resolution (case-insensitive, substring-tolerant).
pub async fn lookup_concept_detail(
    graph: &dyn ConceptGraphRepository,
    key: &str,
) -> Result<ConceptDetail> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidInput(
            "concept id or name must not be empty".to_string(),
        ));
    }

    if let Some(detail) = graph.concept_detail(&slug_id(key)).await? {
        return Ok(detail);
    }

    let resolution = graph.resolve_batch(&[key.to_string()]).await?;
    if let Some(resolved) = resolution.resolved.first() {
        if let Some(detail) = graph.concept_detail(&resolved.concept_id).await? {
            return Ok(detail);
        }
    }
    Err(Error::ConceptNotFound(key.to_string()))
}
