//! Staged concept review
//!
//! Applies curator decisions to staged concepts. Approval promotes the
//! entry into the curated graph and links whichever suggested
//! prerequisites already exist there; rejection and merge only record
//! the verdict. Review transitions are monotonic: an entry reviewed
//! once cannot be reviewed again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{StagedConcept, StagedConceptRepository, StagedStatus, StagingStats};
use crate::domain::concept::{
    slug_id, Concept, ConceptGraphRepository, PrerequisiteEdge,
};
use crate::error::{Error, Result};

/// What approval produced
#[derive(Debug, Clone)]
pub struct ApprovalResult {
    /// The concept now in the curated graph
    pub concept: Concept,
    /// Suggested prerequisites that resolved and were linked
    pub linked_prerequisites: Vec<String>,
    /// Suggested prerequisites with no match in the graph
    pub skipped_prerequisites: Vec<String>,
    /// The staged entry after review
    pub staged: StagedConcept,
}

/// Curator review operations over the staging area
pub struct StagedReviewService {
    staging: Arc<dyn StagedConceptRepository>,
    graph: Arc<dyn ConceptGraphRepository>,
}

impl StagedReviewService {
    pub fn new(
        staging: Arc<dyn StagedConceptRepository>,
        graph: Arc<dyn ConceptGraphRepository>,
    ) -> Self {
        Self { staging, graph }
    }

    /// Promote a pending staged concept into the curated graph.
    ///
    /// Creates the concept, links every suggested prerequisite that
    /// already exists in the graph, and marks the entry approved.
    /// Suggested prerequisites with no match are skipped, not invented.
    pub async fn approve(
        &self,
        name: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<ApprovalResult> {
        let name = normalize_name(name);
        let staged = self
            .staging
            .get(&name)
            .await?
            .ok_or_else(|| Error::StagedConceptNotFound(name.clone()))?;
        if !staged.is_pending() {
            return Err(Error::StagedConceptNotPending(
                staged.concept_name.clone(),
                staged.status.to_string(),
            ));
        }

        let mut concept = Concept::new(staged.concept_name.as_str())
            .with_description(staged.description.as_str())
            .with_difficulty(staged.difficulty_level);
        if !staged.category.is_empty() {
            concept = concept.with_tags(vec![staged.category.clone()]);
        }
        self.graph.save(&concept).await?;

        let (linked, skipped) = self
            .link_prerequisites(&concept, &staged.suggested_prerequisites)
            .await;

        // The concept is already in the graph at this point; a failed
        // status flip must not undo that
        let staged = match self
            .staging
            .mark_reviewed(
                &staged.concept_name,
                StagedStatus::Approved,
                reviewer,
                notes,
                Some(&concept.id),
            )
            .await
        {
            Ok(reviewed) => reviewed,
            Err(e) => {
                warn!(
                    concept = %concept.id,
                    error = %e,
                    "Concept created but review status update failed"
                );
                staged
            }
        };

        info!(
            concept = %concept.id,
            linked = linked.len(),
            skipped = skipped.len(),
            reviewer,
            "Approved staged concept"
        );

        Ok(ApprovalResult {
            concept,
            linked_prerequisites: linked,
            skipped_prerequisites: skipped,
            staged,
        })
    }

    /// Reject a pending staged concept
    pub async fn reject(
        &self,
        name: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<StagedConcept> {
        let name = normalize_name(name);
        let staged = self
            .staging
            .mark_reviewed(&name, StagedStatus::Rejected, reviewer, notes, None)
            .await?;
        info!(concept = %staged.concept_name, reviewer, "Rejected staged concept");
        Ok(staged)
    }

    /// Mark a pending staged concept as a duplicate of an existing one.
    ///
    /// The target may be given as an id or a name; it must already exist
    /// in the graph.
    pub async fn merge(
        &self,
        name: &str,
        into: &str,
        reviewer: &str,
        notes: Option<&str>,
    ) -> Result<StagedConcept> {
        let name = normalize_name(name);
        let target = self
            .graph
            .get(&slug_id(into))
            .await?
            .ok_or_else(|| Error::ConceptNotFound(into.to_string()))?;

        let staged = self
            .staging
            .mark_reviewed(&name, StagedStatus::Merged, reviewer, notes, Some(&target.id))
            .await?;
        info!(
            concept = %staged.concept_name,
            into = %target.id,
            reviewer,
            "Merged staged concept into existing one"
        );
        Ok(staged)
    }

    /// Staged entries in one status, most-mentioned first
    pub async fn list(&self, status: StagedStatus, limit: usize) -> Result<Vec<StagedConcept>> {
        self.staging.list_by_status(status, limit).await
    }

    /// Look up one staged entry by name
    pub async fn get(&self, name: &str) -> Result<Option<StagedConcept>> {
        self.staging.get(&normalize_name(name)).await
    }

    /// Per-status counts
    pub async fn stats(&self) -> Result<StagingStats> {
        self.staging.stats().await
    }

    async fn link_prerequisites(
        &self,
        concept: &Concept,
        suggested: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let mut linked = Vec::new();
        let mut skipped = Vec::new();
        if suggested.is_empty() {
            return (linked, skipped);
        }

        let resolution = match self.graph.resolve_batch(suggested).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(
                    concept = %concept.id,
                    error = %e,
                    "Could not resolve suggested prerequisites"
                );
                skipped.extend(suggested.iter().cloned());
                return (linked, skipped);
            }
        };

        for unmatched in &resolution.unmatched {
            debug!(
                concept = %concept.id,
                prerequisite = %unmatched,
                "Suggested prerequisite not in graph, skipped"
            );
        }
        skipped.extend(resolution.unmatched);

        for resolved in &resolution.resolved {
            if resolved.concept_id == concept.id {
                debug!(concept = %concept.id, "Dropping self-referential prerequisite suggestion");
                continue;
            }
            let edge = PrerequisiteEdge::new(resolved.concept_id.as_str(), concept.id.as_str());
            match self.graph.save_edge(&edge).await {
                Ok(()) => linked.push(resolved.name.clone()),
                Err(e) => {
                    warn!(
                        from = %resolved.concept_id,
                        to = %concept.id,
                        error = %e,
                        "Could not link prerequisite"
                    );
                    skipped.push(resolved.name.clone());
                }
            }
        }

        (linked, skipped)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{SqliteConceptGraphRepository, SqliteStagedConceptRepository};
    use crate::storage::Database;

    struct ReviewHarness {
        service: StagedReviewService,
        staging: Arc<SqliteStagedConceptRepository>,
        graph: Arc<SqliteConceptGraphRepository>,
    }

    async fn harness() -> ReviewHarness {
        let db = Database::in_memory().await.expect("in-memory db");
        let staging = Arc::new(SqliteStagedConceptRepository::new(db.pool().clone()));
        let graph = Arc::new(SqliteConceptGraphRepository::new(db.pool().clone()));
        let service = StagedReviewService::new(staging.clone(), graph.clone());
        ReviewHarness {
            service,
            staging,
            graph,
        }
    }

    fn staged_entry() -> StagedConcept {
        let mut staged = StagedConcept::new("implicit differentiation")
            .with_source_question("How do I differentiate x^2 + y^2 = 1?")
            .with_fingerprint("fp-1");
        staged.description = "Differentiating implicitly defined functions".to_string();
        staged.suggested_prerequisites = vec!["derivatives".to_string(), "nonexistent".to_string()];
        staged.difficulty_level = 3;
        staged.category = "calculus".to_string();
        staged
    }

    #[tokio::test]
    async fn test_approve_promotes_and_links_prerequisites() {
        let h = harness().await;
        h.graph.save(&Concept::new("Derivatives")).await.unwrap();
        h.staging.save(&staged_entry()).await.unwrap();

        let result = h
            .service
            .approve("Implicit Differentiation", "alex", Some("looks right"))
            .await
            .unwrap();

        assert_eq!(result.concept.id, "implicit_differentiation");
        assert_eq!(result.concept.difficulty_level, 3);
        assert_eq!(result.concept.tags, vec!["calculus".to_string()]);
        assert_eq!(result.linked_prerequisites, vec!["Derivatives"]);
        assert_eq!(result.skipped_prerequisites, vec!["nonexistent"]);
        assert_eq!(result.staged.status, StagedStatus::Approved);
        assert_eq!(
            result.staged.approved_concept_id.as_deref(),
            Some("implicit_differentiation")
        );

        let detail = h
            .graph
            .concept_detail("implicit_differentiation")
            .await
            .unwrap()
            .expect("promoted concept");
        assert_eq!(detail.prerequisites.len(), 1);
        assert_eq!(detail.prerequisites[0].id, "derivatives");
    }

    #[tokio::test]
    async fn test_review_is_monotonic() {
        let h = harness().await;
        h.staging.save(&staged_entry()).await.unwrap();

        h.service
            .approve("implicit differentiation", "alex", None)
            .await
            .unwrap();

        let err = h
            .service
            .approve("implicit differentiation", "sam", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StagedConceptNotPending(_, _)));

        let err = h
            .service
            .reject("implicit differentiation", "sam", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StagedConceptNotPending(_, _)));
    }

    #[tokio::test]
    async fn test_approve_unknown_entry() {
        let h = harness().await;
        let err = h.service.approve("ghost", "alex", None).await.unwrap_err();
        assert!(matches!(err, Error::StagedConceptNotFound(_)));
    }

    #[tokio::test]
    async fn test_reject_records_verdict() {
        let h = harness().await;
        h.staging.save(&staged_entry()).await.unwrap();

        let staged = h
            .service
            .reject("implicit differentiation", "alex", Some("duplicate of chain rule"))
            .await
            .unwrap();

        assert_eq!(staged.status, StagedStatus::Rejected);
        assert_eq!(staged.reviewed_by.as_deref(), Some("alex"));
        assert_eq!(staged.review_notes.as_deref(), Some("duplicate of chain rule"));
        assert!(staged.approved_concept_id.is_none());

        // Nothing was added to the graph
        let stats = h.graph.stats().await.unwrap();
        assert_eq!(stats.concept_count, 0);
    }

    #[tokio::test]
    async fn test_merge_requires_existing_target() {
        let h = harness().await;
        h.graph.save(&Concept::new("Derivatives")).await.unwrap();
        h.staging.save(&staged_entry()).await.unwrap();

        let err = h
            .service
            .merge("implicit differentiation", "ghost concept", "alex", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConceptNotFound(_)));

        let staged = h
            .service
            .merge("implicit differentiation", "Derivatives", "alex", None)
            .await
            .unwrap();
        assert_eq!(staged.status, StagedStatus::Merged);
        assert_eq!(staged.approved_concept_id.as_deref(), Some("derivatives"));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let h = harness().await;
        h.staging.save(&staged_entry()).await.unwrap();
        h.staging.save(&StagedConcept::new("tensors")).await.unwrap();
        h.service
            .reject("tensors", "alex", None)
            .await
            .unwrap();

        let pending = h.service.list(StagedStatus::Pending, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].concept_name, "implicit differentiation");

        let rejected = h.service.list(StagedStatus::Rejected, 10).await.unwrap();
        assert_eq!(rejected.len(), 1);

        let stats = h.service.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.total(), 2);
    }
}
