//! Repository trait for staged concepts

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{StagedConcept, StagedStatus, StagingStats};

/// Repository trait for the staging area
#[async_trait]
pub trait StagedConceptRepository: Send + Sync {
    /// Get a staged concept by name
    async fn get(&self, concept_name: &str) -> Result<Option<StagedConcept>>;

    /// Save a staged concept (insert or update)
    async fn save(&self, staged: &StagedConcept) -> Result<()>;

    /// Record another question mentioning an already-staged concept
    ///
    /// Increments the occurrence count and appends the fingerprint if
    /// new. Returns `false` when no entry with that name exists.
    async fn increment_occurrence(&self, concept_name: &str, fingerprint: &str) -> Result<bool>;

    /// List staged concepts with the given status, most-mentioned first
    async fn list_by_status(&self, status: StagedStatus, limit: usize)
        -> Result<Vec<StagedConcept>>;

    /// Move a pending entry to a terminal review status
    ///
    /// Fails with `StagedConceptNotFound` when the entry does not
    /// exist, and `StagedConceptNotPending` when it was already
    /// reviewed. Review decisions never revert.
    async fn mark_reviewed(
        &self,
        concept_name: &str,
        status: StagedStatus,
        reviewed_by: &str,
        notes: Option<&str>,
        approved_concept_id: Option<&str>,
    ) -> Result<StagedConcept>;

    /// Per-status entry counts
    async fn stats(&self) -> Result<StagingStats>;
}
