//! Repository trait for educational resources

use async_trait::async_trait;

use crate::error::Result;

use super::entity::EducationalResource;

/// Repository trait for the resource catalog
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Save a resource (insert, or update by URL)
    ///
    /// Resources are deduplicated by URL. Fails with `InvalidInput`
    /// when the resource covers no concepts.
    async fn save(&self, resource: &EducationalResource) -> Result<()>;

    /// Get a resource by ID
    async fn get(&self, id: &str) -> Result<Option<EducationalResource>>;

    /// Find resources covering any of the given concepts
    ///
    /// Returned best quality first, truncated at `limit`.
    async fn find_for_concepts(
        &self,
        concept_ids: &[String],
        limit: usize,
    ) -> Result<Vec<EducationalResource>>;

    /// List resources ordered by quality
    async fn list(&self, limit: usize) -> Result<Vec<EducationalResource>>;

    /// Count cataloged resources
    async fn count(&self) -> Result<u64>;
}
