//! Repository trait for the answer cache

use async_trait::async_trait;

use crate::error::Result;

use super::record::AnswerRecord;

/// Repository trait for answer cache persistence
///
/// The cache is keyed by question fingerprint. Freshness policy lives
/// with the caller; this trait stores and retrieves records as-is.
#[async_trait]
pub trait AnswerCacheRepository: Send + Sync {
    /// Look up a cached answer by fingerprint
    async fn get(&self, fingerprint: &str) -> Result<Option<AnswerRecord>>;

    /// Store an answer (insert or replace)
    async fn put(&self, record: &AnswerRecord) -> Result<()>;

    /// List the most recently cached answers
    async fn list_recent(&self, limit: usize) -> Result<Vec<AnswerRecord>>;

    /// Count cached answers
    async fn count(&self) -> Result<u64>;
}
