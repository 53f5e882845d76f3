//! Concept extraction from question text
//!
//! The extractor is the gate for the whole pipeline: if it fails, nothing
//! downstream has anything to work with, so its errors are fatal to the
//! request rather than degradable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::llm::{extraction_messages, parse_concept_list, LlmClient};

/// Turns a free-form question into an ordered list of concept names.
///
/// Output names are distinct, lower-cased and trimmed; an empty list is a
/// valid outcome (the question touched nothing recognizable). The call must
/// be bounded: implementations may retry transient rate limits but never
/// loop indefinitely.
#[async_trait]
pub trait ConceptExtractor: Send + Sync {
    async fn extract(&self, question: &str) -> Result<Vec<String>>;
}

/// Production extractor backed by the chat completion client.
///
/// Runs a single cold-temperature completion and parses the comma-separated
/// concept list out of the reply.
pub struct LlmConceptExtractor {
    client: Arc<LlmClient>,
    temperature: f32,
}

impl LlmConceptExtractor {
    pub fn new(client: Arc<LlmClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl ConceptExtractor for LlmConceptExtractor {
    async fn extract(&self, question: &str) -> Result<Vec<String>> {
        let messages = extraction_messages(question);

        let response = self
            .client
            .complete(messages, self.temperature)
            .await
            .map_err(|e| Error::ExtractionFailed(format!("concept extraction call failed: {e}")))?;

        let concepts = parse_concept_list(&response.content);
        debug!(
            count = concepts.len(),
            model = %response.model,
            "Extracted concepts from question"
        );

        Ok(concepts)
    }
}
