//! Answer synthesis
//!
//! Turns the fetch bundle into explanation text, either whole or as an
//! ordered chunk stream. The streaming contract is strict: chunks arrive in
//! producer order, and a mid-stream failure still delivers everything
//! produced so far followed by a terminal failure marker — never a silent
//! cut.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::debug;

use crate::domain::concept::LearningPath;
use crate::error::{Error, Result};
use crate::llm::{synthesis_messages, LlmClient, StreamEvent};

/// One element of a synthesis stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    /// Next piece of explanation text, in order
    Chunk(String),
    /// The explanation finished cleanly
    Completed,
    /// The stream failed after zero or more chunks; always the last event
    Failed(String),
}

/// Produces explanation text from the question plus fetched data
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce the whole explanation in one call
    async fn synthesize(
        &self,
        question: &str,
        path: &LearningPath,
        context: &[String],
    ) -> Result<String>;

    /// Produce the explanation as an ordered chunk stream.
    ///
    /// The stream ends with exactly one terminal event: `Completed` or
    /// `Failed`.
    async fn synthesize_stream(
        &self,
        question: &str,
        path: &LearningPath,
        context: &[String],
    ) -> Result<BoxStream<'static, SynthesisEvent>>;
}

/// Production synthesizer over the chat completion client
pub struct LlmSynthesizer {
    client: Arc<LlmClient>,
    temperature: f32,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<LlmClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        path: &LearningPath,
        context: &[String],
    ) -> Result<String> {
        let messages = synthesis_messages(question, path, context);
        let response = self.client.complete(messages, self.temperature).await?;

        if response.content.trim().is_empty() {
            return Err(Error::LlmError("empty synthesis response".to_string()));
        }

        debug!(
            chars = response.content.len(),
            model = %response.model,
            "Synthesized explanation"
        );
        Ok(response.content)
    }

    async fn synthesize_stream(
        &self,
        question: &str,
        path: &LearningPath,
        context: &[String],
    ) -> Result<BoxStream<'static, SynthesisEvent>> {
        let messages = synthesis_messages(question, path, context);
        let upstream = self
            .client
            .complete_streaming(messages, self.temperature)
            .await?;

        let stream = async_stream::stream! {
            futures_util::pin_mut!(upstream);
            while let Some(event) = upstream.next().await {
                match event {
                    Ok(StreamEvent::Chunk(chunk)) => {
                        if let Some(content) = chunk.content() {
                            if !content.is_empty() {
                                yield SynthesisEvent::Chunk(content.to_string());
                            }
                        }
                    }
                    Ok(StreamEvent::Done) => {
                        yield SynthesisEvent::Completed;
                        return;
                    }
                    Ok(StreamEvent::Error(message)) => {
                        yield SynthesisEvent::Failed(message);
                        return;
                    }
                    Err(e) => {
                        yield SynthesisEvent::Failed(e.to_string());
                        return;
                    }
                }
            }
            // Upstream ended without a [DONE] marker; treat as clean end
            yield SynthesisEvent::Completed;
        };

        Ok(stream.boxed())
    }
}
