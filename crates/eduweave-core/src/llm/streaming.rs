//! Streaming response support
//!
//! Server-Sent Events (SSE) parsing for streaming chat completions.

use serde::Deserialize;

use super::types::{FinishReason, MessageRole};

/// A delta update in a streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct StreamDelta {
    /// Role of the message (only present in first chunk)
    pub role: Option<MessageRole>,
    /// Content fragment
    pub content: Option<String>,
}

/// A streaming choice (partial response)
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    /// Index of this choice
    pub index: usize,
    /// Incremental content update
    pub delta: StreamDelta,
    /// Reason for finishing (only in final chunk)
    pub finish_reason: Option<FinishReason>,
}

/// A chunk from a streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    /// Unique identifier for this completion
    pub id: String,
    /// Model used for the completion
    pub model: String,
    /// List of streaming choices
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Get the content from this chunk (if any)
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    /// Check if this is the final chunk
    pub fn is_done(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .is_some()
    }
}

/// Event from streaming response parsing
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A content chunk was received
    Chunk(StreamChunk),
    /// Stream completed
    Done,
    /// Error parsing chunk
    Error(String),
}

/// Parse a Server-Sent Events line into a StreamEvent
pub fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();

    // Skip empty lines and comments
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    // Handle "data: [DONE]" marker
    if line == "data: [DONE]" {
        return Some(StreamEvent::Done);
    }

    // Parse "data: {json}" lines
    if let Some(data) = line.strip_prefix("data: ") {
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => Some(StreamEvent::Chunk(chunk)),
            Err(e) => Some(StreamEvent::Error(format!("Failed to parse chunk: {}", e))),
        }
    } else {
        None
    }
}
