//! LLM integration - OpenRouter API
//!
//! This module provides:
//! - OpenRouter HTTP client for chat completions and embeddings
//! - Request/response types matching the OpenAI-compatible API
//! - Streaming response support (SSE)
//! - Prompt construction and response parsing for the query pipeline

mod client;
mod prompts;
mod streaming;
mod types;

pub use client::LlmClient;
pub use prompts::{
    analysis_messages, extraction_messages, parse_concept_analysis, parse_concept_list,
    synthesis_messages, MAX_EXTRACTED_CONCEPTS,
};
pub use streaming::{parse_sse_line, StreamChunk, StreamEvent};
pub use types::{
    ChatRequest, ChatResponse, Choice, Embedding, FinishReason, LlmResponse, Message, MessageRole,
    Usage,
};
