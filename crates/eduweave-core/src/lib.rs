//! Eduweave Core Library
//!
//! This crate provides the core functionality for Eduweave, including:
//! - Query orchestration (cache-first answers with deadline-bounded fan-out)
//! - Curated concept graph with prerequisite-path resolution
//! - Content retrieval (keyword and embedding-based)
//! - Educational resource catalog
//! - Concept staging and curator review
//! - Storage (SQLite with inline migrations)
//! - LLM integration (OpenRouter API)

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod orchestrator;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::{QueryOrchestrator, QueryResponse};
    pub use crate::storage::Database;
}
