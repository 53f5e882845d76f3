//! Progressive query events
//!
//! A streamed query emits one ordered event sequence: start, progress,
//! concepts, prerequisites, context, resources, explanation chunks, then a
//! terminal complete — or an error event at whatever point processing
//! failed. Events serialize as `{"type": ..., "data": ...}` for transport
//! adapters.

use serde::{Deserialize, Serialize};

use crate::domain::concept::LearningPath;
use crate::domain::resource::EducationalResource;
use crate::error::Error;

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// Served from a fresh pipeline run
    Processed,
    /// Served from a persisted answer record
    Cache,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Cache => "cache",
        }
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One event in a streamed query response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueryStreamEvent {
    Start {
        question: String,
        fingerprint: String,
    },
    Progress {
        stage: String,
        message: String,
    },
    Concepts {
        concepts: Vec<String>,
        count: usize,
    },
    Prerequisites {
        path: LearningPath,
        count: usize,
    },
    Context {
        chunks: Vec<String>,
        count: usize,
    },
    Resources {
        resources: Vec<EducationalResource>,
        count: usize,
    },
    ExplanationChunk {
        chunk: String,
        total_chars: usize,
    },
    ExplanationComplete {
        total_length: usize,
    },
    Complete {
        fingerprint: String,
        source: AnswerSource,
        processing_ms: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl QueryStreamEvent {
    pub fn progress(stage: &str, message: impl Into<String>) -> Self {
        Self::Progress {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    pub fn concepts(concepts: Vec<String>) -> Self {
        let count = concepts.len();
        Self::Concepts { concepts, count }
    }

    pub fn prerequisites(path: LearningPath) -> Self {
        let count = path.len();
        Self::Prerequisites { path, count }
    }

    pub fn context(chunks: Vec<String>) -> Self {
        let count = chunks.len();
        Self::Context { chunks, count }
    }

    pub fn resources(resources: Vec<EducationalResource>) -> Self {
        let count = resources.len();
        Self::Resources { resources, count }
    }

    pub fn failure(error: &Error) -> Self {
        Self::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Equality on the discriminant only, for asserting event order
impl PartialEq for QueryStreamEventKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Tag-only view of a stream event
#[derive(Debug, Clone, Copy, Eq)]
pub enum QueryStreamEventKind {
    Start,
    Progress,
    Concepts,
    Prerequisites,
    Context,
    Resources,
    ExplanationChunk,
    ExplanationComplete,
    Complete,
    Error,
}

impl QueryStreamEvent {
    pub fn kind(&self) -> QueryStreamEventKind {
        match self {
            Self::Start { .. } => QueryStreamEventKind::Start,
            Self::Progress { .. } => QueryStreamEventKind::Progress,
            Self::Concepts { .. } => QueryStreamEventKind::Concepts,
            Self::Prerequisites { .. } => QueryStreamEventKind::Prerequisites,
            Self::Context { .. } => QueryStreamEventKind::Context,
            Self::Resources { .. } => QueryStreamEventKind::Resources,
            Self::ExplanationChunk { .. } => QueryStreamEventKind::ExplanationChunk,
            Self::ExplanationComplete { .. } => QueryStreamEventKind::ExplanationComplete,
            Self::Complete { .. } => QueryStreamEventKind::Complete,
            Self::Error { .. } => QueryStreamEventKind::Error,
        }
    }
}
