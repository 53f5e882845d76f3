//! Error types for Eduweave

use thiserror::Error;

/// Result type alias using Eduweave's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Eduweave error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (E001-E099)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Concept '{0}' not found. Run `eduweave concepts` to see the curated graph.")]
    ConceptNotFound(String),

    // Upstream errors (E100-E199)
    #[error("'{source}' timed out after {elapsed_ms}ms")]
    UpstreamTimeout {
        // `r#` keeps thiserror from treating this name as an error source
        r#source: &'static str,
        elapsed_ms: u64,
    },

    #[error("'{source}' unavailable: {reason}")]
    UpstreamUnavailable {
        r#source: &'static str,
        reason: String,
    },

    #[error("Concept extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    // Network errors (E200-E299)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check your API key with `eduweave config get api_key`.")]
    LlmError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Staging errors (E700-E799)
    #[error("Staged concept '{0}' not found. Run `eduweave staged list` to see the queue.")]
    StagedConceptNotFound(String),

    #[error("Staged concept '{0}' is already {1}; only pending entries can be reviewed")]
    StagedConceptNotPending(String, String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "E001",
            Self::ConceptNotFound(_) => "E002",
            Self::UpstreamTimeout { .. } => "E100",
            Self::UpstreamUnavailable { .. } => "E101",
            Self::ExtractionFailed(_) => "E102",
            Self::CacheUnavailable(_) => "E103",
            Self::NetworkError(_) => "E200",
            Self::LlmError(_) => "E201",
            Self::RateLimited(_) => "E202",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::StagedConceptNotFound(_) => "E700",
            Self::StagedConceptNotPending(..) => "E701",
            Self::SerializationError(_) => "E900",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ConceptNotFound(_) => Some("eduweave concepts".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LlmError(_) => Some("eduweave config get api_key".to_string()),
            Self::StagedConceptNotFound(_) => Some("eduweave staged list".to_string()),
            Self::ConfigError(_) => Some("eduweave config path".to_string()),
            _ => None,
        }
    }

    /// Whether this error represents a degradable upstream failure rather
    /// than a request-fatal one
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. }
                | Self::UpstreamUnavailable { .. }
                | Self::CacheUnavailable(_)
        )
    }
}
