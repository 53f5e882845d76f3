//! Concept and prerequisite edge types
//!
//! Concepts are nodes in the curated knowledge graph. Each concept has a
//! stable slug identifier derived from its name, so graph documents and
//! LLM output can reference the same concept consistently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curated concept in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Stable slug identifier (e.g. "chain_rule")
    pub id: String,
    /// Human-readable name (e.g. "Chain Rule")
    pub name: String,
    /// Short description used in learning paths and prompts
    #[serde(default)]
    pub description: String,
    /// Difficulty on a 1 (introductory) to 5 (advanced) scale
    #[serde(default = "default_difficulty")]
    pub difficulty_level: u8,
    /// Free-form tags (e.g. "calculus", "algebra")
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the concept was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When the concept was last updated
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_difficulty() -> u8 {
    1
}

impl Concept {
    /// Create a new concept with an ID derived from the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = slug_id(&name);
        let now = Utc::now();

        Self {
            id,
            name,
            description: String::new(),
            difficulty_level: 1,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the derived ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the difficulty level (clamped to 1-5)
    pub fn with_difficulty(mut self, level: u8) -> Self {
        self.difficulty_level = level.clamp(1, 5);
        self
    }

    /// Set free-form tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Derive a stable slug identifier from a concept name
///
/// Lowercases the name and joins whitespace-separated words with
/// underscores, so "Chain Rule" and "chain  rule" map to the same ID.
pub fn slug_id(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// A directed prerequisite edge between two concepts
///
/// `from_id` must be learned before `to_id`. Learning path construction
/// walks these edges backwards from a target concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    /// The prerequisite concept
    pub from_id: String,
    /// The concept that depends on it
    pub to_id: String,
    /// When the edge was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl PrerequisiteEdge {
    /// Create a new prerequisite edge
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the edge points a concept at itself
    pub fn is_self_loop(&self) -> bool {
        self.from_id == self.to_id
    }
}
