//! Educational resource types
//!
//! Resources are external learning materials (videos, articles,
//! tutorials) linked to one or more concepts and ranked by a quality
//! score in [0.0, 1.0].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An external learning resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationalResource {
    /// Unique identifier
    pub id: String,
    /// Resource title
    pub title: String,
    /// Resource URL, unique across the catalog
    pub url: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Kind of material
    pub kind: ResourceKind,
    /// Audience difficulty
    pub difficulty: ResourceDifficulty,
    /// Quality score in [0.0, 1.0], higher is better
    pub quality_score: f32,
    /// Concept IDs this resource covers (at least one)
    pub concepts: Vec<String>,
    /// Host the resource lives on (e.g. "khanacademy.org")
    #[serde(default)]
    pub source_domain: String,
    /// When the resource was cataloged
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl EducationalResource {
    /// Create a new resource, deriving the source domain from the URL
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let source_domain = domain_of(&url);

        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            url,
            description: String::new(),
            kind: ResourceKind::Article,
            difficulty: ResourceDifficulty::Beginner,
            quality_score: 0.5,
            concepts: Vec::new(),
            source_domain,
            created_at: Utc::now(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the kind of material
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the audience difficulty
    pub fn with_difficulty(mut self, difficulty: ResourceDifficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the quality score (clamped to [0.0, 1.0])
    pub fn with_quality(mut self, score: f32) -> Self {
        self.quality_score = score.clamp(0.0, 1.0);
        self
    }

    /// Set the covered concept IDs
    pub fn with_concepts(mut self, concepts: Vec<String>) -> Self {
        self.concepts = concepts;
        self
    }
}

/// Extract the host from a URL, dropping any leading "www."
pub fn domain_of(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Kinds of learning material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Video lesson or lecture
    Video,
    /// Written article or reference page
    Article,
    /// Step-by-step tutorial
    Tutorial,
    /// Worked example
    Example,
    /// Practice problems or exercises
    Practice,
}

impl ResourceKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
            Self::Tutorial => "tutorial",
            Self::Example => "example",
            Self::Practice => "practice",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "video" => Some(Self::Video),
            "article" => Some(Self::Article),
            "tutorial" => Some(Self::Tutorial),
            "example" => Some(Self::Example),
            "practice" | "exercise" => Some(Self::Practice),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audience difficulty of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDifficulty {
    /// Assumes no prior exposure
    Beginner,
    /// Assumes working familiarity
    Intermediate,
    /// Assumes mastery of fundamentals
    Advanced,
}

impl ResourceDifficulty {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_creation() {
        let resource =
            EducationalResource::new("Intro to Limits", "https://www.khanacademy.org/limits")
                .with_kind(ResourceKind::Video)
                .with_quality(0.9)
                .with_concepts(vec!["limits".into()]);

        assert!(!resource.id.is_empty());
        assert_eq!(resource.source_domain, "khanacademy.org");
        assert_eq!(resource.quality_score, 0.9);
    }

    #[test]
    fn test_quality_clamping() {
        let resource = EducationalResource::new("t", "https://example.com").with_quality(1.7);
        assert_eq!(resource.quality_score, 1.0);

        let resource = EducationalResource::new("t", "https://example.com").with_quality(-0.5);
        assert_eq!(resource.quality_score, 0.0);
    }

    #[test]
    fn test_domain_extraction() {
        assert_eq!(domain_of("https://www.khanacademy.org/math"), "khanacademy.org");
        assert_eq!(domain_of("http://example.com"), "example.com");
        assert_eq!(domain_of("https://youtu.be/abc?t=10"), "youtu.be");
        assert_eq!(domain_of("plain-host.org/page"), "plain-host.org");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ResourceKind::parse("video"), Some(ResourceKind::Video));
        assert_eq!(ResourceKind::parse("EXERCISE"), Some(ResourceKind::Practice));
        assert_eq!(ResourceKind::parse("podcast"), None);
    }
}
