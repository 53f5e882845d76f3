//! Staged concept types
//!
//! When a question mentions a concept the curated graph does not know,
//! the concept is staged for human review instead of being added
//! directly. Staging entries accumulate occurrence counts across
//! questions so reviewers can prioritize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A concept awaiting curation review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedConcept {
    /// Normalized concept name, unique across the staging area
    pub concept_name: String,
    /// LLM-proposed description
    #[serde(default)]
    pub description: String,
    /// LLM-proposed prerequisite names
    #[serde(default)]
    pub suggested_prerequisites: Vec<String>,
    /// LLM confidence that this is a real, learnable concept
    pub confidence: f32,
    /// Proposed difficulty on a 1-5 scale
    pub difficulty_level: u8,
    /// Proposed subject category (e.g. "calculus")
    #[serde(default)]
    pub category: String,
    /// Why the analyzer believes this belongs in the graph
    #[serde(default)]
    pub reasoning: String,
    /// Review status
    pub status: StagedStatus,
    /// How many distinct questions have mentioned this concept
    pub occurrence_count: u64,
    /// Fingerprints of the questions that mentioned it
    #[serde(default)]
    pub related_fingerprints: Vec<String>,
    /// The question that first surfaced the concept
    #[serde(default)]
    pub source_question: String,
    /// Who reviewed the entry
    pub reviewed_by: Option<String>,
    /// When it was reviewed
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Free-form reviewer notes
    pub review_notes: Option<String>,
    /// ID of the concept created on approval, or merged into
    pub approved_concept_id: Option<String>,
    /// When the concept was first staged
    pub first_seen_at: DateTime<Utc>,
    /// When the entry last changed
    pub updated_at: DateTime<Utc>,
}

impl StagedConcept {
    /// Stage a new concept
    pub fn new(concept_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            concept_name: concept_name.into(),
            description: String::new(),
            suggested_prerequisites: Vec::new(),
            confidence: 0.5,
            difficulty_level: 1,
            category: String::new(),
            reasoning: String::new(),
            status: StagedStatus::Pending,
            occurrence_count: 1,
            related_fingerprints: Vec::new(),
            source_question: String::new(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            approved_concept_id: None,
            first_seen_at: now,
            updated_at: now,
        }
    }

    /// Fill in the analyzer's proposal
    pub fn with_analysis(mut self, analysis: &ConceptAnalysis) -> Self {
        self.description = analysis.description.clone();
        self.suggested_prerequisites = analysis.suggested_prerequisites.clone();
        self.confidence = analysis.confidence.clamp(0.0, 1.0);
        self.difficulty_level = analysis.difficulty_level.clamp(1, 5);
        self.category = analysis.category.clone();
        self.reasoning = analysis.reasoning.clone();
        self
    }

    /// Set the question that surfaced the concept
    pub fn with_source_question(mut self, question: impl Into<String>) -> Self {
        self.source_question = question.into();
        self
    }

    /// Attach the fingerprint of the question that surfaced the concept
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        let fingerprint = fingerprint.into();
        if !self.related_fingerprints.contains(&fingerprint) {
            self.related_fingerprints.push(fingerprint);
        }
        self
    }

    /// Record another question mentioning this concept
    pub fn record_occurrence(&mut self, fingerprint: &str) {
        self.occurrence_count += 1;
        if !self.related_fingerprints.iter().any(|f| f == fingerprint) {
            self.related_fingerprints.push(fingerprint.to_string());
        }
        self.updated_at = Utc::now();
    }

    /// Whether the entry is still awaiting review
    pub fn is_pending(&self) -> bool {
        self.status == StagedStatus::Pending
    }
}

/// Review status of a staged concept
///
/// Transitions are monotonic: once an entry leaves `Pending` it never
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagedStatus {
    /// Awaiting review
    Pending,
    /// Approved and promoted into the concept graph
    Approved,
    /// Rejected as not a real or useful concept
    Rejected,
    /// Merged into an existing concept
    Merged,
}

impl StagedStatus {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "merged" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl std::fmt::Display for StagedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Analyzer verdict on a candidate concept
///
/// Produced by the LLM gate that decides whether a name mentioned in a
/// question is a genuine learnable concept worth staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptAnalysis {
    /// Whether this is a real, learnable concept
    pub is_learnable: bool,
    /// Proposed description
    #[serde(default)]
    pub description: String,
    /// Proposed prerequisite names
    #[serde(default)]
    pub suggested_prerequisites: Vec<String>,
    /// Confidence in the verdict, [0.0, 1.0]
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Proposed difficulty on a 1-5 scale
    #[serde(default = "default_difficulty")]
    pub difficulty_level: u8,
    /// Proposed subject category
    #[serde(default)]
    pub category: String,
    /// Analyzer's reasoning
    #[serde(default)]
    pub reasoning: String,
}

fn default_confidence() -> f32 {
    0.5
}

fn default_difficulty() -> u8 {
    1
}

/// Per-status counts for the staging area
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StagingStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub merged: u64,
}

impl StagingStats {
    /// Total staged entries across all statuses
    pub fn total(&self) -> u64 {
        self.pending + self.approved + self.rejected + self.merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_defaults() {
        let staged = StagedConcept::new("implicit differentiation");
        assert_eq!(staged.status, StagedStatus::Pending);
        assert_eq!(staged.occurrence_count, 1);
        assert!(staged.is_pending());
    }

    #[test]
    fn test_record_occurrence_deduplicates_fingerprints() {
        let mut staged = StagedConcept::new("tensors").with_fingerprint("fp-1");

        staged.record_occurrence("fp-2");
        staged.record_occurrence("fp-2");

        assert_eq!(staged.occurrence_count, 3);
        assert_eq!(staged.related_fingerprints, vec!["fp-1", "fp-2"]);
    }

    #[test]
    fn test_analysis_clamps_fields() {
        let analysis = ConceptAnalysis {
            is_learnable: true,
            description: "desc".into(),
            suggested_prerequisites: vec!["limits".into()],
            confidence: 1.8,
            difficulty_level: 9,
            category: "calculus".into(),
            reasoning: String::new(),
        };

        let staged = StagedConcept::new("x").with_analysis(&analysis);
        assert_eq!(staged.confidence, 1.0);
        assert_eq!(staged.difficulty_level, 5);
    }

    #[test]
    fn test_analysis_parses_with_defaults() {
        let json = r#"{"is_learnable": false, "reasoning": "typo, not a concept"}"#;
        let analysis: ConceptAnalysis = serde_json::from_str(json).unwrap();
        assert!(!analysis.is_learnable);
        assert_eq!(analysis.confidence, 0.5);
        assert_eq!(analysis.difficulty_level, 1);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(StagedStatus::parse("pending"), Some(StagedStatus::Pending));
        assert_eq!(StagedStatus::parse("MERGED"), Some(StagedStatus::Merged));
        assert_eq!(StagedStatus::parse("held"), None);
    }
}
