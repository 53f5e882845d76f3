//! Answer record type
//!
//! An answer record is the complete, cacheable result of processing one
//! question: the concepts it touches, the learning path, the context
//! that grounded the explanation, the explanation itself, and any
//! recommended resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::concept::LearningPath;
use crate::domain::resource::EducationalResource;

use super::fingerprint::question_fingerprint;

/// A cached answer, keyed by question fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Fingerprint of the normalized question
    pub fingerprint: String,
    /// The question as originally asked
    pub question: String,
    /// Concept names extracted from the question
    pub identified_concepts: Vec<String>,
    /// Ordered learning path, prerequisites first
    pub learning_path: LearningPath,
    /// Context snippets used to ground the explanation
    pub context_snippets: Vec<String>,
    /// The synthesized explanation
    pub explanation: String,
    /// Recommended resources, best quality first
    pub resources: Vec<EducationalResource>,
    /// When the answer was produced
    pub created_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Create a new record for a question, fingerprinting it
    pub fn new(question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            fingerprint: question_fingerprint(&question),
            question,
            identified_concepts: Vec::new(),
            learning_path: LearningPath::new(),
            context_snippets: Vec::new(),
            explanation: String::new(),
            resources: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Age of the record relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Whether the record is still fresh under the given TTL
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.age(now) <= ttl
    }
}
