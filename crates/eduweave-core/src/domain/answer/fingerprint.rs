//! Question fingerprinting
//!
//! Two questions that differ only in case or whitespace should hit the
//! same cache entry, so the fingerprint is computed over a normalized
//! form of the question text.

use sha2::{Digest, Sha256};

/// Compute the cache fingerprint for a question
///
/// Normalizes the question (trim, lowercase, collapse internal
/// whitespace) and returns the hex-encoded SHA-256 of the result.
pub fn question_fingerprint(question: &str) -> String {
    let normalized = normalize_question(question);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize a question for fingerprinting
pub fn normalize_question(question: &str) -> String {
    question
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
