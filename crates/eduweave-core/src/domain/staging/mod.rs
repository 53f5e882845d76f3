//! Concept staging domain module
//!
//! Unknown concepts mentioned in questions are staged here for human
//! review rather than written straight into the curated graph.

mod entity;
mod repository;
mod service;

pub use entity::{ConceptAnalysis, StagedConcept, StagedStatus, StagingStats};
pub use repository::StagedConceptRepository;
pub use service::{ApprovalResult, StagedReviewService};
