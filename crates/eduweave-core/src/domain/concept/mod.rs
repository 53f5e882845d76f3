//! Concept graph domain module
//!
//! Defines the curated concept graph: concept nodes, directed
//! prerequisite edges, learning paths built by bounded backward
//! traversal, and the repository trait the SQLite backend implements.

mod entity;
mod import;
mod path;
mod repository;

pub use entity::{slug_id, Concept, PrerequisiteEdge};
pub use import::{GraphConceptEntry, GraphDocument, GraphEdgeEntry};
pub use path::{LearningPath, PathNode, PathRole};
pub use repository::{
    lookup_concept_detail, BatchResolution, ConceptDetail, ConceptGraphRepository, GraphStats,
    ResolvedConcept,
};
