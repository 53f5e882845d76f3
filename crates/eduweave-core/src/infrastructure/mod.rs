//! Infrastructure layer
//!
//! SQLite implementations of the domain repository traits.

pub mod answer_cache;
pub mod concept_graph;
pub mod content;
pub mod resources;
pub mod staging;

pub use answer_cache::SqliteAnswerCacheRepository;
pub use concept_graph::SqliteConceptGraphRepository;
pub use content::SqliteContentRepository;
pub use resources::SqliteResourceRepository;
pub use staging::SqliteStagedConceptRepository;
