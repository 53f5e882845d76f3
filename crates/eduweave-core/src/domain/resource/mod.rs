//! Educational resource domain module

mod entity;
mod repository;

pub use entity::{domain_of, EducationalResource, ResourceDifficulty, ResourceKind};
pub use repository::ResourceRepository;
