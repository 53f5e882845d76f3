//! Domain types and repository traits
//!
//! Each submodule owns one area of the data model:
//!
//! - [`concept`]: the curated concept graph and learning paths
//! - [`answer`]: the fingerprint-keyed answer cache
//! - [`context`]: ingested content chunks for grounding
//! - [`resource`]: the external resource catalog
//! - [`staging`]: unknown concepts awaiting review
//!
//! Repository traits live beside their entities; the SQLite
//! implementations are in [`crate::infrastructure`].

pub mod answer;
pub mod concept;
pub mod context;
pub mod resource;
pub mod staging;
