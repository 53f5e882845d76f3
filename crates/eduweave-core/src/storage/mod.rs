//! Storage layer
//!
//! SQLite connection management and schema migrations. Repository
//! implementations over this pool live in [`crate::infrastructure`].

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig};
pub use migrations::{run_migrations, MigrationStatus, CURRENT_VERSION};
