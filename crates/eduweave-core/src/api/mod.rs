//! Diagnostic API
//!
//! Health checks and statistics over an already-open database handle.
//! Connection ownership stays with the caller; these functions only
//! borrow it.

pub mod health;

pub use health::{
    get_system_info, health, health_detailed, system_stats, HealthCheck, HealthReport,
    HealthStatus, SystemInfo, SystemStats,
};
