//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the service is up.
//!
//! # Tasks
//! - Maintenance: sweeps expired cache entries and resumes pending preloads

mod maintenance;

pub use maintenance::spawn_maintenance_task;
