//! Edgescout Common - Shared types and traits
//!
//! This crate provides the core types, configuration, and collaborator
//! traits used across the edgescout workspace:
//! - `Candidate`, `TrialOutcome` and `QualificationRecord` data model
//! - `RunConfig` with fast/thorough presets and validation
//! - `ProbeExecutor` and `ReportSink` seams for probing and reporting

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{EdgeScoutError, EdgeScoutResult};
pub use traits::{ProbeExecutor, ReportSink};
pub use types::{
    Candidate, LatencyStats, QualificationRecord, RunStats, StageKind, ThroughputStats,
    TrialOutcome,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
