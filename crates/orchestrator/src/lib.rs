//! Orchestrator - two-stage scheduling, admission control and aggregation

mod admission;
mod aggregator;
mod progress;
mod scheduler;
mod workers;

pub use admission::{should_throttle_latency, AdmissionControl, StageEstimate};
pub use aggregator::{latency_stats, ResultAggregator, Thresholds};
pub use progress::ProgressTracker;
pub use scheduler::{rank, ResultsMap, RunSummary, Scheduler};
pub use workers::{StageReport, WorkItem, WorkerPool};
