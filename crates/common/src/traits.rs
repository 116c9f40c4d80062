//! Collaborator traits for the probing pipeline
//!
//! - `ProbeExecutor` performs single trials; it never returns an error for a
//!   network failure, it reports a failed `TrialOutcome` instead
//! - `ReportSink` receives qualified records as they are confirmed and the
//!   ranked sequence once the run ends

use crate::types::{Candidate, QualificationRecord, TrialOutcome};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Performs one latency or throughput trial against one candidate.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// One connectivity/handshake attempt bounded by `timeout`.
    async fn latency_trial(&self, candidate: &Candidate, timeout: Duration) -> TrialOutcome;

    /// One bounded transfer from `url`, dialled at the candidate's address.
    ///
    /// Reports bytes and transfer time even when the transfer breaks midway.
    async fn throughput_trial(
        &self,
        candidate: &Candidate,
        url: &str,
        timeout: Duration,
        max_duration: Duration,
    ) -> TrialOutcome;

    /// Executor name/identifier
    fn name(&self) -> &str;
}

/// Consumer of qualification records.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Called once per candidate as soon as it qualifies.
    async fn record_qualified(&self, record: &QualificationRecord) -> Result<()>;

    /// Called once at run end with every record, best first.
    async fn finalize(&self, ranked: &[QualificationRecord]) -> Result<()>;

    /// Sink name/identifier
    fn name(&self) -> &str {
        "sink"
    }
}
