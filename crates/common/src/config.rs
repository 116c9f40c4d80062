//! Run configuration consumed by the scheduler and probe workers.
//!
//! Values arrive from the CLI (flags overlaid on an optional JSON file) and are
//! checked once with [`RunConfig::validate`] before a run starts. Durations
//! are written as human-readable strings such as `"250ms"` or `"10s"`.

use crate::error::{EdgeScoutError, EdgeScoutResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Full configuration surface of one run.
///
/// Keep fields `pub` so the scheduler and workers read them without accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop once this many candidates qualified.
    pub result_count: usize,
    /// Replace `result_count` with the size of the initial candidate batch.
    pub test_all: bool,
    pub latency_workers: usize,
    pub throughput_workers: usize,
    /// Per-trial timeout for both stages.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub latency_trials: u32,
    pub throughput_trials: u32,
    /// Average latency must not exceed this.
    #[serde(with = "humantime_serde")]
    pub max_latency: Duration,
    /// Evaluation mode: minimum latency success rate in [0, 1].
    pub min_stability: Option<f64>,
    /// Minimum average throughput in kB/s.
    pub min_speed_kbs: f64,
    /// Transfers below this many bytes never count as sustained throughput.
    pub min_transfer_bytes: u64,
    /// Pause between consecutive trials against the same candidate.
    #[serde(with = "humantime_serde")]
    pub trial_interval: Duration,
    pub throughput_enabled: bool,
    pub throughput_url: String,
    /// Upper bound on the transfer phase of one throughput trial.
    #[serde(with = "humantime_serde")]
    pub throughput_max_duration: Duration,
    /// Slack multiplier of the latency admission throttle.
    pub control_factor: f64,
    /// Port dialled for candidates that carry none.
    pub default_port: u16,
    /// Maximum candidates drawn from the pool in one run.
    pub candidate_budget: usize,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stats_interval: Duration,
    /// Queue depth = workers * multiplier.
    pub queue_multiplier: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            result_count: 10,
            test_all: false,
            latency_workers: 200,
            throughput_workers: 1,
            timeout: Duration::from_secs(1),
            latency_trials: 4,
            throughput_trials: 1,
            max_latency: Duration::from_millis(500),
            min_stability: None,
            min_speed_kbs: 0.0,
            min_transfer_bytes: 1_000_000,
            trial_interval: Duration::from_millis(100),
            throughput_enabled: true,
            throughput_url: "https://speed.cloudflare.com/__down?bytes=100000000".to_string(),
            throughput_max_duration: Duration::from_secs(10),
            control_factor: 2.0,
            default_port: 443,
            candidate_budget: 10_000,
            poll_interval: Duration::from_millis(20),
            stats_interval: Duration::from_secs(5),
            queue_multiplier: 2,
        }
    }
}

impl RunConfig {
    /// Fast preset: fewer trials, short timeouts, shorter transfers.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            latency_workers: 400,
            timeout: Duration::from_millis(600),
            latency_trials: 2,
            trial_interval: Duration::ZERO,
            throughput_max_duration: Duration::from_secs(5),
            candidate_budget: 2_000,
            ..Self::default()
        }
    }

    /// Thorough preset: more trials and a stability gate.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            latency_workers: 100,
            timeout: Duration::from_secs(2),
            latency_trials: 8,
            throughput_trials: 2,
            min_stability: Some(0.9),
            throughput_workers: 2,
            ..Self::default()
        }
    }

    /// Load a (possibly partial) configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EdgeScoutResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| EdgeScoutError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Result-count target, given the size of the initial candidate batch.
    #[inline]
    #[must_use]
    pub fn target_count(&self, initial_batch: usize) -> usize {
        if self.test_all {
            initial_batch
        } else {
            self.result_count
        }
    }

    pub fn validate(&self) -> EdgeScoutResult<()> {
        let fail = |msg: &str| Err(EdgeScoutError::Config(msg.to_string()));

        if self.latency_workers == 0 {
            return fail("latency_workers must be at least 1");
        }
        if self.throughput_enabled && self.throughput_workers == 0 {
            return fail("throughput_workers must be at least 1 when the throughput stage is enabled");
        }
        if self.latency_trials == 0 {
            return fail("latency_trials must be at least 1");
        }
        if self.throughput_enabled && self.throughput_trials == 0 {
            return fail("throughput_trials must be at least 1 when the throughput stage is enabled");
        }
        if self.timeout.is_zero() {
            return fail("timeout must be positive");
        }
        if !self.test_all && self.result_count == 0 {
            return fail("result_count must be at least 1");
        }
        if let Some(rate) = self.min_stability {
            if !(0.0..=1.0).contains(&rate) {
                return fail("min_stability must be within [0, 1]");
            }
        }
        if !(self.control_factor.is_finite() && self.control_factor > 0.0) {
            return fail("control_factor must be a positive number");
        }
        if self.min_speed_kbs < 0.0 {
            return fail("min_speed_kbs must not be negative");
        }
        if self.throughput_enabled && self.throughput_url.trim().is_empty() {
            return fail("throughput_url is required when the throughput stage is enabled");
        }
        if self.candidate_budget == 0 {
            return fail("candidate_budget must be at least 1");
        }
        if self.queue_multiplier == 0 {
            return fail("queue_multiplier must be at least 1");
        }
        Ok(())
    }
}
