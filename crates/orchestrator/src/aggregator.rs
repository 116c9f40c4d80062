//! Result aggregation - reduce trial outcomes into qualification records
//!
//! Pure functions of the trial sequence: the same ordered trials always
//! produce the same record.

use std::time::Duration;

use edgescout_common::{
    Candidate, LatencyStats, QualificationRecord, RunConfig, StageKind, ThroughputStats,
    TrialOutcome,
};

/// Reduces per-candidate trial sequences.
#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    min_transfer_bytes: u64,
}

impl ResultAggregator {
    pub fn new(min_transfer_bytes: u64) -> Self {
        Self { min_transfer_bytes }
    }

    /// Build a record from every trial in `trials`, whatever the stage.
    pub fn reduce(&self, candidate: Candidate, trials: &[TrialOutcome]) -> QualificationRecord {
        let mut record = QualificationRecord::new(candidate);
        record.latency = latency_stats(trials);
        record.throughput = self.throughput_stats(trials);
        record
    }

    /// Throughput statistics; the average stays zero until successful bytes
    /// exceed the minimum transfer floor.
    pub fn throughput_stats(&self, trials: &[TrialOutcome]) -> ThroughputStats {
        let mut stats = ThroughputStats::default();

        for t in trials.iter().filter(|t| t.stage == StageKind::Throughput) {
            stats.trials += 1;
            if t.success {
                stats.successes += 1;
                stats.total_bytes += t.bytes;
                stats.total_duration += t.elapsed;
            }
        }

        stats.success_rate = rate(stats.successes, stats.trials);
        if stats.total_bytes > self.min_transfer_bytes && !stats.total_duration.is_zero() {
            stats.avg_kbs = stats.total_bytes as f64 / 1000.0 / stats.total_duration.as_secs_f64();
        }
        stats
    }
}

/// Latency statistics over successful trials only.
pub fn latency_stats(trials: &[TrialOutcome]) -> LatencyStats {
    let mut stats = LatencyStats::default();
    let mut total = Duration::ZERO;

    for t in trials.iter().filter(|t| t.stage == StageKind::Latency) {
        stats.trials += 1;
        if !t.success {
            continue;
        }
        stats.successes += 1;
        total += t.elapsed;
        if stats.successes == 1 || t.elapsed < stats.min {
            stats.min = t.elapsed;
        }
        if t.elapsed > stats.max {
            stats.max = t.elapsed;
        }
    }

    if stats.successes > 0 {
        stats.avg = total / stats.successes;
    }
    stats.success_rate = rate(stats.successes, stats.trials);
    stats
}

fn rate(successes: u32, trials: u32) -> f64 {
    if trials == 0 {
        0.0
    } else {
        f64::from(successes) / f64::from(trials)
    }
}

/// Stage gates derived from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_latency: Duration,
    pub min_stability: Option<f64>,
    pub min_speed_kbs: f64,
    pub min_transfer_bytes: u64,
}

impl Thresholds {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_latency: config.max_latency,
            min_stability: config.min_stability,
            min_speed_kbs: config.min_speed_kbs,
            min_transfer_bytes: config.min_transfer_bytes,
        }
    }

    /// At least one handshake, average within bound, and stable enough when
    /// evaluation mode is on.
    pub fn latency_ok(&self, record: &QualificationRecord) -> bool {
        record.has_latency()
            && record.latency.avg <= self.max_latency
            && self
                .min_stability
                .map_or(true, |min| record.latency.success_rate >= min)
    }

    /// The byte floor is strict, matching the point where the aggregator
    /// starts reporting a speed at all.
    pub fn throughput_ok(&self, record: &QualificationRecord) -> bool {
        record.throughput.avg_kbs >= self.min_speed_kbs
            && record.throughput.total_bytes > self.min_transfer_bytes
    }
}
