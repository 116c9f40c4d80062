//! Progress tracking

use std::time::{Duration, Instant};
use tracing::info;

use edgescout_common::RunStats;

/// Owned by the control loop; emits a snapshot on a fixed wall-clock interval.
pub struct ProgressTracker {
    stats: RunStats,
    started: Instant,
    interval: Duration,
    last_emit: Instant,
}

impl ProgressTracker {
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            stats: RunStats::default(),
            started: now,
            interval,
            last_emit: now,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emit a snapshot when the interval has passed, whether or not anything changed.
    pub fn tick(&mut self) -> bool {
        if self.last_emit.elapsed() < self.interval {
            return false;
        }
        self.last_emit = Instant::now();
        self.emit();
        true
    }

    pub fn emit(&self) {
        info!("Progress: {} elapsed={:.1}s", self.stats, self.elapsed().as_secs_f64());
        edgescout_telemetry::record_stats(&self.stats);
    }

    pub fn print_summary(&self) {
        let s = &self.stats;
        info!("Run Summary:");
        info!("  Candidates drawn: {}", s.drawn);
        info!("  Latency passed: {}", s.latency_passed);
        info!("  Latency failed: {}", s.latency_failed);
        info!("  Throughput failed: {}", s.throughput_failed);
        info!("  Qualified: {}", s.qualified);
        if s.drawn > 0 {
            info!("  Qualification rate: {:.1}%", (s.qualified as f64 / s.drawn as f64) * 100.0);
        }
        info!("  Elapsed: {:.1}s", self.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_respects_interval() {
        let mut p = ProgressTracker::new(Duration::from_secs(3600));
        assert!(!p.tick());

        let mut p = ProgressTracker::new(Duration::ZERO);
        p.stats_mut().qualified = 2;
        assert!(p.tick());
        assert_eq!(p.stats().qualified, 2);
    }
}
