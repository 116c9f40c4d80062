//! Admission control between the cheap and the expensive stage

use std::time::Duration;

use edgescout_common::RunConfig;

/// Weight of the newest sample in the moving estimates.
const EWMA_ALPHA: f64 = 0.2;

/// Exponentially weighted estimate of one stage's per-candidate wall time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageEstimate {
    secs: f64,
}

impl StageEstimate {
    pub fn new(prior: Duration) -> Self {
        Self {
            secs: prior.as_secs_f64(),
        }
    }

    pub fn observe(&mut self, sample: Duration) {
        self.secs += EWMA_ALPHA * (sample.as_secs_f64() - self.secs);
    }

    pub fn get(&self) -> Duration {
        Duration::from_secs_f64(self.secs.max(0.0))
    }
}

/// True when producing one more latency result is cheap compared to the
/// throughput work already waiting, i.e. the latency stage should hold back.
pub fn should_throttle_latency(
    est_latency: Duration,
    pending_throughput: usize,
    throughput_workers: usize,
    est_throughput: Duration,
    control_factor: f64,
) -> bool {
    if pending_throughput == 0 || throughput_workers == 0 {
        return false;
    }
    let rounds = pending_throughput.div_ceil(throughput_workers) as f64;
    est_latency.as_secs_f64() < rounds * est_throughput.as_secs_f64() * control_factor
}

/// Tracks stage estimates and applies the latency throttle.
#[derive(Debug, Clone)]
pub struct AdmissionControl {
    latency: StageEstimate,
    throughput: StageEstimate,
    throughput_workers: usize,
    control_factor: f64,
}

impl AdmissionControl {
    /// Priors: every latency trial times out, every transfer runs full length.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            latency: StageEstimate::new(config.timeout * config.latency_trials),
            throughput: StageEstimate::new(config.throughput_max_duration * config.throughput_trials),
            throughput_workers: config.throughput_workers,
            control_factor: config.control_factor,
        }
    }

    pub fn observe_latency(&mut self, wall: Duration) {
        self.latency.observe(wall);
    }

    pub fn observe_throughput(&mut self, wall: Duration) {
        self.throughput.observe(wall);
    }

    pub fn latency_estimate(&self) -> Duration {
        self.latency.get()
    }

    pub fn throughput_estimate(&self) -> Duration {
        self.throughput.get()
    }

    pub fn latency_throttled(&self, pending_throughput: usize) -> bool {
        should_throttle_latency(
            self.latency.get(),
            pending_throughput,
            self.throughput_workers,
            self.throughput.get(),
            self.control_factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn throttles_behind_slow_backlog() {
        assert!(should_throttle_latency(ms(100), 3, 1, ms(10_000), 2.0));
    }

    #[test]
    fn no_backlog_no_throttle() {
        assert!(!should_throttle_latency(ms(100), 0, 1, ms(10_000), 2.0));
        assert!(!should_throttle_latency(ms(100), 3, 0, ms(10_000), 2.0));
    }

    #[test]
    fn slow_latency_stage_is_not_throttled() {
        // 30s per latency candidate vs ceil(2/4) * 5s * 2 = 10s
        assert!(!should_throttle_latency(ms(30_000), 2, 4, ms(5_000), 2.0));
    }

    #[test]
    fn estimate_moves_toward_samples() {
        let mut e = StageEstimate::new(ms(1000));
        e.observe(ms(0));
        assert!((799..=800).contains(&e.get().as_millis()));
        for _ in 0..100 {
            e.observe(ms(100));
        }
        let got = e.get().as_millis();
        assert!((99..=101).contains(&got));
    }

    #[test]
    fn priors_from_config() {
        let cfg = RunConfig {
            timeout: ms(500),
            latency_trials: 4,
            throughput_max_duration: Duration::from_secs(10),
            throughput_trials: 1,
            ..Default::default()
        };
        let ac = AdmissionControl::from_config(&cfg);
        assert_eq!(ac.latency_estimate(), ms(2000));
        assert_eq!(ac.throughput_estimate(), Duration::from_secs(10));
        assert!(ac.latency_throttled(1));
        assert!(!ac.latency_throttled(0));
    }
}
