//! Core data types for the edgescout prober
//!
//! - `Candidate` is the immutable unit of work flowing through both stages
//! - `TrialOutcome` is produced per attempt and consumed by the aggregator
//! - `QualificationRecord` is the reduced, per-candidate view that ends up ranked
//!
//! Public fields are kept for direct access from the scheduler hot loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// One concrete address under test, optionally pinned to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Candidate {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

impl Candidate {
    #[inline]
    #[must_use]
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, port: None }
    }

    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Socket address to dial, falling back to `default_port` when unpinned.
    #[inline]
    #[must_use]
    pub fn socket_addr(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.ip, self.port.unwrap_or(default_port))
    }
}

impl From<IpAddr> for Candidate {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}", SocketAddr::new(self.ip, port)),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// Which probe stage produced a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Latency,
    Throughput,
}

impl StageKind {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StageKind::Latency => "latency",
            StageKind::Throughput => "throughput",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub stage: StageKind,
    pub success: bool,
    /// Handshake time for latency trials, transfer time for throughput trials.
    pub elapsed: Duration,
    /// Bytes received; always zero for latency trials.
    pub bytes: u64,
    /// False when the connection was made but the transfer phase never started.
    pub reached_transfer: bool,
}

impl TrialOutcome {
    #[inline]
    #[must_use]
    pub fn latency(success: bool, elapsed: Duration) -> Self {
        Self {
            stage: StageKind::Latency,
            success,
            elapsed,
            bytes: 0,
            reached_transfer: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn throughput(success: bool, bytes: u64, elapsed: Duration) -> Self {
        Self {
            stage: StageKind::Throughput,
            success,
            elapsed,
            bytes,
            reached_transfer: true,
        }
    }

    /// Throughput attempt that connected but never got to read a body.
    #[inline]
    #[must_use]
    pub fn throughput_not_started(elapsed: Duration) -> Self {
        Self {
            stage: StageKind::Throughput,
            success: false,
            elapsed,
            bytes: 0,
            reached_transfer: false,
        }
    }
}

/// Latency-stage statistics over successful trials only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub trials: u32,
    pub successes: u32,
    pub success_rate: f64,
    pub avg: Duration,
    pub min: Duration,
    pub max: Duration,
}

/// Throughput-stage statistics.
///
/// `avg_kbs` stays at zero unless the accumulated successful bytes cleared
/// the minimum transfer floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub trials: u32,
    pub successes: u32,
    pub success_rate: f64,
    /// Kilobytes (10^3 bytes) per second.
    pub avg_kbs: f64,
    pub total_bytes: u64,
    pub total_duration: Duration,
}

/// Per-candidate qualification view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationRecord {
    pub candidate: Candidate,
    pub updated_at: DateTime<Utc>,
    pub latency: LatencyStats,
    pub throughput: ThroughputStats,
}

impl QualificationRecord {
    #[inline]
    #[must_use]
    pub fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            updated_at: DateTime::<Utc>::default(),
            latency: LatencyStats::default(),
            throughput: ThroughputStats::default(),
        }
    }

    /// A record without a single successful handshake never qualifies.
    #[inline]
    #[must_use]
    pub const fn has_latency(&self) -> bool {
        self.latency.successes > 0
    }

    /// Fold the throughput stage into a cached latency record.
    pub fn merge_throughput(&mut self, stats: ThroughputStats) {
        self.throughput = stats;
    }

    #[inline]
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Counters snapshot for a run, emitted periodically and at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Candidates drawn from the pool so far.
    pub drawn: usize,
    /// Drawn but not yet handed to a latency worker.
    pub queued: usize,
    pub latency_in_flight: usize,
    pub throughput_backlog: usize,
    pub throughput_in_flight: usize,
    pub latency_passed: usize,
    pub latency_failed: usize,
    pub throughput_failed: usize,
    /// Candidates that reached a terminal state.
    pub done: usize,
    pub qualified: usize,
}

impl RunStats {
    #[inline]
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.latency_in_flight + self.throughput_in_flight
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "drawn={} queued={} in_flight={} backlog={} done={} qualified={}",
            self.drawn,
            self.queued,
            self.in_flight(),
            self.throughput_backlog,
            self.done,
            self.qualified
        )
    }
}
