//! Telemetry - logging setup and run metrics
//!
//! Metrics go through the `metrics` facade and are no-ops until an exporter
//! is installed with [`install_prometheus`].

use anyhow::{Context, Result};
use edgescout_common::{RunStats, StageKind};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub const LATENCY_TRIALS_TOTAL: &str = "edgescout_latency_trials_total";
pub const THROUGHPUT_TRIALS_TOTAL: &str = "edgescout_throughput_trials_total";
pub const QUALIFIED_TOTAL: &str = "edgescout_qualified_total";
pub const DISCARDED_TOTAL: &str = "edgescout_discarded_total";
pub const IN_FLIGHT: &str = "edgescout_in_flight";
pub const BACKLOG: &str = "edgescout_backlog";

/// Initialise the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: u8, json: bool) -> Result<()> {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let res = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).compact().try_init()
    };
    res.map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
}

/// Serve Prometheus metrics on `addr`. Needs a running tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to start metrics exporter on {}", addr))?;
    describe();
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

fn describe() {
    describe_counter!(LATENCY_TRIALS_TOTAL, "Handshake trials executed");
    describe_counter!(THROUGHPUT_TRIALS_TOTAL, "Transfer trials executed");
    describe_counter!(QUALIFIED_TOTAL, "Candidates that passed every enabled stage");
    describe_counter!(DISCARDED_TOTAL, "Candidates dropped, by failing stage");
    describe_gauge!(IN_FLIGHT, "Candidates currently held by workers");
    describe_gauge!(BACKLOG, "Latency-passed candidates waiting for a throughput worker");
}

/// Counter name for the trials of one stage.
pub fn trials_metric(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Latency => LATENCY_TRIALS_TOTAL,
        StageKind::Throughput => THROUGHPUT_TRIALS_TOTAL,
    }
}

pub fn record_trials(stage: StageKind, count: usize) {
    counter!(trials_metric(stage)).increment(count as u64);
}

pub fn record_discarded(stage: StageKind) {
    counter!(DISCARDED_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_qualified() {
    counter!(QUALIFIED_TOTAL).increment(1);
}

pub fn record_stats(stats: &RunStats) {
    gauge!(IN_FLIGHT).set(stats.in_flight() as f64);
    gauge!(BACKLOG).set(stats.throughput_backlog as f64);
}
