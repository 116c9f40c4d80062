// runner.rs
use anyhow::{Context, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use edgescout_common::RunConfig;
use edgescout_orchestrator::Scheduler;
use edgescout_prober::HttpProbe;
use edgescout_storage::{CsvSink, RunMetadata, SqliteSink};
use edgescout_target_resolver::{
    AddressRange, BuiltinList, CandidatePool, Family, RangeResolver, SelectionMode, SharedRng,
};

use crate::args::{Builtin, ProbeArgs, RangesArgs, TargetArgs};
use crate::output::{print_addresses, print_results};

/// Expand the target flags into address ranges.
pub fn load_ranges(source: &TargetArgs) -> Result<Vec<AddressRange>> {
    if let Some(path) = &source.targets_file {
        return RangeResolver::from_file(path)
            .with_context(|| format!("failed to load targets from {}", path.display()));
    }
    if let Some(targets) = &source.targets {
        return Ok(RangeResolver::resolve(targets)?);
    }

    let list = match source.builtin {
        Builtin::Default => BuiltinList::Default,
        Builtin::Fast => BuiltinList::Fast,
    };
    let family = if source.ipv4_only {
        Some(Family::V4)
    } else if source.ipv6_only {
        Some(Family::V6)
    } else {
        None
    };
    let ranges = RangeResolver::builtin(list, family);
    if ranges.is_empty() {
        anyhow::bail!("the built-in list has no ranges for the requested family");
    }
    Ok(ranges)
}

fn build_pool(ranges: Vec<AddressRange>, random: bool, seed: Option<u64>) -> CandidatePool {
    let mode = if random {
        SelectionMode::Random
    } else {
        SelectionMode::Sequential
    };
    let rng = match seed {
        Some(s) => SharedRng::seeded(s),
        None => SharedRng::from_entropy(),
    };
    CandidatePool::new(ranges, mode, Arc::new(rng))
}

pub async fn run_probe(args: ProbeArgs) -> Result<()> {
    let mut config: RunConfig = args.base_config()?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    if let Some(addr) = args.metrics_addr {
        edgescout_telemetry::install_prometheus(addr)?;
    }

    let ranges = load_ranges(&args.source)?;
    let mut pool = build_pool(ranges, args.random, args.seed);
    if let Some(port) = args.port {
        pool = pool.with_port(port);
    }

    info!("Starting probe...");
    info!("Ranges: {} ({:?} selection)", pool.source_count(), pool.mode());
    info!("Addresses available: {}", pool.remaining());
    if config.test_all {
        info!("Target: every drawn candidate (budget {})", config.candidate_budget);
    } else {
        info!("Target: {} result(s)", config.result_count);
    }
    if config.throughput_enabled {
        info!("Throughput URL: {}", config.throughput_url);
    } else {
        info!("Throughput stage disabled, ranking on latency only");
    }

    let probe = HttpProbe::new().with_default_port(config.default_port);
    let mut scheduler = Scheduler::new(config, Arc::new(probe));

    if let Some(path) = &args.csv_out {
        scheduler.add_sink(Arc::new(CsvSink::new(path)));
    }
    if let Some(url) = &args.db {
        let meta = RunMetadata {
            label: args.label.clone(),
            asn: args.asn,
            city: args.city.clone(),
        };
        scheduler.add_sink(Arc::new(SqliteSink::connect(url, meta).await?));
    }

    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight trials");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let summary = scheduler.run(pool).await?;
    print_results(&summary, args.output_format, args.print_limit)?;
    Ok(())
}

pub fn run_ranges(args: RangesArgs) -> Result<()> {
    let ranges = load_ranges(&args.source)?;
    let mut pool = build_pool(ranges, args.random, args.seed);
    let addresses = pool.request_batch(args.count);
    print_addresses(&addresses);
    Ok(())
}
