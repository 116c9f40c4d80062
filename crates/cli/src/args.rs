use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use edgescout_common::RunConfig;

#[derive(Parser)]
#[command(name = "edgescout")]
#[command(version)]
#[command(about = "Find the fastest anycast edge addresses from where you are", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe candidate addresses and rank the ones that qualify
    Probe(ProbeArgs),
    /// Print the addresses a target list expands to, without probing
    Ranges(RangesArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Fast,
    Balanced,
    Thorough,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Builtin {
    Default,
    Fast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Where candidates come from. Explicit targets win over the built-in lists.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Targets: CIDR, single address or start-end span, comma separated.
    /// Example: 104.16.0.0/24,1.1.1.1-1.1.1.20
    #[arg(short = 't', long)]
    pub targets: Option<String>,

    /// File with one target per line (# starts a comment)
    #[arg(short = 'f', long)]
    pub targets_file: Option<PathBuf>,

    /// Built-in list used when no targets are given
    #[arg(long, value_enum, default_value = "default")]
    pub builtin: Builtin,

    /// Only IPv4 ranges from the built-in list
    #[arg(long, conflicts_with = "ipv6_only")]
    pub ipv4_only: bool,

    /// Only IPv6 ranges from the built-in list
    #[arg(long)]
    pub ipv6_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: TargetArgs,

    /// Preset: fast, balanced, thorough
    #[arg(long, value_enum, default_value = "balanced")]
    pub preset: Preset,

    /// JSON config file; explicit flags override it
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Sample addresses randomly instead of walking ranges in order
    #[arg(long)]
    pub random: bool,

    /// Seed for random sampling (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Port to probe
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Stop after this many qualified candidates
    #[arg(short = 'n', long)]
    pub result_count: Option<usize>,

    /// Probe every drawn candidate instead of stopping at the result count
    #[arg(long)]
    pub test_all: bool,

    /// Concurrent latency workers
    #[arg(long)]
    pub latency_workers: Option<usize>,

    /// Concurrent throughput workers
    #[arg(long)]
    pub throughput_workers: Option<usize>,

    /// Per-trial timeout in milliseconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Handshake trials per candidate
    #[arg(long)]
    pub latency_trials: Option<u32>,

    /// Transfer trials per candidate
    #[arg(long)]
    pub throughput_trials: Option<u32>,

    /// Maximum average handshake latency in milliseconds
    #[arg(long)]
    pub max_latency: Option<u64>,

    /// Minimum handshake success rate in [0, 1]; enables evaluation mode
    #[arg(long)]
    pub min_stability: Option<f64>,

    /// Minimum average throughput in kB/s
    #[arg(long)]
    pub min_speed: Option<f64>,

    /// Bytes a transfer must move before its speed counts
    #[arg(long)]
    pub min_transfer_bytes: Option<u64>,

    /// Skip the throughput stage and rank on latency alone
    #[arg(long)]
    pub no_throughput: bool,

    /// Download URL for throughput trials
    #[arg(long)]
    pub url: Option<String>,

    /// Longest a single transfer may run, in seconds
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// How far ahead the latency stage may run of the throughput backlog
    #[arg(long)]
    pub control_factor: Option<f64>,

    /// Maximum candidates drawn from the pool
    #[arg(long)]
    pub budget: Option<usize>,

    /// Output format: table, json, csv
    #[arg(short, long, value_enum, default_value = "table")]
    pub output_format: OutputFormat,

    /// Print at most this many ranked records (0 prints all)
    #[arg(long, default_value = "10")]
    pub print_limit: usize,

    /// Write ranked results to this CSV file
    #[arg(long)]
    pub csv_out: Option<PathBuf>,

    /// Store results in this SQLite database, e.g. sqlite://edgescout.db
    #[arg(long)]
    pub db: Option<String>,

    /// Run label stored with database rows
    #[arg(long)]
    pub label: Option<String>,

    /// Vantage-point ASN stored with database rows
    #[arg(long)]
    pub asn: Option<u32>,

    /// Vantage-point city stored with database rows
    #[arg(long)]
    pub city: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct RangesArgs {
    #[command(flatten)]
    pub source: TargetArgs,

    /// Addresses to print
    #[arg(short = 'n', long, default_value = "16")]
    pub count: usize,

    /// Sample addresses randomly
    #[arg(long)]
    pub random: bool,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl ProbeArgs {
    /// Preset or config file first, then every flag that was given.
    pub fn base_config(&self) -> anyhow::Result<RunConfig> {
        if let Some(path) = &self.config {
            return Ok(RunConfig::from_json_file(path)?);
        }
        Ok(match self.preset {
            Preset::Fast => RunConfig::fast(),
            Preset::Balanced => RunConfig::default(),
            Preset::Thorough => RunConfig::thorough(),
        })
    }

    pub fn apply(&self, cfg: &mut RunConfig) {
        if let Some(v) = self.port {
            cfg.default_port = v;
        }
        if let Some(v) = self.result_count {
            cfg.result_count = v;
        }
        if self.test_all {
            cfg.test_all = true;
        }
        if let Some(v) = self.latency_workers {
            cfg.latency_workers = v;
        }
        if let Some(v) = self.throughput_workers {
            cfg.throughput_workers = v;
        }
        if let Some(v) = self.timeout {
            cfg.timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.latency_trials {
            cfg.latency_trials = v;
        }
        if let Some(v) = self.throughput_trials {
            cfg.throughput_trials = v;
        }
        if let Some(v) = self.max_latency {
            cfg.max_latency = Duration::from_millis(v);
        }
        if self.min_stability.is_some() {
            cfg.min_stability = self.min_stability;
        }
        if let Some(v) = self.min_speed {
            cfg.min_speed_kbs = v;
        }
        if let Some(v) = self.min_transfer_bytes {
            cfg.min_transfer_bytes = v;
        }
        if self.no_throughput {
            cfg.throughput_enabled = false;
        }
        if let Some(v) = &self.url {
            cfg.throughput_url = v.clone();
        }
        if let Some(v) = self.max_duration {
            cfg.throughput_max_duration = Duration::from_secs(v);
        }
        if let Some(v) = self.control_factor {
            cfg.control_factor = v;
        }
        if let Some(v) = self.budget {
            cfg.candidate_budget = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(args: &[&str]) -> ProbeArgs {
        let mut argv = vec!["edgescout", "probe"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Probe(p) => p,
            Commands::Ranges(_) => panic!("expected probe"),
        }
    }

    #[test]
    fn flags_override_preset() {
        let p = probe(&["--preset", "fast", "-n", "3", "--timeout", "250", "--min-stability", "0.8", "--no-throughput"]);
        let mut cfg = p.base_config().unwrap();
        assert_eq!(cfg.latency_trials, 2);
        p.apply(&mut cfg);
        assert_eq!(cfg.result_count, 3);
        assert_eq!(cfg.timeout, Duration::from_millis(250));
        assert_eq!(cfg.min_stability, Some(0.8));
        assert!(!cfg.throughput_enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_leave_config_untouched() {
        let p = probe(&[]);
        let mut cfg = p.base_config().unwrap();
        p.apply(&mut cfg);
        assert_eq!(cfg, RunConfig::default());
        assert_eq!(p.output_format, OutputFormat::Table);
        assert_eq!(p.source.builtin, Builtin::Default);
    }

    #[test]
    fn family_filters_conflict() {
        assert!(Cli::try_parse_from(["edgescout", "probe", "--ipv4-only", "--ipv6-only"]).is_err());
    }

    #[test]
    fn ranges_subcommand_parses() {
        let cli = Cli::try_parse_from(["edgescout", "ranges", "-t", "1.1.1.0/30", "-n", "4", "--random"]).unwrap();
        match cli.command {
            Commands::Ranges(r) => {
                assert_eq!(r.count, 4);
                assert!(r.random);
                assert_eq!(r.source.targets.as_deref(), Some("1.1.1.0/30"));
            }
            Commands::Probe(_) => panic!("expected ranges"),
        }
    }
}
