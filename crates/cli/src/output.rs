//! Output formatting for ranked results

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use edgescout_common::{Candidate, QualificationRecord};
use edgescout_orchestrator::RunSummary;

use crate::args::OutputFormat;

/// Print the ranked records of a run, at most `limit` of them (0 means all).
pub fn print_results(summary: &RunSummary, format: OutputFormat, limit: usize) -> Result<()> {
    let shown = if limit == 0 || limit > summary.records.len() {
        &summary.records[..]
    } else {
        &summary.records[..limit]
    };

    match format {
        OutputFormat::Json => println!("{}", render_json(summary, shown)?),
        OutputFormat::Csv => print_csv(shown)?,
        OutputFormat::Table => print_table(summary, shown),
    }
    Ok(())
}

/// Print results as ASCII table (best first)
fn print_table(summary: &RunSummary, shown: &[QualificationRecord]) {
    if shown.is_empty() {
        println!("\nNo candidate qualified.\n");
    } else {
        println!("\n{:-<84}", "");
        println!(
            "{:<4} {:<40} {:>10} {:>10} {:>8} {:>8}",
            "#", "ADDRESS", "SPEED", "LATENCY", "LOSS", "TRIALS"
        );
        println!("{:-<84}", "");

        for (i, r) in shown.iter().enumerate() {
            println!(
                "{:<4} {:<40} {:>10} {:>10} {:>7.0}% {:>8}",
                i + 1,
                r.candidate.to_string(),
                format_speed(r.throughput.avg_kbs),
                format!("{:.1}ms", r.latency.avg.as_secs_f64() * 1000.0),
                (1.0 - r.latency.success_rate) * 100.0,
                format!("{}/{}", r.latency.successes, r.latency.trials),
            );
        }
        println!("{:-<84}", "");
    }

    let s = &summary.stats;
    println!("\nSummary:");
    println!("  Candidates drawn: {}", s.drawn);
    println!("  Qualified: {} (target {})", s.qualified, summary.target);
    println!("  Failed latency: {}", s.latency_failed);
    println!("  Failed throughput: {}", s.throughput_failed);
    if summary.cancelled {
        println!("  Interrupted: partial results");
    }
    println!("  Duration: {}", format_duration(summary.elapsed));
    println!();
}

fn render_json(summary: &RunSummary, shown: &[QualificationRecord]) -> Result<String> {
    let output = json!({
        "run_info": {
            "duration_seconds": summary.elapsed.as_secs_f64(),
            "duration_formatted": format_duration(summary.elapsed),
            "target": summary.target,
            "cancelled": summary.cancelled,
            "stats": summary.stats,
        },
        "results": shown,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

fn print_csv(shown: &[QualificationRecord]) -> Result<()> {
    edgescout_storage::write_records(std::io::stdout().lock(), shown)
}

pub fn print_addresses(addresses: &[Candidate]) {
    for c in addresses {
        println!("{}", c);
    }
}

fn format_speed(kbs: f64) -> String {
    if kbs <= 0.0 {
        "-".to_string()
    } else if kbs >= 1000.0 {
        format!("{:.2}MB/s", kbs / 1000.0)
    } else {
        format!("{:.0}kB/s", kbs)
    }
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgescout_common::RunStats;
    use std::net::{IpAddr, Ipv4Addr};

    fn summary() -> RunSummary {
        let mut r = QualificationRecord::new(Candidate::new(IpAddr::V4(Ipv4Addr::new(104, 16, 0, 1))));
        r.latency.trials = 4;
        r.latency.successes = 4;
        r.latency.success_rate = 1.0;
        r.latency.avg = Duration::from_millis(12);
        r.throughput.avg_kbs = 2500.0;
        RunSummary {
            records: vec![r.clone(), r],
            stats: RunStats::default(),
            target: 10,
            elapsed: Duration::from_secs(5),
            cancelled: false,
        }
    }

    #[test]
    fn test_render_json() {
        let s = summary();
        let out = render_json(&s, &s.records[..1]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["results"].as_array().unwrap().len(), 1);
        assert_eq!(v["run_info"]["target"], 10);
        assert_eq!(v["run_info"]["duration_formatted"], "5s");
    }

    #[test]
    fn test_print_results_all_formats() {
        let s = summary();
        assert!(print_results(&s, OutputFormat::Table, 1).is_ok());
        assert!(print_results(&s, OutputFormat::Csv, 0).is_ok());
        assert!(print_results(&s, OutputFormat::Json, 5).is_ok());
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(0.0), "-");
        assert_eq!(format_speed(512.4), "512kB/s");
        assert_eq!(format_speed(2500.0), "2.50MB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(5500)), "5.500s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
    }
}
