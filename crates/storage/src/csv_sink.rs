//! Delimited-text sink

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use edgescout_common::{QualificationRecord, ReportSink};

/// Column order shared by the file sink and CSV stdout rendering.
pub const CSV_HEADER: [&str; 12] = [
    "timestamp",
    "address",
    "throughput_kbs",
    "latency_avg_ms",
    "latency_trials",
    "throughput_trials",
    "latency_success_rate",
    "throughput_success_rate",
    "latency_min_ms",
    "latency_max_ms",
    "latency_successes",
    "throughput_successes",
];

fn millis(d: std::time::Duration) -> String {
    format!("{:.2}", d.as_secs_f64() * 1000.0)
}

pub fn csv_row(record: &QualificationRecord) -> [String; 12] {
    [
        record.updated_at.to_rfc3339(),
        record.candidate.to_string(),
        format!("{:.2}", record.throughput.avg_kbs),
        millis(record.latency.avg),
        record.latency.trials.to_string(),
        record.throughput.trials.to_string(),
        format!("{:.2}", record.latency.success_rate),
        format!("{:.2}", record.throughput.success_rate),
        millis(record.latency.min),
        millis(record.latency.max),
        record.latency.successes.to_string(),
        record.throughput.successes.to_string(),
    ]
}

/// Header plus one row per record.
pub fn write_records<W: Write>(out: W, records: &[QualificationRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for r in records {
        wtr.write_record(csv_row(r))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Appends each qualified record as it arrives, then replaces the file with
/// the ranked list at the end of the run.
pub struct CsvSink {
    path: PathBuf,
    stream: Mutex<Option<csv::Writer<BufWriter<File>>>>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stream: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_stream(&self) -> Result<csv::Writer<BufWriter<File>>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let mut wtr = csv::Writer::from_writer(BufWriter::new(file));
        wtr.write_record(CSV_HEADER)?;
        Ok(wtr)
    }
}

#[async_trait]
impl ReportSink for CsvSink {
    async fn record_qualified(&self, record: &QualificationRecord) -> Result<()> {
        let mut stream = self.stream.lock().await;
        if stream.is_none() {
            *stream = Some(self.open_stream()?);
        }
        if let Some(wtr) = stream.as_mut() {
            wtr.write_record(csv_row(record))?;
            wtr.flush()?;
        }
        Ok(())
    }

    async fn finalize(&self, ranked: &[QualificationRecord]) -> Result<()> {
        // close the streaming writer before the ranked copy replaces it
        if let Some(mut wtr) = self.stream.lock().await.take() {
            wtr.flush()?;
        }

        let tmp = self.path.with_extension("csv.tmp");
        let file = File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        write_records(BufWriter::new(file), ranked)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move results into {}", self.path.display()))?;

        debug!("Wrote {} ranked record(s) to {}", ranked.len(), self.path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}
