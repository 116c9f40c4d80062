//! SQLite sink - one row per candidate per run

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use edgescout_common::{QualificationRecord, ReportSink};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS qualification_results (
    run_id                  TEXT    NOT NULL,
    address                 TEXT    NOT NULL,
    label                   TEXT,
    asn                     INTEGER,
    city                    TEXT,
    latency_avg_ms          REAL    NOT NULL,
    latency_min_ms          REAL    NOT NULL,
    latency_max_ms          REAL    NOT NULL,
    latency_trials          INTEGER NOT NULL,
    latency_successes       INTEGER NOT NULL,
    latency_success_rate    REAL    NOT NULL,
    throughput_kbs          REAL    NOT NULL,
    throughput_bytes        INTEGER NOT NULL,
    throughput_trials       INTEGER NOT NULL,
    throughput_successes    INTEGER NOT NULL,
    throughput_success_rate REAL    NOT NULL,
    rank                    INTEGER,
    updated_at              TEXT    NOT NULL,
    PRIMARY KEY (run_id, address)
)
"#;

const UPSERT: &str = r#"
INSERT INTO qualification_results (
    run_id, address, label, asn, city,
    latency_avg_ms, latency_min_ms, latency_max_ms, latency_trials, latency_successes, latency_success_rate,
    throughput_kbs, throughput_bytes, throughput_trials, throughput_successes, throughput_success_rate,
    rank, updated_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(run_id, address) DO UPDATE SET
    latency_avg_ms = excluded.latency_avg_ms,
    latency_min_ms = excluded.latency_min_ms,
    latency_max_ms = excluded.latency_max_ms,
    latency_trials = excluded.latency_trials,
    latency_successes = excluded.latency_successes,
    latency_success_rate = excluded.latency_success_rate,
    throughput_kbs = excluded.throughput_kbs,
    throughput_bytes = excluded.throughput_bytes,
    throughput_trials = excluded.throughput_trials,
    throughput_successes = excluded.throughput_successes,
    throughput_success_rate = excluded.throughput_success_rate,
    rank = COALESCE(excluded.rank, qualification_results.rank),
    updated_at = excluded.updated_at
"#;

/// Run-level metadata attached to every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetadata {
    pub label: Option<String>,
    pub asn: Option<u32>,
    pub city: Option<String>,
}

pub struct SqliteSink {
    pool: SqlitePool,
    run_id: Uuid,
    meta: RunMetadata,
}

impl SqliteSink {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://results.db`.
    pub async fn connect(url: &str, meta: RunMetadata) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {}", url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open {}", url))?;
        Self::with_pool(pool, meta).await
    }

    pub async fn with_pool(pool: SqlitePool, meta: RunMetadata) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await.context("failed to create schema")?;
        let run_id = Uuid::new_v4();
        info!("SQLite sink ready, run id {}", run_id);
        Ok(Self { pool, run_id, meta })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn upsert<'q>(
        &'q self,
        record: &QualificationRecord,
        rank: Option<i64>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let ms = |d: std::time::Duration| d.as_secs_f64() * 1000.0;
        sqlx::query(UPSERT)
            .bind(self.run_id.to_string())
            .bind(record.candidate.to_string())
            .bind(self.meta.label.clone())
            .bind(self.meta.asn.map(i64::from))
            .bind(self.meta.city.clone())
            .bind(ms(record.latency.avg))
            .bind(ms(record.latency.min))
            .bind(ms(record.latency.max))
            .bind(i64::from(record.latency.trials))
            .bind(i64::from(record.latency.successes))
            .bind(record.latency.success_rate)
            .bind(record.throughput.avg_kbs)
            .bind(i64::try_from(record.throughput.total_bytes).unwrap_or(i64::MAX))
            .bind(i64::from(record.throughput.trials))
            .bind(i64::from(record.throughput.successes))
            .bind(record.throughput.success_rate)
            .bind(rank)
            .bind(record.updated_at.to_rfc3339())
    }
}

#[async_trait]
impl ReportSink for SqliteSink {
    async fn record_qualified(&self, record: &QualificationRecord) -> Result<()> {
        self.upsert(record, None).execute(&self.pool).await?;
        Ok(())
    }

    async fn finalize(&self, ranked: &[QualificationRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (i, record) in ranked.iter().enumerate() {
            self.upsert(record, Some(i as i64 + 1)).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        debug!("Stored {} ranked row(s) for run {}", ranked.len(), self.run_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgescout_common::Candidate;
    use std::net::IpAddr;

    async fn memory_sink(meta: RunMetadata) -> SqliteSink {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteSink::with_pool(pool, meta).await.unwrap()
    }

    fn record(last: u8, kbs: f64) -> QualificationRecord {
        let mut r = QualificationRecord::new(Candidate::new(IpAddr::from([172, 64, 0, last])));
        r.latency.trials = 4;
        r.latency.successes = 4;
        r.latency.success_rate = 1.0;
        r.throughput.avg_kbs = kbs;
        r.throughput.total_bytes = 5_000_000;
        r
    }

    #[tokio::test]
    async fn one_row_per_candidate_with_ranks() {
        let sink = memory_sink(RunMetadata {
            label: Some("home".into()),
            asn: Some(13335),
            city: Some("Berlin".into()),
        })
        .await;

        sink.record_qualified(&record(1, 200.0)).await.unwrap();
        sink.record_qualified(&record(2, 800.0)).await.unwrap();
        sink.finalize(&[record(2, 800.0), record(1, 200.0)]).await.unwrap();

        let rows: Vec<(String, Option<i64>, String, Option<i64>)> = sqlx::query_as(
            "SELECT address, rank, label, asn FROM qualification_results WHERE run_id = ? ORDER BY rank",
        )
        .bind(sink.run_id().to_string())
        .fetch_all(sink.pool())
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "172.64.0.2");
        assert_eq!(rows[0].1, Some(1));
        assert_eq!(rows[1].0, "172.64.0.1");
        assert_eq!(rows[1].1, Some(2));
        assert_eq!(rows[0].2, "home");
        assert_eq!(rows[0].3, Some(13335));
    }

    #[tokio::test]
    async fn runs_do_not_collide() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let a = SqliteSink::with_pool(pool.clone(), RunMetadata::default()).await.unwrap();
        let b = SqliteSink::with_pool(pool.clone(), RunMetadata::default()).await.unwrap();
        assert_ne!(a.run_id(), b.run_id());

        a.finalize(&[record(1, 10.0)]).await.unwrap();
        b.finalize(&[record(1, 20.0)]).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qualification_results")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
