//! Throughput trial - bounded HTTP download pinned to one candidate address

use reqwest::{Client, Url};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument};

use edgescout_common::TrialOutcome;

/// Download from `url` with its host resolved to `addr`.
///
/// `limit` bounds the request and each body read; `max_duration` bounds the
/// whole transfer phase. Hitting `max_duration` ends the trial normally.
#[instrument(skip(url, user_agent))]
pub async fn download_trial(
    addr: SocketAddr,
    url: &str,
    user_agent: &str,
    limit: Duration,
    max_duration: Duration,
) -> TrialOutcome {
    let start = Instant::now();

    let client = match build_client(addr, url, user_agent, limit) {
        Ok(c) => c,
        Err(e) => {
            debug!("Client setup failed: {}", e);
            return TrialOutcome::throughput_not_started(start.elapsed());
        }
    };

    let mut response = match timeout(limit, client.get(url).send()).await {
        Ok(Ok(r)) if r.status().is_success() => r,
        Ok(Ok(r)) => {
            debug!("Unexpected status {}", r.status());
            return TrialOutcome::throughput_not_started(start.elapsed());
        }
        Ok(Err(e)) => {
            debug!("Request failed: {}", e);
            return TrialOutcome::throughput_not_started(start.elapsed());
        }
        Err(_) => {
            debug!("Request timeout");
            return TrialOutcome::throughput_not_started(start.elapsed());
        }
    };

    let transfer_start = Instant::now();
    let deadline = transfer_start + max_duration;
    let mut bytes = 0u64;
    let mut broken = false;

    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        match timeout(left.min(limit), response.chunk()).await {
            Ok(Ok(Some(chunk))) => bytes += chunk.len() as u64,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                debug!("Transfer broke after {} bytes: {}", bytes, e);
                broken = true;
                break;
            }
            Err(_) => {
                // stalled read, unless the transfer window just closed
                broken = Instant::now() < deadline;
                break;
            }
        }
    }

    let elapsed = transfer_start.elapsed();
    TrialOutcome::throughput(!broken && bytes > 0, bytes, elapsed)
}

fn build_client(addr: SocketAddr, url: &str, user_agent: &str, limit: Duration) -> anyhow::Result<Client> {
    let parsed = Url::parse(url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("url has no host: {}", url))?;

    let client = Client::builder()
        .resolve(host, addr)
        .connect_timeout(limit)
        .user_agent(user_agent)
        .no_proxy()
        .build()?;
    Ok(client)
}
