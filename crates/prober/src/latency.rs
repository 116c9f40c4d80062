//! Latency trial - one TCP connect bounded by a timeout

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use edgescout_common::TrialOutcome;

/// Connect once to `addr`; the handshake time is the trial latency.
///
/// Refused, unreachable and timed-out connects all map to a failed outcome.
pub async fn connect_trial(addr: SocketAddr, limit: Duration) -> TrialOutcome {
    let start = Instant::now();
    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let rtt = start.elapsed();
            drop(stream);
            TrialOutcome::latency(true, rtt)
        }
        Ok(Err(e)) => {
            match e.kind() {
                ErrorKind::ConnectionRefused => trace!(%addr, "connection refused"),
                kind => trace!(%addr, ?kind, "connect failed"),
            }
            TrialOutcome::latency(false, start.elapsed())
        }
        Err(_) => {
            trace!(%addr, "connect timeout");
            TrialOutcome::latency(false, limit)
        }
    }
}
