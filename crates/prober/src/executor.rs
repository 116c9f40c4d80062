// crates/prober/src/executor.rs
//! HTTP probe executor

use async_trait::async_trait;
use std::time::Duration;

use edgescout_common::{Candidate, ProbeExecutor, TrialOutcome};

use crate::latency::connect_trial;
use crate::throughput::download_trial;

/// TCP connect latency + HTTP download throughput.
pub struct HttpProbe {
    default_port: u16,
    user_agent: String,
}

impl HttpProbe {
    /// Create a new probe with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Port dialled for candidates without one.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self {
            default_port: 443,
            user_agent: format!("edgescout/{}", edgescout_common::VERSION),
        }
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    async fn latency_trial(&self, candidate: &Candidate, timeout: Duration) -> TrialOutcome {
        connect_trial(candidate.socket_addr(self.default_port), timeout).await
    }

    async fn throughput_trial(
        &self,
        candidate: &Candidate,
        url: &str,
        timeout: Duration,
        max_duration: Duration,
    ) -> TrialOutcome {
        download_trial(
            candidate.socket_addr(self.default_port),
            url,
            &self.user_agent,
            timeout,
            max_duration,
        )
        .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    #[test]
    fn test_builder() {
        let probe = HttpProbe::new().with_default_port(8443).with_user_agent("ua");
        assert_eq!(probe.default_port, 8443);
        assert_eq!(probe.user_agent, "ua");
        assert_eq!(probe.name(), "http");
    }

    #[tokio::test]
    async fn test_latency_uses_default_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let probe = HttpProbe::new().with_default_port(port);
        let candidate = Candidate::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let outcome = probe.latency_trial(&candidate, Duration::from_secs(2)).await;
        assert!(outcome.success);
    }
}
