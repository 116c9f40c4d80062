//! Prober - concrete `ProbeExecutor` over TCP and HTTP(S)
//!
//! - latency trial: TCP connect time to the candidate
//! - throughput trial: bounded HTTP download with DNS pinned to the candidate

mod executor;
mod latency;
mod throughput;

pub use executor::HttpProbe;
pub use latency::connect_trial;
pub use throughput::download_trial;
