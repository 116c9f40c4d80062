//! Error types for edgescout
//!
//! Trial failures are never errors; they are folded into `TrialOutcome`.
//! These variants cover target parsing and configuration. Sinks and the
//! throughput client report through `anyhow` at their trait seams.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeScoutError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address range: {0}")]
    InvalidRange(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for edgescout operations
pub type EdgeScoutResult<T> = Result<T, EdgeScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let io = EdgeScoutError::from(io::Error::new(io::ErrorKind::NotFound, "ranges.txt"));
        assert_eq!(io.to_string(), "I/O error: ranges.txt");
        assert_eq!(
            EdgeScoutError::InvalidRange("10.0.0.9-10.0.0.1".into()).to_string(),
            "Invalid address range: 10.0.0.9-10.0.0.1"
        );
        assert_eq!(EdgeScoutError::InvalidTarget("x".into()).to_string(), "Invalid target: x");
        assert_eq!(
            EdgeScoutError::Config("timeout must be positive".into()).to_string(),
            "Configuration error: timeout must be positive"
        );
    }
}
