//! Range sources - token parsing and built-in lists
//!
//! Turns a comma/whitespace separated target string into `AddressRange`s.
//! Supported token forms:
//! - CIDR: "104.16.0.0/13", "2606:4700::/32"
//! - range: "1.1.1.1-1.1.1.20"
//! - single address: "1.1.1.1"
//!
//! Lines starting with `#` are comments when reading from a file.

use crate::range::{AddressRange, Family};
use edgescout_common::{EdgeScoutError, EdgeScoutResult};
use ipnet::IpNet;
use std::net::IpAddr;
use std::path::Path;
use tracing::{info, warn};

/// Cloudflare anycast blocks, IPv4.
pub const DEFAULT_V4: &[&str] = &[
    "173.245.48.0/20",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "141.101.64.0/18",
    "108.162.192.0/18",
    "190.93.240.0/20",
    "188.114.96.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "162.158.0.0/15",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "172.64.0.0/13",
    "131.0.72.0/22",
];

/// Cloudflare anycast blocks, IPv6.
pub const DEFAULT_V6: &[&str] = &[
    "2400:cb00::/32",
    "2606:4700::/32",
    "2803:f800::/32",
    "2405:b500::/32",
    "2405:8100::/32",
    "2a06:98c0::/29",
    "2c0f:f248::/32",
];

/// Small set of /24s that usually answers quickly.
pub const FAST_V4: &[&str] = &[
    "104.16.132.0/24",
    "104.17.0.0/24",
    "104.18.32.0/24",
    "104.19.96.0/24",
    "162.159.36.0/24",
    "172.64.32.0/24",
    "172.67.0.0/24",
    "188.114.96.0/24",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinList {
    Default,
    Fast,
}

pub struct RangeResolver;

impl RangeResolver {
    /// Parse one token; `start > end` spans surface as `InvalidRange`.
    pub fn parse_token(token: &str) -> EdgeScoutResult<AddressRange> {
        let t = token.trim();

        if let Ok(net) = t.parse::<IpNet>() {
            return Ok(AddressRange::from_net(net));
        }

        if let Some((a, b)) = t.split_once('-') {
            let start: IpAddr = a
                .trim()
                .parse()
                .map_err(|_| EdgeScoutError::InvalidTarget(format!("invalid start address: {}", a)))?;
            let end: IpAddr = b
                .trim()
                .parse()
                .map_err(|_| EdgeScoutError::InvalidTarget(format!("invalid end address: {}", b)))?;
            return AddressRange::from_addrs(start, end);
        }

        t.parse::<IpAddr>()
            .map(AddressRange::single)
            .map_err(|_| EdgeScoutError::InvalidTarget(t.to_string()))
    }

    /// Parse a target list.
    ///
    /// Unparseable tokens are a configuration error; inverted spans are
    /// skipped with a warning and contribute nothing.
    pub fn resolve(targets: &str) -> EdgeScoutResult<Vec<AddressRange>> {
        let mut ranges = Vec::new();

        for line in targets.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                match Self::parse_token(token) {
                    Ok(range) => ranges.push(range),
                    Err(EdgeScoutError::InvalidRange(msg)) => {
                        warn!("Skipping range {}: {}", token, msg);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if ranges.is_empty() {
            return Err(EdgeScoutError::InvalidTarget("no usable ranges in target list".to_string()));
        }
        Ok(ranges)
    }

    pub fn from_file(path: impl AsRef<Path>) -> EdgeScoutResult<Vec<AddressRange>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let ranges = Self::resolve(&raw)?;
        info!("Loaded {} range(s) from {}", ranges.len(), path.display());
        Ok(ranges)
    }

    /// Built-in ranges, optionally restricted to one family.
    pub fn builtin(list: BuiltinList, family: Option<Family>) -> Vec<AddressRange> {
        let tokens: Vec<&str> = match list {
            BuiltinList::Default => DEFAULT_V4.iter().chain(DEFAULT_V6.iter()).copied().collect(),
            BuiltinList::Fast => FAST_V4.to_vec(),
        };

        tokens
            .into_iter()
            .filter_map(|t| t.parse::<IpNet>().ok())
            .map(AddressRange::from_net)
            .filter(|r| family.map_or(true, |f| r.family() == f))
            .collect()
    }
}
