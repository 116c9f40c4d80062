//! Contiguous address span with in-place extraction.
//!
//! Bounds are big-endian byte vectors; the width (4 or 16) decides the family.
//! `remaining` is arbitrary precision because `::/0` holds 2^128 hosts.

use edgescout_common::{EdgeScoutError, EdgeScoutResult};
use ipnet::IpNet;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{ToPrimitive, Zero};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// `extract_all` refuses spans larger than this.
pub const EXTRACT_ALL_LIMIT: usize = 1 << 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    #[inline]
    #[must_use]
    pub const fn from_width(width: usize) -> Option<Self> {
        match width {
            4 => Some(Family::V4),
            16 => Some(Family::V6),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

/// Inclusive length of `[start, end]`.
///
/// Byte-wise subtraction with borrow, read as an unsigned big integer, plus one.
/// Both slices must have the same width and `start <= end`.
#[must_use]
pub fn span_length(start: &[u8], end: &[u8]) -> BigUint {
    let mut diff = vec![0u8; end.len()];
    let mut borrow = 0i16;
    for i in (0..end.len()).rev() {
        let mut d = i16::from(end[i]) - i16::from(start[i]) - borrow;
        if d < 0 {
            d += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        diff[i] = d as u8;
    }
    BigUint::from_bytes_be(&diff) + 1u32
}

fn to_u128(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b))
}

fn to_bytes(value: u128, family: Family) -> Vec<u8> {
    match family {
        Family::V4 => (value as u32).to_be_bytes().to_vec(),
        Family::V6 => value.to_be_bytes().to_vec(),
    }
}

fn to_ip(value: u128, family: Family) -> IpAddr {
    match family {
        Family::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        Family::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

fn ip_bytes(ip: &IpAddr) -> Vec<u8> {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// One contiguous span of hosts, shrunk in place by extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRange {
    start: Vec<u8>,
    end: Vec<u8>,
    remaining: BigUint,
    exhausted: bool,
}

impl AddressRange {
    /// Build from raw bounds; rejects mixed or unknown widths and `start > end`.
    pub fn from_bytes(start: &[u8], end: &[u8]) -> EdgeScoutResult<Self> {
        if start.len() != end.len() || Family::from_width(start.len()).is_none() {
            return Err(EdgeScoutError::InvalidRange(format!(
                "mismatched address widths {} and {}",
                start.len(),
                end.len()
            )));
        }
        // equal-width big-endian slices compare numerically
        if start > end {
            return Err(EdgeScoutError::InvalidRange(format!(
                "start {} is after end {}",
                to_ip(to_u128(start), Family::from_width(start.len()).unwrap_or(Family::V4)),
                to_ip(to_u128(end), Family::from_width(end.len()).unwrap_or(Family::V4)),
            )));
        }
        Ok(Self {
            remaining: span_length(start, end),
            start: start.to_vec(),
            end: end.to_vec(),
            exhausted: false,
        })
    }

    pub fn from_addrs(start: IpAddr, end: IpAddr) -> EdgeScoutResult<Self> {
        Self::from_bytes(&ip_bytes(&start), &ip_bytes(&end))
    }

    /// Whole CIDR block, network and broadcast addresses included.
    #[must_use]
    pub fn from_net(net: IpNet) -> Self {
        let start = ip_bytes(&net.network());
        let end = ip_bytes(&net.broadcast());
        Self {
            remaining: span_length(&start, &end),
            start,
            end,
            exhausted: false,
        }
    }

    #[must_use]
    pub fn single(ip: IpAddr) -> Self {
        let bytes = ip_bytes(&ip);
        Self {
            remaining: BigUint::from(1u32),
            start: bytes.clone(),
            end: bytes,
            exhausted: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn family(&self) -> Family {
        Family::from_width(self.start.len()).unwrap_or(Family::V4)
    }

    #[must_use]
    pub fn start_addr(&self) -> IpAddr {
        to_ip(to_u128(&self.start), self.family())
    }

    #[must_use]
    pub fn end_addr(&self) -> IpAddr {
        to_ip(to_u128(&self.end), self.family())
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &BigUint {
        &self.remaining
    }

    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether `ip` lies inside the current bounds.
    #[must_use]
    pub fn contains(&self, ip: &IpAddr) -> bool {
        if Family::of(ip) != self.family() {
            return false;
        }
        let v = to_u128(&ip_bytes(ip));
        (to_u128(&self.start)..=to_u128(&self.end)).contains(&v)
    }

    fn mark_exhausted(&mut self) {
        self.exhausted = true;
        self.remaining = BigUint::zero();
    }

    /// Up to `n` addresses from the front, ascending; a short batch is not an error.
    pub fn extract_sequential(&mut self, n: usize) -> Vec<IpAddr> {
        if n == 0 || self.exhausted {
            return Vec::new();
        }
        let family = self.family();
        let first = to_u128(&self.start);

        let (take, drains) = match self.remaining.to_usize() {
            Some(left) if left <= n => (left, true),
            _ => (n, false),
        };
        let out = (0..take as u128).map(|i| to_ip(first + i, family)).collect();

        if drains {
            self.mark_exhausted();
        } else {
            self.start = to_bytes(first + take as u128, family);
            self.remaining -= take;
        }
        out
    }

    /// Exactly `n` addresses from the back, descending, or nothing at all.
    ///
    /// Unlike [`extract_sequential`](Self::extract_sequential) this never
    /// returns a partial batch.
    pub fn extract_reverse(&mut self, n: usize) -> Vec<IpAddr> {
        if n == 0 || self.exhausted || BigUint::from(n) > self.remaining {
            return Vec::new();
        }
        let family = self.family();
        let last = to_u128(&self.end);
        let out = (0..n as u128).map(|i| to_ip(last - i, family)).collect();

        if BigUint::from(n) == self.remaining {
            self.mark_exhausted();
        } else {
            self.end = to_bytes(last - n as u128, family);
            self.remaining -= n;
        }
        out
    }

    /// Drain the whole span, unless it exceeds [`EXTRACT_ALL_LIMIT`].
    pub fn extract_all(&mut self) -> Vec<IpAddr> {
        match self.remaining.to_usize() {
            Some(left) if left <= EXTRACT_ALL_LIMIT && !self.exhausted => {
                self.extract_sequential(left)
            }
            _ => Vec::new(),
        }
    }

    /// `n` distinct addresses drawn uniformly from the current span.
    ///
    /// When `n` covers the span this drains it and shuffles. Otherwise bounds and `remaining` are left untouched, so
    /// repeated calls may return addresses seen before.
    pub fn extract_random_unique<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Vec<IpAddr> {
        if n == 0 || self.exhausted {
            return Vec::new();
        }
        if BigUint::from(n) >= self.remaining {
            // remaining <= n, so the drain is bounded by the request
            let mut all = self.extract_sequential(n);
            all.shuffle(rng);
            return all;
        }

        let family = self.family();
        let first = to_u128(&self.start);

        // dense request over a small span: shuffle instead of rejection sampling
        if let Some(left) = self.remaining.to_usize() {
            if left <= EXTRACT_ALL_LIMIT && n.saturating_mul(2) >= left {
                let mut all: Vec<IpAddr> = (0..left as u128).map(|i| to_ip(first + i, family)).collect();
                all.shuffle(rng);
                all.truncate(n);
                return all;
            }
        }

        let mut seen = HashSet::with_capacity(n);
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let offset = rng.gen_biguint_below(&self.remaining);
            // offset < remaining <= 2^128
            let Some(offset) = offset.to_u128() else { continue };
            let ip = to_ip(first + offset, family);
            if seen.insert(ip) {
                out.push(ip);
            }
        }
        out
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_addr(), self.end_addr())
    }
}
