//! Candidate pool - proportional batch sampling across many ranges
//!
//! Every pass recomputes each source's share of the outstanding request from
//! its remaining size, so a /13 is never drained before a /24 gets touched.

use crate::range::{AddressRange, EXTRACT_ALL_LIMIT};
use crate::rng::SharedRng;
use edgescout_common::Candidate;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rand::seq::SliceRandom;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Run-wide extraction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Sequential,
    Random,
}

/// A range plus whatever was over-fetched from it once it ran dry.
#[derive(Debug)]
struct Source {
    range: AddressRange,
    leftover: Vec<IpAddr>,
}

impl Source {
    fn remaining(&self) -> BigUint {
        if self.range.is_exhausted() {
            BigUint::from(self.leftover.len())
        } else {
            self.range.remaining().clone()
        }
    }

    fn is_empty(&self) -> bool {
        self.range.is_exhausted() && self.leftover.is_empty()
    }
}

/// `ceil(want * part / whole)`, never more than `want`.
fn weighted_quota(want: usize, part: &BigUint, whole: &BigUint) -> usize {
    if whole.is_zero() {
        return 0;
    }
    let scaled = BigUint::from(want) * part;
    let quota = (scaled + whole - 1u32) / whole;
    quota.to_usize().unwrap_or(want).min(want)
}

/// Ordered collection of ranges consumed incrementally over one run.
pub struct CandidatePool {
    sources: Vec<Source>,
    mode: SelectionMode,
    port: Option<u16>,
    rng: Arc<SharedRng>,
}

impl CandidatePool {
    pub fn new(ranges: Vec<AddressRange>, mode: SelectionMode, rng: Arc<SharedRng>) -> Self {
        Self {
            sources: ranges
                .into_iter()
                .map(|range| Source {
                    range,
                    leftover: Vec::new(),
                })
                .collect(),
            mode,
            port: None,
            rng,
        }
    }

    /// Pin every produced candidate to `port`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Sources that can still yield candidates.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.iter().filter(|s| !s.is_empty()).count()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.sources.iter().all(Source::is_empty)
    }

    /// Total addresses left across ranges and leftover buffers.
    #[must_use]
    pub fn remaining(&self) -> BigUint {
        self.sources.iter().map(Source::remaining).sum()
    }

    /// Collect up to `total` candidates spread across sources by remaining size.
    ///
    /// Returns a short batch when every source runs dry first.
    pub fn request_batch(&mut self, total: usize) -> Vec<Candidate> {
        let mut out: Vec<IpAddr> = Vec::with_capacity(total.min(EXTRACT_ALL_LIMIT));

        while out.len() < total {
            self.sources.retain(|s| !s.is_empty());
            let want = total - out.len();
            let remaining: Vec<BigUint> = self.sources.iter().map(Source::remaining).collect();
            let whole: BigUint = remaining.iter().sum();
            if whole.is_zero() {
                break;
            }

            let before = out.len();
            for (idx, part) in remaining.iter().enumerate() {
                let quota = weighted_quota(want, part, &whole).min(total - out.len());
                if quota == 0 {
                    continue;
                }
                let pulled = self.pull(idx, quota);
                trace!(source = %self.sources[idx].range, quota, pulled = pulled.len(), "pool pass");
                out.extend(pulled);
            }

            if out.len() == before {
                break;
            }
        }

        debug!(requested = total, produced = out.len(), "candidate batch");
        out.into_iter()
            .map(|ip| {
                let c = Candidate::new(ip);
                match self.port {
                    Some(p) => c.with_port(p),
                    None => c,
                }
            })
            .collect()
    }

    fn pull(&mut self, idx: usize, quota: usize) -> Vec<IpAddr> {
        let mut rng = self.rng.lock();
        let source = &mut self.sources[idx];

        if source.range.is_exhausted() {
            source.leftover.shuffle(&mut *rng);
            if source.leftover.len() > quota {
                let keep = source.leftover.len() - quota;
                return source.leftover.split_off(keep);
            }
            return std::mem::take(&mut source.leftover);
        }

        match self.mode {
            SelectionMode::Sequential => source.range.extract_sequential(quota),
            SelectionMode::Random => {
                let small = source
                    .range
                    .remaining()
                    .to_usize()
                    .is_some_and(|left| left <= EXTRACT_ALL_LIMIT);
                if small {
                    let mut all = source.range.extract_all();
                    all.shuffle(&mut *rng);
                    if all.len() > quota {
                        source.leftover = all.split_off(quota);
                    }
                    all
                } else {
                    source.range.extract_random_unique(quota, &mut *rng)
                }
            }
        }
    }
}
