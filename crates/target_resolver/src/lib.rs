//! Target Resolver - address ranges and the candidate pool
//!
//! - `AddressRange`: one CIDR-derived span with sequential, reverse,
//!   exhaustive and random extraction
//! - `CandidatePool`: proportional batch sampling across many ranges
//! - `RangeResolver`: target-string parsing and built-in range lists
//! - `SharedRng`: the single serialized random source for sampling

pub mod pool;
pub mod range;
pub mod rng;
pub mod sources;

pub use pool::{CandidatePool, SelectionMode};
pub use range::{span_length, AddressRange, Family, EXTRACT_ALL_LIMIT};
pub use rng::SharedRng;
pub use sources::{BuiltinList, RangeResolver};
