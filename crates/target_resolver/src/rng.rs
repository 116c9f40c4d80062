//! Shared random source for sampling and shuffling.

use parking_lot::{Mutex, MutexGuard};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Mutex-guarded generator; every draw goes through [`SharedRng::lock`].
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for reproducible runs and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, StdRng> {
        self.inner.lock()
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
