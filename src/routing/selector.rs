//! Tie-break among rules sharing a `(method, target)` key.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks one candidate index out of `candidates`.
pub trait RuleSelector: Send + Sync + std::fmt::Debug {
    /// Returns an index in `0..candidates`. Only called with `candidates >= 1`.
    fn select(&self, candidates: usize) -> usize;
}

/// Uniform random selection.
#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RuleSelector for RandomSelector {
    fn select(&self, candidates: usize) -> usize {
        if candidates <= 1 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..candidates)
    }
}
