//! Deterministic randomness for construction jitter.
//!
//! RULE: Nothing in the shipyard calls a platform RNG. Each build task gets
//! its own stream seeded from (master_seed, task sequence number), so the
//! latency of task N is reproducible regardless of how many workers run or
//! in which order tasks are picked up.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::time::Duration;

/// A deterministic RNG for a single build task.
pub struct TaskRng {
    inner: Pcg64Mcg,
}

impl TaskRng {
    /// The sequence number must never be reused within a run.
    pub fn new(master_seed: u64, sequence: u64) -> Self {
        let derived_seed = master_seed ^ (sequence.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a u64 in [0, max]. Covers the full range, `u64::MAX` included.
    pub fn next_u64_through(&mut self, max: u64) -> u64 {
        self.inner.gen_range(0..=max)
    }
}

/// Base latency plus up to `jitter_ms` (inclusive) of per-task jitter.
pub fn construction_latency(base_ms: u64, jitter_ms: u64, seed: u64, sequence: u64) -> Duration {
    let jitter = if jitter_ms == 0 {
        0
    } else {
        TaskRng::new(seed, sequence).next_u64_through(jitter_ms)
    };
    Duration::from_millis(base_ms.saturating_add(jitter))
}
