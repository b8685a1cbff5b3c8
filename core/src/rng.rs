//! Deterministic random number generation.
//!
//! RULE: Nothing in the generator may call any platform RNG.
//! All randomness flows through StageRng instances derived
//! from the single master seed of the run.
//!
//! Each pipeline stage gets its own RNG stream, seeded deterministically
//! from (master_seed XOR stage_index). This means:
//!   - Adding a new stage never changes existing stages' streams.
//!   - Each stage's stream is fully reproducible in isolation.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from the master seed and a stable
    /// stage index. The index must never change once assigned.
    pub fn new(master_seed: u64, stage_index: u64) -> Self {
        let derived_seed = master_seed ^ (stage_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.gen_range(0..n)
    }

    /// Roll a u64 in [lo, hi]. Callers guarantee lo <= hi.
    pub fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        assert!(lo <= hi, "empty range [{lo}, {hi}]");
        self.inner.gen_range(lo..=hi)
    }

    /// Uniform amount in [min, max]. A degenerate range returns min.
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + (max - min) * self.next_f64()
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.inner)
    }

    /// Draw `n` distinct items uniformly without replacement.
    /// Callers guarantee `n <= items.len()`.
    pub fn sample<T: Clone>(&mut self, items: &[T], n: usize) -> Vec<T> {
        rand::seq::index::sample(&mut self.inner, items.len(), n)
            .into_iter()
            .map(|i| items[i].clone())
            .collect()
    }

    /// Pick from `(item, weight)` pairs proportionally to weight.
    pub fn weighted<'a, T>(&mut self, items: &'a [(T, u64)]) -> Option<&'a T> {
        let total: u64 = items.iter().map(|(_, w)| *w).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.next_u64_below(total);
        for (item, weight) in items {
            if roll < *weight {
                return Some(item);
            }
            roll -= weight;
        }
        None
    }
}

/// All stage RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        StageRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries, only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    Accounts = 0,
    Graph = 1,
    Nomination = 2,
    Typology = 3,
    Activation = 4,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Graph => "graph",
            Self::Nomination => "nomination",
            Self::Typology => "typology",
            Self::Activation => "activation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_slot_same_stream() {
        let bank = RngBank::new(12345);
        let mut a = bank.for_stage(StageSlot::Graph);
        let mut b = bank.for_stage(StageSlot::Graph);
        for _ in 0..16 {
            assert_eq!(a.next_u64_below(1000), b.next_u64_below(1000));
        }
    }

    #[test]
    fn slots_are_independent_streams() {
        let bank = RngBank::new(12345);
        let a: Vec<u64> = {
            let mut r = bank.for_stage(StageSlot::Graph);
            (0..8).map(|_| r.next_u64_below(1 << 40)).collect()
        };
        let b: Vec<u64> = {
            let mut r = bank.for_stage(StageSlot::Typology);
            (0..8).map(|_| r.next_u64_below(1 << 40)).collect()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn sample_draws_distinct_items() {
        let mut rng = StageRng::new(7, 0);
        let pool: Vec<usize> = (0..20).collect();
        let mut picked = rng.sample(&pool, 20);
        picked.sort_unstable();
        assert_eq!(picked, pool);
    }

    #[test]
    fn weighted_respects_zero_weights() {
        let mut rng = StageRng::new(7, 0);
        let table = vec![("WIRE", 0u64), ("TRANSFER", 5u64)];
        for _ in 0..50 {
            assert_eq!(rng.weighted(&table), Some(&"TRANSFER"));
        }
    }
}
