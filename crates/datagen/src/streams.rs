//! The three deterministic pseudo-random streams behind a randomizer

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-worker PRNG bundle.
///
/// `seeded` is the sole source for choices that must replay identically for
/// a given (seed, worker) pair. `fixed` starts from seed 0 on every worker,
/// so all workers agree on its sequence. `unique` is seeded from the wall
/// clock and never compared across runs.
pub struct Streams {
    /// Seed 0; identical sequence on every worker
    pub fixed: StdRng,
    /// Seed Z + 1 + worker-id; reproducible per worker
    pub seeded: StdRng,
    /// Wall-clock seed; fresh values every run
    pub unique: StdRng,
}

impl Streams {
    /// Build the bundle for one worker
    pub fn new(seed: u64, worker: usize) -> Self {
        let clock = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Streams {
            fixed: StdRng::seed_from_u64(0),
            seeded: StdRng::seed_from_u64(seed.wrapping_add(1).wrapping_add(worker as u64)),
            // Mix the worker id in so workers spawned within the same
            // nanosecond still diverge.
            unique: StdRng::seed_from_u64(clock ^ ((worker as u64) << 32)),
        }
    }

    /// Uniform draw in `[0, n)` from the seeded stream; 0 when `n == 0`
    pub fn intn(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.seeded.gen_range(0..n)
    }

    /// Uniform `u64` from the seeded stream
    pub fn uint64(&mut self) -> u64 {
        self.seeded.gen()
    }

    /// Exponentially decaying draw in `[0, max)`: `intn(intn(max) + 1)`.
    ///
    /// Small values come up far more often than large ones, which simulates
    /// skewed tenant hot-spots.
    pub fn intn_exp(&mut self, max: u32) -> u32 {
        let bound = self.intn(max).saturating_add(1);
        self.intn(bound)
    }
}

impl std::fmt::Debug for Streams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streams").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_stream_replays_per_worker() {
        let mut a = Streams::new(42, 3);
        let mut b = Streams::new(42, 3);
        let seq_a: Vec<u64> = (0..32).map(|_| a.uint64()).collect();
        let seq_b: Vec<u64> = (0..32).map(|_| b.uint64()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn seeded_stream_differs_across_workers() {
        let mut a = Streams::new(42, 0);
        let mut b = Streams::new(42, 1);
        let seq_a: Vec<u64> = (0..8).map(|_| a.uint64()).collect();
        let seq_b: Vec<u64> = (0..8).map(|_| b.uint64()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn fixed_stream_is_worker_independent() {
        let mut a = Streams::new(1, 0);
        let mut b = Streams::new(999, 7);
        let seq_a: Vec<u32> = (0..8).map(|_| a.fixed.gen()).collect();
        let seq_b: Vec<u32> = (0..8).map(|_| b.fixed.gen()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn intn_zero_is_zero() {
        let mut s = Streams::new(1, 0);
        assert_eq!(s.intn(0), 0);
    }

    #[test]
    fn intn_exp_stays_in_range() {
        let mut s = Streams::new(7, 0);
        for _ in 0..1000 {
            assert!(s.intn_exp(100) < 100);
        }
    }

    #[test]
    fn intn_exp_is_skewed_low() {
        let mut s = Streams::new(7, 0);
        let draws: Vec<u32> = (0..2000).map(|_| s.intn_exp(100)).collect();
        let low = draws.iter().filter(|&&v| v < 50).count();
        // A uniform draw would put ~50% below the midpoint; the nested draw
        // concentrates around 75%.
        assert!(low > 1200, "distribution not skewed: {low}/2000 below 50");
    }
}
