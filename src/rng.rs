//! Small PCG32 random number generator used for CPU picks.
//!
//! PCG-XSH-RR with 64 bits of state: fast, statistically solid and trivially
//! seedable, which lets tests and replays reproduce a whole match from one
//! `u64`. Not cryptographically secure.
//!
//! Reference: <https://www.pcg-random.org/>
//!
//! ```rust
//! use rps_referee::rng::{Pcg32, Rng, SeedableRng};
//!
//! let mut rng = Pcg32::seed_from_u64(12345);
//! let die = rng.gen_range(1..7);
//! assert!((1..7).contains(&die));
//! ```

use crate::{
    report_violation,
    telemetry::{ViolationKind, ViolationSeverity},
};

/// PCG32 random number generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

/// Default stream for single-stream use.
const PCG_DEFAULT_STREAM: u64 = 1442695040888963407;

/// Multiplier of the underlying 64-bit LCG.
const PCG_MULTIPLIER: u64 = 6364136223846793005;

impl Pcg32 {
    /// Creates a generator from an initial state and a stream selector.
    #[must_use]
    pub const fn new(state: u64, stream: u64) -> Self {
        // The increment must be odd
        let inc = (stream << 1) | 1;
        let mut pcg = Self { state: 0, inc };
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg.state = pcg.state.wrapping_add(state);
        pcg.state = pcg.state.wrapping_mul(PCG_MULTIPLIER).wrapping_add(pcg.inc);
        pcg
    }

    /// Generates the next 32-bit value.
    #[inline]
    #[must_use]
    pub fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.state = old_state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

/// Constructing generators from seeds.
pub trait SeedableRng: Sized {
    /// Creates a generator seeded from a 64-bit value.
    #[must_use]
    fn seed_from_u64(seed: u64) -> Self;

    /// Creates a generator with a per-process random seed.
    #[must_use]
    fn from_entropy() -> Self;
}

impl SeedableRng for Pcg32 {
    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, PCG_DEFAULT_STREAM)
    }

    fn from_entropy() -> Self {
        Self::seed_from_u64(entropy_seed())
    }
}

/// Source of uniformly distributed random values.
pub trait Rng {
    /// Returns the next 32-bit random value.
    fn next_u32(&mut self) -> u32;

    /// Generates a `u32` in `[range.start, range.end)` without modulo bias.
    ///
    /// # Empty Range Behavior
    /// If the range is empty, reports a violation and returns `range.start`.
    fn gen_range(&mut self, range: std::ops::Range<u32>) -> u32 {
        let span = range.end.wrapping_sub(range.start);
        if range.is_empty() {
            report_violation!(
                ViolationSeverity::Error,
                ViolationKind::Configuration,
                "gen_range called with empty range [{}..{})",
                range.start,
                range.end
            );
            return range.start;
        }

        // Rejection sampling
        let threshold = span.wrapping_neg() % span;
        loop {
            let value = self.next_u32();
            if value >= threshold {
                return range.start.wrapping_add(value % span);
            }
        }
    }

    /// Picks one element of `items` uniformly. Returns `None` for an empty slice.
    fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let len = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let index = self.gen_range(0..len) as usize;
        items.get(index)
    }
}

impl Rng for Pcg32 {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        Self::next_u32(self)
    }
}

impl<R: Rng + ?Sized> Rng for &mut R {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }
}

/// Seed derived from the standard library's randomly keyed hasher, the
/// current thread and the wall clock.
fn entropy_seed() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    std::thread::current().id().hash(&mut hasher);
    if let Ok(since_epoch) = web_time::SystemTime::now().duration_since(web_time::UNIX_EPOCH) {
        since_epoch.as_nanos().hash(&mut hasher);
    }
    hasher.finish().wrapping_add(0x9e3779b97f4a7c15)
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Pcg32::seed_from_u64(42);
        let mut b = Pcg32::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Pcg32::seed_from_u64(1);
        let mut b = Pcg32::seed_from_u64(2);
        let same = (0..32).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn gen_range_stays_in_bounds() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..1000 {
            let v = rng.gen_range(10..13);
            assert!((10..13).contains(&v));
        }
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn gen_range_empty_returns_start() {
        let mut rng = Pcg32::seed_from_u64(7);
        assert_eq!(rng.gen_range(5..5), 5);
        assert_eq!(rng.gen_range(9..3), 9);
    }

    #[test]
    fn choose_covers_every_item() {
        let mut rng = Pcg32::seed_from_u64(99);
        let items = [0usize, 1, 2];
        let mut counts = [0u32; 3];
        for _ in 0..3000 {
            counts[*rng.choose(&items).unwrap()] += 1;
        }
        for count in counts {
            // Expected 1000 each
            assert!((800..1200).contains(&count), "skewed counts: {counts:?}");
        }
    }

    #[test]
    fn choose_empty_is_none() {
        let mut rng = Pcg32::seed_from_u64(0);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
    }

    #[test]
    fn mutable_reference_is_an_rng() {
        let mut base = Pcg32::seed_from_u64(5);
        let mut copy = base.clone();
        let expected = copy.next_u32();
        let mut by_ref = &mut base;
        assert_eq!(Rng::next_u32(&mut by_ref), expected);
    }

    #[test]
    fn entropy_seeded_generators_differ() {
        let mut a = Pcg32::from_entropy();
        let mut b = Pcg32::from_entropy();
        let a_vals: Vec<u32> = (0..4).map(|_| a.next_u32()).collect();
        let b_vals: Vec<u32> = (0..4).map(|_| b.next_u32()).collect();
        assert_ne!(a_vals, b_vals);
    }
}
