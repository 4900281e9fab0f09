//! Seeded, reproducible random streams
//!
//! Every source of randomness in the benchmark harness flows through this
//! module. A single user-supplied seed fans out through a [`SeedFactory`]
//! into child seeds for each generator, replacing any global RNG state, so
//! a run is fully determined by its seed.
//!
//! Streams are built on xoshiro256++, which is fast and produces identical
//! sequences for identical seeds on every platform.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

/// Errors from constructing random streams
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RandomError {
    /// The requested range is empty
    #[error("invalid range: upper bound {hi} is below lower bound {lo}")]
    InvalidRange { lo: i64, hi: i64 },
    /// The seed does not fit the generator's seed space
    #[error("seed {value} is larger than the maximum of {max}", max = RandomSeed::MAX)]
    SeedOutOfRange { value: u64 },
}

/// A validated generator seed
///
/// The seed space is `0..=u32::MAX`; larger values are rejected at
/// construction so that a configured seed either works everywhere or fails
/// up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RandomSeed(u32);

impl RandomSeed {
    /// The largest accepted seed value
    pub const MAX: u64 = u32::MAX as u64;

    /// Validate and wrap a seed value
    pub fn new(value: u64) -> Result<Self, RandomError> {
        if value > Self::MAX {
            return Err(RandomError::SeedOutOfRange { value });
        }
        Ok(Self(value as u32))
    }

    /// The raw seed value
    pub fn value(self) -> u64 {
        u64::from(self.0)
    }
}

fn rng_for(seed: RandomSeed) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(seed.value())
}

/// Uniform stream over the full `i64` range
#[derive(Debug, Clone)]
pub struct FastIntStream {
    rng: Xoshiro256PlusPlus,
}

impl FastIntStream {
    pub fn new(seed: RandomSeed) -> Self {
        Self { rng: rng_for(seed) }
    }

    #[inline]
    pub fn next_int(&mut self) -> i64 {
        self.rng.gen()
    }
}

/// Uniform stream over an inclusive integer range `[lo, hi]`
#[derive(Debug, Clone)]
pub struct UniformIntStream {
    rng: Xoshiro256PlusPlus,
    lo: i64,
    hi: i64,
}

impl UniformIntStream {
    /// Fails with `InvalidRange` if `hi < lo`
    pub fn new(lo: i64, hi: i64, seed: RandomSeed) -> Result<Self, RandomError> {
        if hi < lo {
            return Err(RandomError::InvalidRange { lo, hi });
        }
        Ok(Self {
            rng: rng_for(seed),
            lo,
            hi,
        })
    }

    #[inline]
    pub fn next_int(&mut self) -> i64 {
        self.rng.gen_range(self.lo..=self.hi)
    }
}

/// Uniform stream over a half-open floating-point range `[lo, hi)`
///
/// When `lo >= hi` the range collapses to the singleton `lo`, which the
/// stream then yields constantly.
#[derive(Debug, Clone)]
pub struct UniformDoubleStream {
    rng: Xoshiro256PlusPlus,
    lo: f64,
    hi: f64,
}

impl UniformDoubleStream {
    pub fn new(lo: f64, hi: f64, seed: RandomSeed) -> Self {
        Self {
            rng: rng_for(seed),
            lo,
            hi,
        }
    }

    #[inline]
    pub fn next_double(&mut self) -> f64 {
        if self.lo < self.hi {
            self.rng.gen_range(self.lo..self.hi)
        } else {
            self.lo
        }
    }
}

/// Shuffle a slice in place (Fisher–Yates) with the given seed
pub fn shuffle<T>(items: &mut [T], seed: RandomSeed) {
    items.shuffle(&mut rng_for(seed));
}

/// Deterministic stream of child seeds
///
/// Spawning several generators from one user seed directly would correlate
/// their outputs; a `SeedFactory` derives an independent-looking child seed
/// for each of them instead.
#[derive(Debug, Clone)]
pub struct SeedFactory {
    rng: Xoshiro256PlusPlus,
}

impl SeedFactory {
    pub fn new(seed: RandomSeed) -> Self {
        Self { rng: rng_for(seed) }
    }

    /// The next child seed
    #[inline]
    pub fn next_seed(&mut self) -> RandomSeed {
        RandomSeed(self.rng.gen())
    }

    /// A fixed-size batch of child seeds
    pub fn seeds<const N: usize>(&mut self) -> [RandomSeed; N] {
        [(); N].map(|_| self.next_seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(value: u64) -> RandomSeed {
        RandomSeed::new(value).unwrap()
    }

    #[test]
    fn test_seed_bounds() {
        assert!(RandomSeed::new(0).is_ok());
        assert!(RandomSeed::new(RandomSeed::MAX).is_ok());
        assert_eq!(
            RandomSeed::new(RandomSeed::MAX + 1),
            Err(RandomError::SeedOutOfRange {
                value: RandomSeed::MAX + 1
            })
        );
    }

    #[test]
    fn test_fast_int_stream_reproducible() {
        for s in [0u64, 1, 42, RandomSeed::MAX] {
            let mut a = FastIntStream::new(seed(s));
            let mut b = FastIntStream::new(seed(s));
            for _ in 0..50 {
                assert_eq!(a.next_int(), b.next_int());
            }
        }
    }

    #[test]
    fn test_uniform_int_stream_bounds() {
        let mut stream = UniformIntStream::new(-5, 5, seed(7)).unwrap();
        for _ in 0..1000 {
            let value = stream.next_int();
            assert!((-5..=5).contains(&value));
        }
    }

    #[test]
    fn test_uniform_int_stream_reproducible() {
        let mut a = UniformIntStream::new(0, 1_000_000, seed(42)).unwrap();
        let mut b = UniformIntStream::new(0, 1_000_000, seed(42)).unwrap();
        for _ in 0..50 {
            assert_eq!(a.next_int(), b.next_int());
        }
    }

    #[test]
    fn test_uniform_int_stream_singleton() {
        let mut stream = UniformIntStream::new(3, 3, seed(1)).unwrap();
        for _ in 0..10 {
            assert_eq!(stream.next_int(), 3);
        }
    }

    #[test]
    fn test_uniform_int_stream_invalid_range() {
        assert_eq!(
            UniformIntStream::new(10, 9, seed(1)).err(),
            Some(RandomError::InvalidRange { lo: 10, hi: 9 })
        );
    }

    #[test]
    fn test_uniform_double_stream_bounds() {
        let mut stream = UniformDoubleStream::new(0.0, 100.0, seed(11));
        for _ in 0..1000 {
            let value = stream.next_double();
            assert!((0.0..100.0).contains(&value));
        }
    }

    #[test]
    fn test_uniform_double_stream_collapsed() {
        let mut equal = UniformDoubleStream::new(2.5, 2.5, seed(1));
        let mut inverted = UniformDoubleStream::new(7.0, 3.0, seed(1));
        for _ in 0..10 {
            assert_eq!(equal.next_double(), 2.5);
            assert_eq!(inverted.next_double(), 7.0);
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let original: Vec<u32> = (0..100).collect();
        let mut shuffled = original.clone();
        shuffle(&mut shuffled, seed(42));
        assert_ne!(shuffled, original);
        let mut sorted = shuffled.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, original);
    }

    #[test]
    fn test_shuffle_reproducible() {
        let mut a: Vec<u32> = (0..64).collect();
        let mut b = a.clone();
        shuffle(&mut a, seed(9));
        shuffle(&mut b, seed(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_factory_reproducible() {
        let mut a = SeedFactory::new(seed(42));
        let mut b = SeedFactory::new(seed(42));
        for _ in 0..50 {
            assert_eq!(a.next_seed(), b.next_seed());
        }
    }

    #[test]
    fn test_seed_factory_decorrelates() {
        let mut factory = SeedFactory::new(seed(42));
        let [first, second] = factory.seeds::<2>();
        assert_ne!(first, second);
        // Children differ from the parent seed too.
        assert_ne!(first.value(), 42);
    }
}
