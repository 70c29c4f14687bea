//! The seeded permutation behind mapping generation.
//!
//! Reproducing a mapping in another implementation needs more than the seed:
//! the generator, the shuffle and the order in which the shuffle consumes
//! random numbers all have to match. They are fixed here.
//!
//! - Generator: SplitMix64. The state starts at the seed; each output adds
//!   `0x9E3779B97F4A7C15` to the state and mixes it with the constants below.
//! - Shuffle: Fisher–Yates from the last index down to 1. For index `i` one
//!   `j` is drawn uniformly from `0..=i` and items `i` and `j` are swapped.
//! - Uniform draws: a 64-bit output `v` is rejected while `v < 2^64 mod n`,
//!   otherwise `v mod n` is used.

use rand::{Error as RandError, RngCore, SeedableRng};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_1: u64 = 0xBF58_476D_1CE4_E5B9;
const MIX_2: u64 = 0x94D0_49BB_1331_11EB;

/// The SplitMix64 generator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SplitMix64 {
    state: u64,
}

impl RngCore for SplitMix64 {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(MIX_1);
        z = (z ^ (z >> 27)).wrapping_mul(MIX_2);
        z ^ (z >> 31)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for SplitMix64 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self { state: u64::from_le_bytes(seed) }
    }

    /// The seed becomes the initial state as is.
    fn seed_from_u64(state: u64) -> Self {
        Self { state }
    }
}

/// Draw uniformly from `0..bound`. `bound` must not be zero.
fn uniform_below<R: RngCore>(rng: &mut R, bound: u64) -> u64 {
    let threshold = bound.wrapping_neg() % bound;
    loop {
        let v = rng.next_u64();
        if v >= threshold {
            return v % bound;
        }
    }
}

/// Shuffle `items` in place with Fisher–Yates.
pub fn shuffle<T, R: RngCore>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = uniform_below(rng, i as u64 + 1) as usize;
        items.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitmix_reference_output() {
        let mut rng = SplitMix64::seed_from_u64(0);
        assert_eq!(rng.next_u64(), 0xE220_A839_7B1D_CDAF);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut items: Vec<u32> = (0..100).collect();
        shuffle(&mut items, &mut SplitMix64::seed_from_u64(7));
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn shuffle_of_one_is_identity() {
        let mut items = ['a'];
        shuffle(&mut items, &mut SplitMix64::seed_from_u64(1));
        assert_eq!(items, ['a']);
    }

    #[test]
    fn uniform_draws_stay_in_range() {
        let mut rng = SplitMix64::seed_from_u64(3);
        for bound in [1, 2, 3, 7, 1000] {
            for _ in 0..100 {
                assert!(uniform_below(&mut rng, bound) < bound);
            }
        }
    }
}
