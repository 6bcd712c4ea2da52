//! Bloom-style subscription filter.
//!
//! A bit array of `m` bits probed at `k` positions per item. Positions come
//! from double hashing: two independently seeded xxh3 hashes `h1`, `h2`
//! give `g_i = h1 + i * h2 (mod m)`. Membership tests never return a false
//! negative for an item added to the same instance; false positives occur at
//! the usual rate for the chosen `m`, `k` and insert count.

use bloomcast_proto::FilterParams;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Upper bound on probes per topic. Every routing pass tests each filter
/// under the registry read lock, so an unbounded `k` from one client would
/// stall fan-out for all of them. Optimal `k` stays far below this for any
/// realistic false-positive target.
pub const MAX_HASH_COUNT: u32 = 64;

const SEED_PRIMARY: u64 = 0x9E37_79B9_7F4A_7C15;
const SEED_SECONDARY: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// Probabilistic topic set owned by one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    bits: Vec<u64>,
    bit_size: u64,
    hash_count: u32,
    inserted: usize,
}

impl SubscriptionFilter {
    /// Allocate an empty filter.
    ///
    /// Zero dimensions are clamped to one so that every filter can hold at
    /// least one bit and probe at least once. `hash_count` is capped at
    /// [`MAX_HASH_COUNT`].
    pub fn new(params: FilterParams) -> Self {
        let bit_size = u64::from(params.bit_size.max(1));
        let hash_count = params.hash_count.clamp(1, MAX_HASH_COUNT);
        let words = bit_size.div_ceil(64) as usize;
        Self { bits: vec![0; words], bit_size, hash_count, inserted: 0 }
    }

    /// Dimensions after clamping.
    pub fn params(&self) -> FilterParams {
        FilterParams::new(self.bit_size as u32, self.hash_count)
    }

    /// Number of `add` calls since allocation.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Insert a topic.
    pub fn add(&mut self, topic: impl AsRef<[u8]>) {
        let (h1, h2) = hash_pair(topic.as_ref());
        for i in 0..u64::from(self.hash_count) {
            let bit = self.index(h1, h2, i);
            self.bits[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        self.inserted += 1;
    }

    /// Test a topic. `false` is definitive, `true` may be a false positive.
    pub fn contains(&self, topic: impl AsRef<[u8]>) -> bool {
        let (h1, h2) = hash_pair(topic.as_ref());
        (0..u64::from(self.hash_count)).all(|i| {
            let bit = self.index(h1, h2, i);
            self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0
        })
    }

    /// Expected false-positive probability for the current insert count.
    pub fn estimated_fp_rate(&self) -> f64 {
        let k = f64::from(self.hash_count);
        let m = self.bit_size as f64;
        let n = self.inserted as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    fn index(&self, h1: u64, h2: u64, i: u64) -> u64 {
        h1.wrapping_add(i.wrapping_mul(h2)) % self.bit_size
    }
}

fn hash_pair(data: &[u8]) -> (u64, u64) {
    // An even h2 would revisit the same residues for even m
    (xxh3_64_with_seed(data, SEED_PRIMARY), xxh3_64_with_seed(data, SEED_SECONDARY) | 1)
}
