//! Dense representation: `2^p` saturating `r`-bit counters bit-packed into 32-bit words.
//!
//! Registers are packed most-significant-first: register `i` occupies bits
//! `[(rpw - 1 - i % rpw) * r .. )` of word `i / rpw`, where `rpw = 32 / r`. For `r` of 5 or
//! 6 the low-order remainder bits of every word are never addressed and stay zero, so equal
//! register content implies equal words. One packing routine keyed by `r` serves all three
//! widths.

use crate::sketch::{rank_of, Params, ReprOps, SPARSE_EXTRA_BITS};

/// Precomputed `2^-k` for every representable rank (`r = 6` caps ranks at 63).
static POW_2_NEG_K: [f64; 64] = pow_2_neg_k();

const POW_2_32: f64 = 4_294_967_296.0;

const fn pow_2_neg_k() -> [f64; 64] {
    let mut table = [0.0; 64];
    let mut k = 0;
    while k < table.len() {
        table[k] = 1.0 / (1u64 << k) as f64;
        k += 1;
    }
    table
}

/// Bit-packed register store.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DenseStore {
    params: Params,
    words: Vec<u32>,
}

impl DenseStore {
    /// Create an all-zero register store.
    pub(crate) fn new(params: Params) -> Self {
        Self {
            params,
            words: vec![0; params.word_count()],
        }
    }

    /// Rebuild a store from its raw words (codec path). The caller has already validated
    /// that `words.len()` matches the shape.
    pub(crate) fn from_words(params: Params, words: Vec<u32>) -> Self {
        debug_assert_eq!(words.len(), params.word_count());
        Self { params, words }
    }

    pub(crate) fn words(&self) -> &[u32] {
        &self.words
    }

    /// Read register `index`. Pure bit arithmetic, no allocation.
    pub(crate) fn get(&self, index: usize) -> u32 {
        let (word, shift) = self.params.lane(index);
        (self.words[word] >> shift) & self.params.max_rank()
    }

    /// Overwrite register `index` with `value`. Pure bit arithmetic, no allocation.
    pub(crate) fn set(&mut self, index: usize, value: u32) {
        debug_assert!(value <= self.params.max_rank());
        let (word, shift) = self.params.lane(index);
        let mask = self.params.max_rank() << shift;
        self.words[word] = (self.words[word] & !mask) | (value << shift);
    }

    /// Raise register `index` to `rank` if larger. Registers never decrease.
    pub(crate) fn update_max(&mut self, index: usize, rank: u32) {
        if self.get(index) < rank {
            self.set(index, rank);
        }
    }

    /// Fold a packed sparse entry in at coarse scale: the 4 extra index bits are dropped,
    /// the rank is kept.
    pub(crate) fn fold_entry(&mut self, entry: u32) {
        let index = (entry >> (self.params.entry_shift() + SPARSE_EXTRA_BITS)) as usize;
        let rank = entry & self.params.max_rank();
        self.update_max(index, rank);
    }

    /// Registerwise-max merge of same-shape stores, lane by lane within each word.
    ///
    /// Lanes are packed high-to-low in a shared word, so whole words cannot be compared;
    /// each `r`-bit lane is masked out and compared on its own.
    pub(crate) fn merge_from(&mut self, other: &DenseStore) {
        debug_assert_eq!(self.params, other.params);
        let r = u32::from(self.params.r);
        let lanes = self.params.regs_per_word() as u32;
        let lane_mask = self.params.max_rank();

        for (lw, &rw) in self.words.iter_mut().zip(other.words.iter()) {
            let mut word = 0;
            for lane in 0..lanes {
                let mask = lane_mask << (r * lane);
                word |= (*lw & mask).max(rw & mask);
            }
            *lw = word;
        }
    }

    /// Harmonic sum `sum(2^-k)` over all registers and the number of zero registers.
    fn sum_and_zeros(&self) -> (f64, u32) {
        let mut sum = 0.0;
        let mut zeros = 0;
        for index in 0..self.params.m() {
            let k = self.get(index);
            sum += POW_2_NEG_K[k as usize];
            zeros += u32::from(k == 0);
        }
        (sum, zeros)
    }
}

impl ReprOps for DenseStore {
    fn add_hash(&mut self, hash: u64) {
        let p = u32::from(self.params.p);
        let index = (hash >> (64 - p)) as usize;
        let rank = rank_of(hash, p, self.params.max_rank());
        self.update_max(index, rank);
    }

    /// Bias-corrected harmonic-mean estimate with small- and large-range corrections.
    /// The result is truncated, not rounded.
    fn estimate(&self) -> u64 {
        let m = self.params.m() as f64;
        let (sum, zeros) = self.sum_and_zeros();

        let mut raw = alpha(self.params.m()) * m * m / sum;
        if raw <= 2.5 * m && zeros > 0 {
            // Small range: linear counting over empty registers.
            raw = m * (m / f64::from(zeros)).ln();
        } else if raw > POW_2_32 / 30.0 {
            // Large range: correct for 32-bit hash-space collisions.
            raw = -POW_2_32 * (1.0 - raw / POW_2_32).ln();
        }
        raw as u64
    }
}

/// Empirical bias-correction multiplier for `m` registers.
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn params(p: u8, r: u8) -> Params {
        Params::dense_only(p, r).unwrap()
    }

    #[test_case(4, 4, 2; "r4 fills words exactly")]
    #[test_case(4, 5, 3; "r5 leaves padding")]
    #[test_case(4, 6, 4; "r6 leaves padding")]
    #[test_case(12, 6, 820; "p12 r6")]
    fn test_word_count(p: u8, r: u8, expected: usize) {
        assert_eq!(params(p, r).word_count(), expected);
        assert_eq!(DenseStore::new(params(p, r)).words().len(), expected);
    }

    #[test_case(4; "r4")]
    #[test_case(5; "r5")]
    #[test_case(6; "r6")]
    fn test_get_set_round_trip_every_register(r: u8) {
        let params = params(6, r);
        let mut store = DenseStore::new(params);
        // A value pattern distinct per register so any lane overlap shows up.
        for index in 0..params.m() {
            store.set(index, (index as u32 * 7 + 1) % (params.max_rank() + 1));
        }
        for index in 0..params.m() {
            assert_eq!(store.get(index), (index as u32 * 7 + 1) % (params.max_rank() + 1));
        }
    }

    #[test]
    fn test_set_does_not_disturb_neighbors() {
        let params = params(4, 6);
        let mut store = DenseStore::new(params);
        for index in 0..16 {
            store.set(index, 63);
        }
        store.set(7, 0);
        for index in 0..16 {
            assert_eq!(store.get(index), if index == 7 { 0 } else { 63 });
        }
    }

    #[test]
    fn test_msb_first_packing() {
        // Register 0 sits in the highest used bits of word 0.
        let mut store = DenseStore::new(params(4, 4));
        store.set(0, 0xf);
        assert_eq!(store.words()[0], 0xf000_0000);

        // For r = 5 the top lane starts at bit 25, leaving bits 30..31 as padding.
        let mut store = DenseStore::new(params(4, 5));
        store.set(0, 0x1f);
        assert_eq!(store.words()[0], 0x1f << 25);
        store.set(5, 0x1f);
        assert_eq!(store.words()[0], (0x1f << 25) | 0x1f);
    }

    #[test]
    fn test_update_max_never_decreases() {
        let mut store = DenseStore::new(params(4, 5));
        store.update_max(3, 9);
        store.update_max(3, 4);
        assert_eq!(store.get(3), 9);
        store.update_max(3, 10);
        assert_eq!(store.get(3), 10);
    }

    #[test_case(4; "r4")]
    #[test_case(5; "r5")]
    #[test_case(6; "r6")]
    fn test_merge_is_lane_max(r: u8) {
        let params = params(5, r);
        let mut a = DenseStore::new(params);
        let mut b = DenseStore::new(params);
        for index in 0..params.m() {
            a.set(index, (index as u32 * 3) % (params.max_rank() + 1));
            b.set(index, (index as u32 * 5 + 2) % (params.max_rank() + 1));
        }
        let expected: Vec<u32> = (0..params.m()).map(|i| a.get(i).max(b.get(i))).collect();
        a.merge_from(&b);
        for (index, &want) in expected.iter().enumerate() {
            assert_eq!(a.get(index), want);
        }
    }

    #[test]
    fn test_empty_store_estimates_zero() {
        for r in 4..=6 {
            assert_eq!(DenseStore::new(params(10, r)).estimate(), 0);
        }
    }

    #[test]
    fn test_single_hash_estimates_one() {
        let mut store = DenseStore::new(params(12, 6));
        store.add_hash(0xdead_beef_dead_beef);
        assert_eq!(store.estimate(), 1);
    }

    #[test]
    fn test_alpha_constants() {
        assert_eq!(alpha(16), 0.673);
        assert_eq!(alpha(32), 0.697);
        assert_eq!(alpha(64), 0.709);
        assert!((alpha(4096) - 0.7213 / (1.0 + 1.079 / 4096.0)).abs() < 1e-12);
    }

    #[test]
    fn test_pow_table() {
        assert_eq!(POW_2_NEG_K[0], 1.0);
        assert_eq!(POW_2_NEG_K[1], 0.5);
        assert_eq!(POW_2_NEG_K[63], 1.0 / (1u64 << 63) as f64);
    }
}
