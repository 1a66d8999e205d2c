//! Sparse representation: a HyperLogLog++-style front end for low cardinalities.
//!
//! Each observation is packed into one 32-bit word: the fine index (`sp = p + 4` bits) in
//! the high bits, the rank in the low `r` bits, the middle bits zero. Because the index is
//! the most significant field, plain `u32` ordering sorts by index with ties ordered by
//! rank, which makes dedup-by-maximum a matter of keeping the last duplicate.
//!
//! New entries land in a small append buffer first. When it fills, it is folded into the
//! maintained array: sort, dedup keeping the maximum rank, then an ordered two-pointer
//! union with maximum-on-collision. The maintained array is strictly ascending by fine
//! index with no duplicates.

use std::borrow::Cow;

use crate::dense::DenseStore;
use crate::sketch::{rank_of, Params, ReprOps};

/// Capacity of the temporary append buffer.
pub(crate) const TMP_BUF_LEN: usize = 5;

/// Sorted, delta-encoded sparse entry set plus its append buffer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SparseSet {
    params: Params,
    buf: [u32; TMP_BUF_LEN],
    buf_len: usize,
    entries: Vec<u32>,
}

impl SparseSet {
    pub(crate) fn new(params: Params) -> Self {
        Self {
            params,
            buf: [0; TMP_BUF_LEN],
            buf_len: 0,
            entries: Vec::new(),
        }
    }

    /// Rebuild a set from its maintained entries (codec path, buffer empty by contract).
    pub(crate) fn from_entries(params: Params, entries: Vec<u32>) -> Self {
        Self {
            params,
            buf: [0; TMP_BUF_LEN],
            buf_len: 0,
            entries,
        }
    }

    /// Number of deduplicated entries in the maintained array. Buffered entries are not
    /// counted until folded, which mirrors when promotion is checked.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Fold the append buffer into the maintained array.
    pub(crate) fn flush(&mut self) {
        if self.buf_len == 0 {
            return;
        }
        let mut pending = self.buf[..self.buf_len].to_vec();
        self.buf_len = 0;
        sort_dedup_max(&mut pending, self.params.entry_shift());
        self.entries = union_max(&self.entries, &pending, self.params.entry_shift());
    }

    /// The maintained array with any buffered entries folded in, without mutating `self`.
    /// Borrows when the buffer is empty.
    pub(crate) fn settled(&self) -> Cow<'_, [u32]> {
        if self.buf_len == 0 {
            return Cow::Borrowed(&self.entries);
        }
        let mut pending = self.buf[..self.buf_len].to_vec();
        sort_dedup_max(&mut pending, self.params.entry_shift());
        Cow::Owned(union_max(&self.entries, &pending, self.params.entry_shift()))
    }

    /// Ordered union with `other`'s settled view, maximum-on-collision. `other` is read-only.
    pub(crate) fn union_with(&mut self, other: &SparseSet) {
        debug_assert_eq!(self.params, other.params);
        self.flush();
        self.entries = union_max(&self.entries, &other.settled(), self.params.entry_shift());
    }

    /// Materialize the dense register store this set folds into: each entry contributes its
    /// rank at the coarse `p`-bit index.
    pub(crate) fn to_dense(&self) -> DenseStore {
        let mut store = DenseStore::new(self.params);
        for &entry in self.settled().iter() {
            store.fold_entry(entry);
        }
        store
    }

    /// Logical value of coarse register `index`: maximum rank over the entries whose fine
    /// index collapses onto it.
    pub(crate) fn register(&self, index: usize) -> u32 {
        let shift = self.params.entry_shift();
        let rank_mask = self.params.max_rank();
        self.settled()
            .iter()
            .filter(|&&entry| (entry >> (shift + crate::sketch::SPARSE_EXTRA_BITS)) as usize == index)
            .map(|&entry| entry & rank_mask)
            .max()
            .unwrap_or(0)
    }
}

impl ReprOps for SparseSet {
    fn add_hash(&mut self, hash: u64) {
        let sp = self.params.sp();
        let index = (hash >> (64 - sp)) as u32;
        let rank = rank_of(hash, sp, self.params.max_rank());
        self.buf[self.buf_len] = (index << self.params.entry_shift()) | rank;
        self.buf_len += 1;
        if self.buf_len == TMP_BUF_LEN {
            self.flush();
        }
    }

    /// Linear counting at the fine `2^sp` scale, rounded. The extra 4 index bits buy
    /// small-cardinality accuracy long before the sketch is materialized dense.
    fn estimate(&self) -> u64 {
        let n = self.settled().len() as f64;
        let fine_m = (1u64 << self.params.sp()) as f64;
        (fine_m * (fine_m / (fine_m - n)).ln()).round() as u64
    }
}

/// Sort packed entries and collapse duplicate indices, keeping the maximum rank.
fn sort_dedup_max(entries: &mut Vec<u32>, shift: u32) {
    entries.sort_unstable();
    // Sorted ascending, so among equal indices the largest rank comes last.
    entries.dedup_by(|cur, prev| {
        if *cur >> shift == *prev >> shift {
            *prev = *cur;
            true
        } else {
            false
        }
    });
}

/// Classic sorted-merge union of two deduplicated entry arrays, linear time,
/// maximum-on-collision.
fn union_max(a: &[u32], b: &[u32], shift: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let ai = a[i] >> shift;
        let bj = b[j] >> shift;
        if ai < bj {
            out.push(a[i]);
            i += 1;
        } else if ai > bj {
            out.push(b[j]);
            j += 1;
        } else {
            // Same index: the larger word carries the larger rank.
            out.push(a[i].max(b[j]));
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}
