//! Top-level [`Sketch`] type: construction, insertion, merging and estimation.
//!
//! A sketch is defined by two immutable parameters:
//! - `p`: precision, the number of hash bits used as the register index. The sparse-capable
//!   constructor accepts `p` in `[4..=18]`, the dense-only constructor in `[4..=30]`.
//! - `r`: register width in bits, one of {4, 5, 6}.
//!
//! Payload state is a tagged variant over the two representations:
//! - [`SparseSet`]: delta-encoded entries at `p + 4` bits of index precision, used while the
//!   cardinality is far below the register count.
//! - [`DenseStore`]: `2^p` bit-packed saturating counters.
//!
//! The sparse representation promotes to dense exactly once, when its deduplicated entry
//! count reaches `2^p`. Promotion is irreversible.

use std::hash::{Hash, Hasher};

use enum_dispatch::enum_dispatch;
use wyhash::WyHash;

use crate::codec;
use crate::dense::DenseStore;
use crate::error::Error;
use crate::sparse::SparseSet;

/// Extra index bits carried by the sparse representation on top of `p`.
pub(crate) const SPARSE_EXTRA_BITS: u32 = 4;

const MIN_P: u8 = 4;
const MAX_SPARSE_P: u8 = 18;
const MAX_DENSE_P: u8 = 30;
const MIN_R: u8 = 4;
const MAX_R: u8 = 6;

/// Immutable sketch shape (`p`, `r`) plus the sizing derived from it.
///
/// Two sketches are merge-compatible iff their `Params` are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Params {
    pub(crate) p: u8,
    pub(crate) r: u8,
}

impl Params {
    /// Validate parameters for a sparse-capable sketch (`p` in `[4..=18]`).
    pub(crate) fn sparse_capable(p: u8, r: u8) -> Result<Self, Error> {
        if !(MIN_P..=MAX_SPARSE_P).contains(&p) {
            return Err(Error::invalid_parameter("p", p));
        }
        Self::with_register_width(p, r)
    }

    /// Validate parameters for a dense-only sketch (`p` in `[4..=30]`).
    pub(crate) fn dense_only(p: u8, r: u8) -> Result<Self, Error> {
        if !(MIN_P..=MAX_DENSE_P).contains(&p) {
            return Err(Error::invalid_parameter("p", p));
        }
        Self::with_register_width(p, r)
    }

    fn with_register_width(p: u8, r: u8) -> Result<Self, Error> {
        if !(MIN_R..=MAX_R).contains(&r) {
            return Err(Error::invalid_parameter("r", r));
        }
        Ok(Self { p, r })
    }

    /// Number of registers.
    pub(crate) fn m(self) -> usize {
        1 << self.p
    }

    /// Sparse precision: index bits used by the sparse representation.
    pub(crate) fn sp(self) -> u32 {
        u32::from(self.p) + SPARSE_EXTRA_BITS
    }

    /// Registers packed into each 32-bit word.
    pub(crate) fn regs_per_word(self) -> usize {
        32 / usize::from(self.r)
    }

    /// Number of 32-bit words holding the dense registers.
    pub(crate) fn word_count(self) -> usize {
        self.m().div_ceil(self.regs_per_word())
    }

    /// Saturation value of a register: `2^r - 1`.
    pub(crate) fn max_rank(self) -> u32 {
        (1 << self.r) - 1
    }

    /// Bit position of the fine index within a packed sparse entry word.
    ///
    /// Only meaningful for sparse-capable parameters (`p <= 18`).
    pub(crate) fn entry_shift(self) -> u32 {
        32 - self.sp()
    }

    /// Word index and bit offset of register `index`. Registers are packed
    /// most-significant-first, so register 0 occupies the highest used bits of word 0.
    pub(crate) fn lane(self, index: usize) -> (usize, u32) {
        let rpw = self.regs_per_word();
        let word = index / rpw;
        let shift = ((rpw - 1 - index % rpw) * usize::from(self.r)) as u32;
        (word, shift)
    }
}

/// Rank of a hash relative to a `prefix_bits`-wide index: the 1-based position of the
/// least-significant set bit, with a sentinel forced at bit `64 - prefix_bits` so an all-zero
/// suffix still yields a bounded count, clamped to the register saturation value.
pub(crate) fn rank_of(hash: u64, prefix_bits: u32, max_rank: u32) -> u32 {
    let sentinel = hash | (1u64 << (64 - prefix_bits));
    (sentinel.trailing_zeros() + 1).min(max_rank)
}

/// Operations shared by both payload representations.
#[enum_dispatch(Representation)]
pub(crate) trait ReprOps {
    /// Record one 64-bit hash observation.
    fn add_hash(&mut self, hash: u64);
    /// Cardinality estimate of this representation.
    fn estimate(&self) -> u64;
}

/// Payload representations supported by [`Sketch`].
#[enum_dispatch]
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Representation {
    Sparse(SparseSet),
    Dense(DenseStore),
}

/// A HyperLogLog++ cardinality sketch.
///
/// See the [crate docs](crate) for an overview. A sketch is a plain mutable value with no
/// internal synchronization; concurrent mutation must be prevented by the caller. `merge`
/// only mutates `self`, so a sketch may be shared read-only across concurrent merges into
/// different targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Sketch {
    pub(crate) params: Params,
    pub(crate) repr: Representation,
}

impl Sketch {
    /// Create a sparse-capable sketch with precision `p` in `[4..=18]` and register width
    /// `r` in `[4..=6]`. The sketch starts in sparse mode and promotes to dense on its own.
    pub fn new(p: u8, r: u8) -> Result<Self, Error> {
        let params = Params::sparse_capable(p, r)?;
        Ok(Self {
            params,
            repr: Representation::Sparse(SparseSet::new(params)),
        })
    }

    /// Create a dense-only sketch with precision `p` in `[4..=30]` and register width `r`
    /// in `[4..=6]`. No sparse phase: registers are materialized up front.
    pub fn dense(p: u8, r: u8) -> Result<Self, Error> {
        let params = Params::dense_only(p, r)?;
        Ok(Self {
            params,
            repr: Representation::Dense(DenseStore::new(params)),
        })
    }

    pub(crate) fn from_parts(params: Params, repr: Representation) -> Self {
        Self { params, repr }
    }

    /// Precision parameter `p`.
    pub fn precision(&self) -> u8 {
        self.params.p
    }

    /// Register width parameter `r`.
    pub fn register_width(&self) -> u8 {
        self.params.r
    }

    /// Whether the sketch is still in its sparse representation.
    pub fn is_sparse(&self) -> bool {
        matches!(self.repr, Representation::Sparse(_))
    }

    /// Record a pre-computed, uniformly distributed 64-bit hash.
    ///
    /// Hash quality is the caller's contract: the estimator assumes every bit of the input
    /// is uniform. Adding the same hash any number of times leaves the register state as if
    /// it had been added once.
    pub fn add(&mut self, hash: u64) {
        self.repr.add_hash(hash);
        self.promote_if_full();
    }

    /// Hash `item` with `wyhash` and [`add`](Self::add) the result.
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        let mut hasher = WyHash::default();
        item.hash(&mut hasher);
        self.add(hasher.finish());
    }

    /// Merge `other` into `self`, register by register, keeping the maximum.
    ///
    /// Returns `false` without mutating either operand if the sketches were built with
    /// different `p` or `r`. `other` is never mutated: its unflushed sparse entries are
    /// folded into a temporary view on the fly.
    ///
    /// The merged sketch is exactly the sketch of the combined input streams, independent
    /// of merge order and grouping.
    pub fn merge(&mut self, other: &Sketch) -> bool {
        if self.params != other.params {
            return false;
        }

        if let Representation::Sparse(set) = &mut self.repr {
            set.flush();
            // A sparse lhs converts to dense before merging a dense rhs.
            if matches!(other.repr, Representation::Dense(_)) {
                let store = set.to_dense();
                self.repr = Representation::Dense(store);
            }
        }

        match (&mut self.repr, &other.repr) {
            (Representation::Sparse(lhs), Representation::Sparse(rhs)) => {
                lhs.union_with(rhs);
            }
            (Representation::Dense(lhs), Representation::Sparse(rhs)) => {
                for &entry in rhs.settled().iter() {
                    lhs.fold_entry(entry);
                }
            }
            (Representation::Dense(lhs), Representation::Dense(rhs)) => {
                lhs.merge_from(rhs);
            }
            // Ruled out by the conversion above.
            (Representation::Sparse(_), Representation::Dense(_)) => unreachable!(),
        }
        // A sparse-sparse union may have crossed the promotion threshold.
        self.promote_if_full();
        true
    }

    /// Return the cardinality estimate.
    ///
    /// Sparse sketches use linear counting at the finer `p + 4` index precision; dense
    /// sketches use the bias-corrected harmonic mean with small- and large-range
    /// corrections.
    pub fn estimate(&self) -> u64 {
        self.repr.estimate()
    }

    /// Logical value of the `index`-th register, regardless of representation.
    ///
    /// Mainly useful for debugging and for validating merge semantics in tests.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 2^p`.
    pub fn register(&self, index: usize) -> u32 {
        assert!(index < self.params.m(), "register index out of range");
        match &self.repr {
            Representation::Sparse(set) => set.register(index),
            Representation::Dense(store) => store.get(index),
        }
    }

    /// Serialize to the tagged big-endian byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Deserialize from the tagged big-endian byte layout produced by
    /// [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        codec::decode(bytes)
    }

    /// Serialize to the legacy dense-only layout (`register words ++ p ++ r`, no mode tag).
    ///
    /// Fails with [`Error::Format`] on a sparse sketch: the legacy layout predates the
    /// sparse representation and cannot express it.
    pub fn to_legacy_bytes(&self) -> Result<Vec<u8>, Error> {
        codec::encode_legacy(self)
    }

    /// Deserialize the legacy dense-only layout. The legacy layout carries no mode tag and
    /// is never auto-detected; callers know statically that they hold legacy bytes.
    pub fn from_legacy_bytes(bytes: &[u8]) -> Result<Self, Error> {
        codec::decode_legacy(bytes)
    }

    fn promote_if_full(&mut self) {
        if let Representation::Sparse(set) = &self.repr {
            if set.len() >= self.params.m() {
                let store = set.to_dense();
                self.repr = Representation::Dense(store);
            }
        }
    }
}
