//! `hll-sketch` is a mergeable HyperLogLog++ cardinality sketch: it estimates the number of
//! distinct elements in a stream or dataset using a fixed, small amount of memory.
//!
//! The sketch consumes pre-computed, uniformly distributed 64-bit hashes via [`Sketch::add`]
//! (a convenience [`Sketch::insert`] hashes arbitrary items with `wyhash`). Low cardinalities
//! are tracked in a compact sparse representation carrying 4 extra bits of index precision;
//! once the deduplicated sparse set grows to the register count, the sketch promotes itself
//! to a dense array of bit-packed saturating counters. Sketches with identical parameters can
//! be merged ([`Sketch::merge`]) for distributed or parallel aggregation, and serialized to a
//! stable big-endian byte layout ([`Sketch::to_bytes`]).

mod codec;
mod dense;
mod error;
#[cfg(feature = "with_serde")]
mod serde;
mod sketch;
mod sparse;

pub use error::Error;
pub use sketch::Sketch;
