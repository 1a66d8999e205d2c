//! Binary serialization codec, big-endian throughout.
//!
//! Current tagged layout:
//! - dense:  `[1, p, r]` followed by `word_count` register words, most-significant byte first.
//! - sparse: `[0, p, r]` followed by the settled sparse entries as 32-bit words. The
//!   temporary buffer is folded into the emitted view, so unflushed entries are never
//!   serialized.
//!
//! Legacy dense-only layout (predates the sparse representation and the mode tag):
//! `register words ++ [p, r]`. The two layouts are never auto-detected from a mixed stream;
//! callers of the legacy entry points know statically which format they hold.

use crate::dense::DenseStore;
use crate::error::Error;
use crate::sketch::{Params, Representation, Sketch};
use crate::sparse::SparseSet;

const MODE_SPARSE: u8 = 0;
const MODE_DENSE: u8 = 1;
const HEADER_LEN: usize = 3;
const LEGACY_TRAILER_LEN: usize = 2;

pub(crate) fn encode(sketch: &Sketch) -> Vec<u8> {
    let Params { p, r } = sketch.params;
    match &sketch.repr {
        Representation::Sparse(set) => {
            let entries = set.settled();
            let mut buf = Vec::with_capacity(HEADER_LEN + entries.len() * 4);
            buf.extend_from_slice(&[MODE_SPARSE, p, r]);
            for &entry in entries.iter() {
                buf.extend_from_slice(&entry.to_be_bytes());
            }
            buf
        }
        Representation::Dense(store) => {
            let words = store.words();
            let mut buf = Vec::with_capacity(HEADER_LEN + words.len() * 4);
            buf.extend_from_slice(&[MODE_DENSE, p, r]);
            for &word in words {
                buf.extend_from_slice(&word.to_be_bytes());
            }
            buf
        }
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Sketch, Error> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::format(format!(
            "buffer of {} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let (mode, p, r) = (bytes[0], bytes[1], bytes[2]);
    let payload = &bytes[HEADER_LEN..];

    match mode {
        MODE_SPARSE => {
            let params = Params::sparse_capable(p, r)?;
            if payload.len() % 4 != 0 {
                return Err(Error::format(format!(
                    "sparse payload of {} bytes is not a whole number of entries",
                    payload.len()
                )));
            }
            let entries = be_words(payload);
            let set = SparseSet::from_entries(params, entries);
            Ok(Sketch::from_parts(params, Representation::Sparse(set)))
        }
        MODE_DENSE => {
            let params = Params::dense_only(p, r)?;
            let store = decode_registers(params, payload)?;
            Ok(Sketch::from_parts(params, Representation::Dense(store)))
        }
        _ => Err(Error::format(format!("unknown mode byte {mode}"))),
    }
}

pub(crate) fn encode_legacy(sketch: &Sketch) -> Result<Vec<u8>, Error> {
    let Representation::Dense(store) = &sketch.repr else {
        return Err(Error::format(
            "legacy layout encodes dense sketches only".to_string(),
        ));
    };
    let words = store.words();
    let mut buf = Vec::with_capacity(words.len() * 4 + LEGACY_TRAILER_LEN);
    for &word in words {
        buf.extend_from_slice(&word.to_be_bytes());
    }
    buf.extend_from_slice(&[sketch.params.p, sketch.params.r]);
    Ok(buf)
}

pub(crate) fn decode_legacy(bytes: &[u8]) -> Result<Sketch, Error> {
    // The smallest legal shape (p = 4, r = 4) is already 2 words plus the trailer.
    if bytes.len() < 4 + LEGACY_TRAILER_LEN {
        return Err(Error::format(format!(
            "legacy buffer of {} bytes is too short",
            bytes.len()
        )));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - LEGACY_TRAILER_LEN);
    let params = Params::dense_only(trailer[0], trailer[1])?;
    let store = decode_registers(params, payload)?;
    Ok(Sketch::from_parts(params, Representation::Dense(store)))
}

fn decode_registers(params: Params, payload: &[u8]) -> Result<DenseStore, Error> {
    let expected = params.word_count() * 4;
    if payload.len() != expected {
        return Err(Error::format(format!(
            "dense payload of {} bytes does not match the expected {expected} for p={} r={}",
            payload.len(),
            params.p,
            params.r
        )));
    }
    Ok(DenseStore::from_words(params, be_words(payload)))
}

/// Decode a byte slice whose length is a multiple of 4 into big-endian `u32` words.
fn be_words(payload: &[u8]) -> Vec<u32> {
    payload
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes(chunk.try_into().unwrap()))
        .collect()
}
