//! Error types returned by sketch construction and deserialization.
//!
//! Merge incompatibility is intentionally not represented here: [`crate::Sketch::merge`]
//! signals a shape mismatch through its boolean result and leaves both operands untouched.

use thiserror::Error;

/// Error returned by `hll-sketch` operations.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A construction parameter is outside its supported range. Out-of-range values are
    /// rejected, never clamped.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Name of the offending parameter (`"p"` or `"r"`).
        name: &'static str,
        /// The rejected value.
        value: u8,
    },
    /// A serialized buffer is malformed, truncated, or size-inconsistent. No partial sketch
    /// is ever returned.
    #[error("malformed sketch buffer: {0}")]
    Format(String),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, value: u8) -> Self {
        Error::InvalidParameter { name, value }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
