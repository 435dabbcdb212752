//! # Vircadia Codec
//!
//! Codec primitives shared by every layer of the Vircadia protocol stack:
//!
//! - Explicit-endianness reads and writes over byte buffers ([`wire`])
//! - Length-prefixed UTF-16 strings and byte blobs in the domain server's
//!   wire convention
//! - The wraparound-safe 16-bit sequence number ([`sequence`])
//!
//! Decoding truncated or malformed input is a recoverable [`CodecError`];
//! writing past a buffer's declared capacity is a programming error and
//! panics, since capacities are always computed in advance from known field
//! sizes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sequence;
pub mod wire;

pub use sequence::SequenceNumber;
pub use wire::{WireReader, WireWriter};

use thiserror::Error;

/// Errors produced while decoding wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the field could be read
    #[error("input truncated: needed {needed} bytes at offset {offset}, {remaining} remain")]
    Truncated {
        /// Bytes required by the field
        needed: usize,
        /// Read offset at the time of failure
        offset: usize,
        /// Bytes remaining in the buffer
        remaining: usize,
    },

    /// A length prefix exceeds the remaining input
    #[error("length prefix {length} exceeds remaining input {remaining}")]
    BadLengthPrefix {
        /// Declared length
        length: usize,
        /// Bytes remaining in the buffer
        remaining: usize,
    },

    /// A UTF-16 string field held an odd number of bytes
    #[error("UTF-16 field has odd byte length {0}")]
    OddUtf16Length(usize),

    /// A UTF-16 string field held unpaired surrogates
    #[error("invalid UTF-16 data")]
    InvalidUtf16,
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
