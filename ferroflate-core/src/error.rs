//! Error types for ferroflate operations.
//!
//! A single typed error covers every failure mode of the codec core:
//! malformed or truncated streams, invalid Huffman codes, and internal
//! capacity violations. Errors abort the current block or stream; DEFLATE
//! is not self-synchronizing, so there is no skip-and-resync path.

use std::io;
use thiserror::Error;

/// The main error type for ferroflate operations.
#[derive(Debug, Error)]
pub enum FlateError {
    /// I/O error from the underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed block or stream header.
    ///
    /// Raised for a reserved block type (BTYPE 3), an unsupported zlib
    /// CMF/FLG pair, a stored-block LEN/NLEN mismatch, or a dynamic header
    /// whose code-length array is over-subscribed or incomplete.
    #[error("Malformed header: {message}")]
    MalformedHeader {
        /// Description of the header defect.
        message: String,
    },

    /// Input exhausted mid-token or mid-header.
    #[error("Truncated stream: expected {expected} more bits")]
    TruncatedStream {
        /// Number of bits that were expected but not available.
        expected: usize,
    },

    /// An invalid Huffman code was resolved during decode.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Tree builder rebalancing could not satisfy the length limit.
    ///
    /// This is an internal invariant violation for correctly sized
    /// alphabets and indicates a bug, not a recoverable input error.
    #[error("Code length limit of {max_length} bits exceeded")]
    LengthLimitExceeded {
        /// The length limit that could not be met.
        max_length: u8,
    },

    /// Decode table construction exceeded its entry capacity.
    #[error("Decode table overflow: need {needed} entries, capacity {capacity}")]
    TableOverflow {
        /// Entries the code-length array would require.
        needed: usize,
        /// Hard capacity bound.
        capacity: usize,
    },

    /// Back-reference distance reaches beyond the decoded history.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Current history size.
        history_size: usize,
    },

    /// Adler-32 checksum mismatch in the zlib wrapper.
    #[error("Checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u32,
        /// Checksum computed over the decoded data.
        computed: u32,
    },

    /// Caller-supplied configuration is invalid.
    ///
    /// Detected on the compression side before any bits are emitted.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration defect.
        message: String,
    },
}

/// Result type alias for ferroflate operations.
pub type Result<T> = std::result::Result<T, FlateError>;

impl FlateError {
    /// Create a malformed header error.
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Self::MalformedHeader {
            message: message.into(),
        }
    }

    /// Create a truncated stream error.
    pub fn truncated(expected: usize) -> Self {
        Self::TruncatedStream { expected }
    }

    /// Create an invalid code error.
    pub fn invalid_code(bit_position: u64) -> Self {
        Self::InvalidCode { bit_position }
    }

    /// Create a length limit error.
    pub fn length_limit(max_length: u8) -> Self {
        Self::LengthLimitExceeded { max_length }
    }

    /// Create a table overflow error.
    pub fn table_overflow(needed: usize, capacity: usize) -> Self {
        Self::TableOverflow { needed, capacity }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
