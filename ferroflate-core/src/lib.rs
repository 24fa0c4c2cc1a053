//! # ferroflate Core
//!
//! Core components for the ferroflate codec engine.
//!
//! This crate provides the building blocks shared by the DEFLATE codec:
//!
//! - [`bitstream`]: LSB-first bit-level I/O for variable-length codes
//! - [`window`]: sliding window for LZ77 back-reference resolution
//! - [`traits`]: compressor/decompressor seams
//! - [`error`]: the error taxonomy
//!
//! ## Architecture
//!
//! ferroflate is layered the way the wire format is:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Wrapper: zlib (RFC 1950) header + Adler-32              │
//! ├─────────────────────────────────────────────────────────┤
//! │ Codec: DEFLATE blocks (RFC 1951)                        │
//! │     Huffman trees, decode tables, block state machine   │
//! ├─────────────────────────────────────────────────────────┤
//! │ This crate: BitReader/BitWriter, SlidingWindow          │
//! └─────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod error;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use error::{FlateError, Result};
pub use traits::{
    CompressStatus, CompressionLevel, Compressor, DecompressStatus, Decompressor, FlushMode,
};
pub use window::{OutputWindow, SlidingWindow};
