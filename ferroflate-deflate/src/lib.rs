//! # ferroflate Deflate
//!
//! Pure Rust DEFLATE compression and decompression engine (RFC 1951),
//! with the zlib (RFC 1950) wrapper.
//!
//! The codec reproduces the DEFLATE format bit-for-bit:
//!
//! - **Decompression**: stored, static-tree and dynamic-tree blocks,
//!   decoded through two-level canonical decode tables
//! - **Compression**: LZ77 tokens encoded with length-limited canonical
//!   Huffman codes; stored/static/dynamic block selection by exact bit
//!   cost or pinned by strategy
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_deflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: no compression (stored blocks)
//! - Level 1-4: greedy matching, shallow chains
//! - Level 5-9: lazy matching, deeper chains (default is 6)
//!
//! With the `parallel` feature, [`deflate_parallel`] splits the input
//! into independently compressed segments joined by sync flushes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod decode_table;
pub mod deflate;
pub mod frequency;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod treegen;
pub mod zlib;

// Re-exports
pub use decode_table::{DecodeEntry, DecodeTable, TableKind, build_table};
#[cfg(feature = "parallel")]
pub use deflate::deflate_parallel;
pub use deflate::{BlockStrategy, Deflater, deflate};
pub use frequency::FrequencyTables;
pub use inflate::{Inflater, inflate};
pub use lz77::{Lz77Encoder, Lz77Token, TokenSink};
pub use treegen::{HuffmanCode, TreeBuilder};
pub use zlib::{Adler32, zlib_compress, zlib_decompress};
