//! LZ77 token source for DEFLATE.
//!
//! The match finder scans the input for repeated sequences and emits a
//! stream of tokens: literal bytes and (length, distance) back-references
//! into the 32 KiB window. The codec core consumes this token stream; any
//! conforming token stream is acceptable, so the search heuristics here
//! trade ratio for speed per compression level.
//!
//! Candidate positions are tracked in a hash-chain dictionary: a 3-byte
//! hash selects the most recent position, and a chain array links earlier
//! positions with the same hash.

use ferroflate_core::error::Result;
use ferroflate_core::window::OutputWindow;

/// Maximum back-reference distance (32 KiB).
pub const WINDOW_SIZE: usize = 32768;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Size of the hash table (power of 2).
const HASH_SIZE: usize = 32768;

/// Hash mask.
const HASH_MASK: usize = HASH_SIZE - 1;

/// Position mask for the chain array.
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// A token produced by LZ77 compression or decoded from a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Consumer of a decoded token stream.
///
/// The decompression side feeds tokens to a sink as it parses them; the
/// standard sink is the sliding-window decompressor, but a token buffer
/// works too.
pub trait TokenSink {
    /// Receive a literal byte.
    fn push_literal(&mut self, byte: u8) -> Result<()>;

    /// Receive a back-reference.
    fn push_match(&mut self, length: u16, distance: u16) -> Result<()>;
}

impl TokenSink for OutputWindow {
    fn push_literal(&mut self, byte: u8) -> Result<()> {
        self.write_literal(byte);
        Ok(())
    }

    fn push_match(&mut self, length: u16, distance: u16) -> Result<()> {
        self.copy_match(distance as usize, length as usize)
    }
}

impl TokenSink for Vec<Lz77Token> {
    fn push_literal(&mut self, byte: u8) -> Result<()> {
        self.push(Lz77Token::Literal(byte));
        Ok(())
    }

    fn push_match(&mut self, length: u16, distance: u16) -> Result<()> {
        self.push(Lz77Token::Match { length, distance });
        Ok(())
    }
}

/// Hash-chain LZ77 match finder.
#[derive(Debug)]
pub struct Lz77Encoder {
    /// Most recent position per hash, -1 if none.
    head: Vec<i32>,
    /// Previous position with the same hash, indexed by position & mask.
    prev: Vec<i32>,
    /// Chain positions examined per lookup.
    max_chain: usize,
    /// Shortest match worth emitting.
    min_emit: usize,
    /// Defer a match if the next position matches longer.
    lazy: bool,
}

impl Lz77Encoder {
    /// Create a match finder with default settings (level 6).
    pub fn new() -> Self {
        Self::with_level(6)
    }

    /// Create a match finder for the given compression level (0-9).
    ///
    /// Level 0 disables matching entirely (every byte becomes a literal).
    pub fn with_level(level: u8) -> Self {
        let (max_chain, min_emit, lazy) = match level.min(9) {
            0 => (0, MAX_MATCH + 1, false),
            1 => (4, 4, false),
            2 => (8, 4, false),
            3 => (16, 4, false),
            4 => (32, 4, false),
            5 => (64, 4, true),
            6 => (128, 4, true),
            7 => (256, 3, true),
            8 => (1024, 3, true),
            _ => (4096, 3, true),
        };

        Self {
            head: vec![-1; HASH_SIZE],
            prev: vec![-1; WINDOW_SIZE],
            max_chain,
            min_emit,
            lazy,
        }
    }

    /// Reset the dictionary state.
    pub fn reset(&mut self) {
        self.head.fill(-1);
        self.prev.fill(-1);
    }

    /// Hash the 3 bytes at a position.
    #[inline(always)]
    fn hash(data: &[u8], pos: usize) -> usize {
        let h = (data[pos] as usize).wrapping_mul(506832829)
            ^ ((data[pos + 1] as usize).wrapping_mul(2654435761) << 8)
            ^ ((data[pos + 2] as usize).wrapping_mul(374761393) << 16);
        (h ^ (h >> 15)) & HASH_MASK
    }

    /// Insert a position into the dictionary.
    #[inline]
    fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + MIN_MATCH <= data.len() {
            let h = Self::hash(data, pos);
            self.prev[pos & WINDOW_MASK] = self.head[h];
            self.head[h] = pos as i32;
        }
    }

    /// Find the longest match at `pos`, if one clears the emission bar.
    fn longest_match(&self, data: &[u8], pos: usize) -> Option<(u16, u16)> {
        if pos + MIN_MATCH > data.len() {
            return None;
        }

        let max_len = (data.len() - pos).min(MAX_MATCH);
        if max_len < self.min_emit {
            return None;
        }

        let mut candidate = self.head[Self::hash(data, pos)];
        let mut best_len = self.min_emit - 1;
        let mut best_dist = 0usize;
        let mut chains = 0usize;

        while candidate >= 0 && chains < self.max_chain {
            let cpos = candidate as usize;
            if cpos >= pos {
                break;
            }
            let dist = pos - cpos;
            if dist > WINDOW_SIZE {
                break;
            }

            // A candidate that cannot beat the current best fails at the
            // best_len probe without a full scan
            if best_len >= max_len {
                break;
            }
            if data[cpos + best_len] == data[pos + best_len] {
                let mut len = 0;
                while len < max_len && data[cpos + len] == data[pos + len] {
                    len += 1;
                }

                if len > best_len {
                    best_len = len;
                    best_dist = dist;
                    if len >= max_len {
                        break;
                    }
                }
            }

            candidate = self.prev[cpos & WINDOW_MASK];
            chains += 1;
        }

        if best_dist > 0 && best_len >= self.min_emit {
            Some((best_len as u16, best_dist as u16))
        } else {
            None
        }
    }

    /// Tokenize an input buffer.
    ///
    /// The dictionary is reset first: token streams of separate calls are
    /// independent and never reference across buffers.
    pub fn tokenize(&mut self, data: &[u8]) -> Vec<Lz77Token> {
        self.reset();

        if self.max_chain == 0 {
            return data.iter().copied().map(Lz77Token::Literal).collect();
        }

        let mut tokens = Vec::with_capacity(data.len() / 2 + 1);
        let mut pos = 0;

        while pos < data.len() {
            let mut lazy_inserted = false;
            let mut deferred = false;

            if let Some((length, distance)) = self.longest_match(data, pos) {
                // Lazy matching: a longer match one byte later beats
                // emitting this one now
                if self.lazy && pos + 1 < data.len() && (length as usize) < MAX_MATCH {
                    self.insert(data, pos);
                    lazy_inserted = true;
                    if let Some((next_length, _)) = self.longest_match(data, pos + 1) {
                        if next_length > length {
                            deferred = true;
                        }
                    }
                }

                if !deferred {
                    tokens.push(Lz77Token::Match { length, distance });

                    let end = pos + length as usize;
                    let first = if lazy_inserted { pos + 1 } else { pos };
                    for p in first..end {
                        self.insert(data, p);
                    }
                    pos = end;
                    continue;
                }
            }

            tokens.push(Lz77Token::Literal(data[pos]));
            if !lazy_inserted {
                self.insert(data, pos);
            }
            pos += 1;
        }

        tokens
    }

    /// Tokenize a buffer with a one-shot encoder.
    pub fn tokenize_all(input: &[u8], level: u8) -> Vec<Lz77Token> {
        Self::with_level(level).tokenize(input)
    }
}

impl Default for Lz77Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// The number of output bytes a token stream expands to.
pub fn expanded_len(tokens: &[Lz77Token]) -> usize {
    tokens
        .iter()
        .map(|t| match t {
            Lz77Token::Literal(_) => 1,
            Lz77Token::Match { length, .. } => *length as usize,
        })
        .sum()
}
