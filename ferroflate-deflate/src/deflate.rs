//! DEFLATE compression.
//!
//! The encoder is the mirror image of the decode state machine: given a
//! token stream and canonical codes built from the block's frequencies, it
//! emits the block preamble, the dynamic header (code lengths RLE-packed
//! into the bit-length alphabet, itself Huffman-coded), and each token as
//! its code plus extra bits.
//!
//! Which block type a buffer gets is policy, not format: the exact bit
//! cost of stored, static and dynamic encodings is computed and the
//! cheapest wins, unless a strategy pins the choice.

use crate::frequency::FrequencyTables;
use crate::lz77::{Lz77Encoder, Lz77Token};
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_ALPHABET_SIZE, END_OF_BLOCK, MAX_CODE_LENGTH, MAX_CODELEN_LENGTH,
    distance_to_code, fixed_distance_lengths, fixed_litlen_lengths, length_to_code,
};
use crate::treegen::{HuffmanCode, assign_codes, build_lengths};
use ferroflate_core::BitWriter;
use ferroflate_core::error::Result;
use ferroflate_core::traits::{CompressStatus, Compressor, FlushMode};
use std::io::Write;

/// Largest stored-block payload (16-bit LEN field).
const MAX_STORED_BLOCK: usize = 65535;

/// Block type selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStrategy {
    /// Pick whichever of stored/static/dynamic costs the fewest bits.
    #[default]
    Auto,
    /// Always emit stored blocks.
    Stored,
    /// Always emit static-tree blocks.
    Static,
    /// Always emit dynamic-tree blocks.
    Dynamic,
}

/// One RLE operation of the dynamic-header code-length encoding.
///
/// `symbol` is a bit-length alphabet symbol (0-18); codes 16/17/18 carry
/// a repeat count in `extra`.
#[derive(Debug, Clone, Copy)]
struct RleOp {
    symbol: u8,
    extra: u8,
    extra_bits: u8,
}

/// The fully planned dynamic header for one block.
struct DynamicHeader {
    hlit: usize,
    hdist: usize,
    hclen_symbols: usize,
    ops: Vec<RleOp>,
    codelen_lengths: Vec<u8>,
    codelen_codes: Vec<HuffmanCode>,
}

impl DynamicHeader {
    /// Plan the header: RLE-pack the combined code lengths and build the
    /// nested Huffman code over the bit-length alphabet.
    fn plan(litlen_lengths: &[u8], dist_lengths: &[u8]) -> Result<Self> {
        let hlit = last_used(litlen_lengths, 257);
        let hdist = last_used(dist_lengths, 1);

        let mut combined = Vec::with_capacity(hlit + hdist);
        combined.extend_from_slice(&litlen_lengths[..hlit]);
        combined.extend_from_slice(&dist_lengths[..hdist]);

        let (ops, codelen_freqs) = scan_lengths(&combined);

        let codelen_lengths = build_lengths(&codelen_freqs, MAX_CODELEN_LENGTH)?;
        let codelen_codes = assign_codes(&codelen_lengths);

        let mut hclen_symbols = CODELEN_ALPHABET_SIZE;
        while hclen_symbols > 4 && codelen_lengths[CODE_LENGTH_ORDER[hclen_symbols - 1]] == 0 {
            hclen_symbols -= 1;
        }

        Ok(Self {
            hlit,
            hdist,
            hclen_symbols,
            ops,
            codelen_lengths,
            codelen_codes,
        })
    }

    /// Exact bit cost of the header (past the 3 preamble bits).
    fn bit_cost(&self) -> u64 {
        let mut bits = 5 + 5 + 4 + 3 * self.hclen_symbols as u64;
        for op in &self.ops {
            bits += u64::from(self.codelen_lengths[op.symbol as usize]);
            bits += u64::from(op.extra_bits);
        }
        bits
    }

    /// Emit the header.
    fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        writer.write_bits((self.hlit - 257) as u32, 5)?;
        writer.write_bits((self.hdist - 1) as u32, 5)?;
        writer.write_bits((self.hclen_symbols - 4) as u32, 4)?;

        for &slot in CODE_LENGTH_ORDER.iter().take(self.hclen_symbols) {
            writer.write_bits(u32::from(self.codelen_lengths[slot]), 3)?;
        }

        for op in &self.ops {
            let code = self.codelen_codes[op.symbol as usize];
            debug_assert!(code.is_used(), "RLE symbol {} has no code", op.symbol);
            writer.write_bits(u32::from(code.code), code.len)?;
            if op.extra_bits > 0 {
                writer.write_bits(u32::from(op.extra), op.extra_bits)?;
            }
        }

        Ok(())
    }
}

/// Count of leading symbols to transmit: index past the last used symbol,
/// never below `min`.
fn last_used(lengths: &[u8], min: usize) -> usize {
    let mut count = lengths.len();
    while count > min && lengths[count - 1] == 0 {
        count -= 1;
    }
    count.max(min)
}

/// RLE-scan a combined code-length array into bit-length alphabet
/// operations, tallying that alphabet's frequencies as it goes.
///
/// Runs of zeros become codes 17 (3-10) and 18 (11-138); runs of a
/// repeated non-zero length become the length once plus codes 16 (3-6).
fn scan_lengths(lengths: &[u8]) -> (Vec<RleOp>, Vec<u32>) {
    let mut ops = Vec::new();
    let mut freqs = vec![0u32; CODELEN_ALPHABET_SIZE];

    let mut push = |ops: &mut Vec<RleOp>, symbol: u8, extra: u8, extra_bits: u8| {
        ops.push(RleOp {
            symbol,
            extra,
            extra_bits,
        });
        freqs[symbol as usize] += 1;
    };

    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == len {
            run += 1;
        }
        i += run;

        if len == 0 {
            let mut remaining = run;
            while remaining >= 11 {
                let take = remaining.min(138);
                push(&mut ops, 18, (take - 11) as u8, 7);
                remaining -= take;
            }
            if remaining >= 3 {
                push(&mut ops, 17, (remaining - 3) as u8, 3);
                remaining = 0;
            }
            while remaining > 0 {
                push(&mut ops, 0, 0, 0);
                remaining -= 1;
            }
        } else {
            push(&mut ops, len, 0, 0);
            let mut remaining = run - 1;
            while remaining >= 3 {
                let take = remaining.min(6);
                push(&mut ops, 16, (take - 3) as u8, 2);
                remaining -= take;
            }
            while remaining > 0 {
                push(&mut ops, len, 0, 0);
                remaining -= 1;
            }
        }
    }

    (ops, freqs)
}

/// Exact bit cost of a token stream (plus end-of-block) under the given
/// code lengths.
fn token_bit_cost(tokens: &[Lz77Token], litlen_lengths: &[u8], dist_lengths: &[u8]) -> u64 {
    let mut bits = 0u64;

    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                bits += u64::from(litlen_lengths[byte as usize]);
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra_bits, _) = length_to_code(length);
                bits += u64::from(litlen_lengths[len_code as usize]);
                bits += u64::from(len_extra_bits);

                let (dist_code, dist_extra_bits, _) = distance_to_code(distance);
                bits += u64::from(dist_lengths[dist_code as usize]);
                bits += u64::from(dist_extra_bits);
            }
        }
    }

    bits + u64::from(litlen_lengths[END_OF_BLOCK as usize])
}

/// Emit a token stream plus end-of-block under the given codes.
fn write_tokens<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Lz77Token],
    litlen_codes: &[HuffmanCode],
    dist_codes: &[HuffmanCode],
) -> Result<()> {
    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                let code = litlen_codes[byte as usize];
                debug_assert!(code.is_used(), "literal {} has no code", byte);
                writer.write_bits(u32::from(code.code), code.len)?;
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra_bits, len_extra) = length_to_code(length);
                let code = litlen_codes[len_code as usize];
                debug_assert!(code.is_used(), "length code {} unused", len_code);
                writer.write_bits(u32::from(code.code), code.len)?;
                if len_extra_bits > 0 {
                    writer.write_bits(u32::from(len_extra), len_extra_bits)?;
                }

                let (dist_code, dist_extra_bits, dist_extra) = distance_to_code(distance);
                let code = dist_codes[dist_code as usize];
                debug_assert!(code.is_used(), "distance code {} unused", dist_code);
                writer.write_bits(u32::from(code.code), code.len)?;
                if dist_extra_bits > 0 {
                    writer.write_bits(u32::from(dist_extra), dist_extra_bits)?;
                }
            }
        }
    }

    let eob = litlen_codes[END_OF_BLOCK as usize];
    debug_assert!(eob.is_used(), "end-of-block has no code");
    writer.write_bits(u32::from(eob.code), eob.len)?;

    Ok(())
}

/// DEFLATE compressor.
#[derive(Debug)]
pub struct Deflater {
    /// LZ77 token source.
    lz77: Lz77Encoder,
    /// Compression level (0-9).
    level: u8,
    /// Block type policy.
    strategy: BlockStrategy,
    /// Whether the final block has been written.
    finished: bool,
}

impl Deflater {
    /// Create a compressor with the given level (0-9) and automatic block
    /// type selection.
    pub fn new(level: u8) -> Self {
        Self::with_strategy(level, BlockStrategy::Auto)
    }

    /// Create a compressor with an explicit block type policy.
    pub fn with_strategy(level: u8, strategy: BlockStrategy) -> Self {
        Self {
            lz77: Lz77Encoder::with_level(level),
            level: level.min(9),
            strategy,
            finished: false,
        }
    }

    /// Reset the compressor for a fresh stream.
    pub fn reset(&mut self) {
        self.lz77.reset();
        self.finished = false;
    }

    /// Compress one buffer.
    ///
    /// With `finish` the stream ends in a BFINAL block; without it the
    /// blocks are non-final and a sync flush (an empty stored block)
    /// realigns the output to a byte boundary, so independently produced
    /// segments concatenate into one valid stream.
    pub fn deflate<W: Write>(&mut self, data: &[u8], writer: &mut W, finish: bool) -> Result<()> {
        let mut bit_writer = BitWriter::new(writer);

        if self.level == 0 || self.strategy == BlockStrategy::Stored {
            self.write_stored_blocks(data, &mut bit_writer, finish)?;
        } else {
            let tokens = self.lz77.tokenize(data);
            self.encode_block(&tokens, data, &mut bit_writer, finish)?;
        }

        if finish {
            self.finished = true;
        } else {
            Self::sync_flush(&mut bit_writer)?;
        }
        bit_writer.flush()?;

        Ok(())
    }

    /// Emit an empty non-final stored block, padding to a byte boundary.
    fn sync_flush<W: Write>(writer: &mut BitWriter<W>) -> Result<()> {
        writer.write_bit(false)?;
        writer.write_bits(0b00, 2)?;
        writer.align_to_byte()?;
        writer.write_bits(0, 16)?;
        writer.write_bits(0xFFFF, 16)?;
        Ok(())
    }

    /// Write the buffer as stored blocks.
    fn write_stored_blocks<W: Write>(
        &self,
        data: &[u8],
        writer: &mut BitWriter<W>,
        is_final: bool,
    ) -> Result<()> {
        if data.is_empty() {
            if is_final {
                Self::write_stored_chunk(writer, &[], true)?;
            }
            return Ok(());
        }

        let mut offset = 0;
        while offset < data.len() {
            let block_size = (data.len() - offset).min(MAX_STORED_BLOCK);
            let final_block = is_final && offset + block_size >= data.len();
            Self::write_stored_chunk(writer, &data[offset..offset + block_size], final_block)?;
            offset += block_size;
        }

        Ok(())
    }

    /// Emit one stored block.
    fn write_stored_chunk<W: Write>(
        writer: &mut BitWriter<W>,
        chunk: &[u8],
        is_final: bool,
    ) -> Result<()> {
        debug_assert!(chunk.len() <= MAX_STORED_BLOCK);

        writer.write_bit(is_final)?;
        writer.write_bits(0b00, 2)?;
        writer.align_to_byte()?;

        let len = chunk.len() as u16;
        writer.write_bits(u32::from(len), 16)?;
        writer.write_bits(u32::from(!len), 16)?;
        writer.write_bytes(chunk)?;

        Ok(())
    }

    /// Encode the tokens of one block, choosing the block type.
    fn encode_block<W: Write>(
        &self,
        tokens: &[Lz77Token],
        raw: &[u8],
        writer: &mut BitWriter<W>,
        is_final: bool,
    ) -> Result<()> {
        // Hard barrier: all tokens are counted before the trees build
        let freqs = FrequencyTables::from_tokens(tokens);
        let litlen_lengths = build_lengths(&freqs.litlen, MAX_CODE_LENGTH)?;
        let dist_lengths = build_lengths(&freqs.dist, MAX_CODE_LENGTH)?;

        let header = DynamicHeader::plan(&litlen_lengths, &dist_lengths)?;

        let choice = match self.strategy {
            BlockStrategy::Stored => BlockStrategy::Stored,
            BlockStrategy::Static => BlockStrategy::Static,
            BlockStrategy::Dynamic => BlockStrategy::Dynamic,
            BlockStrategy::Auto => {
                let dynamic_bits =
                    3 + header.bit_cost() + token_bit_cost(tokens, &litlen_lengths, &dist_lengths);
                let static_bits = 3 + token_bit_cost(
                    tokens,
                    &fixed_litlen_lengths(),
                    &fixed_distance_lengths(),
                );
                let stored_blocks = raw.len().div_ceil(MAX_STORED_BLOCK).max(1) as u64;
                let stored_bits = 8 * (raw.len() as u64 + 5 * stored_blocks) + 7;

                if stored_bits < static_bits && stored_bits < dynamic_bits {
                    BlockStrategy::Stored
                } else if static_bits <= dynamic_bits {
                    BlockStrategy::Static
                } else {
                    BlockStrategy::Dynamic
                }
            }
        };

        match choice {
            BlockStrategy::Stored => self.write_stored_blocks(raw, writer, is_final),
            BlockStrategy::Static => Self::write_static_block(writer, tokens, is_final),
            _ => Self::write_dynamic_block(
                writer,
                tokens,
                &header,
                &litlen_lengths,
                &dist_lengths,
                is_final,
            ),
        }
    }

    /// Emit a static-tree block.
    fn write_static_block<W: Write>(
        writer: &mut BitWriter<W>,
        tokens: &[Lz77Token],
        is_final: bool,
    ) -> Result<()> {
        writer.write_bit(is_final)?;
        writer.write_bits(0b01, 2)?;

        let litlen_codes = assign_codes(&fixed_litlen_lengths());
        let dist_codes = assign_codes(&fixed_distance_lengths());

        write_tokens(writer, tokens, &litlen_codes, &dist_codes)
    }

    /// Emit a dynamic-tree block.
    fn write_dynamic_block<W: Write>(
        writer: &mut BitWriter<W>,
        tokens: &[Lz77Token],
        header: &DynamicHeader,
        litlen_lengths: &[u8],
        dist_lengths: &[u8],
        is_final: bool,
    ) -> Result<()> {
        writer.write_bit(is_final)?;
        writer.write_bits(0b10, 2)?;

        header.write(writer)?;

        let litlen_codes = assign_codes(litlen_lengths);
        let dist_codes = assign_codes(dist_lengths);

        write_tokens(writer, tokens, &litlen_codes, &dist_codes)
    }

    /// Compress a buffer into a fresh `Vec`.
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.deflate(data, &mut output, true)?;
        Ok(output)
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Compressor for Deflater {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, CompressStatus)> {
        if self.finished {
            return Ok((0, 0, CompressStatus::Done));
        }

        let finish = matches!(flush, FlushMode::Finish);

        let mut buffer = Vec::new();
        self.deflate(input, &mut buffer, finish)?;

        let to_copy = buffer.len().min(output.len());
        output[..to_copy].copy_from_slice(&buffer[..to_copy]);

        let status = if to_copy < buffer.len() {
            CompressStatus::NeedsOutput
        } else if finish {
            CompressStatus::Done
        } else {
            CompressStatus::NeedsInput
        };

        Ok((input.len(), to_copy, status))
    }

    fn reset(&mut self) {
        Deflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Compress a buffer with DEFLATE.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(level);
    deflater.compress_to_vec(data)
}

/// Compress a buffer by splitting it into independently compressed
/// segments processed in parallel.
///
/// Each segment is tokenized with its own dictionary and ends in a sync
/// flush, so the concatenation is a single valid DEFLATE stream; the last
/// segment carries BFINAL. Per-segment state is private, so no locking is
/// involved. Segment boundaries cost a little ratio since matches never
/// cross them.
#[cfg(feature = "parallel")]
pub fn deflate_parallel(data: &[u8], level: u8, segment_size: usize) -> Result<Vec<u8>> {
    use rayon::prelude::*;

    let segment_size = segment_size.max(1024);
    if data.len() <= segment_size {
        return deflate(data, level);
    }

    let segments: Vec<&[u8]> = data.chunks(segment_size).collect();
    let last = segments.len() - 1;

    let parts: Vec<Result<Vec<u8>>> = segments
        .par_iter()
        .enumerate()
        .map(|(i, segment)| {
            let mut deflater = Deflater::new(level);
            let mut out = Vec::new();
            deflater.deflate(segment, &mut out, i == last)?;
            Ok(out)
        })
        .collect();

    let mut output = Vec::new();
    for part in parts {
        output.extend_from_slice(&part?);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::inflate;

    #[test]
    fn test_deflate_stored() {
        let input = b"Hello, World!";
        let compressed = deflate(input, 0).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_deflate_empty() {
        for level in [0, 6] {
            let compressed = deflate(b"", level).unwrap();
            assert!(inflate(&compressed).unwrap().is_empty());
        }
    }

    #[test]
    fn test_deflate_compressible() {
        let input = b"AAAAAAAAAABBBBBBBBBBCCCCCCCCCCAAAAAAAAAABBBBBBBBBB";
        let compressed = deflate(input, 6).unwrap();

        assert!(compressed.len() < input.len());
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_deflate_roundtrip_levels() {
        let inputs: Vec<Vec<u8>> = vec![
            b"Hello".to_vec(),
            b"The quick brown fox jumps over the lazy dog".to_vec(),
            vec![0u8; 1000],
            (0..=255).collect(),
        ];

        for input in &inputs {
            for level in [0, 1, 6, 9] {
                let compressed = deflate(input, level).unwrap();
                let decompressed = inflate(&compressed).unwrap();
                assert_eq!(
                    &decompressed,
                    input,
                    "roundtrip failed at level {} with {} bytes",
                    level,
                    input.len()
                );
            }
        }
    }

    #[test]
    fn test_forced_strategies_roundtrip() {
        let input = b"abcabcabcabc, a string with some repetition in it";

        for strategy in [
            BlockStrategy::Stored,
            BlockStrategy::Static,
            BlockStrategy::Dynamic,
        ] {
            let mut deflater = Deflater::with_strategy(6, strategy);
            let compressed = deflater.compress_to_vec(input).unwrap();
            assert_eq!(
                inflate(&compressed).unwrap(),
                input,
                "strategy {:?} failed",
                strategy
            );
        }
    }

    #[test]
    fn test_three_literals_roundtrip() {
        // A trivial token source emitting three literals must produce a
        // block that decodes back to "aaa"
        let compressed = deflate(b"aaa", 6).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), b"aaa");
    }

    #[test]
    fn test_empty_token_list_single_block() {
        // An empty token list becomes one end-of-block-only block
        let mut deflater = Deflater::with_strategy(6, BlockStrategy::Static);
        let compressed = deflater.compress_to_vec(b"").unwrap();
        assert_eq!(compressed, vec![0x03, 0x00]);
        assert!(inflate(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_dynamic_beats_static_on_skewed_data() {
        // Long single-byte runs make the dynamic tree much cheaper
        let input = vec![b'z'; 4096];

        let compressed_auto = deflate(&input, 9).unwrap();
        let mut forced = Deflater::with_strategy(9, BlockStrategy::Static);
        let compressed_static = forced.compress_to_vec(&input).unwrap();

        assert!(compressed_auto.len() <= compressed_static.len());
        assert_eq!(inflate(&compressed_auto).unwrap(), input);
        assert_eq!(inflate(&compressed_static).unwrap(), input);
    }

    #[test]
    fn test_sync_flush_segments_concatenate() {
        let mut out = Vec::new();

        let mut first = Deflater::new(6);
        first.deflate(b"hello ", &mut out, false).unwrap();

        let mut second = Deflater::new(6);
        second.deflate(b"world", &mut out, true).unwrap();

        assert_eq!(inflate(&out).unwrap(), b"hello world");
    }

    #[test]
    fn test_large_roundtrip() {
        let mut input = Vec::with_capacity(300_000);
        let pattern = b"The quick brown fox jumps over the lazy dog. ";
        while input.len() < 300_000 {
            input.extend_from_slice(pattern);
        }

        let compressed = deflate(&input, 6).unwrap();
        assert!(compressed.len() < input.len() / 4);
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_deflate_parallel_roundtrip() {
        let mut input = Vec::new();
        for i in 0..100_000u32 {
            input.extend_from_slice(&(i % 251).to_le_bytes());
        }

        let compressed = deflate_parallel(&input, 6, 32768).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
    }

    #[test]
    fn test_scan_lengths_roundtrip() {
        // RLE ops re-expanded must reproduce the scanned array exactly
        let mut lengths = vec![0u8; 300];
        lengths[0] = 5;
        for len in lengths.iter_mut().take(40).skip(1) {
            *len = 7;
        }
        lengths[120] = 3;
        lengths[299] = 1;

        let (ops, freqs) = scan_lengths(&lengths);

        let mut expanded = Vec::new();
        for op in &ops {
            match op.symbol {
                0..=15 => expanded.push(op.symbol),
                16 => {
                    let prev = *expanded.last().unwrap();
                    for _ in 0..op.extra + 3 {
                        expanded.push(prev);
                    }
                }
                17 => {
                    for _ in 0..op.extra + 3 {
                        expanded.push(0);
                    }
                }
                _ => {
                    for _ in 0..u16::from(op.extra) + 11 {
                        expanded.push(0);
                    }
                }
            }
        }

        assert_eq!(expanded, lengths);

        // Tallied frequencies agree with the op stream
        for symbol in 0..CODELEN_ALPHABET_SIZE {
            let count = ops.iter().filter(|op| op.symbol as usize == symbol).count();
            assert_eq!(freqs[symbol], count as u32);
        }
    }
}
