//! DEFLATE decompression (inflate).
//!
//! A block-oriented state machine over a bit stream: each block's preamble
//! selects stored, static-tree or dynamic-tree handling, the dynamic path
//! builds its decode tables from the transmitted code lengths, and token
//! emission walks the two-level tables until the end-of-block code.
//!
//! Tokens flow into a [`TokenSink`]; the default sink is the sliding
//! window, which resolves back-references and accumulates output bytes.
//! All failures are block-fatal: DEFLATE cannot resynchronize after an
//! invalid or truncated code.

use crate::decode_table::{
    CODELEN_ROOT_BITS, DISTANCE_ROOT_BITS, DecodeEntry, DecodeTable, LITLEN_ROOT_BITS, TableKind,
    build_table,
};
use crate::lz77::TokenSink;
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK,
    LITLEN_ALPHABET_SIZE, fixed_distance_table, fixed_litlen_table,
};
use ferroflate_core::error::{FlateError, Result};
use ferroflate_core::traits::{DecompressStatus, Decompressor};
use ferroflate_core::{BitReader, OutputWindow};
use std::io::Read;

/// Resolve one symbol through a two-level decode table.
///
/// Peeks the root index, chases a subtable pointer if the code is longer
/// than the root width, and consumes exactly the code's bits.
#[inline]
fn decode_symbol<R: Read>(reader: &mut BitReader<R>, table: &DecodeTable) -> Result<DecodeEntry> {
    let idx = reader.peek_bits_padded(table.root_bits())?;
    let mut here = table.entry(idx as usize);

    if here.is_pointer() {
        // Pointer entries consume the root bits, then the subtable is
        // indexed by the code's remaining bits
        reader.skip_bits(here.bits)?;
        let sub = reader.peek_bits_padded(here.op)?;
        here = table.entry(here.val as usize + sub as usize);
    }

    reader.skip_bits(here.bits)?;
    Ok(here)
}

/// Decode one block's token bodies into a sink.
///
/// Runs the token-emission loop against a literal/length table and a
/// distance table until the end-of-block code, failing on any entry
/// flagged invalid.
pub fn decode_block_tokens<R: Read, S: TokenSink>(
    reader: &mut BitReader<R>,
    litlen_table: &DecodeTable,
    dist_table: &DecodeTable,
    sink: &mut S,
) -> Result<()> {
    loop {
        let here = decode_symbol(reader, litlen_table)?;

        if here.is_literal() {
            sink.push_literal(here.val as u8)?;
        } else if here.is_base() {
            let extra = reader.read_bits(here.extra_bits())? as u16;
            let length = here.val + extra;

            let dist_here = decode_symbol(reader, dist_table)?;
            if !dist_here.is_base() {
                return Err(FlateError::invalid_code(reader.bit_position()));
            }
            let dist_extra = reader.read_bits(dist_here.extra_bits())? as u16;
            let distance = dist_here.val + dist_extra;

            sink.push_match(length, distance)?;
        } else if here.is_end_of_block() {
            return Ok(());
        } else {
            return Err(FlateError::invalid_code(reader.bit_position()));
        }
    }
}

/// DEFLATE decompressor.
#[derive(Debug)]
pub struct Inflater {
    /// Sliding window plus accumulated output.
    output: OutputWindow,
    /// Whether the final block's BFINAL bit has been seen.
    final_block: bool,
    /// Whether decompression is complete.
    finished: bool,
}

impl Inflater {
    /// Create a new DEFLATE decompressor.
    pub fn new() -> Self {
        Self {
            output: OutputWindow::with_capacity(65536),
            final_block: false,
            finished: false,
        }
    }

    /// Reset the decompressor for a fresh stream.
    pub fn reset(&mut self) {
        self.output.clear();
        self.final_block = false;
        self.finished = false;
    }

    /// Decompress a full stream from a reader.
    pub fn inflate_reader<R: Read>(&mut self, reader: &mut R) -> Result<Vec<u8>> {
        let mut bit_reader = BitReader::new(reader);
        self.inflate(&mut bit_reader)
    }

    /// Decompress a full stream from a bit reader.
    ///
    /// Processes blocks until one carries BFINAL.
    pub fn inflate<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<Vec<u8>> {
        while !self.final_block {
            self.inflate_block(reader)?;
        }

        self.finished = true;
        Ok(self.output.output().to_vec())
    }

    /// Decode one block: preamble, then the body by type.
    fn inflate_block<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        let bfinal = reader.read_bit()?;
        let btype = reader.read_bits(2)?;

        self.final_block = bfinal;

        match btype {
            0 => self.inflate_stored(reader),
            1 => self.inflate_static(reader),
            2 => self.inflate_dynamic(reader),
            _ => Err(FlateError::malformed_header("reserved block type 3")),
        }
    }

    /// Stored block: byte-align, LEN/~LEN, then verbatim bytes.
    fn inflate_stored<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        reader.align_to_byte();

        let len = reader.read_bits(16)? as u16;
        let nlen = reader.read_bits(16)? as u16;

        if len != !nlen {
            return Err(FlateError::malformed_header(format!(
                "stored block LEN/NLEN mismatch: {:#06x} vs {:#06x}",
                len, nlen
            )));
        }

        let mut buf = vec![0u8; len as usize];
        reader.read_bytes(&mut buf)?;
        self.output.write_literals(&buf);

        Ok(())
    }

    /// Static block: the fixed RFC 1951 tables, no table build.
    fn inflate_static<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        decode_block_tokens(
            reader,
            fixed_litlen_table(),
            fixed_distance_table(),
            &mut self.output,
        )
    }

    /// Dynamic block: read the code-length header, build the block's
    /// tables, then decode its tokens.
    fn inflate_dynamic<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        let hlit = reader.read_bits(5)? as usize + 257;
        let hdist = reader.read_bits(5)? as usize + 1;
        let hclen = reader.read_bits(4)? as usize + 4;

        if hlit > LITLEN_ALPHABET_SIZE || hdist > DISTANCE_ALPHABET_SIZE {
            return Err(FlateError::malformed_header(format!(
                "too many symbols: HLIT {} HDIST {}",
                hlit, hdist
            )));
        }

        // Code lengths for the code-length alphabet arrive in the fixed
        // permutation order, 3 bits each
        let mut codelen_lengths = [0u8; CODELEN_ALPHABET_SIZE];
        for &slot in CODE_LENGTH_ORDER.iter().take(hclen) {
            codelen_lengths[slot] = reader.read_bits(3)? as u8;
        }

        let codelen_table = build_table(&codelen_lengths, TableKind::CodeLength, CODELEN_ROOT_BITS)?;

        // Decode the combined literal/length + distance code lengths,
        // expanding the repeat codes 16/17/18
        let mut lengths = vec![0u8; hlit + hdist];
        let mut filled = 0;

        while filled < lengths.len() {
            let here = decode_symbol(reader, &codelen_table)?;
            if !here.is_literal() {
                return Err(FlateError::invalid_code(reader.bit_position()));
            }

            match here.val {
                0..=15 => {
                    lengths[filled] = here.val as u8;
                    filled += 1;
                }
                16 => {
                    if filled == 0 {
                        return Err(FlateError::malformed_header(
                            "repeat code with no previous length",
                        ));
                    }
                    let repeat = reader.read_bits(2)? as usize + 3;
                    let prev = lengths[filled - 1];
                    if filled + repeat > lengths.len() {
                        return Err(FlateError::malformed_header("code length run overflow"));
                    }
                    lengths[filled..filled + repeat].fill(prev);
                    filled += repeat;
                }
                17 => {
                    let repeat = reader.read_bits(3)? as usize + 3;
                    if filled + repeat > lengths.len() {
                        return Err(FlateError::malformed_header("code length run overflow"));
                    }
                    filled += repeat;
                }
                18 => {
                    let repeat = reader.read_bits(7)? as usize + 11;
                    if filled + repeat > lengths.len() {
                        return Err(FlateError::malformed_header("code length run overflow"));
                    }
                    filled += repeat;
                }
                _ => return Err(FlateError::invalid_code(reader.bit_position())),
            }
        }

        if lengths[END_OF_BLOCK as usize] == 0 {
            return Err(FlateError::malformed_header("missing end-of-block code"));
        }

        let litlen_table = build_table(&lengths[..hlit], TableKind::Literal, LITLEN_ROOT_BITS)?;
        let dist_table = build_table(&lengths[hlit..], TableKind::Distance, DISTANCE_ROOT_BITS)?;

        decode_block_tokens(reader, &litlen_table, &dist_table, &mut self.output)
    }

    /// The decoded output so far.
    pub fn output(&self) -> &[u8] {
        self.output.output()
    }

    /// Take ownership of the decoded output.
    pub fn into_output(self) -> Vec<u8> {
        self.output.into_output()
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for Inflater {
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, DecompressStatus)> {
        if self.finished {
            return Ok((0, 0, DecompressStatus::Done));
        }

        let mut cursor = std::io::Cursor::new(input);
        let result = self.inflate_reader(&mut cursor)?;

        let consumed = cursor.position() as usize;
        let to_copy = result.len().min(output.len());
        output[..to_copy].copy_from_slice(&result[..to_copy]);

        Ok((consumed, to_copy, DecompressStatus::Done))
    }

    fn reset(&mut self) {
        Inflater::reset(self);
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Decompress a DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new();
    let mut cursor = std::io::Cursor::new(data);
    inflater.inflate_reader(&mut cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_stored() {
        // BFINAL=1, BTYPE=00, aligned LEN=5 / NLEN, then "Hello"
        let compressed = vec![
            0x01, // BFINAL=1, BTYPE=00, padding
            0x05, 0x00, // LEN=5
            0xFA, 0xFF, // NLEN
            b'H', b'e', b'l', b'l', b'o',
        ];

        assert_eq!(inflate(&compressed).unwrap(), b"Hello");
    }

    #[test]
    fn test_inflate_empty_stored() {
        let compressed = vec![0x01, 0x00, 0x00, 0xFF, 0xFF];
        assert!(inflate(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_stored_len_mismatch() {
        let compressed = vec![0x01, 0x05, 0x00, 0x00, 0x00, b'H'];
        assert!(matches!(
            inflate(&compressed),
            Err(FlateError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_inflate_static_empty() {
        // BFINAL=1, BTYPE=01, then the 7-bit end-of-block code: the
        // canonical empty fixed-Huffman stream
        let compressed = vec![0x03, 0x00];
        assert!(inflate(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_static_single_literal() {
        // Fixed-Huffman encoding of "a": reference encoders produce
        // exactly these bytes
        let compressed = vec![0x4B, 0x04, 0x00];
        assert_eq!(inflate(&compressed).unwrap(), b"a");
    }

    #[test]
    fn test_inflate_reserved_btype() {
        // BFINAL=1, BTYPE=11
        let compressed = vec![0x07, 0x00];
        assert!(matches!(
            inflate(&compressed),
            Err(FlateError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_inflate_truncated() {
        // Stored header promising 5 bytes, delivering 2
        let compressed = vec![0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e'];
        assert!(matches!(
            inflate(&compressed),
            Err(FlateError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn test_inflate_multiple_stored_blocks() {
        let compressed = vec![
            0x00, // BFINAL=0, BTYPE=00
            0x02, 0x00, 0xFD, 0xFF, b'a', b'b', // first block "ab"
            0x01, // BFINAL=1, BTYPE=00
            0x01, 0x00, 0xFE, 0xFF, b'c', // final block "c"
        ];
        assert_eq!(inflate(&compressed).unwrap(), b"abc");
    }
}
