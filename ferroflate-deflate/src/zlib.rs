//! zlib format wrapper for DEFLATE (RFC 1950).
//!
//! The zlib format frames raw DEFLATE data with a two-byte header and a
//! big-endian Adler-32 checksum of the uncompressed data:
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: CM (bits 0-3, must be 8 for DEFLATE) and CINFO (bits 4-7,
//!   log2(window size) - 8)
//! - FLG: FCHECK (bits 0-4, makes CMF*256+FLG divisible by 31), FDICT
//!   (bit 5), FLEVEL (bits 6-7)
//!
//! The codec core starts at the first DEFLATE block; this wrapper consumes
//! and produces the framing around it.

use crate::deflate::deflate;
use crate::inflate::inflate;
use ferroflate_core::error::{FlateError, Result};

/// Compression level indicator stored in the FLEVEL header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZlibLevel {
    /// Fastest compression.
    Fastest = 0,
    /// Fast compression.
    Fast = 1,
    /// Default compression.
    Default = 2,
    /// Maximum compression.
    Maximum = 3,
}

impl ZlibLevel {
    fn from_level(level: u8) -> Self {
        match level {
            0..=2 => Self::Fastest,
            3..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// Streaming Adler-32 checksum.
#[derive(Clone, Debug)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Bytes processed between modulo reductions.
const NMAX: usize = 5552;

impl Adler32 {
    /// Create a new checksum state.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Feed more data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        let mut remaining = data;
        while remaining.len() >= NMAX {
            let (chunk, rest) = remaining.split_at(NMAX);
            remaining = rest;

            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }

            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        for &byte in remaining {
            a += u32::from(byte);
            b += a;
        }

        self.a = a % ADLER_MOD;
        self.b = b % ADLER_MOD;
    }

    /// Finish and return the checksum.
    pub fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// One-shot checksum of a buffer.
    pub fn checksum(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finish()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress data into the zlib format.
///
/// # Example
///
/// ```
/// use ferroflate_deflate::zlib::{zlib_compress, zlib_decompress};
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = zlib_compress(data, 6).unwrap();
/// let decompressed = zlib_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    let level = level.min(9);
    let compressed = deflate(input, level)?;

    let mut output = Vec::with_capacity(6 + compressed.len());

    // CM=8 (DEFLATE), CINFO=7 (32 KiB window)
    let cmf: u8 = 0x78;

    let flevel = ZlibLevel::from_level(level) as u8;
    let flg_base = flevel << 6;
    let fcheck = {
        let base = u16::from(cmf) * 256 + u16::from(flg_base);
        let remainder = base % 31;
        if remainder == 0 {
            0
        } else {
            (31 - remainder) as u8
        }
    };
    let flg = flg_base | fcheck;

    output.push(cmf);
    output.push(flg);
    output.extend_from_slice(&compressed);
    output.extend_from_slice(&Adler32::checksum(input).to_be_bytes());

    Ok(output)
}

/// Decompress zlib format data, validating the header and checksum.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 6 {
        return Err(FlateError::malformed_header("zlib data too short"));
    }

    let cmf = input[0];
    let flg = input[1];

    if cmf & 0x0F != 8 {
        return Err(FlateError::malformed_header(format!(
            "unsupported compression method {}",
            cmf & 0x0F
        )));
    }

    if cmf >> 4 > 7 {
        return Err(FlateError::malformed_header("invalid window size"));
    }

    if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
        return Err(FlateError::malformed_header("zlib header check failed"));
    }

    if flg & 0x20 != 0 {
        return Err(FlateError::malformed_header(
            "preset dictionaries are not supported",
        ));
    }

    let deflate_data = &input[2..input.len() - 4];
    let decompressed = inflate(deflate_data)?;

    let stored = u32::from_be_bytes([
        input[input.len() - 4],
        input[input.len() - 3],
        input[input.len() - 2],
        input[input.len() - 1],
    ]);
    let computed = Adler32::checksum(&decompressed);
    if stored != computed {
        return Err(FlateError::checksum_mismatch(stored, computed));
    }

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(Adler32::checksum(b""), 1);
        assert_eq!(Adler32::checksum(b"Wikipedia"), 0x11E60398);
    }

    #[test]
    fn test_adler32_streaming_matches_oneshot() {
        let data = vec![0x5Au8; 20000];
        let mut streaming = Adler32::new();
        for chunk in data.chunks(777) {
            streaming.update(chunk);
        }
        assert_eq!(streaming.finish(), Adler32::checksum(&data));
    }

    #[test]
    fn test_zlib_roundtrip() {
        let data = b"Hello, World! Hello, World! Hello, World!";
        for level in [0, 1, 6, 9] {
            let compressed = zlib_compress(data, level).unwrap();
            assert_eq!(zlib_decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_zlib_header_is_valid() {
        let compressed = zlib_compress(b"test", 6).unwrap();
        assert_eq!(compressed[0] & 0x0F, 8);
        assert_eq!(
            (u16::from(compressed[0]) * 256 + u16::from(compressed[1])) % 31,
            0
        );
    }

    #[test]
    fn test_zlib_rejects_bad_method() {
        // CM=9, FCHECK fixed up so only the method is wrong
        let mut data = zlib_compress(b"x", 6).unwrap();
        data[0] = (data[0] & 0xF0) | 9;
        assert!(matches!(
            zlib_decompress(&data),
            Err(FlateError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_zlib_rejects_corrupt_checksum() {
        let mut compressed = zlib_compress(b"checksum me", 6).unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        assert!(matches!(
            zlib_decompress(&compressed),
            Err(FlateError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_zlib_too_short() {
        assert!(zlib_decompress(&[0x78, 0x9C]).is_err());
    }
}
