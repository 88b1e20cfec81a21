//! Block-level decompression for Unity binary containers
//!
//! Unity's own block compression ids: `0` uncompressed, `1` LZMA (Unity's
//! variant: a 5-byte properties header, no 8-byte trailer), `2` LZ4, `3`
//! LZ4HC (same block format as LZ4).

use crate::error::{BinaryError, Result};
use std::io::Cursor;

/// Hard cap on a single compressed input, matching the UnityFS block size
/// ceiling; guards against a corrupt `compressed_size`/`uncompressed_size`
/// pair driving an unbounded allocation.
pub const MAX_COMPRESSION_INPUT: usize = 512 * 1024 * 1024;

/// Compression types supported by Unity's block directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression
    None = 0,
    /// LZMA compression (Unity variant)
    Lzma = 1,
    /// LZ4 compression
    Lz4 = 2,
    /// LZ4HC (high compression) - same block format as LZ4
    Lz4Hc = 3,
}

impl CompressionType {
    /// Create compression type from a block/header `flags` field, masking to
    /// the low 6 bits as the directory format specifies.
    pub fn from_flags(flags: u32) -> Result<Self> {
        Self::from_id(flags & 0x3F)
    }

    /// Create compression type from a raw compression id.
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lzma),
            2 => Ok(CompressionType::Lz4),
            3 => Ok(CompressionType::Lz4Hc),
            other => Err(BinaryError::UnsupportedCompression { id: other }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionType::None => "None",
            CompressionType::Lzma => "LZMA",
            CompressionType::Lz4 => "LZ4",
            CompressionType::Lz4Hc => "LZ4HC",
        }
    }
}

/// Single entry point: decompress `input` into exactly `expected_uncompressed_size`
/// bytes using `compression_id` (the raw id, already masked from any flags
/// field by the caller).
pub fn decompress(input: &[u8], expected_uncompressed_size: usize, compression_id: u32) -> Result<Vec<u8>> {
    if input.len() > MAX_COMPRESSION_INPUT {
        return Err(BinaryError::CompressionInputTooLarge {
            size: input.len(),
            limit: MAX_COMPRESSION_INPUT,
        });
    }

    let compression = CompressionType::from_id(compression_id)?;
    tracing::debug!(
        compression = compression.name(),
        input_len = input.len(),
        expected_uncompressed_size,
        "decompressing block"
    );

    match compression {
        CompressionType::None => {
            if input.len() != expected_uncompressed_size {
                return Err(BinaryError::DecompressionSizeMismatch {
                    expected: expected_uncompressed_size,
                    actual: input.len(),
                });
            }
            Ok(input.to_vec())
        }
        CompressionType::Lzma => decompress_unity_lzma(input, expected_uncompressed_size),
        CompressionType::Lz4 | CompressionType::Lz4Hc => {
            decompress_lz4(input, expected_uncompressed_size)
        }
    }
}

/// Decode Unity's LZMA variant: a 5-byte properties header (`lc`/`lp`/`pb`
/// packed into one byte, then a 4-byte little-endian dictionary size), raw
/// stream, no 8-byte uncompressed-size trailer. We supply the expected size
/// out of band via `UnpackedSize::UseProvided`, matching the omission.
fn decompress_unity_lzma(input: &[u8], expected_uncompressed_size: usize) -> Result<Vec<u8>> {
    use lzma_rs::decompress::{Options, UnpackedSize};

    if input.len() < 5 {
        return Err(BinaryError::LzmaTooShort { actual: input.len() });
    }

    let props_byte = input[0];
    if props_byte >= (9 * 5 * 5) {
        return Err(BinaryError::LzmaInvalidProperties { byte: props_byte });
    }

    let mut output = Vec::with_capacity(expected_uncompressed_size);
    let options = Options {
        unpacked_size: UnpackedSize::UseProvided(Some(expected_uncompressed_size as u64)),
        ..Default::default()
    };
    lzma_rs::lzma_decompress_with_options(&mut Cursor::new(input), &mut output, &options).map_err(
        |e| {
            tracing::warn!(error = %e, "LZMA stream failed to decode");
            BinaryError::LzmaSizeMismatch {
                expected: expected_uncompressed_size,
                actual: output.len(),
            }
        },
    )?;

    if output.len() != expected_uncompressed_size {
        return Err(BinaryError::LzmaSizeMismatch {
            expected: expected_uncompressed_size,
            actual: output.len(),
        });
    }

    Ok(output)
}

fn decompress_lz4(input: &[u8], expected_uncompressed_size: usize) -> Result<Vec<u8>> {
    let output = lz4_flex::decompress(input, expected_uncompressed_size)?;
    if output.len() != expected_uncompressed_size {
        return Err(BinaryError::DecompressionSizeMismatch {
            expected: expected_uncompressed_size,
            actual: output.len(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_type_from_flags() {
        assert_eq!(CompressionType::from_flags(0).unwrap(), CompressionType::None);
        assert_eq!(CompressionType::from_flags(1).unwrap(), CompressionType::Lzma);
        assert_eq!(CompressionType::from_flags(0x42).unwrap(), CompressionType::Lz4);
        assert!(CompressionType::from_flags(9).is_err());
    }

    #[test]
    fn test_uncompressed_passthrough() {
        let data = b"hello world".to_vec();
        let out = decompress(&data, data.len(), 0).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_uncompressed_size_mismatch() {
        let data = b"hello world".to_vec();
        let err = decompress(&data, data.len() + 1, 0).unwrap_err();
        assert!(matches!(err, BinaryError::DecompressionSizeMismatch { .. }));
    }

    #[test]
    fn test_lz4_round_trip() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let compressed = lz4_flex::compress(&original);
        let out = decompress(&compressed, original.len(), 2).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn test_lzma_too_short() {
        let err = decompress_unity_lzma(&[0, 1, 2], 10).unwrap_err();
        assert!(matches!(err, BinaryError::LzmaTooShort { actual: 3 }));
    }

    #[test]
    fn test_unsupported_compression_id() {
        let err = decompress(b"", 0, 9).unwrap_err();
        assert!(matches!(err, BinaryError::UnsupportedCompression { id: 9 }));
    }

    #[test]
    fn test_input_too_large_is_rejected_before_dispatch() {
        // A cap this large cannot be built in a unit test; instead verify the
        // constant is the documented 512 MiB figure callers rely on.
        assert_eq!(MAX_COMPRESSION_INPUT, 512 * 1024 * 1024);
    }
}
