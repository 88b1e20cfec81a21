//! Binary data reader for Unity file formats

use crate::error::{BinaryError, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Maximum length of a NUL-terminated UTF-8 string scan before giving up.
pub const DEFAULT_MAX_STRING_LEN: usize = 1024 * 1024;

/// Strings shorter than this are scanned onto the stack before being copied
/// into the returned `String`, avoiding a heap allocation for the common case.
const STACK_SCAN_THRESHOLD: usize = 8 * 1024;

/// Byte order for reading binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Big endian (network byte order)
    Big,
    /// Little endian (most common on x86/x64)
    #[default]
    Little,
}

/// Pure helper: bytes needed to advance `offset` to the next multiple of
/// `alignment`. Returns 0 when already aligned. `alignment` must be a power
/// of two and non-zero, or the offset is not validated and is zero-padded to
/// the caller's default; callers needing enforcement should use `align_to`.
pub fn calculate_padding(offset: u64, alignment: u64) -> Result<u64> {
    if alignment == 0 || !alignment.is_power_of_two() {
        return Err(BinaryError::invalid_argument(format!(
            "alignment must be a non-zero power of two, got {alignment}"
        )));
    }
    Ok((alignment - offset % alignment) % alignment)
}

/// Binary reader for Unity file formats
pub struct BinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
    byte_order: ByteOrder,
}

impl<'a> BinaryReader<'a> {
    /// Create a new binary reader from byte slice
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        Self {
            cursor: Cursor::new(data),
            byte_order,
        }
    }

    /// Get current position in the stream
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Set position in the stream
    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        self.cursor.set_position(pos);
        Ok(())
    }

    /// Seek to a position relative to the current position
    pub fn seek(&mut self, offset: i64) -> Result<u64> {
        Ok(self.cursor.seek(SeekFrom::Current(offset))?)
    }

    /// Get the total length of the data
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// Check if the reader is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    /// Check if we have at least `count` bytes remaining
    pub fn has_bytes(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    fn require_bytes(&self, count: usize) -> Result<()> {
        if !self.has_bytes(count) {
            return Err(BinaryError::out_of_bounds(format!(
                "need {count} bytes at offset {}, only {} remaining",
                self.position(),
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Align to the next 4-byte boundary
    pub fn align(&mut self) -> Result<()> {
        self.align_to(4, false)
    }

    /// Align to the specified byte boundary. `alignment` must be a power of
    /// two. When `validate_padding` is set, every skipped byte must be zero
    /// or `AlignmentValidationError` is returned.
    pub fn align_to(&mut self, alignment: u64, validate_padding: bool) -> Result<()> {
        let pos = self.position();
        let padding = calculate_padding(pos, alignment)?;
        if padding == 0 {
            return Ok(());
        }
        if validate_padding {
            let bytes = self.read_bytes(padding as usize)?;
            if let Some(&bad) = bytes.iter().find(|&&b| b != 0) {
                return Err(BinaryError::AlignmentValidationError {
                    offset: pos,
                    byte: bad,
                });
            }
        } else {
            self.set_position(pos + padding)?;
        }
        Ok(())
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require_bytes(1)?;
        Ok(self.cursor.read_u8()?)
    }

    /// Read a boolean (as u8, 0 = false, non-zero = true)
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a signed 8-bit integer
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an unsigned 16-bit integer
    pub fn read_u16(&mut self) -> Result<u16> {
        self.require_bytes(2)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u16::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u16::<LittleEndian>()?),
        }
    }

    /// Read a signed 16-bit integer
    pub fn read_i16(&mut self) -> Result<i16> {
        self.require_bytes(2)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_i16::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_i16::<LittleEndian>()?),
        }
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32(&mut self) -> Result<u32> {
        self.require_bytes(4)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u32::<LittleEndian>()?),
        }
    }

    /// Read a signed 32-bit integer
    pub fn read_i32(&mut self) -> Result<i32> {
        self.require_bytes(4)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_i32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_i32::<LittleEndian>()?),
        }
    }

    /// Read an unsigned 64-bit integer
    pub fn read_u64(&mut self) -> Result<u64> {
        self.require_bytes(8)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_u64::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_u64::<LittleEndian>()?),
        }
    }

    /// Read a signed 64-bit integer
    pub fn read_i64(&mut self) -> Result<i64> {
        self.require_bytes(8)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_i64::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_i64::<LittleEndian>()?),
        }
    }

    /// Read a 32-bit floating point number
    pub fn read_f32(&mut self) -> Result<f32> {
        self.require_bytes(4)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_f32::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_f32::<LittleEndian>()?),
        }
    }

    /// Read a 64-bit floating point number
    pub fn read_f64(&mut self) -> Result<f64> {
        self.require_bytes(8)?;
        match self.byte_order {
            ByteOrder::Big => Ok(self.cursor.read_f64::<BigEndian>()?),
            ByteOrder::Little => Ok(self.cursor.read_f64::<LittleEndian>()?),
        }
    }

    /// Read a fixed number of bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.require_bytes(count)?;
        let mut buffer = vec![0u8; count];
        self.cursor.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Bounded slice access without advancing the cursor.
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        self.require_bytes(count)?;
        let pos = self.position() as usize;
        Ok(&self.cursor.get_ref()[pos..pos + count])
    }

    /// Read all remaining bytes
    pub fn read_remaining(&mut self) -> &[u8] {
        let pos = self.cursor.position() as usize;
        let data = self.cursor.get_ref();
        &data[pos..]
    }

    /// Read a NUL-terminated UTF-8 string, failing with `StringTooLong` if no
    /// terminator appears within `max_len` bytes, or `OutOfBounds` if the
    /// stream ends first.
    pub fn read_utf8_nul_terminated(&mut self, max_len: usize) -> Result<String> {
        let start = self.position() as usize;
        let data = self.cursor.get_ref();

        if start >= data.len() {
            return Err(BinaryError::out_of_bounds(
                "stream exhausted before a NUL terminator was found",
            ));
        }

        let scan_limit = data.len().min(start + max_len + 1);
        let window = &data[start..scan_limit];

        match window.iter().position(|&b| b == 0) {
            Some(nul_pos) => {
                let bytes = &window[..nul_pos];
                self.set_position((start + nul_pos + 1) as u64)?;
                if bytes.len() < STACK_SCAN_THRESHOLD {
                    let mut stack_buf = [0u8; STACK_SCAN_THRESHOLD];
                    stack_buf[..bytes.len()].copy_from_slice(bytes);
                    std::str::from_utf8(&stack_buf[..bytes.len()])
                        .map(|s| s.to_string())
                        .map_err(|e| BinaryError::Utf8DecodingError {
                            offset: start as u64,
                            message: e.to_string(),
                        })
                } else {
                    String::from_utf8(bytes.to_vec()).map_err(|e| {
                        BinaryError::Utf8DecodingError {
                            offset: start as u64,
                            message: e.to_string(),
                        }
                    })
                }
            }
            None if scan_limit - start > max_len => Err(BinaryError::StringTooLong { max_len }),
            None => Err(BinaryError::out_of_bounds(
                "stream exhausted before a NUL terminator was found",
            )),
        }
    }

    /// Read a NUL-terminated C string with the default 1 MiB limit.
    pub fn read_cstring(&mut self) -> Result<String> {
        self.read_utf8_nul_terminated(DEFAULT_MAX_STRING_LEN)
    }

    /// Read a `u32` length prefix (in the reader's endianness) followed by
    /// that many bytes, decoded as UTF-8. Callers align afterward when the
    /// format requires it (see `read_aligned_string`).
    pub fn read_length_prefixed_string(&mut self) -> Result<String> {
        let offset = self.position();
        let length = self.read_u32()? as usize;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|e| BinaryError::Utf8DecodingError {
            offset,
            message: e.to_string(),
        })
    }

    /// Length-prefixed string followed by 4-byte alignment (Unity's common
    /// "aligned string" wire shape).
    pub fn read_aligned_string(&mut self) -> Result<String> {
        let string = self.read_length_prefixed_string()?;
        self.align()?;
        Ok(string)
    }

    /// Get the current byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Set the byte order
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Get a slice of the remaining data
    pub fn remaining_slice(&self) -> &'a [u8] {
        let pos = self.position() as usize;
        &self.cursor.get_ref()[pos..]
    }

    /// Create a new reader for a subset of the data
    pub fn sub_reader(&self, offset: usize, length: usize) -> Result<BinaryReader<'a>> {
        let data = self.cursor.get_ref();
        if offset + length > data.len() {
            return Err(BinaryError::out_of_bounds(format!(
                "sub_reader range {}..{} exceeds buffer length {}",
                offset,
                offset + length,
                data.len()
            )));
        }
        Ok(BinaryReader::new(
            &data[offset..offset + length],
            self.byte_order,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_reading() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];

        let mut reader_le = BinaryReader::new(&data, ByteOrder::Little);
        assert_eq!(reader_le.read_u32().unwrap(), 0x04030201);

        let mut reader_be = BinaryReader::new(&data, ByteOrder::Big);
        assert_eq!(reader_be.read_u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_string_reading() {
        let data = b"Hello\0World\0";
        let mut reader = BinaryReader::new(data, ByteOrder::Little);

        assert_eq!(reader.read_cstring().unwrap(), "Hello");
        assert_eq!(reader.read_cstring().unwrap(), "World");
    }

    #[test]
    fn test_alignment() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);

        reader.read_u8().unwrap(); // pos = 1
        reader.align().unwrap(); // pos = 4
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_calculate_padding() {
        assert_eq!(calculate_padding(1, 4).unwrap(), 3);
        assert_eq!(calculate_padding(4, 4).unwrap(), 0);
        assert!(calculate_padding(1, 3).is_err());
        assert!(calculate_padding(1, 0).is_err());
    }

    #[test]
    fn test_align_to_validate_padding() {
        let data = [0x01, 0x00, 0x00, 0x00];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        reader.read_u8().unwrap();
        reader.align_to(4, true).unwrap();
        assert_eq!(reader.position(), 4);

        let bad = [0x01, 0x00, 0xFF, 0x00];
        let mut reader = BinaryReader::new(&bad, ByteOrder::Little);
        reader.read_u8().unwrap();
        let err = reader.align_to(4, true).unwrap_err();
        assert!(matches!(err, BinaryError::AlignmentValidationError { .. }));
    }

    #[test]
    fn test_utf8_scan() {
        let data = [0x41, 0x00, 0x42, 0x00];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        let s = reader.read_utf8_nul_terminated(1024).unwrap();
        assert_eq!(s, "A");
        assert_eq!(reader.position(), 2);

        let no_terminator = [0x48, 0x69];
        let mut reader = BinaryReader::new(&no_terminator, ByteOrder::Little);
        let err = reader.read_utf8_nul_terminated(1024).unwrap_err();
        assert!(matches!(err, BinaryError::OutOfBounds { .. }));
    }

    #[test]
    fn test_string_too_long() {
        let data = vec![b'a'; 10];
        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        let err = reader.read_utf8_nul_terminated(4).unwrap_err();
        assert!(matches!(err, BinaryError::StringTooLong { max_len: 4 }));
    }
}
