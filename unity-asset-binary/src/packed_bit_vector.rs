//! Reconstruction of Unity's tightly packed integer/float arrays
//!
//! `PackedBitVector` stores `num_items` fixed-width values (`bit_size` bits
//! each, LSB-first) back to back in `data`, along with the `range`/`start`
//! needed to rescale them back into floats.

use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;

/// A packed integer/float array as it appears on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedBitVector {
    pub num_items: u32,
    pub range: f32,
    pub start: f32,
    pub data: Vec<u8>,
    /// `None` means "unset" (wire value 0).
    pub bit_size: Option<u8>,
}

impl PackedBitVector {
    /// Read the wire format: `num_items: u32`, `range: f32`, `start: f32`,
    /// `data_length: i32` (read signed per the donor's Open Question
    /// decision — negative is malformed), `data: u8[data_length]`, 4-byte
    /// alignment, `bit_size: u8`, 3-byte alignment.
    pub fn from_reader(reader: &mut BinaryReader) -> Result<Self> {
        let num_items = reader.read_u32()?;
        let range = reader.read_f32()?;
        let start = reader.read_f32()?;

        let data_length = reader.read_i32()?;
        if data_length < 0 {
            return Err(BinaryError::invalid_argument(format!(
                "PackedBitVector data_length is negative: {data_length}"
            )));
        }
        let data = reader.read_bytes(data_length as usize)?;
        reader.align_to(4, false)?;

        let bit_size_byte = reader.read_u8()?;
        reader.align_to(4, false)?;

        Ok(Self {
            num_items,
            range,
            start,
            data,
            bit_size: if bit_size_byte == 0 {
                None
            } else {
                Some(bit_size_byte)
            },
        })
    }

    fn bit_size(&self) -> Result<u32> {
        self.bit_size.map(|b| b as u32).ok_or(BinaryError::BitSizeUnset)
    }

    fn read_packed_bits(&self, start_index: u32, count: u32) -> Result<Vec<u32>> {
        let bit_size = self.bit_size()?;
        let mut values = Vec::with_capacity(count as usize);
        let mut bit_index = start_index as u64 * bit_size as u64;

        for _ in 0..count {
            let mut value: u32 = 0;
            for i in 0..bit_size {
                let byte_idx = (bit_index / 8) as usize;
                let bit_in_byte = (bit_index % 8) as u32;
                let byte = *self.data.get(byte_idx).ok_or_else(|| {
                    BinaryError::out_of_bounds(format!(
                        "PackedBitVector read past end of data at bit {bit_index}"
                    ))
                })?;
                let bit = (byte >> bit_in_byte) & 1;
                value |= (bit as u32) << i;
                bit_index += 1;
            }
            values.push(value);
        }

        Ok(values)
    }

    /// Unpack `count` integers starting at `start_index`, `bit_size` bits
    /// each, LSB-first across bytes. Fails with `BitSizeUnset` when
    /// `bit_size` is unset.
    pub fn unpack_ints(&self, start_index: u32, count: u32) -> Result<Vec<u32>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.read_packed_bits(start_index, count)
    }

    /// Unpack `count` floats starting at `start_index`. When `bit_size` is
    /// unset, returns `count` copies of `start` (a constant-value vector).
    /// Otherwise each integer `v` is rescaled to
    /// `v * range / (2^bit_size - 1) + start`.
    pub fn unpack_floats(&self, start_index: u32, count: u32) -> Result<Vec<f32>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let Some(bit_size) = self.bit_size else {
            return Ok(vec![self.start; count as usize]);
        };
        let max_value = ((1u64 << bit_size as u32) - 1) as f32;
        let scale = self.range / max_value;
        let ints = self.read_packed_bits(start_index, count)?;
        Ok(ints
            .into_iter()
            .map(|v| v as f32 * scale + self.start)
            .collect())
    }

    /// Convenience: unpack all items as integers.
    pub fn unpack_all_ints(&self) -> Result<Vec<u32>> {
        self.unpack_ints(0, self.num_items)
    }

    /// Convenience: unpack all items as floats.
    pub fn unpack_all_floats(&self) -> Result<Vec<f32>> {
        self.unpack_floats(0, self.num_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(num_items: u32, range: f32, start: f32, bit_size: u8, data: Vec<u8>) -> PackedBitVector {
        PackedBitVector {
            num_items,
            range,
            start,
            data,
            bit_size: Some(bit_size),
        }
    }

    #[test]
    fn test_unpack_ints_two_bit() {
        let v = vector(4, 10.0, -5.0, 2, vec![0xE4]);
        assert_eq!(v.unpack_all_ints().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_unpack_floats_two_bit() {
        let v = vector(4, 10.0, -5.0, 2, vec![0xE4]);
        let floats = v.unpack_all_floats().unwrap();
        let expected = [-5.0_f32, -1.6667, 1.6667, 5.0];
        for (a, b) in floats.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} != {b}");
        }
    }

    #[test]
    fn test_unpack_single_bit_pattern() {
        // bit pattern "10101010" read LSB-first is 0xAA.
        let v = vector(8, 1.0, 0.0, 1, vec![0xAA]);
        assert_eq!(
            v.unpack_all_ints().unwrap(),
            vec![0, 1, 0, 1, 0, 1, 0, 1]
        );
        assert_eq!(
            v.unpack_all_floats().unwrap(),
            vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_zero_items_no_reads() {
        let v = vector(0, 1.0, 0.0, 4, vec![]);
        assert_eq!(v.unpack_ints(0, 0).unwrap(), Vec::<u32>::new());
        assert_eq!(v.unpack_floats(0, 0).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_bit_size_unset_fails() {
        let v = PackedBitVector {
            num_items: 4,
            range: 1.0,
            start: 0.0,
            data: vec![0, 0],
            bit_size: None,
        };
        assert!(matches!(
            v.unpack_ints(0, 1).unwrap_err(),
            BinaryError::BitSizeUnset
        ));
        // floats fall back to a constant vector of `start` rather than erroring.
        assert_eq!(v.unpack_floats(0, 3).unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unset_bit_size_byte_parses_as_none() {
        let mut reader_data = Vec::new();
        reader_data.extend_from_slice(&3u32.to_le_bytes()); // num_items
        reader_data.extend_from_slice(&1.0f32.to_le_bytes()); // range
        reader_data.extend_from_slice(&0.0f32.to_le_bytes()); // start
        reader_data.extend_from_slice(&2i32.to_le_bytes()); // data_length
        reader_data.extend_from_slice(&[0xAB, 0xCD]); // data
        reader_data.extend_from_slice(&[0, 0]); // align to 4
        reader_data.push(0); // bit_size = 0 (unset)
        reader_data.extend_from_slice(&[0, 0, 0]); // align to 4

        let mut reader = BinaryReader::new(&reader_data, crate::reader::ByteOrder::Little);
        let pbv = PackedBitVector::from_reader(&mut reader).unwrap();
        assert_eq!(pbv.bit_size, None);
        assert_eq!(pbv.data, vec![0xAB, 0xCD]);
    }
}
