//! Big-endian field getters over byte slices.
//!
//! Every getter is bounds-checked and returns [`RangeError`] instead of
//! panicking, so parsers can use `?` from the innermost loop up to the
//! per-file entry point.

use crate::utils::errors::RangeError;

#[inline(always)]
fn field<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], RangeError> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|s| s.try_into().ok())
        .ok_or(RangeError::Bytes {
            offset,
            width: N,
            len: buf.len(),
        })
}

#[inline(always)]
pub fn get_byte(buf: &[u8], offset: usize) -> Result<u8, RangeError> {
    field::<1>(buf, offset).map(|b| b[0])
}

#[inline(always)]
pub fn get_word(buf: &[u8], offset: usize) -> Result<u16, RangeError> {
    field::<2>(buf, offset).map(u16::from_be_bytes)
}

#[inline(always)]
pub fn get_dword(buf: &[u8], offset: usize) -> Result<u32, RangeError> {
    field::<4>(buf, offset).map(u32::from_be_bytes)
}

#[inline(always)]
pub fn get_qword(buf: &[u8], offset: usize) -> Result<u64, RangeError> {
    field::<8>(buf, offset).map(u64::from_be_bytes)
}

/// Fixed-length Latin-1 text, one `char` per byte.
pub fn get_string(buf: &[u8], offset: usize, length: usize) -> Result<String, RangeError> {
    offset
        .checked_add(length)
        .and_then(|end| buf.get(offset..end))
        .map(|s| s.iter().map(|&b| b as char).collect())
        .ok_or(RangeError::Bytes {
            offset,
            width: length,
            len: buf.len(),
        })
}

/// Extracts `num_bits` bits ending at `first_bit`, where bit 32 is the MSB
/// of the 32-bit field and bit 1 its LSB.
///
/// When `num_bits == 32` the value is returned as is.
#[inline(always)]
pub fn get_bits(value: u32, first_bit: u32, num_bits: u32) -> Result<u32, RangeError> {
    check_field(first_bit, num_bits, 32)?;
    if num_bits == 32 {
        return Ok(value);
    }
    Ok((value >> (first_bit - num_bits)) & ((1 << num_bits) - 1))
}

/// 64-bit counterpart of [`get_bits`]; bit 64 is the MSB.
#[inline(always)]
pub fn get_bits64(value: u64, first_bit: u32, num_bits: u32) -> Result<u64, RangeError> {
    check_field(first_bit, num_bits, 64)?;
    if num_bits == 64 {
        return Ok(value);
    }
    Ok((value >> (first_bit - num_bits)) & ((1 << num_bits) - 1))
}

#[inline(always)]
fn check_field(first_bit: u32, num_bits: u32, field_width: u32) -> Result<(), RangeError> {
    if num_bits == 0 || first_bit > field_width || first_bit < num_bits {
        return Err(RangeError::BitField {
            first_bit,
            num_bits,
            field_width,
        });
    }
    Ok(())
}

/// Position of the first occurrence of `pattern` in `buf` at or after `from`.
pub fn find(buf: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    if pattern.is_empty() || from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|p| p + from)
}
