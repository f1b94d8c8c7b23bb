//! Bit cursor over a byte slice.
//!
//! Wraps the `bitstream-io` big-endian reader with an explicit bit length so
//! every read is checked against the end of the slice before it happens and
//! fails with [`RangeError`].

use std::io::Cursor;

use bitstream_io::{BigEndian, BitRead};

use crate::utils::errors::RangeError;

#[derive(Debug)]
pub struct BitReader<'a> {
    bs: bitstream_io::BitReader<Cursor<&'a [u8]>, BigEndian>,
    pos: u64,
    len: u64,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            bs: bitstream_io::BitReader::new(Cursor::new(buf)),
            pos: 0,
            len: (buf.len() as u64) << 3,
        }
    }

    #[inline(always)]
    fn reserve(&mut self, n: u32) -> Result<(), RangeError> {
        if self.available() < n as u64 {
            return Err(RangeError::Bits {
                position: self.pos,
                width: n,
                len: self.len,
            });
        }
        self.pos += n as u64;
        Ok(())
    }

    #[inline(always)]
    fn io_err(&self, n: u32) -> RangeError {
        RangeError::Bits {
            position: self.pos,
            width: n,
            len: self.len,
        }
    }

    /// Reads up to 32 bits as an unsigned big-endian value.
    #[inline(always)]
    pub fn read_bits(&mut self, n: u32) -> Result<u32, RangeError> {
        if n > 32 {
            return Err(self.io_err(n));
        }
        if n == 0 {
            return Ok(0);
        }
        self.reserve(n)?;
        self.bs
            .read_var::<u32>(n)
            .map_err(|_| self.io_err(n))
    }

    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<bool, RangeError> {
        self.reserve(1)?;
        self.bs.read_bit().map_err(|_| self.io_err(1))
    }

    #[inline(always)]
    pub fn skip_bits(&mut self, n: u32) -> Result<(), RangeError> {
        if n == 0 {
            return Ok(());
        }
        self.reserve(n)?;
        self.bs.skip(n).map_err(|_| self.io_err(n))
    }

    /// Unsigned Exp-Golomb code.
    pub fn read_ue(&mut self) -> Result<u32, RangeError> {
        let mut zeros = 0;
        while !self.read_bit()? {
            zeros += 1;
            if zeros > 31 {
                return Err(RangeError::ExpGolomb(zeros));
            }
        }
        if zeros == 0 {
            return Ok(0);
        }
        Ok((1u32 << zeros) - 1 + self.read_bits(zeros)?)
    }

    /// Unsigned Exp-Golomb code for a syntax element bounded by `max`.
    pub fn read_ue_max(&mut self, name: &'static str, max: u32) -> Result<u32, RangeError> {
        let value = self.read_ue()?;
        if value > max {
            return Err(RangeError::SyntaxElement { name, value, max });
        }
        Ok(value)
    }

    #[inline(always)]
    pub fn skip_ue(&mut self) -> Result<(), RangeError> {
        self.read_ue().map(|_| ())
    }

    /// Signed Exp-Golomb code: odd codes are positive, even codes negative.
    pub fn read_se(&mut self) -> Result<i32, RangeError> {
        let code = self.read_ue()? as i64;
        let value = if code & 1 == 1 {
            (code + 1) / 2
        } else {
            -(code / 2)
        };
        Ok(value as i32)
    }

    #[inline(always)]
    pub fn skip_se(&mut self) -> Result<(), RangeError> {
        self.read_se().map(|_| ())
    }

    pub fn byte_align(&mut self) {
        self.bs.byte_align();
        self.pos = (self.pos + 7) & !7;
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[inline(always)]
    pub fn available(&self) -> u64 {
        self.len - self.pos
    }
}
