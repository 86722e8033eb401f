use super::Error;

/// Reads entropy coded data, most significant bit first
///
/// The data must already be unstuffed (`0xFF00` replaced by `0xFF`, restart markers removed).
pub struct BitReader<'a> {
    bytes: &'a [u8],

    /// Offset in bits
    offset: usize,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    #[inline]
    #[must_use]
    const fn byte_offset(&self) -> usize {
        self.offset >> 3
    }

    #[inline]
    #[must_use]
    const fn bit_offset(&self) -> u8 {
        (self.offset & 0b111) as u8
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u32 {
        self.bytes.get(index).copied().unwrap_or_default() as u32
    }

    /// Consume `bits` bits, fails if that moves past the end of the data
    pub fn advance(&mut self, bits: usize) -> Result<(), Error> {
        self.offset += bits;

        if self.bytes.len() * 8 < self.offset {
            log::error!("Entropy coded data ended unexpectedly");
            return Err(Error::UnexpectedEndOfScan);
        }

        Ok(())
    }

    /// Look at the next 16 bits in the stream (extending with zeros if necessary)
    ///
    /// Doesn't advance the internal reader
    #[must_use]
    pub fn peek_u16(&self) -> u16 {
        // We will at most need three bytes
        let index = self.byte_offset();
        let window =
            self.byte_at(index) << 16 | self.byte_at(index + 1) << 8 | self.byte_at(index + 2);

        (window >> (8 - self.bit_offset())) as u16
    }

    /// Read up to 16 bits as an unsigned integer
    pub fn read_bits(&mut self, n: u8) -> Result<u16, Error> {
        debug_assert!(n <= 16);

        if n == 0 {
            return Ok(0);
        }

        let value = ((self.peek_u16() as u32) >> (16 - n as u32)) as u16;
        self.advance(n as usize)?;
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool, Error> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read an `n` bit value and extend it to a signed coefficient (`EXTEND` in Figure F.12)
    pub fn receive_extend(&mut self, n: u8) -> Result<i32, Error> {
        if n == 0 {
            return Ok(0);
        }

        if n > 16 {
            return Err(Error::BadScan);
        }

        let value = self.read_bits(n)? as i32;
        if value < 1 << (n - 1) {
            Ok(value - (1 << n) + 1)
        } else {
            Ok(value)
        }
    }

    /// Skip the remaining bits of the current byte, used at restart intervals
    pub fn align_to_byte(&mut self) {
        self.offset = (self.offset + 7) & !7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_across_bytes() {
        let bytes = [0b1010_1010, 0b1100_1100, 0b1111_0000];
        let mut reader = BitReader::new(&bytes);

        assert_eq!(reader.peek_u16(), 0b1010_1010_1100_1100);
        reader.advance(3).unwrap();
        assert_eq!(reader.peek_u16(), 0b0_1010_1100_1100_111);
        reader.advance(13).unwrap();
        assert_eq!(reader.peek_u16(), 0b1111_0000_0000_0000);
    }

    #[test]
    fn signed_values() {
        // 3 bits: 0b011 -> -4, 0b110 -> 6
        let bytes = [0b0111_1000];
        let mut reader = BitReader::new(&bytes);

        assert_eq!(reader.receive_extend(3), Ok(-4));
        assert_eq!(reader.receive_extend(3), Ok(6));
        assert_eq!(reader.read_bits(3), Err(Error::UnexpectedEndOfScan));
    }

    #[test]
    fn alignment() {
        let bytes = [0xFF, 0x42];
        let mut reader = BitReader::new(&bytes);

        reader.read_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.read_bits(8), Ok(0x42));
    }
}
