//! Bit level access to byte streams, least significant bit first (as used by DEFLATE)

use error_derive::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum BitReaderError {
    #[msg = "unexpected end of input"]
    UnexpectedEOF,

    #[msg = "cannot read more than 32 bits at once"]
    TooLargeRead,
}

#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    byte_ptr: usize,
    bit_ptr: u8,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub const fn new(source: &'a [u8]) -> Self {
        Self {
            bytes: source,
            byte_ptr: 0,
            bit_ptr: 0,
        }
    }

    /// Skip the remaining bits in the current byte, if any
    pub fn align_to_byte_boundary(&mut self) {
        if self.bit_ptr != 0 {
            self.bit_ptr = 0;
            self.byte_ptr += 1;
        }
    }

    /// The number of bytes that were (at least partially) consumed
    #[must_use]
    pub fn num_consumed_bytes(&self) -> usize {
        if self.bit_ptr == 0 {
            self.byte_ptr
        } else {
            self.byte_ptr + 1
        }
    }

    pub fn read_single_bit(&mut self) -> Result<bool, BitReaderError> {
        let byte = *self
            .bytes
            .get(self.byte_ptr)
            .ok_or(BitReaderError::UnexpectedEOF)?;
        let bit = (byte >> self.bit_ptr) & 1 == 1;

        self.bit_ptr += 1;
        if self.bit_ptr == 8 {
            self.bit_ptr = 0;
            self.byte_ptr += 1;
        }

        Ok(bit)
    }

    /// Read `n` bits, the first bit read ends up in the least significant position
    pub fn read_bits(&mut self, n: u8) -> Result<u32, BitReaderError> {
        if n > 32 {
            return Err(BitReaderError::TooLargeRead);
        }

        let mut result = 0;
        for i in 0..n {
            if self.read_single_bit()? {
                result |= 1 << i;
            }
        }

        Ok(result)
    }

    /// Read a whole byte, the reader must be aligned to a byte boundary
    pub fn read_aligned_bytes(&mut self, n: usize) -> Result<&'a [u8], BitReaderError> {
        debug_assert_eq!(self.bit_ptr, 0);

        let bytes = self
            .bytes
            .get(self.byte_ptr..self.byte_ptr + n)
            .ok_or(BitReaderError::UnexpectedEOF)?;
        self.byte_ptr += n;
        Ok(bytes)
    }
}

/// Accumulates bits and packs them into bytes, least significant bit first
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    buffer: u64,
    num_buffered_bits: u8,
}

impl BitWriter {
    /// Write the lowest `n` bits of `value`
    pub fn write_bits(&mut self, value: u32, n: u8) {
        debug_assert!(n <= 32);

        let mask = if n == 32 { u32::MAX } else { (1 << n) - 1 };
        self.buffer |= ((value & mask) as u64) << self.num_buffered_bits;
        self.num_buffered_bits += n;

        while self.num_buffered_bits >= 8 {
            self.bytes.push(self.buffer as u8);
            self.buffer >>= 8;
            self.num_buffered_bits -= 8;
        }
    }

    /// Write a huffman code, which is stored starting with its most significant bit
    pub fn write_code(&mut self, code: u16, length: u8) {
        let reversed = code.reverse_bits() >> (16 - length as u32);
        self.write_bits(reversed as u32, length);
    }

    /// Pad the output with zero bits up to the next byte boundary
    pub fn align_to_byte_boundary(&mut self) {
        if self.num_buffered_bits != 0 {
            self.write_bits(0, 8 - self.num_buffered_bits);
        }
    }

    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte_boundary();
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitreader() {
        let bytes = [0b10010101, 0b00110011];
        let mut reader = BitReader::new(&bytes);

        assert_eq!(reader.read_bits(4), Ok(0b0101));
        assert_eq!(reader.read_bits(8), Ok(0b00111001));
        assert_eq!(reader.read_bits(4), Ok(0b0011));
        assert_eq!(reader.read_bits(1), Err(BitReaderError::UnexpectedEOF));
    }

    #[test]
    fn writer_matches_reader() {
        let mut writer = BitWriter::default();
        writer.write_bits(0b101, 3);
        writer.write_bits(0x1FF, 9);
        writer.write_code(0b110, 3);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3), Ok(0b101));
        assert_eq!(reader.read_bits(9), Ok(0x1FF));

        // Codes are stored most significant bit first
        assert_eq!(reader.read_single_bit(), Ok(true));
        assert_eq!(reader.read_single_bit(), Ok(true));
        assert_eq!(reader.read_single_bit(), Ok(false));
        assert_eq!(reader.num_consumed_bytes(), 2);
    }
}
