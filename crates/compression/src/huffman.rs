//! Canonical huffman codes, as described in [RFC 1951 Section 3.2.2](https://www.rfc-editor.org/rfc/rfc1951#section-3.2.2)
//!
//! For the purposes of this module, "Symbol" shall refer to an unencoded
//! codepoint and "Code" shall refer to an encoded codepoint.

use crate::bit_io::{BitReader, BitReaderError};

const MAX_CODE_LENGTH: usize = 15;

#[derive(Clone, Debug)]
pub struct HuffmanTree {
    /// The number of codes with each length
    counts: [u16; MAX_CODE_LENGTH + 1],

    /// All symbols that have a code, ordered by their code
    symbols: Vec<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HuffmanError {
    /// There are more codes of some length than can be represented
    OverSubscribed,
    CodeTooLong,
    SymbolNotFound,
    UnexpectedEOF,
}

impl From<BitReaderError> for HuffmanError {
    fn from(_: BitReaderError) -> Self {
        Self::UnexpectedEOF
    }
}

impl HuffmanTree {
    /// Build a tree where symbol `i` is assigned a code of length `lengths[i]`
    ///
    /// A length of zero means that the symbol does not occur.
    pub fn new_infer_codes_without_symbols(lengths: &[u8]) -> Result<Self, HuffmanError> {
        let mut counts = [0; MAX_CODE_LENGTH + 1];
        for &length in lengths {
            if MAX_CODE_LENGTH < length as usize {
                return Err(HuffmanError::CodeTooLong);
            }
            counts[length as usize] += 1;
        }
        counts[0] = 0;

        // Incomplete codes are allowed (a single distance code is legal), but
        // over-subscribed ones can never be decoded
        let mut left: i32 = 1;
        for count in &counts[1..] {
            left <<= 1;
            left -= *count as i32;
            if left < 0 {
                return Err(HuffmanError::OverSubscribed);
            }
        }

        let mut offsets = [0; MAX_CODE_LENGTH + 1];
        for length in 1..MAX_CODE_LENGTH {
            offsets[length + 1] = offsets[length] + counts[length];
        }

        let mut symbols = vec![0; lengths.len()];
        for (symbol, &length) in lengths.iter().enumerate() {
            if length != 0 {
                symbols[offsets[length as usize] as usize] = symbol as u16;
                offsets[length as usize] += 1;
            }
        }

        Ok(Self { counts, symbols })
    }

    /// Read bits until they form a valid code and return the associated symbol
    pub fn lookup_incrementally(&self, reader: &mut BitReader<'_>) -> Result<u16, HuffmanError> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for &count in &self.counts[1..] {
            code |= reader.read_single_bit()? as i32;
            let count = count as i32;

            if code - count < first {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }

            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(HuffmanError::SymbolNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitWriter;

    #[test]
    fn test_build_codes_by_length() {
        // Example 1 Section 3.2.2: A..H with lengths (3, 3, 3, 3, 3, 2, 4, 4)
        let lengths = [3, 3, 3, 3, 3, 2, 4, 4];
        let tree = HuffmanTree::new_infer_codes_without_symbols(&lengths).unwrap();

        let codes: [(u16, u8); 8] = [
            (0b010, 3),
            (0b011, 3),
            (0b100, 3),
            (0b101, 3),
            (0b110, 3),
            (0b00, 2),
            (0b1110, 4),
            (0b1111, 4),
        ];

        let mut writer = BitWriter::default();
        for (code, length) in codes {
            writer.write_code(code, length);
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        for expected_symbol in 0..8 {
            assert_eq!(tree.lookup_incrementally(&mut reader), Ok(expected_symbol));
        }
    }

    #[test]
    fn over_subscribed_lengths() {
        assert_eq!(
            HuffmanTree::new_infer_codes_without_symbols(&[1, 1, 1]).unwrap_err(),
            HuffmanError::OverSubscribed
        );
    }
}
