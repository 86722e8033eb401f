//! [DEFLATE](https://www.rfc-editor.org/rfc/rfc1951) compression and decompression

use crate::{
    bit_io::{BitReader, BitReaderError, BitWriter},
    huffman::{HuffmanError, HuffmanTree},
};

use error_derive::Error;

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "reserved block type"]
    ReservedCompressionScheme,

    #[msg = "unexpected end of input"]
    UnexpectedEOF,

    #[msg = "invalid huffman code"]
    SymbolNotFound,

    #[msg = "huffman code lengths are over-subscribed"]
    InvalidCodeLengths,

    #[msg = "code length repeat without a previous length"]
    RLELeadingRepeatValue,

    #[msg = "code length repeat exceeds the number of codes"]
    RLEExceedsExpectedLength,

    #[msg = "stored block length does not match its complement"]
    InvalidUncompressedBlockLength,

    #[msg = "invalid length symbol"]
    InvalidLengthSymbol,

    #[msg = "invalid distance symbol"]
    InvalidDistanceSymbol,

    #[msg = "back reference points before the start of the output"]
    DistanceTooFarBack,
}

impl From<BitReaderError> for Error {
    fn from(_: BitReaderError) -> Self {
        Self::UnexpectedEOF
    }
}

impl From<HuffmanError> for Error {
    fn from(value: HuffmanError) -> Self {
        match value {
            HuffmanError::UnexpectedEOF => Self::UnexpectedEOF,
            HuffmanError::SymbolNotFound => Self::SymbolNotFound,
            HuffmanError::OverSubscribed | HuffmanError::CodeTooLong => Self::InvalidCodeLengths,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum CompressionScheme {
    Uncompressed,
    FixedHuffmanCodes,
    DynamicHuffmanCodes,
    Reserved,
}

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

const CODE_LENGTH_ALPHABET: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const END_OF_BLOCK: u16 = 256;

fn fixed_literal_lengths() -> [u8; 288] {
    let mut lengths = [8; 288];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Returns a tuple of `(decompressed_bytes, num_consumed_compressed_bytes)` on success
pub fn decompress(source: &[u8]) -> Result<(Vec<u8>, usize), Error> {
    let mut reader = BitReader::new(source);
    let mut output_stream = vec![];

    let default_lit_tree = HuffmanTree::new_infer_codes_without_symbols(&fixed_literal_lengths())?;
    let default_dist_tree = HuffmanTree::new_infer_codes_without_symbols(&[5; 30])?;

    loop {
        let is_final = reader.read_single_bit()?;
        let btype = CompressionScheme::from(reader.read_bits(2)? as u8);

        match btype {
            CompressionScheme::Uncompressed => {
                reader.align_to_byte_boundary();
                let len = reader.read_bits(16)? as u16;
                let nlen = reader.read_bits(16)? as u16;

                if len ^ 0xFFFF != nlen {
                    return Err(Error::InvalidUncompressedBlockLength);
                }

                output_stream.extend_from_slice(reader.read_aligned_bytes(len as usize)?);
            },
            CompressionScheme::DynamicHuffmanCodes => {
                // Read the huffman codes from the start of the block
                let hlit = reader.read_bits(5)? as usize + 257;
                let hdist = reader.read_bits(5)? as usize + 1;
                let hclen = reader.read_bits(4)? as usize + 4;

                let (literal_tree, distance_tree) =
                    read_literal_and_distance_tree(hlit, hdist, hclen, &mut reader)?;
                decompress_block(
                    &literal_tree,
                    &distance_tree,
                    &mut reader,
                    &mut output_stream,
                )?;
            },
            CompressionScheme::FixedHuffmanCodes => {
                decompress_block(
                    &default_lit_tree,
                    &default_dist_tree,
                    &mut reader,
                    &mut output_stream,
                )?;
            },
            CompressionScheme::Reserved => {
                return Err(Error::ReservedCompressionScheme);
            },
        }

        if is_final {
            break;
        }
    }
    Ok((output_stream, reader.num_consumed_bytes()))
}

fn decompress_block(
    literal_tree: &HuffmanTree,
    distance_tree: &HuffmanTree,
    reader: &mut BitReader<'_>,
    output_stream: &mut Vec<u8>,
) -> Result<(), Error> {
    loop {
        let symbol = literal_tree.lookup_incrementally(reader)?;

        match symbol.cmp(&END_OF_BLOCK) {
            Ordering::Less => output_stream.push(symbol as u8),
            Ordering::Equal => return Ok(()),
            Ordering::Greater => {
                let run_length = decode_run_length(symbol, reader)?;
                let distance_code = distance_tree.lookup_incrementally(reader)?;
                let distance = decode_distance(distance_code, reader)?;

                if output_stream.len() < distance {
                    return Err(Error::DistanceTooFarBack);
                }

                let copy_base = output_stream.len() - distance;

                // Overlapping copies repeat the most recent `distance` bytes
                let mut bytes_remaining = run_length;
                let bytes_to_copy_at_once = run_length.min(distance);

                while bytes_remaining > bytes_to_copy_at_once {
                    output_stream.extend_from_within(copy_base..copy_base + bytes_to_copy_at_once);
                    bytes_remaining -= bytes_to_copy_at_once;
                }

                output_stream.extend_from_within(copy_base..copy_base + bytes_remaining);
            },
        }
    }
}

fn read_literal_and_distance_tree(
    hlit: usize,
    hdist: usize,
    hclen: usize,
    reader: &mut BitReader<'_>,
) -> Result<(HuffmanTree, HuffmanTree), Error> {
    let mut code_lengths = [0; 19];

    for index in &CODE_LENGTH_ALPHABET[..hclen] {
        code_lengths[*index] = reader.read_bits(3)? as u8;
    }

    let code_tree = HuffmanTree::new_infer_codes_without_symbols(&code_lengths)?;

    let total_number_of_codes = hlit + hdist;
    let mut codes: Vec<u8> = Vec::with_capacity(total_number_of_codes);
    while codes.len() < total_number_of_codes {
        let symbol = code_tree.lookup_incrementally(reader)?;

        let (value, repeat_for) = match symbol {
            0..=15 => (symbol as u8, 1),
            16 => {
                let to_repeat = *codes.last().ok_or(Error::RLELeadingRepeatValue)?;
                (to_repeat, reader.read_bits(2)? as usize + 3)
            },
            17 => (0, reader.read_bits(3)? as usize + 3),
            18 => (0, reader.read_bits(7)? as usize + 11),
            _ => return Err(Error::SymbolNotFound),
        };

        if total_number_of_codes < codes.len() + repeat_for {
            return Err(Error::RLEExceedsExpectedLength);
        }

        codes.resize(codes.len() + repeat_for, value);
    }

    let literal_tree = HuffmanTree::new_infer_codes_without_symbols(&codes[..hlit])?;
    let dist_tree = HuffmanTree::new_infer_codes_without_symbols(&codes[hlit..])?;
    Ok((literal_tree, dist_tree))
}

fn decode_distance(code: u16, reader: &mut BitReader<'_>) -> Result<usize, Error> {
    let index = code as usize;
    if DISTANCE_BASE.len() <= index {
        return Err(Error::InvalidDistanceSymbol);
    }

    let extra_bits = reader.read_bits(DISTANCE_EXTRA_BITS[index])?;
    Ok(DISTANCE_BASE[index] as usize + extra_bits as usize)
}

fn decode_run_length(code: u16, reader: &mut BitReader<'_>) -> Result<usize, Error> {
    let index = code as usize - 257;
    if LENGTH_BASE.len() <= index {
        return Err(Error::InvalidLengthSymbol);
    }

    let extra_bits = reader.read_bits(LENGTH_EXTRA_BITS[index])?;
    Ok(LENGTH_BASE[index] as usize + extra_bits as usize)
}

impl From<u8> for CompressionScheme {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => Self::Uncompressed,
            1 => Self::FixedHuffmanCodes,
            2 => Self::DynamicHuffmanCodes,
            _ => Self::Reserved,
        }
    }
}

const WINDOW_SIZE: usize = 1 << 15;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 258;
const HASH_BITS: u32 = 15;
const MAX_CHAIN_LENGTH: usize = 64;
const NO_POSITION: usize = usize::MAX;

/// Compress `data` into a single final block using the fixed huffman codes
///
/// Matches are found greedily with a hash chain over the last 32KiB of input.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::default();

    // BFINAL=1, BTYPE=01 (fixed huffman codes)
    writer.write_bits(1, 1);
    writer.write_bits(1, 2);

    let mut head = vec![NO_POSITION; 1 << HASH_BITS];
    let mut prev = vec![NO_POSITION; WINDOW_SIZE];

    let mut position = 0;
    while position < data.len() {
        let (length, distance) = find_longest_match(data, position, &head, &prev);

        let advance_by = if length >= MIN_MATCH {
            write_match(&mut writer, length, distance);
            length
        } else {
            write_literal_or_length_symbol(&mut writer, data[position] as u16);
            1
        };

        for insert_at in position..position + advance_by {
            insert_hash(data, insert_at, &mut head, &mut prev);
        }
        position += advance_by;
    }

    write_literal_or_length_symbol(&mut writer, END_OF_BLOCK);
    writer.finish()
}

fn hash_at(data: &[u8], position: usize) -> Option<usize> {
    let bytes = data.get(position..position + MIN_MATCH)?;
    let value = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
    Some((value.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize)
}

fn insert_hash(data: &[u8], position: usize, head: &mut [usize], prev: &mut [usize]) {
    if let Some(hash) = hash_at(data, position) {
        prev[position % WINDOW_SIZE] = head[hash];
        head[hash] = position;
    }
}

fn find_longest_match(
    data: &[u8],
    position: usize,
    head: &[usize],
    prev: &[usize],
) -> (usize, usize) {
    let Some(hash) = hash_at(data, position) else {
        return (0, 0);
    };

    let max_length = MAX_MATCH.min(data.len() - position);
    let mut best = (0, 0);
    let mut candidate = head[hash];

    for _ in 0..MAX_CHAIN_LENGTH {
        if candidate == NO_POSITION || position - candidate > WINDOW_SIZE {
            break;
        }

        let length = data[candidate..]
            .iter()
            .zip(&data[position..position + max_length])
            .take_while(|(a, b)| a == b)
            .count();

        if length > best.0 {
            best = (length, position - candidate);
            if length == max_length {
                break;
            }
        }

        let next = prev[candidate % WINDOW_SIZE];

        // Stale entries from an older window position
        if next != NO_POSITION && next >= candidate {
            break;
        }
        candidate = next;
    }

    best
}

fn write_literal_or_length_symbol(writer: &mut BitWriter, symbol: u16) {
    match symbol {
        0..=143 => writer.write_code(0x30 + symbol, 8),
        144..=255 => writer.write_code(0x190 + (symbol - 144), 9),
        256..=279 => writer.write_code(symbol - 256, 7),
        _ => writer.write_code(0xC0 + (symbol - 280), 8),
    }
}

fn write_match(writer: &mut BitWriter, length: usize, distance: usize) {
    // The last base that does not exceed the value
    let length_index = LENGTH_BASE
        .iter()
        .rposition(|&base| base as usize <= length)
        .unwrap_or_default();
    write_literal_or_length_symbol(writer, 257 + length_index as u16);
    writer.write_bits(
        (length - LENGTH_BASE[length_index] as usize) as u32,
        LENGTH_EXTRA_BITS[length_index],
    );

    let distance_index = DISTANCE_BASE
        .iter()
        .rposition(|&base| base as usize <= distance)
        .unwrap_or_default();
    writer.write_code(distance_index as u16, 5);
    writer.write_bits(
        (distance - DISTANCE_BASE[distance_index] as usize) as u32,
        DISTANCE_EXTRA_BITS[distance_index],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() -> Result<(), Error> {
        let bytes = [0x4b, 0x4c, 0x4a, 0x06, 0x00];
        let (decompressed, num_consumed_bytes) = decompress(&bytes)?;

        assert_eq!(&decompressed, b"abc");
        assert_eq!(num_consumed_bytes, bytes.len());
        Ok(())
    }

    #[test]
    fn stored_block() -> Result<(), Error> {
        let bytes = [0x01, 0x03, 0x00, 0xFC, 0xFF, b'x', b'y', b'z'];
        let (decompressed, num_consumed_bytes) = decompress(&bytes)?;

        assert_eq!(&decompressed, b"xyz");
        assert_eq!(num_consumed_bytes, bytes.len());
        Ok(())
    }

    #[test]
    fn compressed_data_is_decodable() -> Result<(), Error> {
        let mut data = b"the quick brown fox jumps over the lazy dog. ".repeat(40);
        data.extend((0..=255).collect::<Vec<u8>>());
        data.extend([0; 1000]);

        let compressed = compress(&data);
        assert!(compressed.len() < data.len() / 2);

        let (decompressed, num_consumed_bytes) = decompress(&compressed)?;
        assert_eq!(decompressed, data);
        assert_eq!(num_consumed_bytes, compressed.len());
        Ok(())
    }

    #[test]
    fn empty_input() -> Result<(), Error> {
        let compressed = compress(&[]);
        let (decompressed, _) = decompress(&compressed)?;
        assert!(decompressed.is_empty());
        Ok(())
    }

    #[test]
    fn truncated_input() {
        let compressed = compress(b"some text that gets cut off halfway");
        assert_eq!(
            decompress(&compressed[..compressed.len() / 2]),
            Err(Error::UnexpectedEOF)
        );
    }

    #[test]
    fn reference_before_output_start() {
        // Fixed block: length symbol 257, distance code 0, no prior output
        let mut writer = BitWriter::default();
        writer.write_bits(1, 1);
        writer.write_bits(1, 2);
        writer.write_code(1, 7);
        writer.write_code(0, 5);
        let bytes = writer.finish();

        assert_eq!(decompress(&bytes), Err(Error::DistanceTooFarBack));
    }
}
