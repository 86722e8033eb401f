//! [zlib](https://www.rfc-editor.org/rfc/rfc1950) implementation
//!
//! ZLIB is basically just a thin wrapper around DEFLATE.

use crate::deflate;

use error_derive::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "unexpected end of input"]
    UnexpectedEOF,

    /// Usage of the reserved compression method `15`.
    #[msg = "reserved compression method"]
    ReservedCompressionMethod,

    /// `CINFO` must be smaller or equal to 7
    #[msg = "window size too large"]
    CINFOTooLarge,

    /// ZLIB Header Checksum must be a multiple of 31
    #[msg = "invalid header checksum"]
    InvalidHeaderChecksum,

    /// An error occured during the `DEFLATE` decompression
    #[msg = "deflate error"]
    Deflate(deflate::Error),

    #[msg = "unknown compression method"]
    UnknownCompressionMethod,

    /// Preset dictionaries are not used by any of the supported formats
    #[msg = "preset dictionaries are not supported"]
    PresetDictionary,

    /// The checksum of the decompressed data was incorrect
    #[msg = "incorrect data checksum"]
    IncorrectDataChecksum,
}

const FLAG_DICT_BIT: u8 = 1 << 5;

/// Minimum length for a zlib archive
///
/// Consists of:
/// * Compression method (1 byte)
/// * Compression flags (1 byte)
/// * Adler32 checksum (4 bytes)
///
/// Note that the minimum length of a DEFLATE archive is not included since zlib may use algorithms other than DEFLATE.
const MINIMUM_ZLIB_LEN: usize = 6;

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.len() < MINIMUM_ZLIB_LEN {
        return Err(Error::UnexpectedEOF);
    }

    // parse Compression method and flags (CMF)
    let compression_method_and_flags = bytes[0];
    let compression_method = compression_method_and_flags & 0b1111;
    let compression_info = compression_method_and_flags >> 4;

    // Parse compression flags (FLG)
    let flags = bytes[1];
    let flag_dict = flags & FLAG_DICT_BIT != 0;

    let header_checksum = u16::from_be_bytes([bytes[0], bytes[1]]);
    if header_checksum % 31 != 0 {
        log::warn!("Invalid zlib header checksum: {header_checksum} (must be a multiple of 31)");
        return Err(Error::InvalidHeaderChecksum);
    }

    match compression_method {
        8 => {
            // DEFLATE
            if 7 < compression_info {
                return Err(Error::CINFOTooLarge);
            }

            if flag_dict {
                log::warn!("zlib stream requires a preset dictionary");
                return Err(Error::PresetDictionary);
            }

            let (decompressed, num_consumed_bytes) = deflate::decompress(&bytes[2..])?;

            // Verify the checksum provided after the compressed data
            let checksum_bytes = bytes
                .get(2 + num_consumed_bytes..2 + num_consumed_bytes + 4)
                .ok_or(Error::UnexpectedEOF)?;
            let expected_checksum = u32::from_be_bytes([
                checksum_bytes[0],
                checksum_bytes[1],
                checksum_bytes[2],
                checksum_bytes[3],
            ]);

            let computed_checksum = hash::adler32(&decompressed);

            if expected_checksum != computed_checksum {
                log::warn!("Incorrect zlib checksum: expected {expected_checksum:0>8x}, found {computed_checksum:0>8x}");
                return Err(Error::IncorrectDataChecksum);
            }

            Ok(decompressed)
        },
        15 => {
            log::warn!("Reserved zlib compression method");
            Err(Error::ReservedCompressionMethod)
        },
        _ => {
            log::warn!("Unknown zlib compression method: {compression_method}");
            Err(Error::UnknownCompressionMethod)
        },
    }
}

/// Wrap the DEFLATE compressed `data` in a zlib stream
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    // 32K window, default compression level
    let mut bytes = vec![0x78, 0x9C];
    bytes.extend(deflate::compress(data));
    bytes.extend(hash::adler32(data).to_be_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_decompression() -> Result<(), Error> {
        let bytes = [
            0x78, 0x9c, 0x4b, 0x4c, 0x4a, 0x06, 0x00, 0x02, 0x4d, 0x01, 0x27,
        ];
        let decompressed = decompress(&bytes)?;

        assert_eq!(&decompressed, b"abc");
        Ok(())
    }

    #[test]
    fn compress_matches_reference_for_short_input() {
        assert_eq!(
            compress(b"abc"),
            [0x78, 0x9c, 0x4b, 0x4c, 0x4a, 0x06, 0x00, 0x02, 0x4d, 0x01, 0x27]
        );
    }

    #[test]
    fn compressed_stream_is_decodable() -> Result<(), Error> {
        let data: Vec<u8> = (0..5000_u32).map(|i| (i % 7 * 31 + i / 100) as u8).collect();
        assert_eq!(decompress(&compress(&data))?, data);
        Ok(())
    }

    #[test]
    fn missing_checksum() {
        let bytes = [0x78, 0x9c, 0x4b, 0x4c, 0x4a, 0x06, 0x00, 0x02, 0x4d];
        assert_eq!(decompress(&bytes), Err(Error::UnexpectedEOF));
    }

    #[test]
    fn corrupted_checksum() {
        let bytes = [
            0x78, 0x9c, 0x4b, 0x4c, 0x4a, 0x06, 0x00, 0x02, 0x4d, 0x01, 0x28,
        ];
        assert_eq!(decompress(&bytes), Err(Error::IncorrectDataChecksum));
    }
}
