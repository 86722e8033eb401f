use std::iter::FusedIterator;

use super::Error;

#[derive(Clone, Debug)]
pub(super) enum Chunk<'a> {
    /// `SOI`
    StartOfImage,

    /// `SOF`
    StartOfFrame { subscript: u8, data: &'a [u8] },

    /// `DHT`
    DefineHuffmanTable(&'a [u8]),

    /// `DQT`
    DefineQuantizationTable(&'a [u8]),

    /// `DRI`
    DefineRestartInterval(&'a [u8]),

    /// `SOS`, followed by the entropy coded data (unstuffed, restart markers removed)
    StartOfScan { data: &'a [u8], scan: Vec<u8> },

    /// `APP`
    ApplicationSpecific { subscript: u8, data: &'a [u8] },

    /// `COM`
    Comment,

    /// Any other segment that carries a length (`DNL`, `DAC`, `JPGn`, ...)
    Ignored(u8),

    /// `EOI`
    EndOfImage,
}

impl<'a> Chunk<'a> {
    const SOI: u8 = 0xD8;
    const SOF_BEGIN: u8 = 0xC0;
    const SOF_END: u8 = 0xCF;
    const DHT: u8 = 0xC4;
    const JPG: u8 = 0xC8;
    const DAC: u8 = 0xCC;
    const DQT: u8 = 0xDB;
    const DRI: u8 = 0xDD;
    const SOS: u8 = 0xDA;
    const RST_BEGIN: u8 = 0xD0;
    const RST_END: u8 = 0xD7;
    const APP_BEGIN: u8 = 0xE0;
    const APP_END: u8 = 0xEF;
    const COM: u8 = 0xFE;
    const EOI: u8 = 0xD9;
    const TEM: u8 = 0x01;

    /// Tries to read a chunk from the byte slice
    ///
    /// On success this returns the chunk and the remaining bytes
    pub fn read(bytes: &'a [u8]) -> Result<(Self, &'a [u8]), Error> {
        if bytes.len() < 2 || bytes[0] != 0xFF {
            return Err(Error::BadChunk);
        }

        let chunk_id = bytes[1];
        let (chunk, length) = match chunk_id {
            Self::SOI => (Self::StartOfImage, 0),
            Self::EOI => (Self::EndOfImage, 0),
            Self::TEM | Self::RST_BEGIN..=Self::RST_END => (Self::Ignored(chunk_id), 0),
            Self::DHT => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (Self::DefineHuffmanTable(chunk_data), chunk_data.len() + 2)
            },
            Self::JPG | Self::DAC => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (Self::Ignored(chunk_id), chunk_data.len() + 2)
            },
            n @ (Self::SOF_BEGIN..=Self::SOF_END) => {
                let data = read_variable_sized_chunk(&bytes[2..])?;
                let subscript = n - Self::SOF_BEGIN;
                let chunk = Self::StartOfFrame { subscript, data };
                (chunk, data.len() + 2)
            },
            Self::DQT => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (
                    Self::DefineQuantizationTable(chunk_data),
                    chunk_data.len() + 2,
                )
            },
            Self::DRI => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (
                    Self::DefineRestartInterval(chunk_data),
                    chunk_data.len() + 2,
                )
            },
            Self::SOS => {
                let data = read_variable_sized_chunk(&bytes[2..])?;

                let remaining_bytes = &bytes[data.len() + 4..];
                let (scan, scan_length) = read_compressed_data(remaining_bytes)?;
                let chunk = Self::StartOfScan { data, scan };
                (chunk, data.len() + scan_length + 2)
            },
            n @ (Self::APP_BEGIN..=Self::APP_END) => {
                let data = read_variable_sized_chunk(&bytes[2..])?;
                let subscript = n - Self::APP_BEGIN;
                let app_chunk = Self::ApplicationSpecific { subscript, data };
                (app_chunk, data.len() + 2)
            },
            Self::COM => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (Self::Comment, chunk_data.len() + 2)
            },
            0x02..=0xBF | 0xDC | 0xDE | 0xDF | 0xF0..=0xFD => {
                let chunk_data = read_variable_sized_chunk(&bytes[2..])?;
                (Self::Ignored(chunk_id), chunk_data.len() + 2)
            },
            other => {
                log::error!("Invalid jpeg marker: 0xFF{other:02X}");
                return Err(Error::BadChunk);
            },
        };

        let remaining_bytes = &bytes[length + 2..];
        Ok((chunk, remaining_bytes))
    }
}

fn read_variable_sized_chunk(bytes: &[u8]) -> Result<&[u8], Error> {
    if bytes.len() < 2 {
        return Err(Error::BadChunk);
    }

    // The length of the chunk includes the length bytes themselves
    let length = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;

    if length < 2 || bytes.len() < length {
        return Err(Error::BadChunk);
    }

    Ok(&bytes[2..length])
}

#[derive(Clone, Copy)]
pub(super) struct Chunks<'a> {
    remaining_bytes: &'a [u8],
}

impl<'a> Chunks<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            remaining_bytes: bytes,
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        // Any marker may be preceded by fill bytes
        while self.remaining_bytes.starts_with(&[0xFF, 0xFF]) {
            self.remaining_bytes = &self.remaining_bytes[1..];
        }

        if self.remaining_bytes.is_empty() {
            return None;
        }

        match Chunk::read(self.remaining_bytes) {
            Ok((chunk, remaining)) => {
                self.remaining_bytes = remaining;
                Some(Ok(chunk))
            },
            Err(e) => {
                self.remaining_bytes = &[];
                Some(Err(e))
            },
        }
    }
}

impl<'a> FusedIterator for Chunks<'a> {}

/// Extracts the compressed data following a `SOS` chunk
///
/// Returns the unescaped compressed data as well as the length (in the escaped form).
/// Restart markers are dropped, the decoder realigns to a byte boundary at each restart interval instead.
fn read_compressed_data(bytes: &[u8]) -> Result<(Vec<u8>, usize), Error> {
    // The compressed data ends once we find a chunk marker that is not
    // * FFD0 - FFD7 (Restart markers)
    // * FF00 (escaped 0xFF byte)
    // * FFFF (fill byte)
    let mut compressed_data = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while let Some(&element) = bytes.get(index) {
        if element != 0xFF {
            compressed_data.push(element);
            index += 1;
            continue;
        }

        let Some(&next_element) = bytes.get(index + 1) else {
            // This is a 0xFF at the very end of the data stream.
            // This should never happen with a compliant encoder
            return Err(Error::BadChunk);
        };

        match next_element {
            0x00 => {
                // This is a escaped 0xFF byte
                compressed_data.push(0xFF);
                index += 2;
            },
            Chunk::RST_BEGIN..=Chunk::RST_END => index += 2,
            0xFF => index += 1,
            _ => {
                // This is a marker after the end of the compressed data
                return Ok((compressed_data, index));
            },
        }
    }

    // We have reached the end of the byte stream, this means that there is nothing
    // after the compressed data.
    // This is impossible, as there must be a EOI at the end of the image
    log::error!("Entropy coded data is not terminated by a marker");
    Err(Error::BadChunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_compressed_data_after_sos() {
        // Immediate EOI - there is no compressed data
        let empty = &[0xFF, 0xD9];
        assert!(read_compressed_data(empty).unwrap().0.is_empty());

        // Data with reset markers inbetween
        let with_rst = &[0xAA, 0xFF, 0xD0, 0xAA, 0xFF, 0xD7, 0xAA, 0xFF, 0xD9];
        assert_eq!(
            read_compressed_data(with_rst).unwrap(),
            (vec![0xAA, 0xAA, 0xAA], 7)
        );

        // Data with escaped 0xFF bytes
        let with_escape = &[0xFF, 0x00, 0xAA, 0xFF, 0xD9];
        assert_eq!(read_compressed_data(with_escape).unwrap().0, &[0xFF, 0xAA]);

        // Missing end marker
        assert_eq!(read_compressed_data(&[0xAA, 0xBB]), Err(Error::BadChunk));
    }

    #[test]
    fn segments_are_split() {
        let bytes = [
            0xFF, 0xD8, // SOI
            0xFF, 0xFE, 0x00, 0x04, b'h', b'i', // COM
            0xFF, 0xFF, 0xD9, // EOI, preceded by a fill byte
        ];

        let chunks: Vec<_> = Chunks::new(&bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(matches!(chunks[0], Chunk::StartOfImage));
        assert!(matches!(chunks[1], Chunk::Comment));
        assert!(matches!(chunks[2], Chunk::EndOfImage));
    }

    #[test]
    fn bad_segment_length() {
        let bytes = [0xFF, 0xDB, 0x00, 0x01];
        assert!(Chunk::read(&bytes).is_err());
    }
}
