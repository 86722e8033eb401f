//! The ZSoft `.pcx` file format
//!
//! See <https://www.fileformat.info/format/pcx/egff.htm>

use crate::{
    color::{argb, rgb},
    palette::default_ega_palette,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use error_derive::Error;
use sl_std::bytestream::ByteStream;

const MANUFACTURER: u8 = 0x0A;
const HEADER_SIZE: usize = 128;
const VGA_PALETTE_MARKER: u8 = 0x0C;
const VGA_PALETTE_SIZE: usize = 768;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "not a pcx file"]
    NotAPcx,

    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "unsupported combination of bit depth and planes"]
    UnsupportedColorFormat,

    #[msg = "scanlines are too short for the image width"]
    InvalidBytesPerLine,

    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedColorFormat)
    }
}

#[derive(Clone, Debug)]
struct Header {
    is_rle: bool,
    bits_per_pixel: u8,
    width: usize,
    height: usize,
    ega_palette: [u32; 16],
    num_planes: u8,
    bytes_per_line: usize,
}

/// Check the fixed fields at the start of the header
#[must_use]
pub fn has_signature(bytes: &[u8]) -> bool {
    matches!(
        bytes,
        [MANUFACTURER, 0 | 2 | 3 | 4 | 5, 0 | 1, 1 | 2 | 4 | 8, ..]
    )
}

fn read_header(bytes: &[u8]) -> Result<Header, Error> {
    if !has_signature(bytes) {
        return Err(Error::NotAPcx);
    }

    if bytes.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEndOfFile);
    }

    let mut byte_stream = ByteStream::new(bytes);
    let [_manufacturer, _version, encoding, bits_per_pixel] =
        byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;

    let mut window = [0; 4];
    for value in &mut window {
        *value = byte_stream
            .next_le_u16()
            .ok_or(Error::UnexpectedEndOfFile)?;
    }
    let [x_min, y_min, x_max, y_max] = window;

    // Resolution
    byte_stream.advance(4);

    let palette_bytes: [u8; 48] = byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;
    let mut ega_palette = [0; 16];
    for (color, entry) in ega_palette.iter_mut().zip(palette_bytes.chunks_exact(3)) {
        *color = rgb(entry[0], entry[1], entry[2]);
    }

    // Some writers leave the header palette empty
    if palette_bytes.iter().all(|&byte| byte == 0) {
        ega_palette = *default_ega_palette();
    }

    let [_reserved, num_planes] = byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;
    let bytes_per_line = byte_stream
        .next_le_u16()
        .ok_or(Error::UnexpectedEndOfFile)? as usize;

    let width = (x_max as usize + 1).saturating_sub(x_min as usize);
    let height = (y_max as usize + 1).saturating_sub(y_min as usize);

    Ok(Header {
        is_rle: encoding == 1,
        bits_per_pixel,
        width,
        height,
        ega_palette,
        num_planes,
        bytes_per_line,
    })
}

/// Expand the RLE stream into `length` bytes
fn decode_rle(data: &[u8], length: usize) -> Result<Vec<u8>, Error> {
    let mut output = Vec::with_capacity(length);
    let mut byte_stream = ByteStream::new(data);

    while output.len() < length {
        let byte = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;

        if byte >= 0xC0 {
            let count = (byte & 0x3F) as usize;
            let value = byte_stream
                .next_byte()
                .ok_or(Error::UnexpectedEndOfFile)?;
            output.resize(output.len() + count, value);
        } else {
            output.push(byte);
        }
    }

    output.truncate(length);
    Ok(output)
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let header = read_header(bytes)?;
    log::debug!("pcx header: {header:?}");

    let (width, height) = (header.width, header.height);
    if !dimensions_are_acceptable(width, height) {
        log::error!("Refusing to allocate image of size {width}x{height}");
        return Err(Error::RefuseToParse);
    }

    let bits_per_pixel = header.bits_per_pixel as usize;
    let is_planar_true_color = bits_per_pixel == 8 && matches!(header.num_planes, 3 | 4);
    let is_packed = header.num_planes == 1;
    let is_ega_planar = bits_per_pixel == 1 && header.num_planes == 4;
    if !(is_planar_true_color || is_packed || is_ega_planar) {
        log::error!(
            "Unsupported pcx format: {} bits per pixel with {} planes",
            header.bits_per_pixel,
            header.num_planes
        );
        return Err(Error::UnsupportedColorFormat);
    }

    if header.bytes_per_line * 8 < width * bits_per_pixel {
        return Err(Error::InvalidBytesPerLine);
    }

    let scanline_length = header.bytes_per_line * header.num_planes as usize;
    let image_data = &bytes[HEADER_SIZE..];
    let plane_data = if header.is_rle {
        decode_rle(image_data, scanline_length * height)?
    } else {
        image_data
            .get(..scanline_length * height)
            .ok_or(Error::UnexpectedEndOfFile)?
            .to_vec()
    };

    let mut pixels = Vec::with_capacity(width * height);
    let scanlines = plane_data.chunks_exact(scanline_length);

    if is_planar_true_color {
        for scanline in scanlines {
            let plane = |index: usize, x: usize| scanline[index * header.bytes_per_line + x];
            for x in 0..width {
                let alpha = if header.num_planes == 4 {
                    plane(3, x)
                } else {
                    0xFF
                };
                pixels.push(argb(alpha, plane(0, x), plane(1, x), plane(2, x)));
            }
        }
    } else if is_ega_planar {
        for scanline in scanlines {
            for x in 0..width {
                let mut index = 0;
                for plane in 0..4 {
                    let byte = scanline[plane * header.bytes_per_line + x / 8];
                    let bit = (byte >> (7 - x % 8)) & 1;
                    index |= bit << plane;
                }
                pixels.push(header.ega_palette[index as usize]);
            }
        }
    } else {
        let palette = packed_palette(bytes, &header);
        let mask = ((1_u16 << bits_per_pixel) - 1) as u8;
        let pixels_per_byte = 8 / bits_per_pixel;

        for scanline in scanlines {
            for x in 0..width {
                let byte = scanline[x / pixels_per_byte];
                let shift = 8 - bits_per_pixel * (x % pixels_per_byte + 1);
                let index = (byte >> shift) & mask;
                pixels.push(palette[index as usize]);
            }
        }
    }

    Ok(PixelBuffer::from_data(pixels, width, height))
}

/// The palette used by images with a single plane
fn packed_palette(bytes: &[u8], header: &Header) -> Vec<u32> {
    match header.bits_per_pixel {
        1 => vec![rgb(0, 0, 0), rgb(0xFF, 0xFF, 0xFF)],
        8 => {
            let palette_start = bytes.len().checked_sub(VGA_PALETTE_SIZE + 1);
            match palette_start {
                Some(start)
                    if start >= HEADER_SIZE && bytes[start] == VGA_PALETTE_MARKER =>
                {
                    bytes[start + 1..]
                        .chunks_exact(3)
                        .map(|entry| rgb(entry[0], entry[1], entry[2]))
                        .collect()
                },
                _ => {
                    log::warn!("pcx file has no VGA palette, assuming grayscale");
                    (0..=255).map(|gray| rgb(gray, gray, gray)).collect()
                },
            }
        },
        _ => header.ega_palette.to_vec(),
    }
}

/// Append one RLE encoded scanline
fn encode_rle(scanline: &[u8], output: &mut Vec<u8>) {
    let mut index = 0;
    while index < scanline.len() {
        let value = scanline[index];
        let run_length = scanline[index..]
            .iter()
            .take(0x3F)
            .take_while(|&&byte| byte == value)
            .count();

        if run_length > 1 || value >= 0xC0 {
            output.push(0xC0 | run_length as u8);
        }
        output.push(value);
        index += run_length;
    }
}

/// Encode with three (or four, if there is transparency) 8 bit planes
#[must_use]
pub fn encode(texture: &PixelBuffer) -> Vec<u8> {
    let has_alpha = texture.data().iter().any(|pixel| pixel >> 24 != 0xFF);
    let num_planes: u8 = if has_alpha { 4 } else { 3 };

    // Must be even
    let bytes_per_line = texture.width() + texture.width() % 2;

    let mut bytes = vec![MANUFACTURER, 5, 1, 8];
    bytes.extend(0_u16.to_le_bytes());
    bytes.extend(0_u16.to_le_bytes());
    bytes.extend((texture.width() as u16 - 1).to_le_bytes());
    bytes.extend((texture.height() as u16 - 1).to_le_bytes());
    bytes.extend(72_u16.to_le_bytes());
    bytes.extend(72_u16.to_le_bytes());
    bytes.extend([0; 48]);
    bytes.push(0);
    bytes.push(num_planes);
    bytes.extend((bytes_per_line as u16).to_le_bytes());

    // Color palette
    bytes.extend(1_u16.to_le_bytes());
    bytes.resize(HEADER_SIZE, 0);

    let mut scanline = vec![0; bytes_per_line * num_planes as usize];
    for y in 0..texture.height() {
        for (x, pixel) in texture.row(y).iter().enumerate() {
            let channels = pixel.to_be_bytes();
            for plane in 0..num_planes as usize {
                // Planes are stored as red, green, blue, alpha
                scanline[plane * bytes_per_line + x] = channels[(plane + 1) % 4];
            }
        }
        encode_rle(&scanline, &mut bytes);
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ega;

    fn header(
        bits_per_pixel: u8,
        width: u16,
        height: u16,
        planes: u8,
        bytes_per_line: u16,
    ) -> Vec<u8> {
        let mut bytes = vec![MANUFACTURER, 5, 1, bits_per_pixel, 0, 0, 0, 0];
        bytes.extend((width - 1).to_le_bytes());
        bytes.extend((height - 1).to_le_bytes());
        bytes.resize(65, 0);
        bytes.push(planes);
        bytes.extend(bytes_per_line.to_le_bytes());
        bytes.resize(HEADER_SIZE, 0);
        bytes
    }

    #[test]
    fn short_header() {
        let bytes = header(8, 3, 1, 1, 4);

        assert!(has_signature(&bytes[..4]));
        assert!(!has_signature(&bytes[..3]));
        assert_eq!(decode(&bytes[..4]).unwrap_err(), Error::UnexpectedEndOfFile);
        assert_eq!(decode(&bytes[..100]).unwrap_err(), Error::UnexpectedEndOfFile);
        assert_eq!(decode(&[0x0A, 1, 1, 8]).unwrap_err(), Error::NotAPcx);
    }

    #[test]
    fn vga_palette() {
        let mut bytes = header(8, 3, 1, 1, 4);

        // A run of three index 1 and one padding byte
        bytes.extend([0xC3, 1, 0]);
        bytes.push(VGA_PALETTE_MARKER);
        let mut palette = vec![0; VGA_PALETTE_SIZE];
        palette[3..6].copy_from_slice(&[0x11, 0x22, 0x33]);
        bytes.extend(palette);

        let texture = decode(&bytes).unwrap();
        assert_eq!(texture.data(), &[rgb(0x11, 0x22, 0x33); 3]);
    }

    #[test]
    fn literal_above_run_threshold() {
        let mut bytes = header(8, 2, 1, 1, 2);

        // 0xC5 has to be escaped as a run of one
        bytes.extend([0xC1, 0xC5, 0x07]);
        let texture = decode(&bytes).unwrap();

        // No VGA palette, grayscale fallback
        assert_eq!(texture.data(), &[rgb(0xC5, 0xC5, 0xC5), rgb(7, 7, 7)]);
    }

    #[test]
    fn ega_planes() {
        // 2x1 with four 1 bit planes: pixel 0 has index 0b0101, pixel 1 index 0b1010
        let mut bytes = header(1, 2, 1, 4, 2);
        bytes.extend([0b1000_0000, 0, 0b0100_0000, 0, 0b1000_0000, 0, 0b0100_0000, 0]);
        let texture = decode(&bytes).unwrap();

        assert_eq!(texture.data(), &[ega::MAGENTA, ega::LIGHT_GREEN]);
    }

    #[test]
    fn monochrome() {
        let mut bytes = header(1, 3, 1, 1, 2);
        bytes.extend([0b1010_0000, 0]);
        let texture = decode(&bytes).unwrap();

        let (black, white) = (rgb(0, 0, 0), rgb(0xFF, 0xFF, 0xFF));
        assert_eq!(texture.data(), &[white, black, white]);
    }

    #[test]
    fn encoding_preserves_alpha() {
        let pixels = vec![
            0xFFC0_C0C0,
            0x00FF_0000,
            0x80C1_C2C3,
            0x80C1_C2C3,
            0xFF00_0000,
            0x1234_5678,
        ];
        let texture = PixelBuffer::from_data(pixels, 3, 2);

        assert_eq!(decode(&encode(&texture)).unwrap(), texture);
    }

    #[test]
    fn truncated() {
        let pixels = (0..64).map(|i| 0xFF00_0000 | i * 3).collect();
        let bytes = encode(&PixelBuffer::from_data(pixels, 8, 8));

        assert_eq!(
            decode(&bytes[..bytes.len() - 4]),
            Err(Error::UnexpectedEndOfFile)
        );
    }
}
