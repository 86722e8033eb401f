//! The Truevision `.tga` file format
//!
//! See <http://www.paulbourke.net/dataformats/tga/> and the TGA 2.0 specification
//! for the footer.

use crate::{
    color::argb,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use error_derive::Error;
use sl_std::bytestream::ByteStream;

const HEADER_SIZE: usize = 18;
const FOOTER_SIZE: usize = 26;
pub(crate) const FOOTER_SIGNATURE: &[u8; 18] = b"TRUEVISION-XFILE.\0";

const DESCRIPTOR_RIGHT_TO_LEFT: u8 = 1 << 4;
const DESCRIPTOR_TOP_TO_BOTTOM: u8 = 1 << 5;
const DESCRIPTOR_ALPHA_BITS: u8 = 0b1111;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "unknown image type"]
    UnknownImageType,

    #[msg = "unsupported pixel depth"]
    UnsupportedPixelDepth,

    #[msg = "color mapped image without a color map"]
    MissingColorMap,

    #[msg = "color map index out of range"]
    ColorMapIndexOutOfRange,

    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImageKind {
    ColorMapped,
    TrueColor,
    GrayScale,
}

#[derive(Clone, Copy, Debug)]
struct Header {
    id_length: u8,
    color_map_type: u8,
    kind: ImageKind,
    is_rle: bool,
    color_map_first_entry: u16,
    color_map_length: u16,
    color_map_entry_size: u8,
    width: u16,
    height: u16,
    pixel_depth: u8,
    descriptor: u8,
}

impl Header {
    fn read(byte_stream: &mut ByteStream<'_>) -> Result<Self, Error> {
        let [id_length, color_map_type, image_type] =
            byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;

        let (kind, is_rle) = match image_type {
            1 => (ImageKind::ColorMapped, false),
            2 => (ImageKind::TrueColor, false),
            3 => (ImageKind::GrayScale, false),
            9 => (ImageKind::ColorMapped, true),
            10 => (ImageKind::TrueColor, true),
            11 => (ImageKind::GrayScale, true),
            other => {
                log::error!("Unknown tga image type: {other}");
                return Err(Error::UnknownImageType);
            },
        };

        let color_map_first_entry = byte_stream
            .next_le_u16()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let color_map_length = byte_stream
            .next_le_u16()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let color_map_entry_size = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;

        // Image origin, unused
        byte_stream.advance(4);

        let width = byte_stream
            .next_le_u16()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let height = byte_stream
            .next_le_u16()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let [pixel_depth, descriptor] =
            byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;

        Ok(Self {
            id_length,
            color_map_type,
            kind,
            is_rle,
            color_map_first_entry,
            color_map_length,
            color_map_entry_size,
            width,
            height,
            pixel_depth,
            descriptor,
        })
    }

    fn alpha_bits(&self) -> u8 {
        self.descriptor & DESCRIPTOR_ALPHA_BITS
    }
}

/// Whether the file ends with a TGA 2.0 footer
#[must_use]
pub fn has_footer(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_SIZE + FOOTER_SIZE && bytes.ends_with(FOOTER_SIGNATURE)
}

/// TGA has no magic bytes in its header, check whether the header is plausible instead
#[must_use]
pub fn header_is_plausible(bytes: &[u8]) -> bool {
    let Some(header) = bytes.get(..HEADER_SIZE) else {
        return false;
    };

    let width = u16::from_le_bytes([header[12], header[13]]);
    let height = u16::from_le_bytes([header[14], header[15]]);

    matches!(header[1], 0 | 1)
        && matches!(header[2], 1 | 2 | 3 | 9 | 10 | 11)
        && matches!(header[16], 8 | 15 | 16 | 24 | 32)
        && width != 0
        && height != 0
}

/// Convert a single stored pixel (little endian) to `0xAARRGGBB`
fn read_color(bytes: &[u8], alpha_bits: u8) -> u32 {
    match *bytes {
        [gray] => argb(0xFF, gray, gray, gray),
        [low, high] => {
            let value = u16::from_le_bytes([low, high]);
            let expand = |channel: u16| {
                let channel = (channel & 0x1F) as u8;
                channel << 3 | channel >> 2
            };
            let alpha = if alpha_bits > 0 && value & 0x8000 == 0 {
                0
            } else {
                0xFF
            };
            argb(alpha, expand(value >> 10), expand(value >> 5), expand(value))
        },
        [blue, green, red] => argb(0xFF, red, green, blue),
        [blue, green, red, alpha] => {
            let alpha = if alpha_bits > 0 { alpha } else { 0xFF };
            argb(alpha, red, green, blue)
        },
        _ => 0,
    }
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let mut byte_stream = ByteStream::new(bytes);
    let header = Header::read(&mut byte_stream)?;
    log::debug!("tga header: {header:?}");

    let (width, height) = (header.width as usize, header.height as usize);
    if !dimensions_are_acceptable(width, height) {
        log::error!("Refusing to allocate image of size {width}x{height}");
        return Err(Error::RefuseToParse);
    }

    byte_stream.advance(header.id_length as usize);

    // The color map may be present even if the image does not use it
    let mut color_map = vec![];
    if header.color_map_type == 1 {
        let entry_size = match header.color_map_entry_size {
            15 | 16 => 2,
            24 => 3,
            32 => 4,
            other => {
                log::error!("Unsupported tga color map entry size: {other}");
                return Err(Error::UnsupportedPixelDepth);
            },
        };

        let data = byte_stream
            .next_slice(entry_size * header.color_map_length as usize)
            .ok_or(Error::UnexpectedEndOfFile)?;

        // 15 bit entries never carry alpha
        let alpha_bits = if header.color_map_entry_size == 15 {
            0
        } else {
            header.alpha_bits()
        };
        color_map = data
            .chunks_exact(entry_size)
            .map(|entry| read_color(entry, alpha_bits))
            .collect();
    } else if header.kind == ImageKind::ColorMapped {
        return Err(Error::MissingColorMap);
    }

    let bytes_per_pixel = match (header.kind, header.pixel_depth) {
        (ImageKind::ColorMapped, 8) | (ImageKind::GrayScale, 8) => 1,
        (ImageKind::ColorMapped, 16) => 2,
        (ImageKind::TrueColor, 15 | 16) => 2,
        (ImageKind::TrueColor, 24) => 3,
        (ImageKind::TrueColor, 32) => 4,
        (kind, depth) => {
            log::error!("Unsupported tga pixel depth {depth} for {kind:?} image");
            return Err(Error::UnsupportedPixelDepth);
        },
    };

    let raw_pixels = if header.is_rle {
        decode_rle(&mut byte_stream, width * height, bytes_per_pixel)?
    } else {
        byte_stream
            .next_slice(width * height * bytes_per_pixel)
            .ok_or(Error::UnexpectedEndOfFile)?
            .to_vec()
    };

    let alpha_bits = header.alpha_bits();
    let pixels = raw_pixels
        .chunks_exact(bytes_per_pixel)
        .map(|pixel| {
            if header.kind == ImageKind::ColorMapped {
                let index = match *pixel {
                    [index] => index as usize,
                    [low, high] => u16::from_le_bytes([low, high]) as usize,
                    _ => unreachable!(),
                };
                index
                    .checked_sub(header.color_map_first_entry as usize)
                    .and_then(|index| color_map.get(index).copied())
                    .ok_or(Error::ColorMapIndexOutOfRange)
            } else {
                Ok(read_color(pixel, alpha_bits))
            }
        })
        .collect::<Result<Vec<u32>, Error>>()?;

    let mut texture = PixelBuffer::from_data(pixels, width, height);

    // Normalize to a top-left origin
    if header.descriptor & DESCRIPTOR_TOP_TO_BOTTOM == 0 {
        flip_vertically(&mut texture);
    }
    if header.descriptor & DESCRIPTOR_RIGHT_TO_LEFT != 0 {
        for y in 0..height {
            texture.row_mut(y).reverse();
        }
    }

    Ok(texture)
}

fn flip_vertically(texture: &mut PixelBuffer) {
    let (width, height) = (texture.width(), texture.height());
    for y in 0..height / 2 {
        let (top, bottom) = texture.data_mut().split_at_mut((height - y - 1) * width);
        top[y * width..(y + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}

/// Packets may span multiple scanlines
fn decode_rle(
    byte_stream: &mut ByteStream<'_>,
    num_pixels: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, Error> {
    let mut pixels = Vec::with_capacity(num_pixels * bytes_per_pixel);

    while pixels.len() < num_pixels * bytes_per_pixel {
        let packet_header = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let count = (packet_header & 0x7F) as usize + 1;

        if packet_header & 0x80 != 0 {
            let pixel = byte_stream
                .next_slice(bytes_per_pixel)
                .ok_or(Error::UnexpectedEndOfFile)?;
            for _ in 0..count {
                pixels.extend_from_slice(pixel);
            }
        } else {
            let raw = byte_stream
                .next_slice(count * bytes_per_pixel)
                .ok_or(Error::UnexpectedEndOfFile)?;
            pixels.extend_from_slice(raw);
        }
    }

    // The last packet may overshoot the image
    pixels.truncate(num_pixels * bytes_per_pixel);
    Ok(pixels)
}

/// Encode as a run length encoded true color image with a top-left origin
///
/// Uses 24 bits per pixel unless any pixel is translucent.
#[must_use]
pub fn encode(texture: &PixelBuffer) -> Vec<u8> {
    let has_alpha = texture.data().iter().any(|pixel| pixel >> 24 != 0xFF);
    let (pixel_depth, alpha_bits) = if has_alpha { (32, 8) } else { (24, 0) };

    let mut bytes = vec![0, 0, 10];

    // Color map specification and origin
    bytes.extend([0; 9]);
    bytes.extend((texture.width() as u16).to_le_bytes());
    bytes.extend((texture.height() as u16).to_le_bytes());
    bytes.push(pixel_depth);
    bytes.push(DESCRIPTOR_TOP_TO_BOTTOM | alpha_bits);

    let write_pixel = |bytes: &mut Vec<u8>, pixel: u32| {
        let [alpha, red, green, blue] = pixel.to_be_bytes();
        bytes.extend([blue, green, red]);
        if has_alpha {
            bytes.push(alpha);
        }
    };

    // Packets do not cross scanlines
    for y in 0..texture.height() {
        let row = texture.row(y);
        let mut x = 0;
        while x < row.len() {
            let run_length = row[x..]
                .iter()
                .take(128)
                .take_while(|&&pixel| pixel == row[x])
                .count();

            if run_length > 1 {
                bytes.push(0x80 | (run_length - 1) as u8);
                write_pixel(&mut bytes, row[x]);
                x += run_length;
                continue;
            }

            // Collect literals until the next run of at least two pixels
            let mut literal_length = 1;
            while x + literal_length < row.len()
                && literal_length < 128
                && (x + literal_length + 1 >= row.len()
                    || row[x + literal_length] != row[x + literal_length + 1])
            {
                literal_length += 1;
            }

            bytes.push((literal_length - 1) as u8);
            for &pixel in &row[x..x + literal_length] {
                write_pixel(&mut bytes, pixel);
            }
            x += literal_length;
        }
    }

    // TGA 2.0 footer without extension or developer areas
    bytes.extend([0; 8]);
    bytes.extend_from_slice(FOOTER_SIGNATURE);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::rgb;

    fn header(image_type: u8, width: u16, height: u16, depth: u8, descriptor: u8) -> Vec<u8> {
        let mut bytes = vec![0, 0, image_type, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend(width.to_le_bytes());
        bytes.extend(height.to_le_bytes());
        bytes.extend([depth, descriptor]);
        bytes
    }

    #[test]
    fn bottom_up_grayscale() {
        let mut bytes = header(3, 2, 2, 8, 0);
        bytes.extend([10, 20, 30, 40]);
        let texture = decode(&bytes).unwrap();

        assert_eq!(texture.row(0), &[rgb(30, 30, 30), rgb(40, 40, 40)]);
        assert_eq!(texture.row(1), &[rgb(10, 10, 10), rgb(20, 20, 20)]);
    }

    #[test]
    fn right_to_left() {
        let mut bytes = header(2, 2, 1, 24, DESCRIPTOR_TOP_TO_BOTTOM | DESCRIPTOR_RIGHT_TO_LEFT);
        bytes.extend([0xFF, 0, 0, 0, 0, 0xFF]);
        let texture = decode(&bytes).unwrap();

        assert_eq!(texture.data(), &[rgb(0xFF, 0, 0), rgb(0, 0, 0xFF)]);
    }

    #[test]
    fn alpha_requires_alpha_bits() {
        let mut bytes = header(2, 1, 1, 32, DESCRIPTOR_TOP_TO_BOTTOM);
        bytes.extend([1, 2, 3, 0]);
        assert_eq!(decode(&bytes).unwrap().data(), &[rgb(3, 2, 1)]);

        let mut bytes = header(2, 1, 1, 32, DESCRIPTOR_TOP_TO_BOTTOM | 8);
        bytes.extend([1, 2, 3, 0]);
        assert_eq!(decode(&bytes).unwrap().data(), &[argb(0, 3, 2, 1)]);
    }

    #[test]
    fn rle_color_mapped() {
        let mut bytes = vec![0, 1, 9, 0, 0, 2, 0, 24, 0, 0, 0, 0];
        bytes.extend(3_u16.to_le_bytes());
        bytes.extend(1_u16.to_le_bytes());
        bytes.extend([8, DESCRIPTOR_TOP_TO_BOTTOM]);

        // Color map: blue, red
        bytes.extend([0xFF, 0, 0, 0, 0, 0xFF]);

        // Run of two index 1, then one raw index 0
        bytes.extend([0x81, 1, 0x00, 0]);
        let texture = decode(&bytes).unwrap();

        let (red, blue) = (rgb(0xFF, 0, 0), rgb(0, 0, 0xFF));
        assert_eq!(texture.data(), &[red, red, blue]);
    }

    #[test]
    fn encoded_files_have_a_footer() {
        let texture = PixelBuffer::from_data(vec![rgb(1, 2, 3); 6], 3, 2);
        let bytes = encode(&texture);

        assert!(has_footer(&bytes));
        assert!(header_is_plausible(&bytes));
        assert_eq!(decode(&bytes).unwrap(), texture);
    }

    #[test]
    fn mixed_runs_and_literals() {
        let pixels = vec![
            1, 1, 1, 2, 3, 4, 4, 5, 0x8000_0000, 0x8000_0000, 6, 7, 8, 9, 9, 9,
        ];
        let texture = PixelBuffer::from_data(pixels, 8, 2);

        assert_eq!(decode(&encode(&texture)).unwrap(), texture);
    }

    #[test]
    fn implausible_headers() {
        assert!(!header_is_plausible(&header(4, 1, 1, 8, 0)));
        assert!(!header_is_plausible(&header(2, 0, 1, 24, 0)));
        assert!(!header_is_plausible(&header(2, 1, 1, 7, 0)));
        assert!(!header_is_plausible(b"short"));
    }
}
