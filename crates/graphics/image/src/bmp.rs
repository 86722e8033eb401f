//! The `.bmp` file format
//!
//! Information about the format can be found at
//! * <http://www.ece.ualberta.ca/~elliott/ee552/studentAppNotes/2003_w/misc/bmp_file_format/bmp_file_format.htm>
//! * <http://www.martinreddy.net/gfx/2d/BMP.txt>

use crate::{
    color::argb,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use error_derive::Error;
use sl_std::bytestream::ByteStream;

pub(crate) const BMP_MAGIC: [u8; 2] = [0x42, 0x4d];

const FILE_HEADER_SIZE: usize = 14;
const CORE_HEADER_SIZE: u32 = 12;
const INFO_HEADER_SIZE: u32 = 40;
const V4_HEADER_SIZE: u32 = 108;

/// `sRGB` in the V4 header color space field
const LCS_SRGB: u32 = 0x7352_4742;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "missing BM signature"]
    NotABmp,

    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "unsupported info header size"]
    UnknownHeaderSize,

    #[msg = "unsupported number of bits per pixel"]
    UnknownColorFormat,

    #[msg = "unsupported compression"]
    UnknownCompression,

    #[msg = "compression does not match the bit depth"]
    InvalidCompression,

    #[msg = "palette index out of range"]
    PaletteTooSmall,

    #[msg = "invalid color masks"]
    InvalidBitMasks,

    /// This image contains extreme values and cannot be parsed
    ///
    /// For example, the image might be too large to fit in memory.
    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    /// Whether the file is valid but uses a feature this decoder does not implement
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnknownCompression | Self::UnknownHeaderSize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compression {
    None,
    Rle8Bit,
    Rle4Bit,
    BitFields,
}

/// Describes where a channel is stored within a pixel
#[derive(Clone, Copy, Debug, Default)]
struct BitMask {
    shift: u32,
    bits: u32,
}

impl BitMask {
    fn new(mask: u32) -> Result<Self, Error> {
        if mask == 0 {
            return Ok(Self::default());
        }

        let shift = mask.trailing_zeros();
        let bits = (mask >> shift).trailing_ones();

        // The set bits of a mask have to be contiguous
        if (mask >> shift) >> bits != 0 {
            return Err(Error::InvalidBitMasks);
        }

        Ok(Self { shift, bits })
    }

    fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Extract the channel and scale it to 8 bits
    fn extract(&self, pixel: u32) -> u8 {
        if self.is_empty() {
            return 0;
        }

        let max = if self.bits >= 32 {
            u32::MAX
        } else {
            (1 << self.bits) - 1
        };
        let value = (pixel >> self.shift) & max;

        if self.bits >= 8 {
            (value >> (self.bits - 8)) as u8
        } else {
            ((value * 255 + max / 2) / max) as u8
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ColorMasks {
    red: BitMask,
    green: BitMask,
    blue: BitMask,
    alpha: BitMask,

    /// Images without explicit masks often leave the alpha byte zeroed
    alpha_is_implied: bool,
}

impl ColorMasks {
    fn from_masks(red: u32, green: u32, blue: u32, alpha: u32) -> Result<Self, Error> {
        Ok(Self {
            red: BitMask::new(red)?,
            green: BitMask::new(green)?,
            blue: BitMask::new(blue)?,
            alpha: BitMask::new(alpha)?,
            alpha_is_implied: false,
        })
    }

    fn default_for(bits_per_pixel: u16) -> Result<Self, Error> {
        match bits_per_pixel {
            16 => Self::from_masks(0x7C00, 0x03E0, 0x001F, 0),
            _ => Ok(Self {
                alpha_is_implied: true,
                ..Self::from_masks(0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000)?
            }),
        }
    }

    fn to_argb(&self, pixel: u32) -> u32 {
        let alpha = if self.alpha.is_empty() {
            0xFF
        } else {
            self.alpha.extract(pixel)
        };

        argb(
            alpha,
            self.red.extract(pixel),
            self.green.extract(pixel),
            self.blue.extract(pixel),
        )
    }
}

#[derive(Clone, Debug)]
struct InfoHeader {
    header_size: u32,
    width: usize,
    height: usize,
    top_down: bool,
    bits_per_pixel: u16,
    compression: Compression,
    colors_used: u32,
    masks: Option<[u32; 4]>,
}

fn read_info_header(byte_stream: &mut ByteStream<'_>) -> Result<InfoHeader, Error> {
    let header_start = byte_stream.cursor();
    let header_size = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    let (width, height) = match header_size {
        CORE_HEADER_SIZE => {
            let width = byte_stream
                .next_le_i16()
                .ok_or(Error::UnexpectedEndOfFile)?;
            let height = byte_stream
                .next_le_i16()
                .ok_or(Error::UnexpectedEndOfFile)?;
            (width as i32, height as i32)
        },
        40 | 52 | 56 | 64 | V4_HEADER_SIZE | 124 => {
            let width = byte_stream
                .next_le_i32()
                .ok_or(Error::UnexpectedEndOfFile)?;
            let height = byte_stream
                .next_le_i32()
                .ok_or(Error::UnexpectedEndOfFile)?;
            (width, height)
        },
        other => {
            log::error!("Unknown bmp info header size: {other}");
            return Err(Error::UnknownHeaderSize);
        },
    };

    let planes = byte_stream
        .next_le_u16()
        .ok_or(Error::UnexpectedEndOfFile)?;

    if planes != 1 {
        log::warn!("Unexpected number of planes, expected 1, got {planes:?}");
    }

    let bits_per_pixel = byte_stream
        .next_le_u16()
        .ok_or(Error::UnexpectedEndOfFile)?;

    if !matches!(bits_per_pixel, 1 | 4 | 8 | 16 | 24 | 32) {
        log::error!("No format known for the given number of bits per pixel: {bits_per_pixel:?}");
        return Err(Error::UnknownColorFormat);
    }

    let mut info_header = InfoHeader {
        header_size,
        width: width.unsigned_abs() as usize,
        height: height.unsigned_abs() as usize,
        top_down: height < 0,
        bits_per_pixel,
        compression: Compression::None,
        colors_used: 0,
        masks: None,
    };

    if header_size == CORE_HEADER_SIZE {
        return Ok(info_header);
    }

    let compression = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    info_header.compression = match compression {
        0 => Compression::None,
        1 => Compression::Rle8Bit,
        2 => Compression::Rle4Bit,
        // 6 is BI_ALPHABITFIELDS
        3 | 6 => Compression::BitFields,
        other => {
            log::error!("Unknown compression format: {other:?}");
            return Err(Error::UnknownCompression);
        },
    };

    let valid_compression = match info_header.compression {
        Compression::None => true,
        Compression::Rle8Bit => bits_per_pixel == 8,
        Compression::Rle4Bit => bits_per_pixel == 4,
        Compression::BitFields => matches!(bits_per_pixel, 16 | 32),
    };

    if !valid_compression {
        log::error!(
            "Compression {:?} cannot be used with {bits_per_pixel} bits per pixel",
            info_header.compression
        );
        return Err(Error::InvalidCompression);
    }

    // Image size, horizontal and vertical resolution
    byte_stream.advance(12);

    info_header.colors_used = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    let _important_colors = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    if info_header.compression == Compression::BitFields {
        // Masks directly follow a plain info header, larger headers contain them
        let num_masks = if header_size == INFO_HEADER_SIZE {
            if compression == 6 {
                4
            } else {
                3
            }
        } else {
            4
        };

        let mut masks = [0; 4];
        for mask in masks.iter_mut().take(num_masks) {
            *mask = byte_stream
                .next_le_u32()
                .ok_or(Error::UnexpectedEndOfFile)?;
        }

        if header_size == 52 {
            // BITMAPV2INFOHEADER has no alpha mask
            masks[3] = 0;
        }

        info_header.masks = Some(masks);
    }

    if header_size != INFO_HEADER_SIZE {
        byte_stream.set_cursor(header_start + header_size as usize);
    }

    Ok(info_header)
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let mut byte_stream = ByteStream::new(bytes);

    // Start of header
    if byte_stream.next_chunk() != Some(BMP_MAGIC) {
        return Err(Error::NotABmp);
    }

    let file_size = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    if file_size as usize != bytes.len() {
        log::warn!(
            "bmp header states that the file size is 0x{file_size:x} bytes, but its 0x{:x}",
            bytes.len()
        );
    }

    let reserved = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)?;

    if reserved != 0 {
        log::warn!("Reserved field in bmp header is not zero (it is 0x{reserved:x})")
    }

    let image_data_offset = byte_stream
        .next_le_u32()
        .ok_or(Error::UnexpectedEndOfFile)? as usize;

    let info_header = read_info_header(&mut byte_stream)?;
    log::debug!("bmp info header: {info_header:?}");

    let (width, height) = (info_header.width, info_header.height);
    if !dimensions_are_acceptable(width, height) {
        log::error!("Refusing to allocate image of size {width}x{height}");
        return Err(Error::RefuseToParse);
    }

    // Read the palette, if any
    let palette = if info_header.bits_per_pixel <= 8 {
        let max_palette_size = 1 << info_header.bits_per_pixel;
        let palette_size = match info_header.colors_used {
            0 => max_palette_size,
            n => (n as usize).min(max_palette_size),
        };
        let entry_size = if info_header.header_size == CORE_HEADER_SIZE {
            3
        } else {
            4
        };

        let mut palette = Vec::with_capacity(palette_size);
        for _ in 0..palette_size {
            let entry = byte_stream
                .next_slice(entry_size)
                .ok_or(Error::UnexpectedEndOfFile)?;

            // Palette entries are stored as BGR(x)
            palette.push(argb(0xFF, entry[2], entry[1], entry[0]));
        }
        palette
    } else {
        vec![]
    };

    if byte_stream.cursor() != image_data_offset {
        log::warn!(
            "Expected image data to be at 0x{:x}, but its at 0x{image_data_offset:x} instead",
            byte_stream.cursor()
        );
    }

    let image_data = bytes
        .get(image_data_offset..)
        .ok_or(Error::UnexpectedEndOfFile)?;

    let mut pixels = match info_header.compression {
        Compression::Rle8Bit | Compression::Rle4Bit => {
            let indices = decode_rle(
                image_data,
                width,
                height,
                info_header.compression == Compression::Rle4Bit,
            )?;
            resolve_indices(&indices, &palette)?
        },
        _ if info_header.bits_per_pixel <= 8 => {
            let indices = read_packed_indices(image_data, &info_header)?;
            resolve_indices(&indices, &palette)?
        },
        _ => {
            let masks = match info_header.masks {
                Some([red, green, blue, alpha]) => {
                    ColorMasks::from_masks(red, green, blue, alpha)?
                },
                None => ColorMasks::default_for(info_header.bits_per_pixel)?,
            };
            read_true_color(image_data, &info_header, &masks)?
        },
    };

    // Rows are stored bottom to top unless the height is negative
    if !info_header.top_down {
        let rows: Vec<&[u32]> = pixels.chunks_exact(width).rev().collect();
        pixels = rows.concat();
    }

    Ok(PixelBuffer::from_data(pixels, width, height))
}

#[must_use]
fn align_up<const N: usize>(x: usize) -> usize {
    (x + N - 1) & !(N - 1)
}

fn scanlines<'a>(
    image_data: &'a [u8],
    info_header: &InfoHeader,
) -> Result<impl Iterator<Item = &'a [u8]>, Error> {
    let bits_per_scanline = info_header.width * info_header.bits_per_pixel as usize;
    let scanline_width = align_up::<4>(bits_per_scanline.div_ceil(8));

    let needed = scanline_width * info_header.height;
    if image_data.len() < needed {
        log::error!(
            "Expected at least 0x{needed:x} bytes of image data, found 0x{:x}",
            image_data.len()
        );
        return Err(Error::UnexpectedEndOfFile);
    }

    Ok(image_data[..needed].chunks_exact(scanline_width))
}

fn read_packed_indices(image_data: &[u8], info_header: &InfoHeader) -> Result<Vec<u8>, Error> {
    let bits = info_header.bits_per_pixel as usize;
    let pixels_per_byte = 8 / bits;
    let mask = ((1_u16 << bits) - 1) as u8;

    let mut indices = Vec::with_capacity(info_header.width * info_header.height);
    for scanline in scanlines(image_data, info_header)? {
        for x in 0..info_header.width {
            let byte = scanline[x / pixels_per_byte];

            // The leftmost pixel is stored in the most significant bits
            let shift = 8 - bits * (x % pixels_per_byte + 1);
            indices.push((byte >> shift) & mask);
        }
    }

    Ok(indices)
}

fn read_true_color(
    image_data: &[u8],
    info_header: &InfoHeader,
    masks: &ColorMasks,
) -> Result<Vec<u32>, Error> {
    let bytes_per_pixel = info_header.bits_per_pixel as usize / 8;

    let mut pixels = Vec::with_capacity(info_header.width * info_header.height);
    for scanline in scanlines(image_data, info_header)? {
        for pixel in scanline
            .chunks_exact(bytes_per_pixel)
            .take(info_header.width)
        {
            let value = match *pixel {
                [low, high] => u16::from_le_bytes([low, high]) as u32,
                [blue, green, red] => argb(0xFF, red, green, blue),
                [a, b, c, d] => u32::from_le_bytes([a, b, c, d]),
                _ => unreachable!(),
            };

            let color = if bytes_per_pixel == 3 {
                value
            } else {
                masks.to_argb(value)
            };
            pixels.push(color);
        }
    }

    if masks.alpha_is_implied && pixels.iter().all(|pixel| pixel >> 24 == 0) {
        log::debug!("bmp alpha channel is entirely zero, treating the image as opaque");
        pixels.iter_mut().for_each(|pixel| *pixel |= 0xFF00_0000);
    }

    Ok(pixels)
}

/// Decode RLE4/RLE8 data into one palette index per pixel (in file row order)
fn decode_rle(data: &[u8], width: usize, height: usize, is_rle4: bool) -> Result<Vec<u8>, Error> {
    let mut indices = vec![0; width * height];
    let mut byte_stream = ByteStream::new(data);
    let (mut x, mut y) = (0, 0);

    let mut put = |x: &mut usize, y: usize, index: u8| {
        if *x < width && y < height {
            indices[y * width + *x] = index;
        }
        *x += 1;
    };

    loop {
        let count = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;
        let value = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;

        if count > 0 {
            for i in 0..count {
                let index = if is_rle4 {
                    if i % 2 == 0 {
                        value >> 4
                    } else {
                        value & 0xF
                    }
                } else {
                    value
                };
                put(&mut x, y, index);
            }
            continue;
        }

        match value {
            // End of line
            0 => {
                x = 0;
                y += 1;
            },
            // End of bitmap
            1 => break,
            // Delta
            2 => {
                let [dx, dy] = byte_stream
                    .next_chunk()
                    .ok_or(Error::UnexpectedEndOfFile)?;
                x += dx as usize;
                y += dy as usize;
            },
            // Absolute mode
            num_pixels => {
                let num_bytes = if is_rle4 {
                    (num_pixels as usize).div_ceil(2)
                } else {
                    num_pixels as usize
                };
                let literal = byte_stream
                    .next_slice(num_bytes)
                    .ok_or(Error::UnexpectedEndOfFile)?;

                for i in 0..num_pixels as usize {
                    let index = if is_rle4 {
                        let byte = literal[i / 2];
                        if i % 2 == 0 {
                            byte >> 4
                        } else {
                            byte & 0xF
                        }
                    } else {
                        literal[i]
                    };
                    put(&mut x, y, index);
                }

                // Runs are padded to 16 bit boundaries
                if num_bytes % 2 == 1 {
                    byte_stream.advance(1);
                }
            },
        }

        if height <= y {
            break;
        }
    }

    Ok(indices)
}

fn resolve_indices(indices: &[u8], palette: &[u32]) -> Result<Vec<u32>, Error> {
    indices
        .iter()
        .map(|&index| {
            palette
                .get(index as usize)
                .copied()
                .ok_or(Error::PaletteTooSmall)
        })
        .collect()
}

/// Encode as an uncompressed bottom-up bitmap
///
/// Opaque images are stored with 24 bits per pixel, images with any transparency use
/// 32 bits per pixel and an explicit alpha mask.
#[must_use]
pub fn encode(texture: &PixelBuffer) -> Vec<u8> {
    let has_alpha = texture.data().iter().any(|pixel| pixel >> 24 != 0xFF);
    let (bits_per_pixel, info_header_size): (u16, u32) = if has_alpha {
        (32, V4_HEADER_SIZE)
    } else {
        (24, INFO_HEADER_SIZE)
    };

    let scanline_width = align_up::<4>(texture.width() * bits_per_pixel as usize / 8);
    let image_size = scanline_width * texture.height();
    let image_data_offset = FILE_HEADER_SIZE + info_header_size as usize;

    let mut bytes = Vec::with_capacity(image_data_offset + image_size);
    bytes.extend_from_slice(&BMP_MAGIC);
    bytes.extend(((image_data_offset + image_size) as u32).to_le_bytes());
    bytes.extend(0_u32.to_le_bytes());
    bytes.extend((image_data_offset as u32).to_le_bytes());

    bytes.extend(info_header_size.to_le_bytes());
    bytes.extend((texture.width() as i32).to_le_bytes());
    bytes.extend((texture.height() as i32).to_le_bytes());
    bytes.extend(1_u16.to_le_bytes());
    bytes.extend(bits_per_pixel.to_le_bytes());
    bytes.extend((if has_alpha { 3_u32 } else { 0 }).to_le_bytes());
    bytes.extend((image_size as u32).to_le_bytes());

    // 72 DPI
    bytes.extend(2835_u32.to_le_bytes());
    bytes.extend(2835_u32.to_le_bytes());

    // Colors used, important colors
    bytes.extend([0; 8]);

    if has_alpha {
        for mask in [0x00FF_0000_u32, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000] {
            bytes.extend(mask.to_le_bytes());
        }
        bytes.extend(LCS_SRGB.to_le_bytes());

        // Endpoints and gamma are unused for sRGB
        bytes.resize(image_data_offset, 0);
    }

    for y in (0..texture.height()).rev() {
        let scanline_start = bytes.len();
        for &pixel in texture.row(y) {
            let [alpha, red, green, blue] = pixel.to_be_bytes();
            bytes.extend([blue, green, red]);
            if has_alpha {
                bytes.push(alpha);
            }
        }
        bytes.resize(scanline_start + scanline_width, 0);
    }

    bytes
}
