//! Implements a [PNG](https://www.w3.org/TR/png) decoder and encoder

pub mod chunks;

use compression::zlib;
use error_derive::Error;
use hash::Crc32Hasher;
use sl_std::bytestream::ByteStream;

use crate::{
    color::argb,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use self::chunks::{
    ihdr::{ImageHeaderError, ImageType, InterlaceMethod},
    plte::PaletteError,
    ImageHeader, Palette, Transparency,
};

pub(crate) const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// `(x_start, y_start, x_step, y_step)` for each of the seven Adam7 passes
const ADAM7_PASSES: [(usize, usize, usize, usize); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

#[derive(Debug, Error)]
pub enum Error {
    #[msg = "missing png signature"]
    NotAPng,

    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "first chunk is not IHDR"]
    ExpectedIHDR,

    #[msg = "unknown critical chunk"]
    UnknownCriticalChunk,

    #[msg = "chunk checksum mismatch"]
    MismatchedChecksum,

    #[msg = "invalid IHDR chunk"]
    InvalidIHDRChunk(ImageHeaderError),

    #[msg = "invalid PLTE chunk"]
    InvalidPLTEChunk(PaletteError),

    #[msg = "invalid tRNS chunk"]
    InvalidtRNSChunk,

    #[msg = "IDAT chunks are not consecutive"]
    NonConsecutiveIDATChunk,

    #[msg = "no IDAT chunk"]
    MissingIDAT,

    /// Expected the length of the decompressed zlib stream to match the size of the scanlines plus the filter bytes
    #[msg = "decompressed data has the wrong size"]
    MismatchedDecompressedZlibSize,

    #[msg = "unknown filter type"]
    UnknownFilterType,

    #[msg = "indexed image without a PLTE chunk"]
    IndexedImageWithoutPLTE,

    #[msg = "palette index out of range"]
    PaletteIndexOutOfRange,

    #[msg = "zlib error"]
    ZLib(zlib::Error),

    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::InvalidIHDRChunk(error) if error.is_unknown())
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug)]
enum Chunk<'a> {
    /// Image Header
    IHDR(ImageHeader),
    /// Color Palette
    PLTE(Palette),
    /// Image Data
    IDAT(&'a [u8]),
    /// Image End
    IEND,
    /// Transparency
    tRNS(&'a [u8]),
    /// Any chunk that does not affect the decoded pixels
    Ancillary([u8; 4]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ParserStage {
    BeforeIDAT,
    DuringIDAT,
    AfterIDAT,
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let mut reader = ByteStream::new(bytes);

    if reader.next_chunk() != Some(PNG_HEADER) {
        return Err(Error::NotAPng);
    }

    let ihdr_chunk = read_chunk(&mut reader)?;
    let Chunk::IHDR(image_header) = ihdr_chunk else {
        log::warn!("Expected IHDR chunk, found {ihdr_chunk:?}");
        return Err(Error::ExpectedIHDR);
    };
    log::debug!("png header: {image_header:?}");

    let image_width = image_header.width as usize;
    let image_height = image_header.height as usize;
    if !dimensions_are_acceptable(image_width, image_height) {
        log::error!("Refusing to allocate image of size {image_width}x{image_height}");
        return Err(Error::RefuseToParse);
    }

    let mut parser_stage = ParserStage::BeforeIDAT;
    let mut idat = vec![];
    let mut palette = None;
    let mut transparency = None;

    // Read all the PNG chunks in the file
    loop {
        let chunk = read_chunk(&mut reader)?;

        if parser_stage == ParserStage::DuringIDAT && !matches!(chunk, Chunk::IDAT(_)) {
            parser_stage = ParserStage::AfterIDAT;
        }

        match chunk {
            Chunk::IEND => break,
            Chunk::IDAT(data) => {
                match parser_stage {
                    ParserStage::BeforeIDAT => parser_stage = ParserStage::DuringIDAT,
                    ParserStage::AfterIDAT => return Err(Error::NonConsecutiveIDATChunk),
                    _ => {},
                }
                idat.extend_from_slice(data);
            },
            Chunk::PLTE(plte) => palette = Some(plte),
            Chunk::tRNS(data) => {
                transparency = Some(
                    Transparency::new(data, image_header.image_type)
                        .ok_or(Error::InvalidtRNSChunk)?,
                );
            },
            Chunk::IHDR(_) => {
                log::warn!("Ignoring duplicate IHDR chunk");
            },
            Chunk::Ancillary(name) => {
                log::debug!("Skipping ancillary chunk {}", String::from_utf8_lossy(&name));
            },
        }
    }

    if parser_stage == ParserStage::BeforeIDAT {
        return Err(Error::MissingIDAT);
    }

    if image_header.image_type == ImageType::IndexedColor && palette.is_none() {
        log::error!("Cannot decode indexed color image without palette table");
        return Err(Error::IndexedImageWithoutPLTE);
    }

    let decompressed_body = zlib::decompress(&idat)?;

    let passes: Vec<(usize, usize, usize, usize)> = match image_header.interlace_method {
        InterlaceMethod::None => vec![(0, 0, 1, 1)],
        InterlaceMethod::Adam7 => ADAM7_PASSES.to_vec(),
    };

    let sample_converter = SampleConverter {
        header: &image_header,
        palette: palette.as_ref(),
        transparency: transparency.as_ref(),
    };

    let mut pixels = vec![0; image_width * image_height];
    let mut remaining_data = decompressed_body.as_slice();

    for (x_start, y_start, x_step, y_step) in passes {
        let pass_width = (image_width + x_step - 1 - x_start) / x_step;
        let pass_height = (image_height + y_step - 1 - y_start) / y_step;

        // Passes without pixels are omitted entirely
        if pass_width == 0 || pass_height == 0 {
            continue;
        }

        let scanline_width = image_header.scanline_width(pass_width);

        // NOTE: need to add 1 here because each scanline also contains a byte specifying a filter type
        let pass_size = (scanline_width + 1) * pass_height;
        if remaining_data.len() < pass_size {
            log::error!(
                "Decompressed data is too short: expected at least {pass_size} more bytes, found {}",
                remaining_data.len()
            );
            return Err(Error::MismatchedDecompressedZlibSize);
        }
        let (pass_data, rest) = remaining_data.split_at(pass_size);
        remaining_data = rest;

        let image_data = apply_filters(pass_data, scanline_width, image_header.filter_unit())?;

        for (pass_y, scanline) in image_data.chunks_exact(scanline_width).enumerate() {
            let y = y_start + pass_y * y_step;
            for pass_x in 0..pass_width {
                let x = x_start + pass_x * x_step;
                pixels[y * image_width + x] = sample_converter.pixel_at(scanline, pass_x)?;
            }
        }
    }

    if !remaining_data.is_empty() {
        log::warn!(
            "Ignoring {} trailing bytes of decompressed image data",
            remaining_data.len()
        );
    }

    Ok(PixelBuffer::from_data(pixels, image_width, image_height))
}

fn read_chunk<'a>(reader: &mut ByteStream<'a>) -> Result<Chunk<'a>, Error> {
    let length = reader.next_be_u32().ok_or(Error::UnexpectedEndOfFile)? as usize;
    let chunk_name_bytes: [u8; 4] = reader.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;
    let data = reader
        .next_slice(length)
        .ok_or(Error::UnexpectedEndOfFile)?;
    let expected_crc = reader.next_be_u32().ok_or(Error::UnexpectedEndOfFile)?;

    let mut hasher = Crc32Hasher::default();
    hasher.write(&chunk_name_bytes);
    hasher.write(data);
    let computed_crc = hasher.finish();

    if expected_crc != computed_crc {
        log::error!(
            "Incorrect chunk checksum: expected {expected_crc:0>8x}, found {computed_crc:0>8x}"
        );
        return Err(Error::MismatchedChecksum);
    }

    let chunk = match &chunk_name_bytes {
        b"IHDR" => Chunk::IHDR(ImageHeader::new(data)?),
        b"PLTE" => Chunk::PLTE(Palette::new(data)?),
        b"IDAT" => Chunk::IDAT(data),
        b"IEND" => {
            if length != 0 {
                log::warn!("IEND is not empty, found {length} bytes")
            }

            Chunk::IEND
        },
        b"tRNS" => Chunk::tRNS(data),
        other => {
            // The case of the first letter marks a chunk as critical
            if other[0].is_ascii_uppercase() {
                log::error!(
                    "Unknown critical chunk: {}",
                    String::from_utf8_lossy(other)
                );
                return Err(Error::UnknownCriticalChunk);
            }

            Chunk::Ancillary(*other)
        },
    };

    Ok(chunk)
}

/// Turns unfiltered scanline data into `0xAARRGGBB` pixels
struct SampleConverter<'a> {
    header: &'a ImageHeader,
    palette: Option<&'a Palette>,
    transparency: Option<&'a Transparency>,
}

impl<'a> SampleConverter<'a> {
    /// Read the sample with the given index from a scanline, samples are at most 16 bits wide
    fn sample(&self, scanline: &[u8], index: usize) -> u16 {
        match self.header.bit_depth {
            16 => u16::from_be_bytes([scanline[2 * index], scanline[2 * index + 1]]),
            8 => scanline[index] as u16,
            bits => {
                let bits = bits as usize;
                let bit_offset = index * bits;
                let byte = scanline[bit_offset / 8];
                let shift = 8 - bits - bit_offset % 8;
                ((byte >> shift) & ((1 << bits) - 1)) as u16
            },
        }
    }

    /// Scale a sample to 8 bits
    fn to_u8(&self, sample: u16) -> u8 {
        match self.header.bit_depth {
            16 => (sample >> 8) as u8,
            8 => sample as u8,
            bits => {
                let max = (1_u16 << bits) - 1;
                (sample * 255 / max) as u8
            },
        }
    }

    fn pixel_at(&self, scanline: &[u8], x: usize) -> Result<u32, Error> {
        let channels = self.header.image_type.num_channels();
        let sample = |channel: usize| self.sample(scanline, x * channels + channel);

        let pixel = match self.header.image_type {
            ImageType::GrayScale => {
                let gray = sample(0);
                let alpha = match self.transparency {
                    Some(Transparency::GrayScale(transparent)) if *transparent == gray => 0,
                    _ => 0xFF,
                };
                let gray = self.to_u8(gray);
                argb(alpha, gray, gray, gray)
            },
            ImageType::GrayScaleWithAlpha => {
                let gray = self.to_u8(sample(0));
                argb(self.to_u8(sample(1)), gray, gray, gray)
            },
            ImageType::TrueColor => {
                let color = [sample(0), sample(1), sample(2)];
                let alpha = match self.transparency {
                    Some(Transparency::TrueColor(transparent)) if *transparent == color => 0,
                    _ => 0xFF,
                };
                argb(
                    alpha,
                    self.to_u8(color[0]),
                    self.to_u8(color[1]),
                    self.to_u8(color[2]),
                )
            },
            ImageType::TrueColorWithAlpha => argb(
                self.to_u8(sample(3)),
                self.to_u8(sample(0)),
                self.to_u8(sample(1)),
                self.to_u8(sample(2)),
            ),
            ImageType::IndexedColor => {
                let index = sample(0) as usize;
                let color = self
                    .palette
                    .and_then(|palette| palette.colors.get(index))
                    .copied()
                    .ok_or(Error::PaletteIndexOutOfRange)?;
                let alpha = match self.transparency {
                    Some(Transparency::Indexed(alphas)) => {
                        alphas.get(index).copied().unwrap_or(0xFF)
                    },
                    _ => 0xFF,
                };
                color & 0x00FF_FFFF | (alpha as u32) << 24
            },
        };

        Ok(pixel)
    }
}

/// Reverse the filters specified in <https://www.w3.org/TR/png/#9-table91>
///
/// `from` contains scanlines that are each prefixed with their filter type
fn apply_filters(from: &[u8], scanline_width: usize, filter_unit: usize) -> Result<Vec<u8>, Error> {
    let num_scanlines = from.len() / (scanline_width + 1);
    let mut to = vec![0; num_scanlines * scanline_width];
    let mut previous_scanline = vec![0; scanline_width];

    for (scanline_data_and_filter_method, current_scanline) in from
        .chunks_exact(scanline_width + 1)
        .zip(to.chunks_exact_mut(scanline_width))
    {
        let (filter_type, filtered_data) = (
            scanline_data_and_filter_method[0],
            &scanline_data_and_filter_method[1..],
        );

        let filter = Filter::try_from(filter_type)?;

        for i in 0..scanline_width {
            // a: the byte to the left, b: the byte above, c: the byte above and to the left
            let a = if i >= filter_unit {
                current_scanline[i - filter_unit]
            } else {
                0
            };
            let b = previous_scanline[i];
            let c = if i >= filter_unit {
                previous_scanline[i - filter_unit]
            } else {
                0
            };

            let predictor = match filter {
                Filter::None => 0,
                Filter::Sub => a,
                Filter::Up => b,
                Filter::Average => ((a as u16 + b as u16) / 2) as u8,
                Filter::Paeth => paeth(a, b, c),
            };
            current_scanline[i] = filtered_data[i].wrapping_add(predictor);
        }

        previous_scanline.copy_from_slice(current_scanline);
    }
    Ok(to)
}

/// Filter one scanline with every filter type and keep the one with the smallest sum of
/// absolute differences
fn filter_scanline(
    scanline: &[u8],
    previous_scanline: &[u8],
    filter_unit: usize,
    output: &mut Vec<u8>,
) {
    let mut best: Option<(u64, Vec<u8>)> = None;

    for filter in [
        Filter::None,
        Filter::Sub,
        Filter::Up,
        Filter::Average,
        Filter::Paeth,
    ] {
        let mut filtered = Vec::with_capacity(scanline.len() + 1);
        filtered.push(filter as u8);

        for i in 0..scanline.len() {
            let a = if i >= filter_unit {
                scanline[i - filter_unit]
            } else {
                0
            };
            let b = previous_scanline[i];
            let c = if i >= filter_unit {
                previous_scanline[i - filter_unit]
            } else {
                0
            };

            let predictor = match filter {
                Filter::None => 0,
                Filter::Sub => a,
                Filter::Up => b,
                Filter::Average => ((a as u16 + b as u16) / 2) as u8,
                Filter::Paeth => paeth(a, b, c),
            };
            filtered.push(scanline[i].wrapping_sub(predictor));
        }

        let cost = filtered[1..]
            .iter()
            .map(|&byte| (byte as i8).unsigned_abs() as u64)
            .sum();

        if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
            best = Some((cost, filtered));
        }
    }

    if let Some((_, filtered)) = best {
        output.extend(filtered);
    }
}

/// <https://www.w3.org/TR/png/#9Filter-type-4-Paeth>
/// Note that this function only implements a single selection
/// step in the paeth algorithm
#[inline]
#[must_use]
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    // Note that we need to use i16's because all the calculations
    // must be performed without overflows
    let a_i16 = a as i16;
    let b_i16 = b as i16;
    let c_i16 = c as i16;

    let p = a_i16 + b_i16 - c_i16;
    let pa = (p - a_i16).abs();
    let pb = (p - b_i16).abs();
    let pc = (p - c_i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[derive(Clone, Copy, Debug)]
enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl TryFrom<u8> for Filter {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Sub),
            2 => Ok(Self::Up),
            3 => Ok(Self::Average),
            4 => Ok(Self::Paeth),
            _ => Err(Error::UnknownFilterType),
        }
    }
}

/// Append a chunk, including its length and checksum
pub(crate) fn write_chunk(output: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    output.extend((data.len() as u32).to_be_bytes());
    output.extend_from_slice(chunk_type);
    output.extend_from_slice(data);

    let mut hasher = Crc32Hasher::default();
    hasher.write(chunk_type);
    hasher.write(data);
    output.extend(hasher.finish().to_be_bytes());
}

/// Encode as an 8 bit truecolor image, with an alpha channel only if any pixel is translucent
#[must_use]
pub fn encode(texture: &PixelBuffer) -> Vec<u8> {
    let has_alpha = texture.data().iter().any(|pixel| pixel >> 24 != 0xFF);

    let header = ImageHeader {
        width: texture.width() as u32,
        height: texture.height() as u32,
        bit_depth: 8,
        image_type: if has_alpha {
            ImageType::TrueColorWithAlpha
        } else {
            ImageType::TrueColor
        },
        interlace_method: InterlaceMethod::None,
    };

    let scanline_width = header.scanline_width(texture.width());
    let mut filtered = Vec::with_capacity((scanline_width + 1) * texture.height());
    let mut previous_scanline = vec![0; scanline_width];
    let mut scanline = Vec::with_capacity(scanline_width);

    for y in 0..texture.height() {
        scanline.clear();
        for &pixel in texture.row(y) {
            let [alpha, red, green, blue] = pixel.to_be_bytes();
            scanline.extend([red, green, blue]);
            if has_alpha {
                scanline.push(alpha);
            }
        }

        filter_scanline(&scanline, &previous_scanline, header.filter_unit(), &mut filtered);
        std::mem::swap(&mut previous_scanline, &mut scanline);
    }

    let mut bytes = PNG_HEADER.to_vec();
    write_chunk(&mut bytes, b"IHDR", &header.to_bytes());
    write_chunk(&mut bytes, b"IDAT", &zlib::compress(&filtered));
    write_chunk(&mut bytes, b"IEND", &[]);
    bytes
}
