//! The [Quite OK Image Format](https://qoiformat.org/qoi-specification.pdf)

use crate::{
    color::Rgba,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use error_derive::Error;
use sl_std::bytestream::ByteStream;

pub(crate) const QOI_MAGIC: [u8; 4] = *b"qoif";
const END_MARKER: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

const QOI_OP_INDEX: u8 = 0b0000_0000;
const QOI_OP_DIFF: u8 = 0b0100_0000;
const QOI_OP_LUMA: u8 = 0b1000_0000;
const QOI_OP_RUN: u8 = 0b1100_0000;
const QOI_OP_RGB: u8 = 0xFE;
const QOI_OP_RGBA: u8 = 0xFF;
const TAG_MASK: u8 = 0b1100_0000;

const MAX_RUN_LENGTH: u8 = 62;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "missing qoif signature"]
    NotAQoi,

    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "invalid number of channels"]
    InvalidChannels,

    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        false
    }
}

fn hash(pixel: Rgba) -> usize {
    (pixel.red as usize * 3
        + pixel.green as usize * 5
        + pixel.blue as usize * 7
        + pixel.alpha as usize * 11)
        % 64
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let mut byte_stream = ByteStream::new(bytes);

    if byte_stream.next_chunk() != Some(QOI_MAGIC) {
        return Err(Error::NotAQoi);
    }

    let width = byte_stream
        .next_be_u32()
        .ok_or(Error::UnexpectedEndOfFile)? as usize;
    let height = byte_stream
        .next_be_u32()
        .ok_or(Error::UnexpectedEndOfFile)? as usize;
    let [channels, colorspace] = byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;

    if !matches!(channels, 3 | 4) {
        return Err(Error::InvalidChannels);
    }

    log::debug!("qoi image: {width}x{height}, {channels} channels, colorspace {colorspace}");

    if !dimensions_are_acceptable(width, height) {
        log::error!("Refusing to allocate image of size {width}x{height}");
        return Err(Error::RefuseToParse);
    }

    let num_pixels = width * height;
    let mut pixels = Vec::with_capacity(num_pixels);
    let mut seen = [Rgba::default(); 64];
    let mut previous = Rgba::new(0, 0, 0, 0xFF);

    while pixels.len() < num_pixels {
        let tag = byte_stream
            .next_byte()
            .ok_or(Error::UnexpectedEndOfFile)?;

        let pixel = match tag {
            QOI_OP_RGB => {
                let [red, green, blue] =
                    byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;
                Rgba { red, green, blue, ..previous }
            },
            QOI_OP_RGBA => {
                let [red, green, blue, alpha] =
                    byte_stream.next_chunk().ok_or(Error::UnexpectedEndOfFile)?;
                Rgba::new(red, green, blue, alpha)
            },
            _ => match tag & TAG_MASK {
                QOI_OP_INDEX => seen[tag as usize],
                QOI_OP_DIFF => Rgba {
                    red: previous.red.wrapping_add((tag >> 4) & 0b11).wrapping_sub(2),
                    green: previous.green.wrapping_add((tag >> 2) & 0b11).wrapping_sub(2),
                    blue: previous.blue.wrapping_add(tag & 0b11).wrapping_sub(2),
                    alpha: previous.alpha,
                },
                QOI_OP_LUMA => {
                    let next = byte_stream
                        .next_byte()
                        .ok_or(Error::UnexpectedEndOfFile)?;
                    let green_diff = (tag & 0b11_1111).wrapping_sub(32);
                    let red_diff = green_diff.wrapping_add(next >> 4).wrapping_sub(8);
                    let blue_diff = green_diff.wrapping_add(next & 0b1111).wrapping_sub(8);

                    Rgba {
                        red: previous.red.wrapping_add(red_diff),
                        green: previous.green.wrapping_add(green_diff),
                        blue: previous.blue.wrapping_add(blue_diff),
                        alpha: previous.alpha,
                    }
                },
                _ => {
                    // QOI_OP_RUN, the pixel is repeated `run_length` times in total
                    let run_length = (tag & 0b11_1111) as usize + 1;
                    let repeat = run_length.min(num_pixels - pixels.len());
                    pixels.extend(std::iter::repeat(u32::from(previous)).take(repeat - 1));
                    previous
                },
            },
        };

        seen[hash(pixel)] = pixel;
        previous = pixel;
        pixels.push(u32::from(pixel));
    }

    // Every pixel is known at this point, a missing end marker is tolerated
    if byte_stream.next_chunk() != Some(END_MARKER) {
        log::warn!("qoi file is missing its end marker");
    }

    Ok(PixelBuffer::from_data(pixels, width, height))
}

#[must_use]
pub fn encode(texture: &PixelBuffer) -> Vec<u8> {
    let has_alpha = texture.data().iter().any(|pixel| pixel >> 24 != 0xFF);

    let mut bytes = Vec::with_capacity(14 + texture.data().len() * 2 + END_MARKER.len());
    bytes.extend_from_slice(&QOI_MAGIC);
    bytes.extend((texture.width() as u32).to_be_bytes());
    bytes.extend((texture.height() as u32).to_be_bytes());
    bytes.push(if has_alpha { 4 } else { 3 });

    // sRGB with linear alpha
    bytes.push(0);

    let mut seen = [Rgba::default(); 64];
    let mut previous = Rgba::new(0, 0, 0, 0xFF);
    let mut run_length = 0;

    for &packed in texture.data() {
        let pixel = Rgba::from(packed);

        if pixel == previous {
            run_length += 1;
            if run_length == MAX_RUN_LENGTH {
                bytes.push(QOI_OP_RUN | (run_length - 1));
                run_length = 0;
            }
            continue;
        }

        if run_length > 0 {
            bytes.push(QOI_OP_RUN | (run_length - 1));
            run_length = 0;
        }

        let index = hash(pixel);
        if seen[index] == pixel {
            bytes.push(QOI_OP_INDEX | index as u8);
        } else if pixel.alpha == previous.alpha {
            let red_diff = pixel.red.wrapping_sub(previous.red) as i8;
            let green_diff = pixel.green.wrapping_sub(previous.green) as i8;
            let blue_diff = pixel.blue.wrapping_sub(previous.blue) as i8;
            let red_green = red_diff.wrapping_sub(green_diff);
            let blue_green = blue_diff.wrapping_sub(green_diff);

            let small = -2..=1;
            if small.contains(&red_diff) && small.contains(&green_diff) && small.contains(&blue_diff)
            {
                bytes.push(
                    QOI_OP_DIFF
                        | ((red_diff + 2) as u8) << 4
                        | ((green_diff + 2) as u8) << 2
                        | (blue_diff + 2) as u8,
                );
            } else if (-32..=31).contains(&green_diff)
                && (-8..=7).contains(&red_green)
                && (-8..=7).contains(&blue_green)
            {
                bytes.push(QOI_OP_LUMA | (green_diff + 32) as u8);
                bytes.push(((red_green + 8) as u8) << 4 | (blue_green + 8) as u8);
            } else {
                bytes.extend([QOI_OP_RGB, pixel.red, pixel.green, pixel.blue]);
            }
        } else {
            bytes.extend([QOI_OP_RGBA, pixel.red, pixel.green, pixel.blue, pixel.alpha]);
        }

        seen[index] = pixel;
        previous = pixel;
    }

    if run_length > 0 {
        bytes.push(QOI_OP_RUN | (run_length - 1));
    }

    bytes.extend(END_MARKER);
    bytes
}
