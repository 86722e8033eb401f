//! JPEG decoding module
//!
//! Supports baseline and progressive huffman coded images with 8 bit precision
//! and either one (grayscale) or three (YCbCr or RGB) components.
//!
//! ## Resources
//! * <https://www.w3.org/Graphics/JPEG/itu-t81.pdf>
//! * <https://www.w3.org/Graphics/JPEG/>
//! * <https://imrannazar.com/series/lets-build-a-jpeg-decoder>
//! * <http://www.opennet.ru/docs/formats/jpeg.txt>

mod bit_reader;
mod chunk;
mod colors;
mod cosine_transform;
mod frame_header;
mod huffman_table;
mod quantization_table;
mod scan;

use error_derive::Error;

use crate::{
    color::rgb,
    texture::{dimensions_are_acceptable, PixelBuffer},
};

use self::{
    chunk::{Chunk, Chunks},
    frame_header::{FrameComponent, FrameHeader},
    huffman_table::HuffmanTables,
    quantization_table::{QuantizationTable, QuantizationTables},
    scan::ScanHeader,
};

/// `SOI` followed by the first byte of the next marker
pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[msg = "malformed segment"]
    BadChunk,

    #[msg = "segment in unexpected position"]
    UnexpectedChunk,

    #[msg = "image has no frame or no scans"]
    IncompleteImage,

    /// Failed to parse frame data
    #[msg = "invalid frame header"]
    BadFrame,

    #[msg = "invalid scan"]
    BadScan,

    /// A `DHT` chunk failed to parse
    #[msg = "invalid huffman table"]
    BadHuffmanTable,

    #[msg = "invalid huffman code"]
    BadHuffmanCode,

    #[msg = "reference to undefined huffman table"]
    UndefinedHuffmanTable,

    /// A `DQT` chunk failed to parse
    #[msg = "invalid quantization table"]
    BadQuantizationTable,

    #[msg = "reference to undefined quantization table"]
    UndefinedQuantizationTable,

    #[msg = "quantization table contains zero"]
    ZeroInQuantizationTable,

    #[msg = "entropy coded data ended unexpectedly"]
    UnexpectedEndOfScan,

    /// Arithmetic coding, lossless or hierarchical mode, 12 bit samples or CMYK
    #[msg = "unsupported jpeg variant"]
    Unsupported,

    /// This image contains extreme values and cannot be parsed
    #[msg = "image dimensions out of range"]
    RefuseToParse,
}

impl Error {
    /// Whether the file is valid but uses a feature this decoder does not implement
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }
}

/// Decoding state of a single frame component
#[derive(Clone, Debug)]
struct Component {
    id: u8,
    horizontal_sampling_factor: u8,
    vertical_sampling_factor: u8,
    quantization_table_index: u8,

    /// Quantization table in use when the component appeared in its first scan
    quantization_table: Option<QuantizationTable>,

    /// Number of blocks per line including those only needed to complete MCUs
    blocks_per_line: usize,
    blocks_per_column: usize,

    /// Number of blocks covering the component itself
    width_in_blocks: usize,
    height_in_blocks: usize,

    coefficients: Vec<[i16; 64]>,
    dc_prediction: i32,
}

impl Component {
    fn new(frame_component: &FrameComponent, frame: &FrameHeader) -> Self {
        let (mcus_per_line, mcus_per_column) = frame.mcus();
        let horizontal = frame_component.horizontal_sampling_factor as usize;
        let vertical = frame_component.vertical_sampling_factor as usize;

        let width = (frame.samples_per_line as usize * horizontal)
            .div_ceil(frame.max_horizontal_sampling_factor() as usize);
        let height = (frame.number_of_lines as usize * vertical)
            .div_ceil(frame.max_vertical_sampling_factor() as usize);

        let blocks_per_line = mcus_per_line * horizontal;
        let blocks_per_column = mcus_per_column * vertical;

        Self {
            id: frame_component.id,
            horizontal_sampling_factor: frame_component.horizontal_sampling_factor,
            vertical_sampling_factor: frame_component.vertical_sampling_factor,
            quantization_table_index: frame_component.quantization_table,
            quantization_table: None,
            blocks_per_line,
            blocks_per_column,
            width_in_blocks: width.div_ceil(8),
            height_in_blocks: height.div_ceil(8),
            coefficients: vec![[0; 64]; blocks_per_line * blocks_per_column],
            dc_prediction: 0,
        }
    }

    /// Transform the coefficients back into samples
    fn to_samples(&self) -> Result<Samples, Error> {
        let quantization_table = self
            .quantization_table
            .as_ref()
            .ok_or(Error::IncompleteImage)?;

        let stride = self.blocks_per_line * 8;
        let mut data = vec![0; stride * self.blocks_per_column * 8];
        let mut block_samples = [0; 64];

        for (block_index, coefficients) in self.coefficients.iter().enumerate() {
            cosine_transform::dequantize_and_perform_idct(
                coefficients,
                quantization_table,
                &mut block_samples,
            );

            let block_x = block_index % self.blocks_per_line;
            let block_y = block_index / self.blocks_per_line;
            for (row_index, row) in block_samples.chunks_exact(8).enumerate() {
                let start = (block_y * 8 + row_index) * stride + block_x * 8;
                data[start..start + 8].copy_from_slice(row);
            }
        }

        Ok(Samples {
            data,
            stride,
            horizontal_sampling_factor: self.horizontal_sampling_factor as usize,
            vertical_sampling_factor: self.vertical_sampling_factor as usize,
        })
    }
}

/// The decoded sample plane of one component
struct Samples {
    data: Vec<u8>,
    stride: usize,
    horizontal_sampling_factor: usize,
    vertical_sampling_factor: usize,
}

impl Samples {
    /// Nearest neighbour upsampling to the full image resolution
    #[inline]
    fn get(&self, x: usize, y: usize, max_horizontal: usize, max_vertical: usize) -> u8 {
        let x = x * self.horizontal_sampling_factor / max_horizontal;
        let y = y * self.vertical_sampling_factor / max_vertical;
        self.data[y * self.stride + x]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ColorTransform {
    YCbCr,
    Rgb,
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, Error> {
    Decoder::default().decode(bytes)
}

#[derive(Default)]
struct Decoder {
    huffman_tables: HuffmanTables,
    quantization_tables: QuantizationTables,
    restart_interval: u16,
    frame: Option<(FrameHeader, Vec<Component>)>,
    num_scans: usize,

    /// Set by a `JFIF` segment
    is_jfif: bool,

    /// Transform flag of an `Adobe` segment
    adobe_transform: Option<u8>,
}

impl Decoder {
    fn decode(mut self, bytes: &[u8]) -> Result<PixelBuffer, Error> {
        let mut chunks = Chunks::new(bytes);

        let first_chunk = chunks.next().transpose()?;
        if !matches!(first_chunk, Some(Chunk::StartOfImage)) {
            log::error!("Expected SOI chunk, found {first_chunk:?}");
            return Err(Error::UnexpectedChunk);
        }

        for chunk in chunks {
            match chunk? {
                Chunk::EndOfImage => break,
                Chunk::StartOfImage => return Err(Error::UnexpectedChunk),
                Chunk::ApplicationSpecific { subscript, data } => {
                    self.process_application_segment(subscript, data);
                },
                Chunk::StartOfFrame { subscript, data } => {
                    self.process_frame_header(FrameHeader::new(subscript, data)?)?;
                },
                Chunk::DefineHuffmanTable(data) => {
                    self.huffman_tables.add_tables(data)?;
                },
                Chunk::DefineQuantizationTable(data) => {
                    self.quantization_tables.add_tables(data)?;
                },
                Chunk::DefineRestartInterval(data) => {
                    let &[high, low] = data else {
                        return Err(Error::BadChunk);
                    };
                    self.restart_interval = u16::from_be_bytes([high, low]);
                },
                Chunk::StartOfScan { data, scan } => {
                    self.process_scan(data, &scan)?;
                },
                Chunk::Ignored(marker) => log::debug!("Skipping jpeg segment 0xFF{marker:02X}"),
                Chunk::Comment => {},
            }
        }

        if self.num_scans == 0 {
            log::error!("Decoder did not terminate with a complete decoded image");
            return Err(Error::IncompleteImage);
        }

        self.finish()
    }

    fn process_application_segment(&mut self, subscript: u8, data: &[u8]) {
        match subscript {
            0 if data.starts_with(b"JFIF\0") => self.is_jfif = true,
            14 if data.starts_with(b"Adobe") => {
                self.adobe_transform = data.get(11).copied();
            },
            _ => {},
        }
    }

    fn process_frame_header(&mut self, frame_header: FrameHeader) -> Result<(), Error> {
        if self.frame.is_some() {
            log::error!("Jpeg image contains more than one frame");
            return Err(Error::UnexpectedChunk);
        }

        let width = frame_header.samples_per_line as usize;
        let height = frame_header.number_of_lines as usize;
        if !dimensions_are_acceptable(width, height) {
            log::error!("Refusing to decode {width}x{height} jpeg image");
            return Err(Error::RefuseToParse);
        }

        log::debug!(
            "Jpeg frame: {width}x{height}, {:?}, {} components",
            frame_header.coding_scheme,
            frame_header.components.len()
        );

        let components: Vec<Component> = frame_header
            .components
            .iter()
            .map(|component| Component::new(component, &frame_header))
            .collect();

        self.frame = Some((frame_header, components));
        Ok(())
    }

    fn process_scan(&mut self, header_data: &[u8], scan: &[u8]) -> Result<(), Error> {
        let Some((frame_header, components)) = self.frame.as_mut() else {
            log::error!("Scan before frame header");
            return Err(Error::UnexpectedChunk);
        };

        let scan_header = ScanHeader::new(header_data, frame_header)?;

        for scan_component in &scan_header.components {
            let component = &mut components[scan_component.component_index];
            if component.quantization_table.is_none() {
                let table = self
                    .quantization_tables
                    .get(component.quantization_table_index)?;
                component.quantization_table = Some(*table);
            }
        }

        scan::decode_scan(
            &scan_header,
            scan,
            frame_header,
            components,
            &self.huffman_tables,
            self.restart_interval,
        )?;

        self.num_scans += 1;
        Ok(())
    }

    fn color_transform(&self, components: &[Component]) -> ColorTransform {
        if let Some(transform) = self.adobe_transform {
            return if transform == 0 {
                ColorTransform::Rgb
            } else {
                ColorTransform::YCbCr
            };
        }

        let ids: Vec<u8> = components.iter().map(|component| component.id).collect();
        if !self.is_jfif && ids == b"RGB" {
            ColorTransform::Rgb
        } else {
            ColorTransform::YCbCr
        }
    }

    fn finish(self) -> Result<PixelBuffer, Error> {
        let Some((frame_header, components)) = &self.frame else {
            return Err(Error::IncompleteImage);
        };

        let width = frame_header.samples_per_line as usize;
        let height = frame_header.number_of_lines as usize;
        let max_horizontal = frame_header.max_horizontal_sampling_factor() as usize;
        let max_vertical = frame_header.max_vertical_sampling_factor() as usize;

        let planes = components
            .iter()
            .map(Component::to_samples)
            .collect::<Result<Vec<_>, _>>()?;

        let mut pixels = Vec::with_capacity(width * height);
        match planes.as_slice() {
            [gray] => {
                for y in 0..height {
                    for x in 0..width {
                        let value = gray.get(x, y, max_horizontal, max_vertical);
                        pixels.push(rgb(value, value, value));
                    }
                }
            },
            [first, second, third] => {
                let transform = self.color_transform(components);
                for y in 0..height {
                    for x in 0..width {
                        let a = first.get(x, y, max_horizontal, max_vertical);
                        let b = second.get(x, y, max_horizontal, max_vertical);
                        let c = third.get(x, y, max_horizontal, max_vertical);

                        let pixel = match transform {
                            ColorTransform::YCbCr => colors::ycbcr_to_rgb(a, b, c),
                            ColorTransform::Rgb => rgb(a, b, c),
                        };
                        pixels.push(pixel);
                    }
                }
            },
            _ => return Err(Error::BadFrame),
        }

        Ok(PixelBuffer::from_data(pixels, width, height))
    }
}
