use crate::jpeg::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntropyCoding {
    Arithmetic,
    Huffman,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodingScheme {
    SequentialDiscreteCosineTransform,
    ProgressiveDiscreteCosineTransform,
    Lossless,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsDifferential {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub horizontal_sampling_factor: u8,
    pub vertical_sampling_factor: u8,
    pub quantization_table: u8,
}

#[derive(Clone, Debug)]
pub struct FrameHeader {
    pub coding_scheme: CodingScheme,

    /// The height of the image
    ///
    /// If there are multiple components then this is the height of the largest one.
    pub number_of_lines: u16,

    /// The width of the image
    ///
    /// If there are multiple components then this is the width of the largest one.
    pub samples_per_line: u16,
    pub components: Vec<FrameComponent>,
}

impl FrameHeader {
    pub fn new(subscript: u8, bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 6 {
            return Err(Error::BadFrame);
        }

        let (coding_scheme, entropy_coding, is_differential) = decode_subscript(subscript)?;

        if entropy_coding == EntropyCoding::Arithmetic {
            log::error!("Arithmetic coded jpeg images are not supported");
            return Err(Error::Unsupported);
        }

        if is_differential == IsDifferential::Yes || coding_scheme == CodingScheme::Lossless {
            log::error!("Hierarchical and lossless jpeg images are not supported");
            return Err(Error::Unsupported);
        }

        let sample_precision = bytes[0];
        if sample_precision != 8 {
            log::error!("Unsupported jpeg sample precision: {sample_precision} bits");
            return Err(Error::Unsupported);
        }

        let number_of_lines = u16::from_be_bytes([bytes[1], bytes[2]]);
        let samples_per_line = u16::from_be_bytes([bytes[3], bytes[4]]);

        if number_of_lines == 0 {
            // The height would be defined by a DNL segment after the first scan
            log::error!("Jpeg images without an explicit height are not supported");
            return Err(Error::Unsupported);
        }

        if samples_per_line == 0 {
            return Err(Error::BadFrame);
        }

        let num_image_components = bytes[5] as usize;
        match num_image_components {
            1 | 3 => {},
            4 => {
                log::error!("CMYK jpeg images are not supported");
                return Err(Error::Unsupported);
            },
            other => {
                log::error!("Invalid number of jpeg image components: {other}");
                return Err(Error::BadFrame);
            },
        }

        let component_data = bytes
            .get(6..6 + 3 * num_image_components)
            .ok_or(Error::BadFrame)?;

        let mut components = Vec::with_capacity(num_image_components);
        for data in component_data.chunks_exact(3) {
            let component = FrameComponent {
                id: data[0],
                horizontal_sampling_factor: data[1] >> 4,
                vertical_sampling_factor: data[1] & 0x0F,
                quantization_table: data[2],
            };

            if !(1..=4).contains(&component.horizontal_sampling_factor)
                || !(1..=4).contains(&component.vertical_sampling_factor)
                || 4 <= component.quantization_table
            {
                return Err(Error::BadFrame);
            }

            if components
                .iter()
                .any(|other: &FrameComponent| other.id == component.id)
            {
                log::error!("Duplicate jpeg component id: {}", component.id);
                return Err(Error::BadFrame);
            }

            components.push(component);
        }

        let header = Self {
            coding_scheme,
            number_of_lines,
            samples_per_line,
            components,
        };

        Ok(header)
    }

    #[must_use]
    pub fn max_horizontal_sampling_factor(&self) -> u8 {
        self.components
            .iter()
            .map(|component| component.horizontal_sampling_factor)
            .max()
            .unwrap_or(1)
    }

    #[must_use]
    pub fn max_vertical_sampling_factor(&self) -> u8 {
        self.components
            .iter()
            .map(|component| component.vertical_sampling_factor)
            .max()
            .unwrap_or(1)
    }

    /// The number of MCUs per line and per column for interleaved scans
    #[must_use]
    pub fn mcus(&self) -> (usize, usize) {
        let mcu_width = 8 * self.max_horizontal_sampling_factor() as usize;
        let mcu_height = 8 * self.max_vertical_sampling_factor() as usize;

        (
            (self.samples_per_line as usize).div_ceil(mcu_width),
            (self.number_of_lines as usize).div_ceil(mcu_height),
        )
    }
}

fn decode_subscript(subscript: u8) -> Result<(CodingScheme, EntropyCoding, IsDifferential), Error> {
    let schemes = match subscript {
        0 | 1 => (
            CodingScheme::SequentialDiscreteCosineTransform,
            EntropyCoding::Huffman,
            IsDifferential::No,
        ),
        2 => (
            CodingScheme::ProgressiveDiscreteCosineTransform,
            EntropyCoding::Huffman,
            IsDifferential::No,
        ),
        3 => (
            CodingScheme::Lossless,
            EntropyCoding::Huffman,
            IsDifferential::No,
        ),
        5 => (
            CodingScheme::SequentialDiscreteCosineTransform,
            EntropyCoding::Huffman,
            IsDifferential::Yes,
        ),
        6 => (
            CodingScheme::ProgressiveDiscreteCosineTransform,
            EntropyCoding::Huffman,
            IsDifferential::Yes,
        ),
        7 => (
            CodingScheme::Lossless,
            EntropyCoding::Huffman,
            IsDifferential::Yes,
        ),
        8 => {
            log::error!("Use of reserved SOF marker: 8");
            return Err(Error::Unsupported);
        },
        9 => (
            CodingScheme::SequentialDiscreteCosineTransform,
            EntropyCoding::Arithmetic,
            IsDifferential::No,
        ),
        10 => (
            CodingScheme::ProgressiveDiscreteCosineTransform,
            EntropyCoding::Arithmetic,
            IsDifferential::No,
        ),
        11 => (
            CodingScheme::Lossless,
            EntropyCoding::Arithmetic,
            IsDifferential::No,
        ),
        13 => (
            CodingScheme::SequentialDiscreteCosineTransform,
            EntropyCoding::Arithmetic,
            IsDifferential::Yes,
        ),
        14 => (
            CodingScheme::ProgressiveDiscreteCosineTransform,
            EntropyCoding::Arithmetic,
            IsDifferential::Yes,
        ),
        15 => (
            CodingScheme::Lossless,
            EntropyCoding::Arithmetic,
            IsDifferential::Yes,
        ),
        other => {
            log::error!("Undefined SOF marker: {other}");
            return Err(Error::Unsupported);
        },
    };

    Ok(schemes)
}
