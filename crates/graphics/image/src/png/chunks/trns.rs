//! [tRNS](https://www.w3.org/TR/png/#11tRNS) chunk

use super::ihdr::ImageType;

/// Transparency information, its layout depends on the image type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transparency {
    /// Alpha values for the first entries of the palette, the remaining entries are opaque
    Indexed(Vec<u8>),

    /// Pixels with this exact gray value are fully transparent
    GrayScale(u16),

    /// Pixels with this exact color are fully transparent
    TrueColor([u16; 3]),
}

impl Transparency {
    /// Returns `None` if the chunk is malformed or not allowed for the image type
    #[must_use]
    pub fn new(data: &[u8], image_type: ImageType) -> Option<Self> {
        let sample = |index: usize| -> Option<u16> {
            let bytes = data.get(2 * index..2 * index + 2)?;
            Some(u16::from_be_bytes([bytes[0], bytes[1]]))
        };

        match image_type {
            ImageType::IndexedColor if data.len() <= 256 => Some(Self::Indexed(data.to_vec())),
            ImageType::GrayScale if data.len() == 2 => Some(Self::GrayScale(sample(0)?)),
            ImageType::TrueColor if data.len() == 6 => {
                Some(Self::TrueColor([sample(0)?, sample(1)?, sample(2)?]))
            },
            _ => None,
        }
    }
}
