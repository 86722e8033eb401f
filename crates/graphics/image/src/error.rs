use std::io;

use error_derive::Error;

use crate::{blurhash, bmp, jpeg, pcx, png, qoi, tga};

/// The reason a codec rejected its input
#[derive(Debug, Error)]
pub enum DecodeError {
    #[msg = "invalid bmp image"]
    Bmp(bmp::Error),

    #[msg = "invalid tga image"]
    Tga(tga::Error),

    #[msg = "invalid pcx image"]
    Pcx(pcx::Error),

    #[msg = "invalid png image"]
    Png(png::Error),

    #[msg = "invalid jpeg image"]
    Jpeg(jpeg::Error),

    #[msg = "invalid qoi image"]
    Qoi(qoi::Error),

    #[msg = "invalid blurhash"]
    Blurhash(blurhash::Error),
}

impl DecodeError {
    /// Whether the input is a variant of the format that the codec does not implement
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Bmp(error) => error.is_unsupported(),
            Self::Tga(error) => error.is_unsupported(),
            Self::Pcx(error) => error.is_unsupported(),
            Self::Png(error) => error.is_unsupported(),
            Self::Jpeg(error) => error.is_unsupported(),
            Self::Qoi(error) => error.is_unsupported(),
            Self::Blurhash(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[msg = "failed to access file"]
    Io(io::Error),

    #[msg = "unsupported image format"]
    UnsupportedFormat,

    #[msg = "corrupt image data"]
    #[no_from]
    CorruptData(DecodeError),

    #[msg = "dimensions do not match the amount of data"]
    DimensionMismatch,

    #[msg = "coordinates outside of the bitmap"]
    OutOfRange,

    #[msg = "character is not a valid palette index"]
    InvalidIndex,
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        if value.is_unsupported() {
            Self::UnsupportedFormat
        } else {
            Self::CorruptData(value)
        }
    }
}
