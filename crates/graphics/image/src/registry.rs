//! The ordered list of codecs and format detection
//!
//! Formats with magic bytes are recognized first. If none of them matches, the hint
//! (usually derived from the file extension) decides, and weak header heuristics come last.

use std::{fmt, path::Path};

use crate::{
    bmp,
    error::{DecodeError, Error},
    jpeg, pcx, png, qoi,
    texture::PixelBuffer,
    tga,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Bmp,
    Tga,
    Pcx,
    Png,
    Jpeg,
    Qoi,
}

impl ImageFormat {
    pub const ALL: [Self; 6] = [
        Self::Bmp,
        Self::Tga,
        Self::Pcx,
        Self::Png,
        Self::Jpeg,
        Self::Qoi,
    ];

    /// Case-insensitive lookup of a file extension (without the leading dot)
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension.to_ascii_lowercase().as_str() {
            "bmp" | "dib" => Self::Bmp,
            "tga" | "icb" | "vda" | "vst" => Self::Tga,
            "pcx" => Self::Pcx,
            "png" => Self::Png,
            "jpg" | "jpeg" | "jpe" | "jfif" => Self::Jpeg,
            "qoi" => Self::Qoi,
            _ => return None,
        };

        Some(format)
    }

    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::from_extension)
    }

    /// The canonical file extension
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Tga => "tga",
            Self::Pcx => "pcx",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Qoi => "qoi",
        }
    }

    #[must_use]
    pub fn can_encode(&self) -> bool {
        codec(*self).encode.is_some()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bmp => "BMP",
            Self::Tga => "TGA",
            Self::Pcx => "PCX",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Qoi => "QOI",
        };
        f.write_str(name)
    }
}

/// How confidently a codec claims a byte sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signature {
    /// The data starts (or ends) with the format's magic bytes
    Magic,

    /// The header looks plausible, but the format has no magic bytes
    Heuristic,
    NoMatch,
}

impl Signature {
    fn magic_if(matches: bool) -> Self {
        if matches {
            Self::Magic
        } else {
            Self::NoMatch
        }
    }
}

pub type DecodeFn = fn(&[u8]) -> Result<PixelBuffer, DecodeError>;
pub type EncodeFn = fn(&PixelBuffer) -> Vec<u8>;

/// The capabilities of a single image format
#[derive(Clone, Copy)]
pub struct Codec {
    pub format: ImageFormat,
    pub sniff: fn(&[u8]) -> Signature,
    pub decode: DecodeFn,
    pub encode: Option<EncodeFn>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("format", &self.format)
            .field("can_encode", &self.encode.is_some())
            .finish()
    }
}

/// Generates the adapter functions between a codec module and the registry
macro_rules! codec_adapters {
    ($($module: ident => $decode: ident),* $(,)?) => {
        $(
            fn $decode(bytes: &[u8]) -> Result<PixelBuffer, DecodeError> {
                Ok($module::decode(bytes)?)
            }
        )*
    };
}

codec_adapters!(
    png => decode_png,
    jpeg => decode_jpeg,
    qoi => decode_qoi,
    bmp => decode_bmp,
    pcx => decode_pcx,
    tga => decode_tga,
);

fn sniff_png(bytes: &[u8]) -> Signature {
    Signature::magic_if(bytes.starts_with(&png::PNG_HEADER))
}

fn sniff_jpeg(bytes: &[u8]) -> Signature {
    Signature::magic_if(bytes.starts_with(&jpeg::JPEG_MAGIC))
}

fn sniff_qoi(bytes: &[u8]) -> Signature {
    Signature::magic_if(bytes.starts_with(&qoi::QOI_MAGIC))
}

fn sniff_bmp(bytes: &[u8]) -> Signature {
    Signature::magic_if(bytes.starts_with(&bmp::BMP_MAGIC))
}

fn sniff_pcx(bytes: &[u8]) -> Signature {
    Signature::magic_if(pcx::has_signature(bytes))
}

fn sniff_tga(bytes: &[u8]) -> Signature {
    if tga::has_footer(bytes) {
        Signature::Magic
    } else if tga::header_is_plausible(bytes) {
        Signature::Heuristic
    } else {
        Signature::NoMatch
    }
}

/// All known codecs, in the order in which they are asked to claim data
pub static CODECS: &[Codec] = &[
    Codec {
        format: ImageFormat::Png,
        sniff: sniff_png,
        decode: decode_png,
        encode: Some(png::encode),
    },
    Codec {
        format: ImageFormat::Jpeg,
        sniff: sniff_jpeg,
        decode: decode_jpeg,
        encode: None,
    },
    Codec {
        format: ImageFormat::Qoi,
        sniff: sniff_qoi,
        decode: decode_qoi,
        encode: Some(qoi::encode),
    },
    Codec {
        format: ImageFormat::Bmp,
        sniff: sniff_bmp,
        decode: decode_bmp,
        encode: Some(bmp::encode),
    },
    Codec {
        format: ImageFormat::Pcx,
        sniff: sniff_pcx,
        decode: decode_pcx,
        encode: Some(pcx::encode),
    },
    Codec {
        format: ImageFormat::Tga,
        sniff: sniff_tga,
        decode: decode_tga,
        encode: Some(tga::encode),
    },
];

/// The registry entry for `format`
#[must_use]
pub fn codec(format: ImageFormat) -> &'static Codec {
    CODECS
        .iter()
        .find(|codec| codec.format == format)
        .unwrap_or_else(|| unreachable!("every format has a codec"))
}

/// Find the codec responsible for `bytes`, see the module documentation for the order
#[must_use]
pub fn identify(bytes: &[u8], hint: Option<ImageFormat>) -> Option<&'static Codec> {
    let with_signature =
        |signature| CODECS.iter().find(|codec| (codec.sniff)(bytes) == signature);

    with_signature(Signature::Magic)
        .or_else(|| hint.map(codec))
        .or_else(|| with_signature(Signature::Heuristic))
}

/// Decode `bytes`, returning the detected format along with the pixels
pub fn decode(bytes: &[u8]) -> Result<(ImageFormat, PixelBuffer), Error> {
    decode_with_hint(bytes, None)
}

/// Like [decode], but falls back to `hint` if no format is recognized by its magic bytes
pub fn decode_with_hint(
    bytes: &[u8],
    hint: Option<ImageFormat>,
) -> Result<(ImageFormat, PixelBuffer), Error> {
    let Some(codec) = identify(bytes, hint) else {
        log::error!("No codec recognizes the image data");
        return Err(Error::UnsupportedFormat);
    };

    log::debug!("Decoding {} bytes as {}", bytes.len(), codec.format);

    let pixels = (codec.decode)(bytes)?;
    Ok((codec.format, pixels))
}

pub fn encode(pixels: &PixelBuffer, format: ImageFormat) -> Result<Vec<u8>, Error> {
    let Some(encode) = codec(format).encode else {
        log::error!("There is no encoder for {format}");
        return Err(Error::UnsupportedFormat);
    };

    Ok(encode(pixels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_has_a_codec() {
        for format in ImageFormat::ALL {
            assert_eq!(codec(format).format, format);
        }
        assert_eq!(CODECS.len(), ImageFormat::ALL.len());
    }

    #[test]
    fn extensions() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("gif"), None);
        assert_eq!(
            ImageFormat::from_path(Path::new("dir/image.Tga")),
            Some(ImageFormat::Tga)
        );
        assert_eq!(ImageFormat::from_path(Path::new("no_extension")), None);

        for format in ImageFormat::ALL {
            assert_eq!(
                ImageFormat::from_extension(format.extension()),
                Some(format)
            );
        }
    }

    #[test]
    fn magic_bytes_win_over_hint() {
        let pixels = PixelBuffer::from_data(vec![0xFF123456; 4], 2, 2);
        let bytes = png::encode(&pixels);

        let codec = identify(&bytes, Some(ImageFormat::Bmp)).unwrap();
        assert_eq!(codec.format, ImageFormat::Png);
    }

    #[test]
    fn hint_wins_over_heuristic() {
        let bytes = [0; 32];
        assert!(identify(&bytes, None).is_none());

        let codec = identify(&bytes, Some(ImageFormat::Pcx)).unwrap();
        assert_eq!(codec.format, ImageFormat::Pcx);
    }

    #[test]
    fn jpeg_has_no_encoder() {
        let pixels = PixelBuffer::from_data(vec![0; 1], 1, 1);
        assert!(!ImageFormat::Jpeg.can_encode());
        assert!(matches!(
            encode(&pixels, ImageFormat::Jpeg),
            Err(Error::UnsupportedFormat)
        ));
    }

    #[test]
    fn unknown_data() {
        assert!(matches!(
            decode(b"GIF89a and some more bytes"),
            Err(Error::UnsupportedFormat)
        ));
    }
}
