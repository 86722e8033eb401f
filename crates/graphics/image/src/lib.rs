//! Decoding, encoding and drawing of bitmap images
//!
//! Every codec produces a [PixelBuffer] of straight-alpha `0xAARRGGBB` pixels. The [registry]
//! decides which codec is responsible for a given file, and [Bitmap] ties everything together.

mod bitmap;
pub mod blurhash;
pub mod bmp;
mod color;
mod error;
pub mod jpeg;
mod palette;
pub mod pcx;
pub mod png;
pub mod qoi;
pub mod registry;
mod render;
mod texture;
pub mod tga;

pub use bitmap::Bitmap;
pub use color::{argb, blend, rgb, ColorDepth, Rgba};
pub use error::{DecodeError, Error};
pub use palette::{ega, PaletteId};
pub use registry::{Codec, ImageFormat, Signature};
pub use render::{BlendMode, RenderTarget};
pub use texture::{PixelBuffer, Texture, MAX_DIMENSION};
