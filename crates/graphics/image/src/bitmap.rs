use std::{
    fs,
    path::{Path, PathBuf},
};

use math::{Rectangle, Vec2D};

use crate::{
    blurhash,
    color::ColorDepth,
    error::{DecodeError, Error},
    palette::PaletteId,
    registry::{self, ImageFormat},
    render::{BlendMode, RenderTarget},
    texture::{dimensions_are_acceptable, PixelBuffer},
};

/// An image in memory, along with where it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pixels: PixelBuffer,

    /// The container format the bitmap was decoded from, if any
    format: Option<ImageFormat>,
    depth: ColorDepth,
    path: Option<PathBuf>,
}

impl Bitmap {
    /// Wrap an existing buffer
    #[must_use]
    pub fn from_pixels(pixels: PixelBuffer) -> Self {
        Self {
            pixels,
            format: None,
            depth: ColorDepth::TrueColor32,
            path: None,
        }
    }

    /// Load an image file, the extension is used when the format can't be detected from the content
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;

        let (format, pixels) = registry::decode_with_hint(&bytes, ImageFormat::from_path(path))?;
        log::info!(
            "Loaded {}x{} {format} image from {}",
            pixels.width(),
            pixels.height(),
            path.display()
        );

        let mut bitmap = Self::decoded(format, pixels);
        bitmap.path = Some(path.to_path_buf());
        Ok(bitmap)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (format, pixels) = registry::decode(bytes)?;
        Ok(Self::decoded(format, pixels))
    }

    fn decoded(format: ImageFormat, pixels: PixelBuffer) -> Self {
        let is_opaque = pixels.data().iter().all(|&pixel| pixel >> 24 == 0xFF);
        let depth = if is_opaque {
            ColorDepth::TrueColor24
        } else {
            ColorDepth::TrueColor32
        };

        Self {
            pixels,
            format: Some(format),
            depth,
            path: None,
        }
    }

    /// Build a bitmap from a `width` x `height` grid of colors, where every value becomes a
    /// `scale` x `scale` block
    pub fn from_pixel_array(
        values: &[u32],
        width: usize,
        height: usize,
        scale: usize,
    ) -> Result<Self, Error> {
        let output_width = width.checked_mul(scale).ok_or(Error::DimensionMismatch)?;
        let output_height = height.checked_mul(scale).ok_or(Error::DimensionMismatch)?;

        if !dimensions_are_acceptable(output_width, output_height)
            || values.len() != width * height
        {
            log::error!(
                "Cannot build a {width}x{height} bitmap (scale {scale}) from {} values",
                values.len()
            );
            return Err(Error::DimensionMismatch);
        }

        let mut data = Vec::with_capacity(output_width * output_height);
        for row in values.chunks_exact(width) {
            let mut scaled_row = Vec::with_capacity(output_width);
            for &value in row {
                scaled_row.extend(std::iter::repeat(value).take(scale));
            }

            for _ in 0..scale {
                data.extend_from_slice(&scaled_row);
            }
        }

        Ok(Self::from_pixels(PixelBuffer::from_data(
            data,
            output_width,
            output_height,
        )))
    }

    /// Build a bitmap from one printable ASCII character per pixel
    ///
    /// The character `c` selects the color at index `c - 0x20` of the palette.
    pub fn from_index_string(
        characters: &str,
        width: usize,
        height: usize,
        palette: PaletteId,
    ) -> Result<Self, Error> {
        if !dimensions_are_acceptable(width, height) || characters.chars().count() != width * height
        {
            return Err(Error::DimensionMismatch);
        }

        let data = characters
            .chars()
            .map(|character| {
                if !(' '..='~').contains(&character) {
                    return Err(Error::InvalidIndex);
                }

                palette
                    .get(character as usize - 0x20)
                    .ok_or(Error::InvalidIndex)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut bitmap = Self::from_pixels(PixelBuffer::from_data(data, width, height));
        bitmap.depth = ColorDepth::Indexed8;
        Ok(bitmap)
    }

    /// A bitmap filled with `fill`
    ///
    /// `depth` is only recorded, the pixels always keep the exact color.
    pub fn blank(width: usize, height: usize, fill: u32, depth: ColorDepth) -> Result<Self, Error> {
        if !dimensions_are_acceptable(width, height) {
            return Err(Error::DimensionMismatch);
        }

        let data = vec![fill; width * height];
        let mut bitmap = Self::from_pixels(PixelBuffer::from_data(data, width, height));
        bitmap.depth = depth;
        Ok(bitmap)
    }

    /// Render a [BlurHash](https://blurha.sh) placeholder
    pub fn from_blurhash(hash: &str, width: usize, height: usize, punch: f32) -> Result<Self, Error> {
        if !dimensions_are_acceptable(width, height) {
            return Err(Error::DimensionMismatch);
        }

        let pixels = blurhash::decode(hash, width, height, punch).map_err(DecodeError::from)?;

        let mut bitmap = Self::from_pixels(pixels);
        bitmap.depth = ColorDepth::TrueColor24;
        Ok(bitmap)
    }

    /// Copy a rectangle out of `source`, which must lie entirely inside of it
    pub fn from_region(
        source: &PixelBuffer,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::DimensionMismatch);
        }

        let fits = x
            .checked_add(width)
            .zip(y.checked_add(height))
            .is_some_and(|(right, bottom)| right <= source.width() && bottom <= source.height());
        if !fits {
            return Err(Error::OutOfRange);
        }

        Ok(Self::from_pixels(source.sub_texture(x, y, width, height)))
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    #[must_use]
    pub fn depth(&self) -> ColorDepth {
        self.depth
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Read a single `0xAARRGGBB` pixel
    pub fn get(&self, x: usize, y: usize) -> Result<u32, Error> {
        self.pixels.try_get(x, y).ok_or(Error::OutOfRange)
    }

    /// Copy the bitmap onto `target` with its top left corner at `(x, y)`
    pub fn draw<T: RenderTarget + ?Sized>(&self, target: &mut T, x: i32, y: i32) {
        target.blit(
            &self.pixels,
            Vec2D::new(x, y),
            self.pixels.bounds(),
            BlendMode::Copy,
        );
    }

    /// Like [draw](Self::draw), but blends translucent pixels with the target
    pub fn draw_trans<T: RenderTarget + ?Sized>(&self, target: &mut T, x: i32, y: i32) {
        target.blit(
            &self.pixels,
            Vec2D::new(x, y),
            self.pixels.bounds(),
            BlendMode::Blend,
        );
    }

    /// Scale the `source` area of the bitmap into `destination`
    pub fn draw_scaled<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
        source: Rectangle,
        destination: Rectangle,
    ) {
        target.blit_scaled(&self.pixels, source, destination, BlendMode::Copy);
    }

    /// Encode the bitmap as `format` and write it to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ImageFormat) -> Result<(), Error> {
        let bytes = registry::encode(&self.pixels, format)?;
        fs::write(path.as_ref(), bytes)?;

        log::info!("Saved {format} image to {}", path.as_ref().display());
        Ok(())
    }

    /// Save in the format implied by the extension of `path`, or else the format the
    /// bitmap was loaded from
    pub fn save_default<P: AsRef<Path>>(&self, path: P) -> Result<ImageFormat, Error> {
        let format = ImageFormat::from_path(path.as_ref())
            .or(self.format)
            .ok_or(Error::UnsupportedFormat)?;

        self.save(path, format)?;
        Ok(format)
    }
}

impl From<PixelBuffer> for Bitmap {
    fn from(value: PixelBuffer) -> Self {
        Self::from_pixels(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ega;

    #[test]
    fn pixel_array_with_scale() {
        let bitmap = Bitmap::from_pixel_array(&[1, 2, 3, 4, 5, 6], 3, 2, 2).unwrap();

        assert_eq!(bitmap.width(), 6);
        assert_eq!(bitmap.height(), 4);
        assert_eq!(bitmap.pixels().row(0), &[1, 1, 2, 2, 3, 3]);
        assert_eq!(bitmap.pixels().row(1), &[1, 1, 2, 2, 3, 3]);
        assert_eq!(bitmap.pixels().row(3), &[4, 4, 5, 5, 6, 6]);
        assert_eq!(bitmap.format(), None);
    }

    #[test]
    fn pixel_array_mismatch() {
        assert!(matches!(
            Bitmap::from_pixel_array(&[1, 2, 3], 2, 2, 1),
            Err(Error::DimensionMismatch)
        ));
        assert!(matches!(
            Bitmap::from_pixel_array(&[1], 1, 1, 0),
            Err(Error::DimensionMismatch)
        ));
        assert!(matches!(
            Bitmap::from_pixel_array(&[], 0, 0, 1),
            Err(Error::DimensionMismatch)
        ));
    }

    #[test]
    fn index_string() {
        // Space is index 0, '!' is index 1, '/' is index 15
        let bitmap = Bitmap::from_index_string(" !/ ", 2, 2, PaletteId::Ega).unwrap();

        assert_eq!(bitmap.get(0, 0).unwrap(), ega::BLACK);
        assert_eq!(bitmap.get(1, 0).unwrap(), ega::BLUE);
        assert_eq!(bitmap.get(0, 1).unwrap(), ega::WHITE);
        assert_eq!(bitmap.depth(), ColorDepth::Indexed8);
    }

    #[test]
    fn index_string_errors() {
        // '0' is index 16, beyond the EGA palette
        assert!(matches!(
            Bitmap::from_index_string("0", 1, 1, PaletteId::Ega),
            Err(Error::InvalidIndex)
        ));
        assert!(matches!(
            Bitmap::from_index_string("\n", 1, 1, PaletteId::WebSafe),
            Err(Error::InvalidIndex)
        ));
        assert!(matches!(
            Bitmap::from_index_string("  ", 1, 1, PaletteId::Ega),
            Err(Error::DimensionMismatch)
        ));
    }

    #[test]
    fn blank_keeps_fill_at_every_depth() {
        let depths = [
            ColorDepth::Indexed8,
            ColorDepth::HiColor15,
            ColorDepth::HiColor16,
            ColorDepth::TrueColor24,
            ColorDepth::TrueColor32,
        ];

        for depth in depths {
            let bitmap = Bitmap::blank(3, 2, 0x80123456, depth).unwrap();
            assert_eq!(bitmap.depth(), depth);

            for y in 0..2 {
                for x in 0..3 {
                    assert_eq!(bitmap.get(x, y).unwrap(), 0x80123456, "{depth:?}");
                }
            }
        }
    }

    #[test]
    fn reading_outside() {
        let bitmap = Bitmap::blank(2, 2, 0, ColorDepth::TrueColor32).unwrap();
        assert!(matches!(bitmap.get(2, 0), Err(Error::OutOfRange)));
        assert!(matches!(bitmap.get(0, 2), Err(Error::OutOfRange)));
    }

    #[test]
    fn region() {
        let source = PixelBuffer::from_data((0..16).collect(), 4, 4);

        let bitmap = Bitmap::from_region(&source, 1, 2, 3, 2).unwrap();
        assert_eq!(bitmap.pixels().data(), &[9, 10, 11, 13, 14, 15]);

        assert!(matches!(
            Bitmap::from_region(&source, 2, 2, 3, 1),
            Err(Error::OutOfRange)
        ));
    }

    #[test]
    fn draw_onto_buffer() {
        let bitmap = Bitmap::blank(2, 2, 0xFFFFFFFF, ColorDepth::TrueColor32).unwrap();
        let mut target = PixelBuffer::new(3, 3);

        bitmap.draw(&mut target, 2, 2);
        assert_eq!(target.get_pixel(2, 2), 0xFFFFFFFF);
        assert_eq!(target.get_pixel(1, 1), 0);

        let translucent = Bitmap::blank(1, 1, 0x00FFFFFF, ColorDepth::TrueColor32).unwrap();
        translucent.draw_trans(&mut target, 2, 2);
        assert_eq!(target.get_pixel(2, 2), 0xFFFFFFFF);
    }

    #[test]
    fn blurhash_errors_are_corrupt_data() {
        assert!(matches!(
            Bitmap::from_blurhash("nope", 4, 4, 1.),
            Err(Error::CorruptData(DecodeError::Blurhash(_)))
        ));
        assert!(Bitmap::from_blurhash("00TI:j", 4, 4, 1.).is_ok());
    }
}
