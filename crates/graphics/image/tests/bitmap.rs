use std::{env, fs, path::PathBuf};

use image::{ega, Bitmap, ColorDepth, Error, ImageFormat, PaletteId, PixelBuffer};

/// A path in the system temp directory that is removed again when dropped
struct TemporaryFile(PathBuf);

impl TemporaryFile {
    fn new(name: &str) -> Self {
        let file_name = format!("image-test-{}-{name}", std::process::id());
        Self(env::temp_dir().join(file_name))
    }
}

impl Drop for TemporaryFile {
    fn drop(&mut self) {
        _ = fs::remove_file(&self.0);
    }
}

#[test]
fn pixel_array_matches_values() {
    let values: Vec<u32> = (0..12).map(|i| 0xFF000000 | i * 0x010101).collect();
    let bitmap = Bitmap::from_pixel_array(&values, 4, 3, 1).unwrap();

    for y in 0..3 {
        for x in 0..4 {
            assert_eq!(bitmap.get(x, y).unwrap(), values[y * 4 + x]);
        }
    }
}

#[test]
fn save_and_load() {
    let bitmap = Bitmap::from_index_string("!\"#$%&'()*+,", 4, 3, PaletteId::Ega).unwrap();

    for format in [ImageFormat::Bmp, ImageFormat::Png, ImageFormat::Qoi] {
        let file = TemporaryFile::new(&format!("save.{}", format.extension()));
        bitmap.save(&file.0, format).unwrap();

        let loaded = Bitmap::from_path(&file.0).unwrap();
        assert_eq!(loaded.format(), Some(format));
        assert_eq!(loaded.path(), Some(file.0.as_path()));
        assert_eq!(loaded.pixels(), bitmap.pixels());
        assert_eq!(loaded.get(0, 0).unwrap(), ega::BLUE);
    }
}

#[test]
fn save_default_uses_extension_then_source_format() {
    let bitmap = Bitmap::blank(3, 3, 0xFF00FF00, ColorDepth::TrueColor24).unwrap();

    let with_extension = TemporaryFile::new("default.tga");
    assert_eq!(
        bitmap.save_default(&with_extension.0).unwrap(),
        ImageFormat::Tga
    );

    // The loaded bitmap remembers that it was a TGA
    let loaded = Bitmap::from_path(&with_extension.0).unwrap();
    let without_extension = TemporaryFile::new("default");
    assert_eq!(
        loaded.save_default(&without_extension.0).unwrap(),
        ImageFormat::Tga
    );

    // Constructed bitmaps have no source format
    assert!(matches!(
        bitmap.save_default(&without_extension.0),
        Err(Error::UnsupportedFormat)
    ));
}

#[test]
fn jpeg_cannot_be_saved() {
    let bitmap = Bitmap::blank(1, 1, 0, ColorDepth::TrueColor32).unwrap();
    let file = TemporaryFile::new("image.jpg");

    assert!(matches!(
        bitmap.save(&file.0, ImageFormat::Jpeg),
        Err(Error::UnsupportedFormat)
    ));
    assert!(!file.0.exists());
}

#[test]
fn missing_file() {
    let file = TemporaryFile::new("does-not-exist.png");
    assert!(matches!(Bitmap::from_path(&file.0), Err(Error::Io(_))));
}

#[test]
fn truncated_file_is_corrupt() {
    let bitmap = Bitmap::blank(8, 8, 0xFF336699, ColorDepth::TrueColor24).unwrap();
    let file = TemporaryFile::new("truncated.bmp");
    bitmap.save(&file.0, ImageFormat::Bmp).unwrap();

    let bytes = fs::read(&file.0).unwrap();
    assert!(matches!(
        Bitmap::from_bytes(&bytes[..bytes.len() - 20]),
        Err(Error::CorruptData(_))
    ));
}

#[test]
fn draw_scaled_and_clipped() {
    let bitmap = Bitmap::from_pixel_array(&[1, 2, 3, 4], 2, 2, 1).unwrap();
    let mut target = PixelBuffer::new(5, 5);

    let source = math::Rectangle::from_position_and_size(math::Vec2D::new(0, 0), 2, 2);
    let destination = math::Rectangle::from_position_and_size(math::Vec2D::new(1, 1), 6, 6);
    bitmap.draw_scaled(&mut target, source, destination);

    assert_eq!(target.row(0), &[0, 0, 0, 0, 0]);
    assert_eq!(target.row(1), &[0, 1, 1, 1, 2]);
    assert_eq!(target.row(4), &[0, 3, 3, 3, 4]);
}

#[test]
fn depth_is_metadata() {
    let hi_color = Bitmap::blank(1, 1, 0xFF1F1F1F, ColorDepth::HiColor16).unwrap();
    assert_eq!(hi_color.get(0, 0).unwrap(), 0xFF1F1F1F);
    assert_eq!(hi_color.depth(), ColorDepth::HiColor16);

    let indexed = Bitmap::blank(1, 1, 0x80FF00C0, ColorDepth::Indexed8).unwrap();
    assert_eq!(indexed.get(0, 0).unwrap(), 0x80FF00C0);
    assert_eq!(indexed.depth().bits_per_pixel(), 8);
}
