//! Built-in palettes for index strings and palette based formats

use crate::color::rgb;

/// The 16 standard EGA colors
pub mod ega {
    use crate::color::rgb;

    pub const BLACK: u32 = rgb(0x00, 0x00, 0x00);
    pub const BLUE: u32 = rgb(0x00, 0x00, 0xAA);
    pub const GREEN: u32 = rgb(0x00, 0xAA, 0x00);
    pub const CYAN: u32 = rgb(0x00, 0xAA, 0xAA);
    pub const RED: u32 = rgb(0xAA, 0x00, 0x00);
    pub const MAGENTA: u32 = rgb(0xAA, 0x00, 0xAA);
    pub const BROWN: u32 = rgb(0xAA, 0x55, 0x00);
    pub const LIGHT_GREY: u32 = rgb(0xAA, 0xAA, 0xAA);
    pub const DARK_GREY: u32 = rgb(0x55, 0x55, 0x55);
    pub const LIGHT_BLUE: u32 = rgb(0x55, 0x55, 0xFF);
    pub const LIGHT_GREEN: u32 = rgb(0x55, 0xFF, 0x55);
    pub const LIGHT_CYAN: u32 = rgb(0x55, 0xFF, 0xFF);
    pub const LIGHT_RED: u32 = rgb(0xFF, 0x55, 0x55);
    pub const LIGHT_MAGENTA: u32 = rgb(0xFF, 0x55, 0xFF);
    pub const YELLOW: u32 = rgb(0xFF, 0xFF, 0x55);
    pub const WHITE: u32 = rgb(0xFF, 0xFF, 0xFF);

    /// Fully transparent, useful as a "no color" marker when drawing with alpha
    pub const NO_COLOR: u32 = 0;
}

const EGA: [u32; 16] = [
    ega::BLACK,
    ega::BLUE,
    ega::GREEN,
    ega::CYAN,
    ega::RED,
    ega::MAGENTA,
    ega::BROWN,
    ega::LIGHT_GREY,
    ega::DARK_GREY,
    ega::LIGHT_BLUE,
    ega::LIGHT_GREEN,
    ega::LIGHT_CYAN,
    ega::LIGHT_RED,
    ega::LIGHT_MAGENTA,
    ega::YELLOW,
    ega::WHITE,
];

/// CGA palette 1, high intensity
const CGA: [u32; 4] = [
    ega::BLACK,
    ega::LIGHT_CYAN,
    ega::LIGHT_MAGENTA,
    ega::WHITE,
];

const WEB_SAFE: [u32; 216] = web_safe_colors();

const fn web_safe_colors() -> [u32; 216] {
    let mut colors = [0; 216];
    let mut i = 0;
    while i < 216 {
        let red = (i / 36) as u8 * 0x33;
        let green = ((i / 6) % 6) as u8 * 0x33;
        let blue = (i % 6) as u8 * 0x33;
        colors[i] = rgb(red, green, blue);
        i += 1;
    }
    colors
}

/// Identifies one of the built-in palettes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteId {
    Ega,
    Cga,
    /// The 6x6x6 color cube, red varies slowest
    WebSafe,
}

impl PaletteId {
    #[must_use]
    pub fn colors(&self) -> &'static [u32] {
        match self {
            Self::Ega => &EGA,
            Self::Cga => &CGA,
            Self::WebSafe => &WEB_SAFE,
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<u32> {
        self.colors().get(index).copied()
    }
}

/// The palette EGA images use when they do not provide their own
pub(crate) const fn default_ega_palette() -> &'static [u32; 16] {
    &EGA
}
