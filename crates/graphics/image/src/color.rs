//! Pixels are packed as `0xAARRGGBB` with straight (not premultiplied) alpha

/// Pack the four channels of a color
#[must_use]
pub const fn argb(alpha: u8, red: u8, green: u8, blue: u8) -> u32 {
    (alpha as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

/// Pack an opaque color
#[must_use]
pub const fn rgb(red: u8, green: u8, blue: u8) -> u32 {
    argb(0xFF, red, green, blue)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Rgba {
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        self.alpha == u8::MAX
    }

    /// Blend `self` (the foreground) onto `background`
    ///
    /// Uses the integer approximation `dst + a * (src - dst) / 256`, alpha values
    /// of 254 and above are treated as fully opaque. The result is always opaque.
    #[must_use]
    pub fn blend_onto(self, background: Self) -> Self {
        if self.alpha >= 254 {
            return Self { alpha: 0xFF, ..self };
        }

        let alpha = self.alpha as i32;
        let mix = |source: u8, destination: u8| {
            let (source, destination) = (source as i32, destination as i32);
            (destination + ((alpha * (source - destination)) >> 8)) as u8
        };

        Self {
            red: mix(self.red, background.red),
            green: mix(self.green, background.green),
            blue: mix(self.blue, background.blue),
            alpha: 0xFF,
        }
    }
}

impl From<u32> for Rgba {
    fn from(value: u32) -> Self {
        let [alpha, red, green, blue] = value.to_be_bytes();
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

impl From<Rgba> for u32 {
    fn from(value: Rgba) -> Self {
        argb(value.alpha, value.red, value.green, value.blue)
    }
}

/// Blend the packed `foreground` color onto `background`, see [Rgba::blend_onto]
#[must_use]
pub fn blend(background: u32, foreground: u32) -> u32 {
    Rgba::from(foreground).blend_onto(background.into()).into()
}

/// Bits per pixel of a bitmap
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorDepth {
    /// 3 bits red, 3 bits green, 2 bits blue
    Indexed8,
    HiColor15,
    HiColor16,
    TrueColor24,
    #[default]
    TrueColor32,
}

impl ColorDepth {
    #[must_use]
    pub const fn bits_per_pixel(&self) -> u8 {
        match self {
            Self::Indexed8 => 8,
            Self::HiColor15 => 15,
            Self::HiColor16 => 16,
            Self::TrueColor24 => 24,
            Self::TrueColor32 => 32,
        }
    }

    #[must_use]
    pub fn from_bits_per_pixel(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::Indexed8),
            15 => Some(Self::HiColor15),
            16 => Some(Self::HiColor16),
            24 => Some(Self::TrueColor24),
            32 => Some(Self::TrueColor32),
            _ => None,
        }
    }
}
