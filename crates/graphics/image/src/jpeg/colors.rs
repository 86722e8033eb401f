use crate::color::rgb;

/// Converts from [YCbCr](https://en.wikipedia.org/wiki/YCbCr) to RGB, as defined by JFIF
#[must_use]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> u32 {
    let y = y as f32;
    let cb = cb as f32 - 128.;
    let cr = cr as f32 - 128.;

    let red = cr * (2. - 2. * 0.299) + y;
    let blue = cb * (2. - 2. * 0.114) + y;
    let green = (y - 0.114 * blue - 0.299 * red) / 0.587;

    rgb(to_sample(red), to_sample(green), to_sample(blue))
}

#[inline]
#[must_use]
fn to_sample(value: f32) -> u8 {
    value.round().clamp(0., 255.) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_gray() {
        assert_eq!(ycbcr_to_rgb(0, 128, 128), 0xFF000000);
        assert_eq!(ycbcr_to_rgb(200, 128, 128), 0xFFC8C8C8);
        assert_eq!(ycbcr_to_rgb(255, 128, 128), 0xFFFFFFFF);
    }

    #[test]
    fn saturated_colors_are_clamped() {
        // Blue overshoots to 480
        assert_eq!(ycbcr_to_rgb(255, 255, 128), 0xFFFFD3FF);
    }
}
