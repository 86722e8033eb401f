use math::{Rectangle, Vec2D};

/// The largest width or height any decoder will allocate
pub const MAX_DIMENSION: usize = 1 << 14;

/// A rectangular grid of values, stored row by row starting at the top left corner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Packed `0xAARRGGBB` pixels with straight alpha
pub type PixelBuffer = Texture<u32>;

/// Whether a decoder should allocate a texture of the given size
#[must_use]
pub fn dimensions_are_acceptable(width: usize, height: usize) -> bool {
    (1..=MAX_DIMENSION).contains(&width) && (1..=MAX_DIMENSION).contains(&height)
}

impl<T: Default + Copy> Texture<T> {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T> Texture<T> {
    #[must_use]
    pub fn from_data(data: Vec<T>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);

        Self {
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Calculate the index of the pixel data for a given set of coordinates
    #[must_use]
    fn index_of_pixel(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.contains(x, y));

        y * self.width + x
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    #[must_use]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Return `true` if the coordinates are inside the bounds of the texture
    #[must_use]
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width() && y < self.height()
    }

    /// The area covered by the texture, with the top left corner at the origin
    #[must_use]
    pub fn bounds(&self) -> Rectangle {
        Rectangle::from_position_and_size(Vec2D::new(0, 0), self.width as i32, self.height as i32)
    }
}

impl<T: Copy> Texture<T> {
    pub fn clear(&mut self, clear_color: T) {
        self.data.fill(clear_color);
    }

    /// Get the pixel value at the given coordinates
    ///
    /// # Panics
    /// This function panics if the coordinates are outside of the texture
    #[must_use]
    pub fn get_pixel(&self, x: usize, y: usize) -> T {
        self.data[self.index_of_pixel(x, y)]
    }

    /// Access a specific pixel, returning `None` outside of the texture
    #[must_use]
    pub fn try_get(&self, x: usize, y: usize) -> Option<T> {
        self.contains(x, y).then(|| self.get_pixel(x, y))
    }

    /// Set the pixel at the given coordinates to the specified value.
    ///
    /// # Panics
    /// This function panics if the coordinates are outside of the texture
    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: T) {
        let index = self.index_of_pixel(x, y);
        self.data[index] = pixel;
    }

    /// Copy out the given rectangle, which must lie inside the texture
    #[must_use]
    pub fn sub_texture(&self, x: usize, y: usize, width: usize, height: usize) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in y..y + height {
            data.extend_from_slice(&self.row(row)[x..x + width]);
        }
        Self::from_data(data, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_access() {
        let mut texture: Texture<u8> = Texture::new(3, 2);
        texture.set_pixel(2, 1, 7);

        assert_eq!(texture.get_pixel(2, 1), 7);
        assert_eq!(texture.try_get(2, 1), Some(7));
        assert_eq!(texture.try_get(3, 0), None);
        assert_eq!(texture.try_get(0, 2), None);
        assert_eq!(texture.row(1), &[0, 0, 7]);
    }

    #[test]
    fn sub_texture() {
        let texture = Texture::from_data((0..12).collect(), 4, 3);
        let sub = texture.sub_texture(1, 1, 2, 2);

        assert_eq!(sub.data(), &[5, 6, 9, 10]);
    }

    #[test]
    fn dimension_limits() {
        assert!(dimensions_are_acceptable(1, MAX_DIMENSION));
        assert!(!dimensions_are_acceptable(0, 10));
        assert!(!dimensions_are_acceptable(MAX_DIMENSION + 1, 10));
    }
}
