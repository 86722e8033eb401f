use math::{Rectangle, Vec2D};

use crate::{color::blend, texture::PixelBuffer};

/// How source pixels are combined with the pixels of the target
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Replace the target pixels
    #[default]
    Copy,

    /// Alpha-blend the source onto the target
    Blend,
}

impl BlendMode {
    #[inline]
    fn apply(&self, destination: &mut u32, source: u32) {
        *destination = match self {
            Self::Copy => source,
            Self::Blend => blend(*destination, source),
        };
    }
}

/// Anything pixels can be drawn onto
///
/// Drawing never fails, everything outside of [bounds](RenderTarget::bounds) is silently clipped.
pub trait RenderTarget {
    fn bounds(&self) -> Rectangle;

    /// Draw the `clip` area of `source` with its top left corner at `position`
    fn blit(&mut self, source: &PixelBuffer, position: Vec2D, clip: Rectangle, mode: BlendMode);

    /// Scale the `clip` area of `source` into `destination`, using nearest neighbour sampling
    fn blit_scaled(
        &mut self,
        source: &PixelBuffer,
        clip: Rectangle,
        destination: Rectangle,
        mode: BlendMode,
    );
}

impl RenderTarget for PixelBuffer {
    fn bounds(&self) -> Rectangle {
        PixelBuffer::bounds(self)
    }

    fn blit(&mut self, source: &PixelBuffer, position: Vec2D, clip: Rectangle, mode: BlendMode) {
        let Some(clip) = clip.intersection(source.bounds()) else {
            return;
        };

        // Positions near the edges of the i32 range would overflow once the clip size is added
        let clip = clip.map(i64::from);
        let position = position.map(i64::from);
        let bounds = RenderTarget::bounds(self).map(i64::from);

        // Where the clipped source would end up in the target, before clipping against the target
        let offset = position - clip.top_left();
        let Some(visible) = clip.offset_by(offset).intersection(bounds) else {
            return;
        };

        let width = visible.width() as usize;
        let source_x = (visible.top_left().x - offset.x) as usize;
        let target_x = visible.top_left().x as usize;

        for target_y in visible.top_left().y..visible.bottom_right().y {
            let source_y = (target_y - offset.y) as usize;
            let source_row = &source.row(source_y)[source_x..source_x + width];
            let target_row = &mut self.row_mut(target_y as usize)[target_x..target_x + width];

            match mode {
                BlendMode::Copy => target_row.copy_from_slice(source_row),
                BlendMode::Blend => {
                    for (destination, &pixel) in target_row.iter_mut().zip(source_row) {
                        mode.apply(destination, pixel);
                    }
                },
            }
        }
    }

    fn blit_scaled(
        &mut self,
        source: &PixelBuffer,
        clip: Rectangle,
        destination: Rectangle,
        mode: BlendMode,
    ) {
        let Some(clip) = clip.intersection(source.bounds()) else {
            return;
        };

        if destination.is_empty() {
            return;
        }

        // The size of a destination spanning most of the i32 range does not fit into an i32
        let clip = clip.map(i64::from);
        let destination = destination.map(i64::from);
        let bounds = RenderTarget::bounds(self).map(i64::from);

        let Some(visible) = destination.intersection(bounds) else {
            return;
        };

        // Sample at the center of each target pixel
        let sample = |target: i64, start: i64, target_size: i64, source_start: i64, source_size: i64| {
            let position = (2 * (target - start) + 1) * source_size / (2 * target_size);
            (source_start + position) as usize
        };

        for target_y in visible.top_left().y..visible.bottom_right().y {
            let source_y = sample(
                target_y,
                destination.top_left().y,
                destination.height(),
                clip.top_left().y,
                clip.height(),
            );

            for target_x in visible.top_left().x..visible.bottom_right().x {
                let source_x = sample(
                    target_x,
                    destination.top_left().x,
                    destination.width(),
                    clip.top_left().x,
                    clip.width(),
                );

                let pixel = source.get_pixel(source_x, source_y);
                mode.apply(&mut self.row_mut(target_y as usize)[target_x as usize], pixel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::from_data((0..(width * height) as u32).collect(), width, height)
    }

    #[test]
    fn blit_is_clipped() {
        let source = numbered(3, 3);
        let mut target = PixelBuffer::new(4, 4);

        target.blit(&source, Vec2D::new(2, -1), source.bounds(), BlendMode::Copy);

        assert_eq!(target.row(0), &[0, 0, 3, 4]);
        assert_eq!(target.row(1), &[0, 0, 6, 7]);
        assert_eq!(target.row(2), &[0, 0, 0, 0]);
    }

    #[test]
    fn blit_part_of_source() {
        let source = numbered(3, 3);
        let mut target = PixelBuffer::new(2, 2);

        let clip = Rectangle::from_position_and_size(Vec2D::new(1, 1), 2, 2);
        target.blit(&source, Vec2D::new(0, 0), clip, BlendMode::Copy);

        assert_eq!(target.data(), &[4, 5, 7, 8]);
    }

    #[test]
    fn blit_outside_is_ignored() {
        let source = numbered(2, 2);
        let mut target = PixelBuffer::new(2, 2);

        target.blit(&source, Vec2D::new(5, 0), source.bounds(), BlendMode::Copy);
        target.blit(&source, Vec2D::new(-2, -2), source.bounds(), BlendMode::Copy);

        assert!(target.data().iter().all(|&pixel| pixel == 0));
    }

    #[test]
    fn blit_at_extreme_positions() {
        let source = numbered(3, 3);
        let mut target = PixelBuffer::new(4, 4);

        for position in [
            Vec2D::new(0, i32::MAX),
            Vec2D::new(i32::MAX - 1, 0),
            Vec2D::new(i32::MAX, i32::MAX),
            Vec2D::new(i32::MIN, 0),
            Vec2D::new(0, i32::MIN),
            Vec2D::new(i32::MIN, i32::MIN),
        ] {
            target.blit(&source, position, source.bounds(), BlendMode::Copy);
            target.blit(&source, position, source.bounds(), BlendMode::Blend);
        }

        assert!(target.data().iter().all(|&pixel| pixel == 0));

        // The clip may start anywhere, only its overlap with the source is drawn
        let clip = Rectangle::from_corners(Vec2D::new(i32::MIN, i32::MIN), Vec2D::new(i32::MAX, i32::MAX));
        target.blit(&source, Vec2D::new(i32::MIN, i32::MIN), clip, BlendMode::Copy);
        target.blit(&source, Vec2D::new(1, 1), clip, BlendMode::Copy);

        assert_eq!(target.row(0), &[0, 0, 0, 0]);
        assert_eq!(target.row(1), &[0, 0, 1, 2]);
        assert_eq!(target.row(3), &[0, 6, 7, 8]);
    }

    #[test]
    fn scaled_blit_to_huge_destination() {
        let source = numbered(2, 2);
        let mut target = PixelBuffer::new(2, 2);

        // The left half of the destination covers the whole target
        let destination = Rectangle::from_corners(Vec2D::new(i32::MIN, i32::MIN), Vec2D::new(i32::MAX, i32::MAX));
        target.blit_scaled(&source, source.bounds(), destination, BlendMode::Copy);

        assert_eq!(target.data(), &[3, 3, 3, 3]);

        let far_away = Rectangle::from_corners(Vec2D::new(i32::MAX - 1, 0), Vec2D::new(i32::MAX, 1));
        target.blit_scaled(&source, source.bounds(), far_away, BlendMode::Copy);

        assert_eq!(target.data(), &[3, 3, 3, 3]);
    }

    #[test]
    fn blended_blit() {
        let source = PixelBuffer::from_data(vec![0x80FFFFFF, 0x00FFFFFF, 0xFFFFFFFF], 3, 1);
        let mut target = PixelBuffer::from_data(vec![0xFF000000; 3], 3, 1);

        target.blit(&source, Vec2D::new(0, 0), source.bounds(), BlendMode::Blend);

        // 0 + (128 * 255) >> 8 = 127
        assert_eq!(target.data(), &[0xFF7F7F7F, 0xFF000000, 0xFFFFFFFF]);
    }

    #[test]
    fn scaled_blit() {
        let source = numbered(2, 2);
        let mut target = PixelBuffer::new(4, 4);

        let destination = Rectangle::from_position_and_size(Vec2D::new(0, 0), 4, 4);
        target.blit_scaled(&source, source.bounds(), destination, BlendMode::Copy);

        assert_eq!(target.row(0), &[0, 0, 1, 1]);
        assert_eq!(target.row(1), &[0, 0, 1, 1]);
        assert_eq!(target.row(3), &[2, 2, 3, 3]);
    }

    #[test]
    fn scaled_blit_shrinks() {
        let source = numbered(4, 4);
        let mut target = PixelBuffer::new(2, 2);

        let destination = Rectangle::from_position_and_size(Vec2D::new(0, 0), 2, 2);
        target.blit_scaled(&source, source.bounds(), destination, BlendMode::Copy);

        assert_eq!(target.data(), &[5, 7, 13, 15]);
    }
}
