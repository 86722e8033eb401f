use super::Vec2D;

use std::{cmp, ops};

/// An axis aligned rectangle, `bottom_right` is exclusive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rectangle<T = i32> {
    top_left: Vec2D<T>,
    bottom_right: Vec2D<T>,
}

impl<T> Rectangle<T> {
    pub const fn from_corners(top_left: Vec2D<T>, bottom_right: Vec2D<T>) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }
}

impl<T> Rectangle<T>
where
    T: Copy,
{
    pub const fn top_left(&self) -> Vec2D<T> {
        self.top_left
    }

    pub const fn bottom_right(&self) -> Vec2D<T> {
        self.bottom_right
    }

    #[must_use]
    pub fn map<U, F: Fn(T) -> U>(self, f: F) -> Rectangle<U> {
        Rectangle {
            top_left: self.top_left.map(&f),
            bottom_right: self.bottom_right.map(&f),
        }
    }
}

impl<T> Rectangle<T>
where
    T: ops::Add<Output = T> + ops::Sub<Output = T> + Copy,
{
    #[must_use]
    pub fn offset_by(&self, offset: Vec2D<T>) -> Self {
        Self::from_position_and_size(self.top_left() + offset, self.width(), self.height())
    }

    pub fn from_position_and_size(top_left: Vec2D<T>, width: T, height: T) -> Self {
        let bottom_right = Vec2D {
            x: top_left.x + width,
            y: top_left.y + height,
        };

        Self {
            top_left,
            bottom_right,
        }
    }

    pub fn width(&self) -> T {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> T {
        self.bottom_right.y - self.top_left.y
    }
}

impl<T> Rectangle<T>
where
    T: Ord + Copy,
{
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bottom_right.x <= self.top_left.x || self.bottom_right.y <= self.top_left.y
    }

    #[inline]
    #[must_use]
    pub fn contains_point(&self, point: Vec2D<T>) -> bool {
        (self.top_left.x..self.bottom_right.x).contains(&point.x)
            && (self.top_left.y..self.bottom_right.y).contains(&point.y)
    }

    /// The area covered by both rectangles, if any
    #[must_use]
    pub fn intersection(&self, other: Self) -> Option<Self> {
        let intersection = Self {
            top_left: Vec2D {
                x: cmp::max(self.top_left.x, other.top_left.x),
                y: cmp::max(self.top_left.y, other.top_left.y),
            },
            bottom_right: Vec2D {
                x: cmp::min(self.bottom_right.x, other.bottom_right.x),
                y: cmp::min(self.bottom_right.y, other.bottom_right.y),
            },
        };

        (!intersection.is_empty()).then_some(intersection)
    }
}
