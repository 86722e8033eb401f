//! Integer geometry shared by the pixel buffer and animation crates

mod rect;
mod vec2d;

pub use rect::Rectangle;
pub use vec2d::Vec2D;
