pub mod ihdr;
pub mod plte;
pub mod trns;

pub use ihdr::ImageHeader;
pub use plte::Palette;
pub use trns::Transparency;
