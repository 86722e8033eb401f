//! [PLTE](https://www.w3.org/TR/png/#11PLTE) chunk

use crate::color::rgb;

use error_derive::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[msg = "palette size must be a multiple of three and at most 256 entries"]
    InvalidPaletteSize,
}

#[derive(Clone, Debug)]
pub struct Palette {
    /// Opaque colors, transparency is applied from the tRNS chunk
    pub colors: Vec<u32>,
}

impl Palette {
    pub fn new(bytes: &[u8]) -> Result<Self, PaletteError> {
        if bytes.len() % 3 != 0 || bytes.len() > 3 * 256 {
            return Err(PaletteError::InvalidPaletteSize);
        }

        let colors = bytes
            .chunks_exact(3)
            .map(|entry| rgb(entry[0], entry[1], entry[2]))
            .collect();

        Ok(Self { colors })
    }
}
