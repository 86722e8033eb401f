const BASE: u32 = 65521;

/// The largest number of bytes that can be summed before the
/// accumulators need to be reduced modulo [BASE] to avoid overflowing
const NMAX: usize = 5552;

#[must_use]
pub fn adler32(bytes: &[u8]) -> u32 {
    let mut hasher = Adler32Hasher::default();
    hasher.write(bytes);
    hasher.finish()
}

#[derive(Clone, Copy, Debug)]
pub struct Adler32Hasher(u32, u32);

impl Default for Adler32Hasher {
    fn default() -> Self {
        Self(1, 0)
    }
}

impl Adler32Hasher {
    pub fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(NMAX) {
            for b in chunk {
                self.0 += *b as u32;
                self.1 += self.0;
            }

            self.0 %= BASE;
            self.1 %= BASE;
        }
    }

    #[must_use]
    pub fn finish(&self) -> u32 {
        self.1 << 16 | self.0
    }
}
