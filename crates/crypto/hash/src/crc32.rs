//! CRC-32 as used by PNG, zlib and gzip (reflected polynomial `0xEDB88320`)

const POLYNOMIAL: u32 = 0xEDB88320;

const CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0; 256];
    let mut n = 0;

    while n < 256 {
        let mut value = n as u32;
        let mut bit = 0;
        while bit < 8 {
            value = if value & 1 == 1 {
                POLYNOMIAL ^ (value >> 1)
            } else {
                value >> 1
            };
            bit += 1;
        }
        table[n] = value;
        n += 1;
    }

    table
}

#[must_use]
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Incremental CRC-32 computation
///
/// Useful when the checksummed data is not contiguous in memory,
/// like the type and payload of a PNG chunk.
#[derive(Clone, Copy, Debug)]
pub struct Crc32Hasher(u32);

impl Default for Crc32Hasher {
    fn default() -> Self {
        Self(u32::MAX)
    }
}

impl Crc32Hasher {
    pub fn write(&mut self, bytes: &[u8]) {
        let mut crc32 = self.0;
        for byte in bytes {
            let lookup_index = (crc32 & 0xFF) as u8 ^ byte;
            crc32 = (crc32 >> 8) ^ CRC32_TABLE[lookup_index as usize];
        }
        self.0 = crc32;
    }

    #[must_use]
    pub fn finish(self) -> u32 {
        !self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32() {
        assert_eq!(crc32(b""), 0);
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn incremental_matches_oneshot() {
        let text = b"The quick brown fox jumps over the lazy dog";

        let mut hasher = Crc32Hasher::default();
        hasher.write(&text[..10]);
        hasher.write(&text[10..]);

        assert_eq!(hasher.finish(), crc32(text));
        assert_eq!(crc32(text), 0x414FA339);
    }

    #[test]
    fn png_iend_chunk() {
        // The CRC of an IEND chunk is the same in every PNG file
        assert_eq!(crc32(b"IEND"), 0xAE426082);
    }
}
