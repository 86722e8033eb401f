//! Non-cryptographic checksums used by the container formats in this workspace
//!
//! * [crc32] protects every PNG chunk
//! * [adler32] protects the payload of a zlib stream

mod adler32;
mod crc32;

pub use adler32::{adler32, Adler32Hasher};
pub use crc32::{crc32, Crc32Hasher};
