//! Implements the compression schemes used by the image container formats

mod bit_io;
mod huffman;

pub mod deflate;
pub mod zlib;

pub use bit_io::{BitReader, BitWriter};
pub use huffman::HuffmanTree;
