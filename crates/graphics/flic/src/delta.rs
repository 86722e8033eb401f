//! Decoding of a single frame chunk into the changes it makes to the animation
//!
//! Decoding is separate from applying the changes so that a corrupt frame can be rejected
//! before anything on the canvas is touched.

use sl_std::bytestream::ByteStream;

use crate::FrameError;

/// The size of the header every chunk starts with (size: u32, type: u16)
pub(crate) const CHUNK_HEADER_SIZE: usize = 6;

const FRAME_HEADER_SIZE: usize = 16;

const COLOR_256: u16 = 4;
const DELTA_FLC: u16 = 7;
const COLOR_64: u16 = 11;
const DELTA_FLI: u16 = 12;
const BLACK: u16 = 13;
const BYTE_RUN: u16 = 15;
const FLI_COPY: u16 = 16;
const PSTAMP: u16 = 18;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    /// Set every index on the canvas to zero
    Clear,

    /// Overwrite a horizontal run of indices, starting at `(x, y)`
    Span { x: usize, y: usize, indices: Vec<u8> },
}

/// Everything a single frame changes about the animation
///
/// All operations are known to lie within the animation, so applying a delta cannot fail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameDelta {
    /// New palette entries as `(index, 0xFFRRGGBB)`
    pub(crate) palette: Vec<(u8, u32)>,
    pub(crate) operations: Vec<Operation>,
}

impl FrameDelta {
    /// Decode a complete frame chunk (including its header) for an animation of the given size
    pub fn decode(chunk: &[u8], width: usize, height: usize) -> Result<Self, FrameError> {
        let mut stream = ByteStream::new(chunk);
        stream.advance(CHUNK_HEADER_SIZE);
        let num_subchunks = stream
            .next_le_u16()
            .ok_or(FrameError::UnexpectedEndOfFile)?;
        stream.set_cursor(FRAME_HEADER_SIZE);

        let mut delta = Self::default();
        let mut decoder = Decoder {
            delta: &mut delta,
            width,
            height,
        };

        for _ in 0..num_subchunks {
            let start = stream.cursor();
            let size = stream
                .next_le_u32()
                .ok_or(FrameError::UnexpectedEndOfFile)? as usize;
            let chunk_type = stream
                .next_le_u16()
                .ok_or(FrameError::UnexpectedEndOfFile)?;

            if size < CHUNK_HEADER_SIZE {
                log::error!("Subchunk of type {chunk_type} has invalid size {size}");
                return Err(FrameError::InvalidChunkSize);
            }

            let body = stream
                .next_slice(size - CHUNK_HEADER_SIZE)
                .ok_or(FrameError::InvalidChunkSize)?;

            decoder.decode_subchunk(chunk_type, body)?;
            stream.set_cursor(start + size);
        }

        Ok(delta)
    }

    #[must_use]
    pub fn changes_palette(&self) -> bool {
        !self.palette.is_empty()
    }

    #[must_use]
    pub fn clears_canvas(&self) -> bool {
        self.operations.contains(&Operation::Clear)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.palette.is_empty() && self.operations.is_empty()
    }
}

struct Decoder<'a> {
    delta: &'a mut FrameDelta,
    width: usize,
    height: usize,
}

impl Decoder<'_> {
    fn decode_subchunk(&mut self, chunk_type: u16, body: &[u8]) -> Result<(), FrameError> {
        let mut stream = ByteStream::new(body);

        match chunk_type {
            COLOR_256 => self.decode_palette(&mut stream, |value| value),
            COLOR_64 => self.decode_palette(&mut stream, |value| value << 2 | value >> 4),
            DELTA_FLI => self.decode_delta_fli(&mut stream),
            DELTA_FLC => self.decode_delta_flc(&mut stream),
            BLACK => {
                self.delta.operations.push(Operation::Clear);
                Ok(())
            },
            BYTE_RUN => self.decode_byte_run(&mut stream),
            FLI_COPY => self.decode_copy(&mut stream),
            PSTAMP => Ok(()),
            other => {
                log::debug!("Skipping unknown subchunk of type {other}");
                Ok(())
            },
        }
    }

    fn push_span(&mut self, x: usize, y: usize, indices: Vec<u8>) -> Result<(), FrameError> {
        if y >= self.height || x + indices.len() > self.width {
            log::error!(
                "Span of {} pixels at ({x}, {y}) does not fit into a {}x{} animation",
                indices.len(),
                self.width,
                self.height
            );
            return Err(FrameError::OutOfBounds);
        }

        if !indices.is_empty() {
            self.delta
                .operations
                .push(Operation::Span { x, y, indices });
        }

        Ok(())
    }

    fn decode_palette<F>(&mut self, stream: &mut ByteStream<'_>, scale: F) -> Result<(), FrameError>
    where
        F: Fn(u8) -> u8,
    {
        let num_packets = stream
            .next_le_u16()
            .ok_or(FrameError::UnexpectedEndOfFile)?;

        let mut index = 0;
        for _ in 0..num_packets {
            let skip = stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)?;
            let count = match stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)? {
                0 => 256,
                n => n as usize,
            };

            index += skip as usize;
            if index + count > 256 {
                return Err(FrameError::OutOfBounds);
            }

            for _ in 0..count {
                let [r, g, b] = stream
                    .next_chunk::<3>()
                    .ok_or(FrameError::UnexpectedEndOfFile)?;
                let color = 0xFF000000
                    | u32::from(scale(r)) << 16
                    | u32::from(scale(g)) << 8
                    | u32::from(scale(b));
                self.delta.palette.push((index as u8, color));
                index += 1;
            }
        }

        Ok(())
    }

    fn decode_copy(&mut self, stream: &mut ByteStream<'_>) -> Result<(), FrameError> {
        for y in 0..self.height {
            let line = stream
                .next_slice(self.width)
                .ok_or(FrameError::UnexpectedEndOfFile)?;
            self.push_span(0, y, line.to_vec())?;
        }

        Ok(())
    }

    fn decode_byte_run(&mut self, stream: &mut ByteStream<'_>) -> Result<(), FrameError> {
        for y in 0..self.height {
            // The packet count is unreliable for wide animations, lines end once they are full
            stream.advance(1);

            let mut line = Vec::with_capacity(self.width);
            while line.len() < self.width {
                let count = stream.next_i8().ok_or(FrameError::UnexpectedEndOfFile)?;

                match count {
                    0 => return Err(FrameError::InvalidRunLength),
                    1..=i8::MAX => {
                        let value = stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)?;
                        line.resize(line.len() + count as usize, value);
                    },
                    _ => {
                        let literals = stream
                            .next_slice(count.unsigned_abs() as usize)
                            .ok_or(FrameError::UnexpectedEndOfFile)?;
                        line.extend_from_slice(literals);
                    },
                }
            }

            if line.len() != self.width {
                log::error!("Byte run overflows line {y}");
                return Err(FrameError::OutOfBounds);
            }

            self.push_span(0, y, line)?;
        }

        Ok(())
    }

    fn decode_delta_fli(&mut self, stream: &mut ByteStream<'_>) -> Result<(), FrameError> {
        let first_line = stream
            .next_le_u16()
            .ok_or(FrameError::UnexpectedEndOfFile)? as usize;
        let num_lines = stream
            .next_le_u16()
            .ok_or(FrameError::UnexpectedEndOfFile)? as usize;

        for y in first_line..first_line + num_lines {
            let num_packets = stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)?;

            let mut x = 0;
            for _ in 0..num_packets {
                x += stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)? as usize;
                let size = stream.next_i8().ok_or(FrameError::UnexpectedEndOfFile)?;

                let indices = if size >= 0 {
                    stream
                        .next_slice(size as usize)
                        .ok_or(FrameError::UnexpectedEndOfFile)?
                        .to_vec()
                } else {
                    let value = stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)?;
                    vec![value; size.unsigned_abs() as usize]
                };

                let length = indices.len();
                self.push_span(x, y, indices)?;
                x += length;
            }
        }

        Ok(())
    }

    fn decode_delta_flc(&mut self, stream: &mut ByteStream<'_>) -> Result<(), FrameError> {
        let num_lines = stream
            .next_le_u16()
            .ok_or(FrameError::UnexpectedEndOfFile)?;

        let mut y = 0;
        for _ in 0..num_lines {
            // Line opcodes precede the packet count
            let num_packets = loop {
                let opcode = stream
                    .next_le_u16()
                    .ok_or(FrameError::UnexpectedEndOfFile)?;

                match opcode >> 14 {
                    0b00 => break opcode,
                    0b11 => y += (opcode as i16).unsigned_abs() as usize,
                    0b10 => {
                        if self.width == 0 {
                            return Err(FrameError::OutOfBounds);
                        }
                        self.push_span(self.width - 1, y, vec![opcode as u8])?;
                    },
                    _ => {
                        log::error!("Invalid line opcode {opcode:#06x} in line {y}");
                        return Err(FrameError::InvalidOpcode);
                    },
                }
            };

            let mut x = 0;
            for _ in 0..num_packets {
                x += stream.next_byte().ok_or(FrameError::UnexpectedEndOfFile)? as usize;
                let size = stream.next_i8().ok_or(FrameError::UnexpectedEndOfFile)?;

                let indices = if size >= 0 {
                    stream
                        .next_slice(2 * size as usize)
                        .ok_or(FrameError::UnexpectedEndOfFile)?
                        .to_vec()
                } else {
                    let word = stream
                        .next_chunk::<2>()
                        .ok_or(FrameError::UnexpectedEndOfFile)?;
                    word.repeat(size.unsigned_abs() as usize)
                };

                let length = indices.len();
                self.push_span(x, y, indices)?;
                x += length;
            }

            y += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(subchunks: &[(u16, &[u8])]) -> Vec<u8> {
        let mut bytes = vec![0; FRAME_HEADER_SIZE];
        bytes[4..6].copy_from_slice(&0xF1FAu16.to_le_bytes());
        bytes[6..8].copy_from_slice(&(subchunks.len() as u16).to_le_bytes());

        for (chunk_type, body) in subchunks {
            let size = (body.len() + CHUNK_HEADER_SIZE) as u32;
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(&chunk_type.to_le_bytes());
            bytes.extend_from_slice(body);
        }

        let size = bytes.len() as u32;
        bytes[0..4].copy_from_slice(&size.to_le_bytes());
        bytes
    }

    fn spans(delta: &FrameDelta) -> Vec<(usize, usize, Vec<u8>)> {
        delta
            .operations
            .iter()
            .filter_map(|operation| match operation {
                Operation::Span { x, y, indices } => Some((*x, *y, indices.clone())),
                Operation::Clear => None,
            })
            .collect()
    }

    #[test]
    fn palette_64() {
        // One packet, skip 2, two colors
        let body = [1, 0, 2, 2, 63, 0, 32, 0, 0, 63];
        let delta = FrameDelta::decode(&frame(&[(COLOR_64, &body)]), 4, 4).unwrap();

        assert_eq!(delta.palette, vec![(2, 0xFFFF0082), (3, 0xFF0000FF)]);
        assert!(delta.changes_palette());
    }

    #[test]
    fn palette_overflow() {
        let mut body = vec![1, 0, 255, 2];
        body.extend_from_slice(&[0; 6]);
        let result = FrameDelta::decode(&frame(&[(COLOR_256, &body)]), 4, 4);

        assert_eq!(result, Err(FrameError::OutOfBounds));
    }

    #[test]
    fn byte_run() {
        // Line 0: repeat 7 four times, line 1: literals 1 2 3 4
        let body = [1, 4, 7, 1, 0xFC, 1, 2, 3, 4];
        let delta = FrameDelta::decode(&frame(&[(BYTE_RUN, &body)]), 4, 2).unwrap();

        assert_eq!(
            spans(&delta),
            vec![(0, 0, vec![7; 4]), (0, 1, vec![1, 2, 3, 4])]
        );
    }

    #[test]
    fn byte_run_overflowing_line() {
        let body = [1, 5, 7];
        let result = FrameDelta::decode(&frame(&[(BYTE_RUN, &body)]), 4, 1);

        assert_eq!(result, Err(FrameError::OutOfBounds));
    }

    #[test]
    fn byte_run_zero_count() {
        let body = [1, 0];
        let result = FrameDelta::decode(&frame(&[(BYTE_RUN, &body)]), 4, 1);

        assert_eq!(result, Err(FrameError::InvalidRunLength));
    }

    #[test]
    fn delta_fli() {
        // Start at line 1, one line, two packets
        let body = [1, 0, 1, 0, 2, 1, 2, 9, 8, 0, 0xFE, 5];
        let delta = FrameDelta::decode(&frame(&[(DELTA_FLI, &body)]), 8, 4).unwrap();

        assert_eq!(
            spans(&delta),
            vec![(1, 1, vec![9, 8]), (3, 1, vec![5, 5])]
        );
    }

    #[test]
    fn delta_flc() {
        // Two lines: skip 2 lines, then one literal word; then repeat a word twice
        let body = [
            2, 0, // lines
            0xFE, 0xFF, // skip 2 lines
            1, 0, // one packet
            1, 1, 4, 5, // skip 1, one literal word
            1, 0, // one packet
            0, 0xFE, 6, 7, // skip 0, repeat word twice
        ];
        let delta = FrameDelta::decode(&frame(&[(DELTA_FLC, &body)]), 6, 4).unwrap();

        assert_eq!(
            spans(&delta),
            vec![(1, 2, vec![4, 5]), (0, 3, vec![6, 7, 6, 7])]
        );
    }

    #[test]
    fn delta_flc_last_byte() {
        let body = [1, 0, 0x09, 0x80, 0, 0];
        let delta = FrameDelta::decode(&frame(&[(DELTA_FLC, &body)]), 5, 1).unwrap();

        assert_eq!(spans(&delta), vec![(4, 0, vec![9])]);
    }

    #[test]
    fn delta_flc_invalid_opcode() {
        let body = [1, 0, 0x00, 0x40];
        let result = FrameDelta::decode(&frame(&[(DELTA_FLC, &body)]), 4, 4);

        assert_eq!(result, Err(FrameError::InvalidOpcode));
    }

    #[test]
    fn span_outside_animation() {
        let body = [0, 0, 1, 0, 1, 3, 2, 1, 2];
        let result = FrameDelta::decode(&frame(&[(DELTA_FLI, &body)]), 4, 4);

        assert_eq!(result, Err(FrameError::OutOfBounds));
    }

    #[test]
    fn black_and_unknown_chunks() {
        let delta =
            FrameDelta::decode(&frame(&[(BLACK, &[]), (PSTAMP, &[1, 2]), (99, &[3])]), 4, 4)
                .unwrap();

        assert!(delta.clears_canvas());
        assert_eq!(delta.operations.len(), 1);
    }

    #[test]
    fn truncated_subchunk() {
        let mut bytes = frame(&[(FLI_COPY, &[0; 16])]);
        bytes.truncate(bytes.len() - 4);

        let result = FrameDelta::decode(&bytes, 4, 4);
        assert_eq!(result, Err(FrameError::InvalidChunkSize));
    }

    #[test]
    fn empty_frame() {
        let delta = FrameDelta::decode(&frame(&[]), 4, 4).unwrap();
        assert!(delta.is_empty());
    }
}
