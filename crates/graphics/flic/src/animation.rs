//! The animation container and the retained state frames are applied to

use std::ops::Range;

use image::{BlendMode, PixelBuffer, RenderTarget, Texture, MAX_DIMENSION};
use math::Vec2D;
use sl_std::bytestream::ByteStream;

use crate::{
    delta::{FrameDelta, Operation, CHUNK_HEADER_SIZE},
    Error, FrameError,
};

const HEADER_SIZE: usize = 128;

const FLI_MAGIC: u16 = 0xAF11;
const FLC_MAGIC: u16 = 0xAF12;

const PREFIX_CHUNK: u16 = 0xF100;
const FRAME_CHUNK: u16 = 0xF1FA;

/// FLI animations always have this size, older files leave the fields blank
const DEFAULT_WIDTH: usize = 320;
const DEFAULT_HEIGHT: usize = 200;

/// FLI speeds are measured in ticks of 1/70th of a second
const FLI_TICKS_PER_SECOND: u32 = 70;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// The original 320x200 Animator format
    Fli,

    /// The Animator Pro format with arbitrary dimensions
    Flc,
}

/// An open animation, along with the canvas its frames are rendered onto
#[derive(Clone, Debug)]
pub struct Animation {
    variant: Variant,
    width: usize,
    height: usize,
    frame_delay: u32,
    data: Vec<u8>,

    /// Byte ranges of every frame chunk, in playback order
    frames: Vec<Range<usize>>,
    palette: [u32; 256],
    canvas: Texture<u8>,
    frame: PixelBuffer,
    cursor: usize,
}

impl Animation {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        let mut stream = ByteStream::new(&data);
        stream.advance(4);
        let magic = stream.next_le_u16().ok_or(Error::UnsupportedFormat)?;

        let variant = match magic {
            FLI_MAGIC => Variant::Fli,
            FLC_MAGIC => Variant::Flc,
            other => {
                log::debug!("{other:#06x} is not a flic magic number");
                return Err(Error::UnsupportedFormat);
            },
        };

        if data.len() < HEADER_SIZE {
            return Err(FrameError::UnexpectedEndOfFile.into());
        }

        // The header is complete, none of the reads below can fail
        let frame_count = stream.next_le_u16().unwrap_or_default() as usize;
        let width = stream.next_le_u16().unwrap_or_default() as usize;
        let height = stream.next_le_u16().unwrap_or_default() as usize;
        let depth = stream.next_le_u16().unwrap_or_default();
        stream.advance(2);

        let frame_delay = match variant {
            Variant::Fli => {
                let ticks = u32::from(stream.next_le_u16().unwrap_or_default());
                ticks * 1000 / FLI_TICKS_PER_SECOND
            },
            Variant::Flc => stream.next_le_u32().unwrap_or_default(),
        };

        let first_frame = match variant {
            Variant::Fli => HEADER_SIZE,
            Variant::Flc => {
                stream.set_cursor(80);
                match stream.next_le_u32().unwrap_or_default() {
                    0 => HEADER_SIZE,
                    offset => offset as usize,
                }
            },
        };

        if depth != 0 && depth != 8 {
            log::error!("Animations with {depth} bits per pixel are not supported");
            return Err(Error::UnsupportedFormat);
        }

        let (width, height) = if width == 0 || height == 0 {
            (DEFAULT_WIDTH, DEFAULT_HEIGHT)
        } else {
            (width, height)
        };

        if MAX_DIMENSION < width || MAX_DIMENSION < height {
            log::error!("Refusing to play a {width}x{height} animation");
            return Err(FrameError::RefuseToParse.into());
        }

        if frame_count == 0 {
            return Err(FrameError::NoFrames.into());
        }

        let frames = index_frames(&data, first_frame, frame_count)?;

        Ok(Self {
            variant,
            width,
            height,
            frame_delay,
            data,
            frames,
            palette: [0xFF000000; 256],
            canvas: Texture::new(width, height),
            frame: PixelBuffer::from_data(vec![0xFF000000; width * height], width, height),
            cursor: 0,
        })
    }

    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The time between two frames, in milliseconds
    #[must_use]
    pub const fn frame_delay(&self) -> u32 {
        self.frame_delay
    }

    /// The index of the frame that will be applied next
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// The most recently rendered frame
    #[must_use]
    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor < self.frame_count());
        self.cursor = cursor;
    }

    /// Decode the frame at the cursor and apply it
    ///
    /// The cursor is not moved. If the frame is corrupt, the animation is left untouched.
    pub(crate) fn apply_current_frame(&mut self) -> Result<(), FrameError> {
        let delta = FrameDelta::decode(
            &self.data[self.frames[self.cursor].clone()],
            self.width,
            self.height,
        )?;

        if self.cursor == 0 {
            self.canvas.clear(0);
            self.palette = [0xFF000000; 256];
            self.frame.clear(0xFF000000);
        }

        self.apply(&delta);
        Ok(())
    }

    fn apply(&mut self, delta: &FrameDelta) {
        for &(index, color) in &delta.palette {
            self.palette[index as usize] = color;
        }

        for operation in &delta.operations {
            match operation {
                Operation::Clear => self.canvas.clear(0),
                Operation::Span { x, y, indices } => {
                    self.canvas.row_mut(*y)[*x..*x + indices.len()].copy_from_slice(indices);
                },
            }
        }

        if delta.changes_palette() || delta.clears_canvas() {
            for (pixel, &index) in self.frame.data_mut().iter_mut().zip(self.canvas.data()) {
                *pixel = self.palette[index as usize];
            }
        } else {
            for operation in &delta.operations {
                if let Operation::Span { x, y, indices } = operation {
                    let row = &mut self.frame.row_mut(*y)[*x..*x + indices.len()];
                    for (pixel, &index) in row.iter_mut().zip(indices) {
                        *pixel = self.palette[index as usize];
                    }
                }
            }
        }
    }

    /// Draw the most recently rendered frame with its top left corner at `(x, y)`
    pub fn composite<T: RenderTarget + ?Sized>(&self, target: &mut T, x: i32, y: i32) {
        target.blit(
            &self.frame,
            Vec2D::new(x, y),
            self.frame.bounds(),
            BlendMode::Copy,
        );
    }
}

/// Find the byte ranges of the first `frame_count` frame chunks
///
/// Prefix chunks and chunks of unknown type are skipped. Anything after the last frame
/// (usually the ring frame that loops back to the start) is ignored.
fn index_frames(
    data: &[u8],
    first_frame: usize,
    frame_count: usize,
) -> Result<Vec<Range<usize>>, FrameError> {
    let mut stream = ByteStream::new(data);
    stream.set_cursor(first_frame);

    let mut frames = Vec::with_capacity(frame_count);
    while frames.len() < frame_count {
        let start = stream.cursor();
        let (Some(size), Some(chunk_type)) = (stream.next_le_u32(), stream.next_le_u16()) else {
            log::error!(
                "Expected {frame_count} frames, found only {}",
                frames.len()
            );
            return Err(FrameError::MissingFrames);
        };

        let size = size as usize;
        if size < CHUNK_HEADER_SIZE || data.len() - start < size {
            log::error!("Chunk at offset {start} has invalid size {size}");
            return Err(FrameError::InvalidChunkSize);
        }

        match chunk_type {
            FRAME_CHUNK => frames.push(start..start + size),
            PREFIX_CHUNK => {},
            other => log::debug!("Skipping chunk of type {other:#06x}"),
        }

        stream.set_cursor(start + size);
    }

    Ok(frames)
}
