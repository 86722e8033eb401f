//! Playback of Autodesk FLIC animations (`.fli` and `.flc`)
//!
//! Frames are stored as deltas against the previous frame, so an animation can only be played
//! front to back. The [AnimationPlayer] keeps the current frame around and updates it in place.
//!
//! ## Resources
//! * <https://www.compuphase.com/flic.htm>
//! * <http://www.fileformat.info/format/fli/egff.htm>

mod animation;
mod delta;
mod player;

use std::io;

use error_derive::Error;

pub use animation::{Animation, Variant};
pub use delta::FrameDelta;
pub use player::{AnimationPlayer, PlaybackState};

/// Describes why the content of an animation is invalid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FrameError {
    #[msg = "unexpected end of file"]
    UnexpectedEndOfFile,

    #[msg = "chunk size exceeds its container"]
    InvalidChunkSize,

    #[msg = "the animation contains no frames"]
    NoFrames,

    #[msg = "fewer frames than announced in the header"]
    MissingFrames,

    #[msg = "frame data exceeds the animation dimensions"]
    OutOfBounds,

    #[msg = "invalid run length"]
    InvalidRunLength,

    #[msg = "invalid line opcode"]
    InvalidOpcode,

    /// This animation contains extreme values and cannot be played
    #[msg = "animation dimensions out of range"]
    RefuseToParse,
}

#[derive(Debug, Error)]
pub enum Error {
    #[msg = "failed to read animation"]
    Io(io::Error),

    #[msg = "not a supported flic animation"]
    UnsupportedFormat,

    #[msg = "corrupt animation data"]
    CorruptData(FrameError),

    #[msg = "no animation is open"]
    NotOpen,
}
