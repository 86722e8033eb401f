use std::{fs, path::Path};

use image::RenderTarget;

use crate::{Animation, Error};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// No animation is open
    #[default]
    Closed,

    /// An animation is open, but no frame has been shown yet
    Open,
    Playing,
    Paused,

    /// The last frame of a non-looping animation was shown
    Finished,
}

/// Owns at most one animation and plays it back frame by frame
#[derive(Debug, Default)]
pub struct AnimationPlayer {
    animation: Option<Animation>,
    state: PlaybackState,
}

impl AnimationPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the animation at `path`, closing the current one first
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        self.close();

        let path = path.as_ref();
        let animation = Animation::from_bytes(fs::read(path)?)?;

        log::info!(
            "Opened {}: {} frames of {}x{}",
            path.display(),
            animation.frame_count(),
            animation.width(),
            animation.height()
        );

        self.animation = Some(animation);
        self.state = PlaybackState::Open;
        Ok(())
    }

    /// Open an animation that is already in memory, closing the current one first
    pub fn open_bytes(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        self.close();

        let animation = Animation::from_bytes(bytes)?;
        log::info!(
            "Opened animation: {} frames of {}x{}",
            animation.frame_count(),
            animation.width(),
            animation.height()
        );

        self.animation = Some(animation);
        self.state = PlaybackState::Open;
        Ok(())
    }

    /// Show the next frame at `(x, y)` on `target`
    ///
    /// Returns the index of the frame that the next call will show, or `None` once a
    /// non-looping animation has run out of frames. While paused, the current frame is drawn
    /// again without advancing.
    ///
    /// A corrupt frame is reported as an error, but playback still moves past it and the
    /// last good frame is drawn instead.
    pub fn advance<T: RenderTarget + ?Sized>(
        &mut self,
        target: &mut T,
        x: i32,
        y: i32,
        looping: bool,
    ) -> Result<Option<usize>, Error> {
        let Some(animation) = self.animation.as_mut() else {
            return Err(Error::NotOpen);
        };

        match self.state {
            PlaybackState::Closed => return Err(Error::NotOpen),
            PlaybackState::Finished => return Ok(None),
            PlaybackState::Paused => {
                animation.composite(target, x, y);
                return Ok(Some(animation.cursor()));
            },
            PlaybackState::Open | PlaybackState::Playing => {},
        }

        let applied = animation.apply_current_frame();
        animation.composite(target, x, y);
        self.state = PlaybackState::Playing;

        let next = animation.cursor() + 1;
        let next = if next < animation.frame_count() {
            animation.set_cursor(next);
            Some(next)
        } else if looping {
            animation.set_cursor(0);
            Some(0)
        } else {
            log::debug!("Animation finished");
            self.state = PlaybackState::Finished;
            None
        };

        match applied {
            Ok(()) => Ok(next),
            Err(error) => {
                log::warn!("Skipping corrupt frame: {error}");
                Err(error.into())
            },
        }
    }

    /// Has no effect unless the animation is playing
    pub fn pause(&mut self) {
        if matches!(self.state, PlaybackState::Open | PlaybackState::Playing) {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn close(&mut self) {
        if self.animation.take().is_some() {
            log::info!("Closed animation");
        }
        self.state = PlaybackState::Closed;
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }

    #[must_use]
    pub fn width(&self) -> Option<usize> {
        self.animation.as_ref().map(Animation::width)
    }

    #[must_use]
    pub fn height(&self) -> Option<usize> {
        self.animation.as_ref().map(Animation::height)
    }

    #[must_use]
    pub fn frame_count(&self) -> Option<usize> {
        self.animation.as_ref().map(Animation::frame_count)
    }

    /// The time between two frames, in milliseconds
    #[must_use]
    pub fn frame_delay(&self) -> Option<u32> {
        self.animation.as_ref().map(Animation::frame_delay)
    }

    /// The index of the frame the next call to [advance](Self::advance) will show
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.animation.as_ref().map(Animation::cursor)
    }
}
