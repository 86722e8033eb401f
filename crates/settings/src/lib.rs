//! Responsible for turning the command line into the settings of a gfxtool run

mod cli;

use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use image::{ColorDepth, ImageFormat};

/// What gfxtool was asked to do
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    /// Print format, size and depth of images
    Info { paths: Vec<PathBuf> },

    /// Re-encode an image, the format is taken from `format` or the output extension
    Convert {
        input: PathBuf,
        output: PathBuf,
        format: Option<ImageFormat>,
    },

    /// Print a single pixel
    Pixel { path: PathBuf, x: usize, y: usize },

    /// Create an image filled with a single color
    Blank {
        output: PathBuf,
        width: usize,
        height: usize,
        color: u32,
        depth: ColorDepth,
    },

    /// Render a BlurHash placeholder
    Blurhash {
        hash: String,
        output: PathBuf,
        width: usize,
        height: usize,
        punch: f32,
    },

    /// Play a FLIC animation, optionally dumping every frame
    Play {
        path: PathBuf,
        looping: bool,
        frames: Option<usize>,
        output: Option<PathBuf>,
        realtime: bool,
    },
}

/// Holds all the configurable information for a gfxtool run
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub task: Task,

    /// Used when the output path has no recognizable extension
    pub fallback_format: ImageFormat,
}

impl Settings {
    /// Read the settings from the process arguments, exiting on invalid input
    #[must_use]
    pub fn init() -> Self {
        let mut settings = Self::default();

        let args = cli::Arguments::parse();

        args.update_settings(&mut settings);

        settings
    }

    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut settings = Self::default();
        cli::Arguments::try_parse_from(args)?.update_settings(&mut settings);
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            task: Task::Info { paths: Vec::new() },
            fallback_format: ImageFormat::Png,
        }
    }
}
