use std::path::PathBuf;

use image::{ColorDepth, ImageFormat};

use crate::{Settings, Task};

#[derive(clap::Parser, Debug)]
#[command(name = "gfxtool", version, about = "Inspect, convert and play retro image formats", long_about = None)]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,

    /// Format for output files without a known extension
    #[arg(long, global = true, value_parser = parse_format)]
    fallback_format: Option<ImageFormat>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print format, size and color depth of images
    Info {
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        paths: Vec<PathBuf>,
    },

    /// Convert an image to another format
    Convert {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        input: PathBuf,

        #[arg(value_hint = clap::ValueHint::FilePath)]
        output: PathBuf,

        /// Output format, guessed from the output extension if omitted
        #[arg(short, long, value_parser = parse_format)]
        format: Option<ImageFormat>,
    },

    /// Print the color of a single pixel
    Pixel {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
        x: usize,
        y: usize,
    },

    /// Create an image filled with a single color
    Blank {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        output: PathBuf,

        #[arg(long)]
        width: usize,

        #[arg(long)]
        height: usize,

        /// Either #RRGGBB or AARRGGBB
        #[arg(long, default_value = "#000000", value_parser = parse_color)]
        color: u32,

        /// Bits per pixel (8, 15, 16, 24 or 32)
        #[arg(long, default_value = "32", value_parser = parse_depth)]
        depth: ColorDepth,
    },

    /// Render a BlurHash placeholder
    Blurhash {
        hash: String,

        #[arg(value_hint = clap::ValueHint::FilePath)]
        output: PathBuf,

        #[arg(long, default_value_t = 32)]
        width: usize,

        #[arg(long, default_value_t = 32)]
        height: usize,

        /// Contrast of the placeholder
        #[arg(long, default_value_t = 1.0)]
        punch: f32,
    },

    /// Play a FLI or FLC animation
    Play {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,

        /// Start over once the last frame was shown
        #[arg(long = "loop", action = clap::ArgAction::SetTrue)]
        looping: bool,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<usize>,

        /// Directory to write every frame into, as PNG
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        output: Option<PathBuf>,

        /// Wait for the frame delay between frames
        #[arg(long, action = clap::ArgAction::SetTrue)]
        realtime: bool,
    },
}

impl Arguments {
    pub(crate) fn update_settings(self, settings: &mut Settings) {
        if let Some(format) = self.fallback_format {
            settings.fallback_format = format;
        }

        settings.task = match self.command {
            Command::Info { paths } => Task::Info { paths },
            Command::Convert {
                input,
                output,
                format,
            } => Task::Convert {
                input,
                output,
                format,
            },
            Command::Pixel { path, x, y } => Task::Pixel { path, x, y },
            Command::Blank {
                output,
                width,
                height,
                color,
                depth,
            } => Task::Blank {
                output,
                width,
                height,
                color,
                depth,
            },
            Command::Blurhash {
                hash,
                output,
                width,
                height,
                punch,
            } => Task::Blurhash {
                hash,
                output,
                width,
                height,
                punch,
            },
            Command::Play {
                path,
                looping,
                frames,
                output,
                realtime,
            } => Task::Play {
                path,
                looping,
                frames,
                output,
                realtime,
            },
        };
    }
}

fn parse_format(s: &str) -> Result<ImageFormat, String> {
    ImageFormat::from_extension(s).ok_or_else(|| format!("unknown image format {s:?}"))
}

fn parse_color(s: &str) -> Result<u32, String> {
    let invalid = || format!("{s:?} is not a color, expected #RRGGBB or AARRGGBB");

    if let Some(rgb) = s.strip_prefix('#') {
        if rgb.len() != 6 {
            return Err(invalid());
        }
        let rgb = u32::from_str_radix(rgb, 16).map_err(|_| invalid())?;
        return Ok(0xFF000000 | rgb);
    }

    let argb = s.strip_prefix("0x").unwrap_or(s);
    if argb.len() != 8 {
        return Err(invalid());
    }
    u32::from_str_radix(argb, 16).map_err(|_| invalid())
}

fn parse_depth(s: &str) -> Result<ColorDepth, String> {
    s.parse()
        .ok()
        .and_then(ColorDepth::from_bits_per_pixel)
        .ok_or_else(|| format!("unsupported color depth {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(args: &[&str]) -> Settings {
        Settings::try_from_args(std::iter::once("gfxtool").chain(args.iter().copied()))
            .expect("arguments are valid")
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#ff8000"), Ok(0xFFFF8000));
        assert_eq!(parse_color("80102030"), Ok(0x80102030));
        assert_eq!(parse_color("0x80102030"), Ok(0x80102030));
        assert!(parse_color("#fff").is_err());
        assert!(parse_color("#gggggg").is_err());
        assert!(parse_color("red").is_err());
    }

    #[test]
    fn convert() {
        let settings = settings(&["convert", "in.bmp", "out", "--format", "qoi"]);

        assert_eq!(
            settings.task,
            Task::Convert {
                input: "in.bmp".into(),
                output: "out".into(),
                format: Some(ImageFormat::Qoi),
            }
        );
        assert_eq!(settings.fallback_format, ImageFormat::Png);
    }

    #[test]
    fn blank_defaults() {
        let settings = settings(&[
            "blank",
            "out.tga",
            "--width",
            "4",
            "--height",
            "2",
            "--fallback-format",
            "bmp",
        ]);

        assert_eq!(
            settings.task,
            Task::Blank {
                output: "out.tga".into(),
                width: 4,
                height: 2,
                color: 0xFF000000,
                depth: ColorDepth::TrueColor32,
            }
        );
        assert_eq!(settings.fallback_format, ImageFormat::Bmp);
    }

    #[test]
    fn play() {
        let settings = settings(&["play", "intro.flc", "--loop", "--frames", "10"]);

        assert_eq!(
            settings.task,
            Task::Play {
                path: "intro.flc".into(),
                looping: true,
                frames: Some(10),
                output: None,
                realtime: false,
            }
        );
    }

    #[test]
    fn invalid_arguments() {
        assert!(Settings::try_from_args(["gfxtool"]).is_err());
        assert!(Settings::try_from_args(["gfxtool", "info"]).is_err());
        assert!(Settings::try_from_args(["gfxtool", "convert", "a", "b", "-f", "gif"]).is_err());
        assert!(
            Settings::try_from_args(["gfxtool", "blank", "a", "--width", "1", "--height", "1", "--depth", "12"])
                .is_err()
        );
    }
}
