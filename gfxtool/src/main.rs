use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::Duration,
};

use error_derive::Error;
use flic::{AnimationPlayer, PlaybackState};
use image::{Bitmap, ImageFormat, PixelBuffer};
use settings::{Settings, Task};

#[derive(Debug, Error)]
enum Error {
    #[msg = "image error"]
    Image(image::Error),

    #[msg = "animation error"]
    Animation(flic::Error),

    #[msg = "failed to create output directory"]
    Io(io::Error),
}

pub fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::init();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match std::error::Error::source(&error) {
                Some(cause) => log::error!("{error}: {cause}"),
                None => log::error!("{error}"),
            }
            ExitCode::FAILURE
        },
    }
}

fn run(settings: &Settings) -> Result<(), Error> {
    match &settings.task {
        Task::Info { paths } => {
            for path in paths {
                print_info(path)?;
            }
        },
        Task::Convert {
            input,
            output,
            format,
        } => {
            let bitmap = Bitmap::from_path(input)?;
            match format {
                Some(format) => bitmap.save(output, *format)?,
                None => save(&bitmap, output, settings.fallback_format)?,
            }
        },
        Task::Pixel { path, x, y } => {
            let bitmap = Bitmap::from_path(path)?;
            println!("{:#010x}", bitmap.get(*x, *y)?);
        },
        Task::Blank {
            output,
            width,
            height,
            color,
            depth,
        } => {
            let bitmap = Bitmap::blank(*width, *height, *color, *depth)?;
            save(&bitmap, output, settings.fallback_format)?;
        },
        Task::Blurhash {
            hash,
            output,
            width,
            height,
            punch,
        } => {
            let bitmap = Bitmap::from_blurhash(hash, *width, *height, *punch)?;
            save(&bitmap, output, settings.fallback_format)?;
        },
        Task::Play {
            path,
            looping,
            frames,
            output,
            realtime,
        } => play(path, *looping, *frames, output.as_deref(), *realtime)?,
    }

    Ok(())
}

fn print_info(path: &Path) -> Result<(), Error> {
    let bitmap = Bitmap::from_path(path)?;

    let format = bitmap
        .format()
        .map(|format| format.to_string())
        .unwrap_or_default();
    println!(
        "{}: {format} {}x{}, {} bits per pixel",
        path.display(),
        bitmap.width(),
        bitmap.height(),
        bitmap.depth().bits_per_pixel()
    );

    Ok(())
}

/// Save in the format implied by the path or the bitmap, and use `fallback` if neither is encodable
fn save(bitmap: &Bitmap, path: &Path, fallback: ImageFormat) -> Result<(), Error> {
    match bitmap.save_default(path) {
        Err(image::Error::UnsupportedFormat) if ImageFormat::from_path(path).is_none() => {
            log::warn!(
                "Cannot infer the format of {}, saving as {fallback}",
                path.display()
            );
            bitmap.save(path, fallback)?;
            Ok(())
        },
        result => {
            result?;
            Ok(())
        },
    }
}

fn play(
    path: &Path,
    looping: bool,
    frame_limit: Option<usize>,
    output: Option<&Path>,
    realtime: bool,
) -> Result<(), Error> {
    let mut player = AnimationPlayer::new();
    player.open(path)?;

    let width = player.width().unwrap_or_default();
    let height = player.height().unwrap_or_default();
    let delay = Duration::from_millis(u64::from(player.frame_delay().unwrap_or_default()));

    if let Some(directory) = output {
        fs::create_dir_all(directory)?;
    }

    let mut screen = PixelBuffer::new(width, height);
    let mut frames_shown = 0;
    while frame_limit.map_or(true, |limit| frames_shown < limit) {
        let next = match player.advance(&mut screen, 0, 0, looping) {
            Ok(next) => next,
            Err(flic::Error::CorruptData(_)) if player.state() != PlaybackState::Finished => {
                player.current_frame()
            },
            Err(flic::Error::CorruptData(_)) => None,
            Err(error) => return Err(error.into()),
        };

        if let Some(directory) = output {
            let frame_path: PathBuf = directory.join(format!("frame_{frames_shown:04}.png"));
            Bitmap::from(screen.clone()).save(frame_path, ImageFormat::Png)?;
        }
        frames_shown += 1;

        if next.is_none() {
            break;
        }

        if realtime {
            thread::sleep(delay);
        }
    }

    log::info!("Played {frames_shown} frames of {}", path.display());
    player.close();
    Ok(())
}
