use flic::{AnimationPlayer, Error, FrameError, PlaybackState, Variant};
use image::PixelBuffer;

const COLOR_256: u16 = 4;
const DELTA_FLC: u16 = 7;
const COLOR_64: u16 = 11;
const DELTA_FLI: u16 = 12;
const BLACK: u16 = 13;
const BYTE_RUN: u16 = 15;

const RED: u32 = 0xFFFF0000;
const GREEN: u32 = 0xFF00FF00;

fn chunk(chunk_type: u16, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(body.len() + 6);
    bytes.extend_from_slice(&((body.len() + 6) as u32).to_le_bytes());
    bytes.extend_from_slice(&chunk_type.to_le_bytes());
    bytes.extend_from_slice(body);
    bytes
}

fn frame(subchunks: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = (subchunks.len() as u16).to_le_bytes().to_vec();
    body.resize(10, 0);

    for (chunk_type, subchunk) in subchunks {
        body.extend(chunk(*chunk_type, subchunk));
    }

    chunk(0xF1FA, &body)
}

fn header(magic: u16, frame_count: u16, width: u16, height: u16, speed: u32) -> Vec<u8> {
    let mut bytes = vec![0; 128];
    bytes[4..6].copy_from_slice(&magic.to_le_bytes());
    bytes[6..8].copy_from_slice(&frame_count.to_le_bytes());
    bytes[8..10].copy_from_slice(&width.to_le_bytes());
    bytes[10..12].copy_from_slice(&height.to_le_bytes());
    bytes[12..14].copy_from_slice(&8_u16.to_le_bytes());
    bytes[16..20].copy_from_slice(&speed.to_le_bytes());
    bytes
}

fn animation(mut header: Vec<u8>, chunks: &[Vec<u8>]) -> Vec<u8> {
    for chunk in chunks {
        header.extend_from_slice(chunk);
    }

    let size = header.len() as u32;
    header[0..4].copy_from_slice(&size.to_le_bytes());
    header
}

/// A red 8x8 frame, using a 6-bit palette where index 1 is red and index 2 is green
fn red_background() -> Vec<u8> {
    let palette = vec![1, 0, 0, 3, 0, 0, 0, 63, 0, 0, 0, 63, 0];

    let mut byte_run = vec![];
    for _ in 0..8 {
        byte_run.extend_from_slice(&[1, 8, 1]);
    }

    frame(&[(COLOR_64, palette), (BYTE_RUN, byte_run)])
}

/// Paints the 4x4 block at (2, 2) green
fn green_block() -> Vec<u8> {
    let mut delta = vec![2, 0, 4, 0];
    for _ in 0..4 {
        delta.extend_from_slice(&[1, 2, 0xFC, 2]);
    }

    frame(&[(DELTA_FLI, delta)])
}

fn two_frame_fli() -> Vec<u8> {
    animation(
        header(0xAF11, 2, 8, 8, 5),
        &[red_background(), green_block()],
    )
}

fn in_block(x: usize, y: usize) -> bool {
    (2..6).contains(&x) && (2..6).contains(&y)
}

#[test]
fn only_changed_block_differs() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();

    let mut first = PixelBuffer::new(8, 8);
    let mut second = PixelBuffer::new(8, 8);
    player.advance(&mut first, 0, 0, false).unwrap();
    player.advance(&mut second, 0, 0, false).unwrap();

    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(first.get_pixel(x, y), RED);

            let expected = if in_block(x, y) { GREEN } else { RED };
            assert_eq!(second.get_pixel(x, y), expected, "pixel at ({x}, {y})");
        }
    }
}

#[test]
fn non_looping_playback() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();
    assert_eq!(player.state(), PlaybackState::Open);

    let mut target = PixelBuffer::new(8, 8);
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), Some(1));
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), None);
    assert_eq!(player.state(), PlaybackState::Finished);
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), None);
}

#[test]
fn looping_playback() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    let indices: Vec<_> = (0..5)
        .map(|_| player.advance(&mut target, 0, 0, true).unwrap())
        .collect();
    assert_eq!(indices, vec![Some(1), Some(0), Some(1), Some(0), Some(1)]);

    // The fifth call showed the first frame again, without the green block
    assert_eq!(target.get_pixel(3, 3), RED);
}

#[test]
fn pause_and_resume() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    player.advance(&mut target, 0, 0, false).unwrap();
    player.pause();
    assert_eq!(player.state(), PlaybackState::Paused);

    let mut redrawn = PixelBuffer::new(8, 8);
    assert_eq!(player.advance(&mut redrawn, 0, 0, false).unwrap(), Some(1));
    assert_eq!(redrawn, target);
    assert_eq!(player.current_frame(), Some(1));

    player.resume();
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), None);
}

#[test]
fn composite_is_clipped() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    player.advance(&mut target, 6, -6, false).unwrap();

    for y in 0..8 {
        for x in 0..8 {
            let expected = if x >= 6 && y < 2 { RED } else { 0 };
            assert_eq!(target.get_pixel(x, y), expected);
        }
    }
}

#[test]
fn accessors() {
    let mut player = AnimationPlayer::new();
    assert_eq!(player.width(), None);
    assert_eq!(player.frame_count(), None);

    player.open_bytes(two_frame_fli()).unwrap();
    assert_eq!(player.width(), Some(8));
    assert_eq!(player.height(), Some(8));
    assert_eq!(player.frame_count(), Some(2));
    assert_eq!(player.frame_delay(), Some(71));
    assert_eq!(player.current_frame(), Some(0));
    assert_eq!(player.animation().map(|a| a.variant()), Some(Variant::Fli));

    player.close();
    player.close();
    assert_eq!(player.state(), PlaybackState::Closed);
    assert_eq!(player.width(), None);
}

#[test]
fn flc_with_prefix_chunk() {
    let palette = vec![1, 0, 0, 2, 0, 0, 0, 0x12, 0x34, 0x56];

    // Line 0: skip 1 pixel, then one literal word of index 1
    let delta = vec![1, 0, 1, 0, 1, 1, 1, 1];

    let bytes = animation(
        header(0xAF12, 2, 4, 2, 40),
        &[
            chunk(0xF100, &[0; 10]),
            frame(&[(COLOR_256, palette), (BLACK, vec![])]),
            frame(&[(DELTA_FLC, delta)]),
        ],
    );

    let mut player = AnimationPlayer::new();
    player.open_bytes(bytes).unwrap();
    assert_eq!(player.frame_delay(), Some(40));
    assert_eq!(player.animation().map(|a| a.variant()), Some(Variant::Flc));

    let mut target = PixelBuffer::new(4, 2);
    player.advance(&mut target, 0, 0, false).unwrap();
    assert!(target.data().iter().all(|&pixel| pixel == 0xFF000000));

    player.advance(&mut target, 0, 0, false).unwrap();
    assert_eq!(
        target.row(0),
        &[0xFF000000, 0xFF123456, 0xFF123456, 0xFF000000]
    );
    assert!(target.row(1).iter().all(|&pixel| pixel == 0xFF000000));
}

fn with_corrupt_middle_frame() -> Vec<u8> {
    let broken = frame(&[(BYTE_RUN, vec![1, 0])]);
    animation(
        header(0xAF11, 3, 8, 8, 5),
        &[red_background(), broken, green_block()],
    )
}

#[test]
fn corrupt_frame_is_skipped() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(with_corrupt_middle_frame()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    assert_eq!(player.advance(&mut target, 0, 0, true).unwrap(), Some(1));

    // The last good frame is drawn and playback moves on
    let mut fresh = PixelBuffer::new(8, 8);
    let result = player.advance(&mut fresh, 0, 0, true);
    assert!(matches!(
        result,
        Err(Error::CorruptData(FrameError::InvalidRunLength))
    ));
    assert!(fresh.data().iter().all(|&pixel| pixel == RED));
    assert_eq!(player.current_frame(), Some(2));

    assert_eq!(player.advance(&mut target, 0, 0, true).unwrap(), Some(0));
    assert_eq!(target.get_pixel(3, 3), GREEN);
    assert_eq!(target.get_pixel(0, 0), RED);
}

#[test]
fn looping_over_corrupt_frame() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(with_corrupt_middle_frame()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    let results: Vec<_> = (0..6)
        .map(|_| player.advance(&mut target, 0, 0, true).ok())
        .collect();

    assert_eq!(
        results,
        vec![Some(Some(1)), None, Some(Some(0)), Some(Some(1)), None, Some(Some(0))]
    );
}

#[test]
fn corrupt_last_frame_finishes() {
    let broken = frame(&[(BYTE_RUN, vec![1, 0])]);
    let bytes = animation(header(0xAF11, 2, 8, 8, 5), &[red_background(), broken]);

    let mut player = AnimationPlayer::new();
    player.open_bytes(bytes).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), Some(1));
    assert!(player.advance(&mut target, 0, 0, false).is_err());
    assert_eq!(player.state(), PlaybackState::Finished);
    assert_eq!(player.advance(&mut target, 0, 0, false).unwrap(), None);
}

#[test]
fn unknown_magic() {
    let bytes = animation(header(0x1234, 1, 8, 8, 5), &[red_background()]);

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::UnsupportedFormat)
    ));
    assert_eq!(player.state(), PlaybackState::Closed);
}

#[test]
fn unsupported_depth() {
    let mut header = header(0xAF12, 1, 8, 8, 5);
    header[12] = 16;
    let bytes = animation(header, &[red_background()]);

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::UnsupportedFormat)
    ));
}

#[test]
fn missing_frames() {
    let bytes = animation(header(0xAF11, 3, 8, 8, 5), &[red_background()]);

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::CorruptData(FrameError::MissingFrames))
    ));
}

#[test]
fn truncated_header() {
    let mut bytes = two_frame_fli();
    bytes.truncate(64);

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::CorruptData(FrameError::UnexpectedEndOfFile))
    ));
}

#[test]
fn oversized_chunk() {
    let mut bytes = two_frame_fli();
    bytes[128..132].copy_from_slice(&u32::MAX.to_le_bytes());

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::CorruptData(FrameError::InvalidChunkSize))
    ));
}

#[test]
fn no_frames() {
    let bytes = animation(header(0xAF11, 0, 8, 8, 5), &[]);

    let mut player = AnimationPlayer::new();
    assert!(matches!(
        player.open_bytes(bytes),
        Err(Error::CorruptData(FrameError::NoFrames))
    ));
}

#[test]
fn advance_without_animation() {
    let mut player = AnimationPlayer::new();
    let mut target = PixelBuffer::new(1, 1);

    assert!(matches!(
        player.advance(&mut target, 0, 0, true),
        Err(Error::NotOpen)
    ));
}

#[test]
fn missing_file() {
    let mut player = AnimationPlayer::new();
    let result = player.open("this/file/does/not/exist.fli");

    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn reopening_replaces_animation() {
    let mut player = AnimationPlayer::new();
    player.open_bytes(two_frame_fli()).unwrap();

    let mut target = PixelBuffer::new(8, 8);
    player.advance(&mut target, 0, 0, false).unwrap();

    let single = animation(header(0xAF11, 1, 8, 8, 5), &[red_background()]);
    player.open_bytes(single).unwrap();
    assert_eq!(player.frame_count(), Some(1));
    assert_eq!(player.current_frame(), Some(0));
    assert_eq!(player.state(), PlaybackState::Open);
}
