// THEORY:
// Sources stand in for the camera and the serial port. They own all blocking work
// (reading files, decoding images, pacing the stream) and hand finished units of
// input to a decoder link over a bounded channel. One source feeds one link; the
// channel is the only thing they share.
//
// Recorded frames are a directory of image files replayed in file-name order at a
// fixed cadence. Recorded vibration is a text log of decimal amplitudes.

use crate::core_modules::imaging::ensure_not_empty;
use crate::error::DecodeError;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

/// Capacity of the source -> link channels.
pub const CHANNEL_CAPACITY: usize = 16;
pub const DEFAULT_FRAME_CADENCE: Duration = Duration::from_millis(20);
pub const DEFAULT_SAMPLE_MASK: u32 = 0xFFFF;

const FRAME_EXTENSIONS: [&str; 5] = ["png", "pgm", "bmp", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Replay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Consumer channel closed")]
    ChannelClosed,
}

/// Parses a vibration log. Tokens that are not unsigned integers count as 0.
pub fn parse_signal_log(text: &str, mask: u32) -> Vec<u32> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| match token.parse::<u32>() {
            Ok(value) => value & mask,
            Err(_) => {
                warn!(index, token, "malformed signal log token");
                0
            }
        })
        .collect()
}

pub async fn load_signal_log(path: impl AsRef<Path>, mask: u32) -> Result<Vec<u32>, SourceError> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    let samples = parse_signal_log(&text, mask);
    debug!(path = %path.as_ref().display(), samples = samples.len(), "signal log loaded");
    Ok(samples)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Image files directly inside `dir`, sorted by file name.
pub async fn list_frames(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, SourceError> {
    let mut entries = tokio::fs::read_dir(dir.as_ref()).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_frame_file(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Decodes one recorded frame to 8-bit grayscale.
pub fn load_frame(path: &Path) -> Result<GrayImage, SourceError> {
    let frame = image::open(path)?.to_luma8();
    ensure_not_empty(&frame, "recorded frame")?;
    Ok(frame)
}

/// Replays frames into `tx`, one per `cadence` tick. A zero cadence sends as
/// fast as the consumer drains. Yields the number of frames sent.
pub fn spawn_frame_replay(
    paths: Vec<PathBuf>,
    cadence: Duration,
    tx: mpsc::Sender<GrayImage>,
) -> JoinHandle<Result<usize, SourceError>> {
    tokio::spawn(replay_frames(paths, cadence, tx))
}

async fn replay_frames(
    paths: Vec<PathBuf>,
    cadence: Duration,
    tx: mpsc::Sender<GrayImage>,
) -> Result<usize, SourceError> {
    let mut ticker = (!cadence.is_zero()).then(|| {
        let mut ticker = interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut sent = 0;
    for path in paths {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }
        let frame = tokio::task::spawn_blocking(move || load_frame(&path)).await??;
        if tx.send(frame).await.is_err() {
            debug!(sent, "frame consumer gone");
            return Err(SourceError::ChannelClosed);
        }
        sent += 1;
    }
    Ok(sent)
}

/// Replays vibration samples into `tx`. Yields the number of samples sent.
pub fn spawn_sample_replay(
    samples: Vec<u32>,
    tx: mpsc::Sender<u32>,
) -> JoinHandle<Result<usize, SourceError>> {
    tokio::spawn(async move {
        let mut sent = 0;
        for sample in samples {
            if tx.send(sample).await.is_err() {
                debug!(sent, "sample consumer gone");
                return Err(SourceError::ChannelClosed);
            }
            sent += 1;
        }
        Ok(sent)
    })
}
