//! Frame ingestion sources.
//!
//! This module provides different sources for raw frames:
//! - Synthetic scenes (`stub://...`) for tests and dry runs
//! - Image-sequence directories (PNG/JPEG files sorted by name)
//! - HTTP MJPEG / JPEG snapshot cameras
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source yields `Frame` values in stream order. `Ok(None)` marks the end
//! of the stream; errors are read failures and abort the monitoring loop.

pub mod file;
pub mod mjpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Duration;

use crate::config::CaptureSettings;
use crate::frame::Frame;

pub use file::ImageSequenceSource;
pub use mjpeg::MjpegSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// A stream of frames from a camera, file set or generator.
pub trait FrameSource {
    /// Block until the next frame is available. `Ok(None)` is end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_open(&self) -> bool;

    /// Close the underlying device or stream. Calling it twice is a no-op.
    fn release(&mut self) -> Result<()>;

    /// Human-readable locator for logs.
    fn describe(&self) -> String;
}

/// Open the source named by `settings.source`.
pub fn open_source(settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    let locator = settings.source.trim();
    if locator.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(
            locator,
            settings.width,
            settings.height,
        )?));
    }
    if locator.starts_with("http://") || locator.starts_with("https://") {
        let mut source = MjpegSource::new(locator, settings.frame_rate)?;
        source.connect()?;
        return Ok(Box::new(source));
    }
    if locator.starts_with("/dev/video") {
        return open_device(locator, settings);
    }
    if Path::new(locator).is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(Path::new(locator))?));
    }
    if locator.contains("://") {
        return Err(anyhow!(
            "unsupported source scheme in '{}'; expected stub://, http(s):// or a local path",
            locator
        ));
    }
    Err(anyhow!(
        "source '{}' is neither a directory nor a video device",
        locator
    ))
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: &str, settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    let mut source = V4l2Source::new(v4l2::V4l2Config {
        device: device.to_string(),
        target_fps: settings.frame_rate,
        width: settings.width,
        height: settings.height,
    });
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: &str, _settings: &CaptureSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "capturing from {} requires the ingest-v4l2 feature",
        device
    ))
}

/// Minimum spacing between delivered frames at `target_fps`.
pub(crate) fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}
