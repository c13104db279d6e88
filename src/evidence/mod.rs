//! Evidence persistence.
//!
//! The monitoring loop hands every movement frame to an `EvidenceRecorder`
//! (the video stream) and, when an alert fires, asks it for a still snapshot
//! whose path is passed on to the notifier.

mod filesystem;
mod memory;

use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;

use crate::frame::Frame;

pub use filesystem::FilesystemRecorder;
pub use memory::{MemoryEvidence, MemoryRecorder};

pub const VIDEO_PREFIX: &str = "movevid_";
pub const SNAPSHOT_PREFIX: &str = "moveimg_";

const FILE_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.3f";

/// Sink for annotated evidence frames.
pub trait EvidenceRecorder {
    /// Append one frame to the evidence video stream.
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Persist a still image and return where it was stored.
    fn write_snapshot(&mut self, frame: &Frame, timestamp: &DateTime<Local>) -> Result<PathBuf>;

    /// Flush and close. Calling it twice is a no-op.
    fn release(&mut self) -> Result<()>;
}

/// Timestamp as used in evidence file names, e.g. `2024-05-01_03-12-45.120`.
pub fn file_stamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(FILE_STAMP_FORMAT).to_string()
}

pub fn snapshot_file_name(timestamp: &DateTime<Local>) -> String {
    format!("{}{}.png", SNAPSHOT_PREFIX, file_stamp(timestamp))
}

pub fn video_file_name(started_at: &DateTime<Local>) -> String {
    format!("{}{}.mjpeg", VIDEO_PREFIX, file_stamp(started_at))
}
