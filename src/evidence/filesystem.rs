use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use super::{snapshot_file_name, video_file_name, EvidenceRecorder};
use crate::frame::Frame;

const VIDEO_JPEG_QUALITY: u8 = 85;

/// Writes the evidence video as a concatenated-JPEG (MJPEG) stream and
/// snapshots as PNG files.
pub struct FilesystemRecorder {
    video_path: PathBuf,
    image_dir: PathBuf,
    video: Option<BufWriter<File>>,
    frames_written: u64,
}

impl FilesystemRecorder {
    /// Create both folders if needed and open `movevid_<stamp>.mjpeg`.
    pub fn open(video_dir: &Path, image_dir: &Path, started_at: &DateTime<Local>) -> Result<Self> {
        fs::create_dir_all(video_dir)
            .with_context(|| format!("create video folder {}", video_dir.display()))?;
        fs::create_dir_all(image_dir)
            .with_context(|| format!("create image folder {}", image_dir.display()))?;

        let video_path = video_dir.join(video_file_name(started_at));
        let file = File::create(&video_path)
            .with_context(|| format!("create evidence video {}", video_path.display()))?;
        log::info!("recording evidence to {}", video_path.display());

        Ok(Self {
            video_path,
            image_dir: image_dir.to_path_buf(),
            video: Some(BufWriter::new(file)),
            frames_written: 0,
        })
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl EvidenceRecorder for FilesystemRecorder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let writer = self
            .video
            .as_mut()
            .ok_or_else(|| anyhow!("evidence video {} is closed", self.video_path.display()))?;
        JpegEncoder::new_with_quality(writer, VIDEO_JPEG_QUALITY)
            .encode_image(frame.as_image())
            .with_context(|| format!("append frame to {}", self.video_path.display()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn write_snapshot(&mut self, frame: &Frame, timestamp: &DateTime<Local>) -> Result<PathBuf> {
        let path = self.image_dir.join(snapshot_file_name(timestamp));
        let mut encoded = Cursor::new(Vec::new());
        frame
            .as_image()
            .write_to(&mut encoded, ImageFormat::Png)
            .context("encode snapshot png")?;
        write_atomic(&path, encoded.get_ref())
            .with_context(|| format!("write snapshot {}", path.display()))?;
        Ok(path)
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut writer) = self.video.take() else {
            return Ok(());
        };
        writer
            .flush()
            .with_context(|| format!("flush evidence video {}", self.video_path.display()))?;
        log::debug!(
            "closed evidence video {} ({} frames)",
            self.video_path.display(),
            self.frames_written
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
