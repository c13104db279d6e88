//! Live preview seam.
//!
//! There is no on-screen window; the headless sink keeps the latest annotated
//! frame in a JPEG file that an external viewer can poll.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

const PREVIEW_JPEG_QUALITY: u8 = 75;

pub trait PreviewSink {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    fn release(&mut self) -> Result<()>;
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPreview;

impl PreviewSink for NoPreview {
    fn show(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Overwrites one JPEG file with each frame shown.
pub struct FilePreview {
    path: PathBuf,
    released: bool,
}

impl FilePreview {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create preview folder {}", parent.display()))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreviewSink for FilePreview {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        if self.released {
            return Err(anyhow!("preview {} is released", self.path.display()));
        }
        let tmp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("create preview {}", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, PREVIEW_JPEG_QUALITY)
                .encode_image(frame.as_image())
                .context("encode preview jpeg")?;
            writer.flush().context("flush preview")?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace preview {}", self.path.display()))?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}
