//! Image-sequence frame source.
//!
//! Replays a directory of still images as a video stream: every PNG/JPEG file,
//! sorted by file name. The stream ends after the last file. All images must
//! share the dimensions of the first one.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::FrameSource;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    dimensions: Option<(u32, u32)>,
    open: bool,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("list image directory {}", dir.display()))?
                .path();
            if path.is_file() && is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no PNG or JPEG files in {}", dir.display()));
        }
        log::info!(
            "ImageSequenceSource: {} frames in {}",
            files.len(),
            dir.display()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
            dimensions: None,
            open: true,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.files.len() - self.cursor
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(anyhow!("image sequence {} is released", self.dir.display()));
        }
        let Some(path) = self.files.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("decode image {}", path.display()))?
            .into_rgb8();
        let dims = image.dimensions();
        match self.dimensions {
            None => self.dimensions = Some(dims),
            Some(expected) if expected != dims => {
                return Err(anyhow!(
                    "{} is {}x{}, expected {}x{} like the rest of the sequence",
                    path.display(),
                    dims.0,
                    dims.1,
                    expected.0,
                    expected.1
                ));
            }
            Some(_) => {}
        }
        self.cursor += 1;
        Ok(Some(Frame::from_image(image)))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, color: [u8; 3]) -> Result<()> {
        RgbImage::from_pixel(width, height, Rgb(color)).save(dir.join(name))?;
        Ok(())
    }

    #[test]
    fn replays_images_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_png(dir.path(), "frame_002.png", 8, 6, [0, 0, 200])?;
        write_png(dir.path(), "frame_001.png", 8, 6, [200, 0, 0])?;
        std::fs::write(dir.path().join("notes.txt"), "not a frame")?;

        let mut source = ImageSequenceSource::open(dir.path())?;
        assert_eq!(source.len(), 2);

        let first = source.next_frame()?.expect("first frame");
        assert_eq!(first.as_image().get_pixel(0, 0).0, [200, 0, 0]);
        let second = source.next_frame()?.expect("second frame");
        assert_eq!(second.as_image().get_pixel(0, 0).0, [0, 0, 200]);
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.remaining(), 0);
        Ok(())
    }

    #[test]
    fn mismatched_dimensions_fail() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_png(dir.path(), "a.png", 8, 6, [0, 0, 0])?;
        write_png(dir.path(), "b.png", 6, 8, [0, 0, 0])?;

        let mut source = ImageSequenceSource::open(dir.path())?;
        assert!(source.next_frame()?.is_some());
        let err = source.next_frame().err().expect("dimension mismatch");
        assert!(err.to_string().contains("expected 8x6"));
        Ok(())
    }

    #[test]
    fn empty_directory_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(ImageSequenceSource::open(dir.path()).is_err());
        Ok(())
    }
}
