//! Frame model shared by every pipeline stage.
//!
//! - `Frame`: 3-channel RGB raster, the unit produced by frame sources.
//! - `MotionMask`: single-channel binary image derived from a frame pair.
//! - `Region`: candidate moving blob (bounding rectangle + polygon area).
//!
//! Frames carry no timestamp. The orchestration loop stamps them at capture time.

use anyhow::{anyhow, Result};
use image::{GrayImage, Rgb, RgbImage};

// ----------------------------------------------------------------------------
// Frame: RGB raster
// ----------------------------------------------------------------------------

/// One raster image from the video stream.
///
/// The detector treats frames as immutable inputs; annotation works on a
/// caller-owned clone.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Solid black frame.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    /// Frame filled with one color.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))? as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not match {}x{}", width, height))?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Packed RGB24 bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Paint a filled axis-aligned rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 3]) {
        let x_end = rect.right().min(self.width());
        let y_end = rect.bottom().min(self.height());
        for y in rect.y.min(y_end)..y_end {
            for x in rect.x.min(x_end)..x_end {
                self.image.put_pixel(x, y, Rgb(color));
            }
        }
    }

    /// Set one pixel if it lies inside the frame.
    pub(crate) fn put_clipped(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x < self.width() && y < self.height() {
            self.image.put_pixel(x, y, Rgb(color));
        }
    }
}

// ----------------------------------------------------------------------------
// MotionMask: binary change mask
// ----------------------------------------------------------------------------

/// Binary image marking pixels that changed between two frames (0 or 255).
#[derive(Clone, Debug, PartialEq)]
pub struct MotionMask {
    mask: GrayImage,
}

impl MotionMask {
    pub(crate) fn new(mask: GrayImage) -> Self {
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] != 0
    }

    /// Number of set pixels.
    pub fn count_set(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v != 0).count()
    }
}

// ----------------------------------------------------------------------------
// Rect / Region
// ----------------------------------------------------------------------------

/// Axis-aligned rectangle in pixel coordinates. `width`/`height` are inclusive
/// pixel counts, so a single pixel is 1x1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Candidate moving blob.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    /// Bounding rectangle of the contour.
    pub bounds: Rect,
    /// Polygon area of the contour (not `width * height`).
    pub area: f64,
}

/// Filtered movement verdict for one frame pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotionDecision {
    pub movement_detected: bool,
    pub regions: Vec<Region>,
}
