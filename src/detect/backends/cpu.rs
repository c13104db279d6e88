use anyhow::{Context, Result};

use crate::config::DetectionConfig;
use crate::detect::backend::DetectorBackend;
use crate::detect::contours::find_regions;
use crate::detect::raster;
use crate::frame::{Frame, MotionMask, Region};

/// Raster pipeline on `image` buffers, no native dependencies.
#[derive(Clone, Debug)]
pub struct CpuBackend {
    config: DetectionConfig,
}

impl CpuBackend {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(&self, previous: &Frame, current: &Frame) -> Result<(MotionMask, Vec<Region>)> {
        let diff = raster::abs_diff(previous.as_image(), current.as_image())
            .context("compare frame pair")?;
        let gray = raster::to_gray(&diff);
        let blurred = raster::gaussian_blur(&gray, self.config.blur_kernel)?;
        let binary = raster::threshold(&blurred, self.config.diff_threshold);
        let dilated = raster::dilate(&binary, self.config.dilate_iterations);
        let regions = find_regions(&dilated);
        Ok((MotionMask::new(dilated), regions))
    }
}
