use anyhow::Result;

use crate::config::DetectionConfig;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::{self, CpuBackend};
use crate::frame::{Frame, MotionMask, Region};

/// Frame-difference motion detector.
///
/// Stateless: every call compares exactly the two frames it is given. The
/// detector reports every contour it finds; noise suppression is the
/// `RegionFilter`'s job.
pub struct MotionDetector {
    config: DetectionConfig,
    backend: Box<dyn DetectorBackend>,
}

impl MotionDetector {
    /// Detector on the backend named in `config.backend`.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        let backend = backends::create(&config)?;
        log::debug!("motion detector using {} backend", backend.name());
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Compare two temporally adjacent frames.
    ///
    /// Pipeline: absolute difference, grayscale, Gaussian blur, binary
    /// threshold, dilation, border following. Frames of different dimensions
    /// are rejected.
    pub fn detect(&self, previous: &Frame, current: &Frame) -> Result<(MotionMask, Vec<Region>)> {
        self.backend.detect(previous, current)
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        let config = DetectionConfig::default();
        Self {
            backend: Box::new(CpuBackend::new(config.clone())),
            config,
        }
    }
}

impl std::fmt::Debug for MotionDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionDetector")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}
