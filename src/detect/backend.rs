use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;

use crate::frame::{Frame, MotionMask, Region};

/// Image-processing implementation behind detection and annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisionBackend {
    /// Built-in raster pipeline on `image` buffers. Always available.
    #[default]
    Cpu,
    /// OpenCV `imgproc` (feature `backend-opencv`).
    Opencv,
}

impl VisionBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Opencv => "opencv",
        }
    }

    /// Whether this build can run the backend.
    pub fn is_available(self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Opencv => cfg!(feature = "backend-opencv"),
        }
    }

    pub fn ensure_available(self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(anyhow!(
                "vision backend '{}' requires building with the backend-{} feature",
                self.name(),
                self.name()
            ))
        }
    }
}

impl FromStr for VisionBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "opencv" => Ok(Self::Opencv),
            other => Err(anyhow!(
                "unknown vision backend '{}'; expected 'cpu' or 'opencv'",
                other
            )),
        }
    }
}

/// One frame-difference implementation.
///
/// Backends report every contour they find, in raster order of the border
/// start points; filtering happens downstream.
pub trait DetectorBackend: Send {
    fn name(&self) -> &'static str;

    fn detect(&self, previous: &Frame, current: &Frame) -> Result<(MotionMask, Vec<Region>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() -> Result<()> {
        assert_eq!("cpu".parse::<VisionBackend>()?, VisionBackend::Cpu);
        assert_eq!(" OpenCV ".parse::<VisionBackend>()?, VisionBackend::Opencv);
        assert!("cuda".parse::<VisionBackend>().is_err());
        Ok(())
    }

    #[test]
    fn cpu_is_always_available() {
        assert!(VisionBackend::Cpu.ensure_available().is_ok());
        assert_eq!(
            VisionBackend::Opencv.is_available(),
            cfg!(feature = "backend-opencv")
        );
    }

    #[cfg(not(feature = "backend-opencv"))]
    #[test]
    fn missing_opencv_feature_names_the_feature() {
        let err = VisionBackend::Opencv
            .ensure_available()
            .expect_err("opencv not compiled in");
        assert!(err.to_string().contains("backend-opencv"));
    }
}
