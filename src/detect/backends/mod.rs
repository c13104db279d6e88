pub mod cpu;

#[cfg(feature = "backend-opencv")]
pub mod opencv;

pub use cpu::CpuBackend;

#[cfg(feature = "backend-opencv")]
pub use self::opencv::OpenCvBackend;

use anyhow::Result;

use crate::config::DetectionConfig;
use crate::detect::backend::{DetectorBackend, VisionBackend};

/// Build the backend selected in `config`, failing when this build lacks it.
pub fn create(config: &DetectionConfig) -> Result<Box<dyn DetectorBackend>> {
    config.backend.ensure_available()?;
    match config.backend {
        VisionBackend::Cpu => Ok(Box::new(CpuBackend::new(config.clone()))),
        #[cfg(feature = "backend-opencv")]
        VisionBackend::Opencv => Ok(Box::new(OpenCvBackend::new(config.clone()))),
        #[cfg(not(feature = "backend-opencv"))]
        VisionBackend::Opencv => Err(anyhow::anyhow!("vision backend 'opencv' is not compiled in")),
    }
}
