mod backend;
pub mod backends;
pub mod contours;
mod detector;
mod filter;
pub mod raster;

pub use backend::{DetectorBackend, VisionBackend};
pub use backends::CpuBackend;
#[cfg(feature = "backend-opencv")]
pub use backends::OpenCvBackend;
pub use contours::{find_contours, find_regions, Contour};
pub use detector::MotionDetector;
pub use filter::{RegionFilter, DEFAULT_NOISE_AREA};
