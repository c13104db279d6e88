//! Motion Sentry
//!
//! Frame-difference motion detection for unattended premises monitoring.
//!
//! # Architecture
//!
//! Each pair of consecutive frames runs through a fixed pipeline:
//!
//! 1. **Detect**: absolute difference, grayscale, Gaussian blur, threshold,
//!    dilation, contour extraction (`detect`). The built-in CPU backend is
//!    always available; feature `backend-opencv` adds OpenCV `imgproc`.
//! 2. **Filter**: drop regions whose polygon area is below the noise floor.
//! 3. **Annotate**: boxes, status label and timestamp (`annotate`).
//! 4. **Throttle**: a cooldown state machine decides whether the movement
//!    raises an alert (`throttle`).
//! 5. **Record / notify**: movement frames go to the evidence stream; fired
//!    alerts persist a snapshot and notify contacts off-thread (`evidence`,
//!    `notify`).
//!
//! # Module Structure
//!
//! - `frame`: Frame, MotionMask, Rect, Region, MotionDecision
//! - `ingest`: Frame sources (synthetic, image sequence, HTTP MJPEG, V4L2)
//! - `monitor`: Capture session guard and the processing loop
//! - `config`, `logging`: Ambient daemon setup

pub mod annotate;
pub mod config;
#[cfg(feature = "backend-opencv")]
pub mod cv;
pub mod detect;
pub mod evidence;
pub mod frame;
pub mod ingest;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod preview;
pub mod throttle;

pub use annotate::{format_timestamp, Annotator};
pub use config::{
    AlertSettings, CaptureSettings, DetectionConfig, MonitorConfig, NotifySettings,
    StorageSettings,
};
pub use detect::{
    DetectorBackend, MotionDetector, RegionFilter, VisionBackend, DEFAULT_NOISE_AREA,
};
pub use evidence::{EvidenceRecorder, FilesystemRecorder, MemoryRecorder};
pub use frame::{Frame, MotionDecision, MotionMask, Rect, Region};
pub use ingest::{open_source, FrameSource, ImageSequenceSource, MjpegSource, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{v4l2::V4l2Config, V4l2Source};
pub use monitor::{
    CaptureSession, Clock, Monitor, RunSummary, StopReason, StopSignal, SystemClock,
};
pub use notify::{
    build_notifier, ContactBook, ContactNotifier, MessageTemplate, NotificationDispatcher,
    Notifier,
};
pub use preview::{FilePreview, NoPreview, PreviewSink};
pub use throttle::{AlertDecision, AlertThrottle, CooldownMode, ThrottleState};
