use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::VisionBackend;
use crate::throttle::CooldownMode;

const DEFAULT_SOURCE: &str = "stub://front_door";
const DEFAULT_FRAME_RATE: u32 = 10;
const DEFAULT_WARMUP_FRAMES: u32 = 10;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_BLUR_KERNEL: u32 = 5;
const DEFAULT_DIFF_THRESHOLD: u8 = 20;
const DEFAULT_DILATE_ITERATIONS: u32 = 3;
const DEFAULT_NOISE_AREA: f64 = 900.0;
const DEFAULT_COOLDOWN_SECS: u64 = 60;
const DEFAULT_IMAGE_DIR: &str = "./images/";
const DEFAULT_VIDEO_DIR: &str = "./videos/";
const DEFAULT_CONTACTS_PATH: &str = "./contacts.txt";
const DEFAULT_MESSAGE_PATH: &str = "./message.txt";
const DEFAULT_SUBJECT: &str = "Movement detected";
const DEFAULT_LOG_PATH: &str = "./movements.log";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MonitorConfigFile {
    capture: Option<CaptureConfigFile>,
    detection: Option<DetectionConfigFile>,
    alert: Option<AlertConfigFile>,
    storage: Option<StorageConfigFile>,
    notify: Option<NotifyConfigFile>,
    log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    frame_rate: Option<u32>,
    warmup_frames: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    backend: Option<VisionBackend>,
    blur_kernel: Option<u32>,
    diff_threshold: Option<u8>,
    dilate_iterations: Option<u32>,
    noise_area: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<u64>,
    cooldown_mode: Option<CooldownMode>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    image_dir: Option<PathBuf>,
    video_dir: Option<PathBuf>,
    preview_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    contacts_path: Option<PathBuf>,
    message_path: Option<PathBuf>,
    subject: Option<String>,
    webhook_url: Option<String>,
}

/// Immutable configuration for one monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub capture: CaptureSettings,
    pub detection: DetectionConfig,
    pub alert: AlertSettings,
    pub storage: StorageSettings,
    pub notify: NotifySettings,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Source locator: `stub://...`, `http(s)://...`, a directory, or a device node.
    pub source: String,
    /// Frames per second; also the length of the start banner in frames.
    pub frame_rate: u32,
    /// Frames discarded at startup while the sensor settles.
    pub warmup_frames: u32,
    /// Frame size for synthetic and V4L2 sources.
    pub width: u32,
    pub height: u32,
}

/// Motion detector and region filter parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub backend: VisionBackend,
    pub blur_kernel: u32,
    pub diff_threshold: u8,
    pub dilate_iterations: u32,
    pub noise_area: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            backend: VisionBackend::default(),
            blur_kernel: DEFAULT_BLUR_KERNEL,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
            noise_area: DEFAULT_NOISE_AREA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSettings {
    pub cooldown: Duration,
    pub cooldown_mode: CooldownMode,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            cooldown_mode: CooldownMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    /// Headless preview target: the latest annotated frame is written here.
    pub preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    pub contacts_path: PathBuf,
    pub message_path: PathBuf,
    pub subject: String,
    pub webhook_url: Option<String>,
}

impl MonitorConfig {
    /// Load from an optional file (falling back to `SENTRY_CONFIG`), apply
    /// environment overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::read(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File and environment layers only. Callers that add their own overrides
    /// must call `validate` afterwards.
    pub fn read(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("SENTRY_CONFIG").ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let storage = file.storage.unwrap_or_default();
        let notify = file.notify.unwrap_or_default();

        Self {
            capture: CaptureSettings {
                source: capture.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                frame_rate: capture.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
                warmup_frames: capture.warmup_frames.unwrap_or(DEFAULT_WARMUP_FRAMES),
                width: capture.width.unwrap_or(DEFAULT_WIDTH),
                height: capture.height.unwrap_or(DEFAULT_HEIGHT),
            },
            detection: DetectionConfig {
                backend: detection.backend.unwrap_or_default(),
                blur_kernel: detection.blur_kernel.unwrap_or(DEFAULT_BLUR_KERNEL),
                diff_threshold: detection.diff_threshold.unwrap_or(DEFAULT_DIFF_THRESHOLD),
                dilate_iterations: detection
                    .dilate_iterations
                    .unwrap_or(DEFAULT_DILATE_ITERATIONS),
                noise_area: detection.noise_area.unwrap_or(DEFAULT_NOISE_AREA),
            },
            alert: AlertSettings {
                cooldown: Duration::from_secs(
                    alert.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
                ),
                cooldown_mode: alert.cooldown_mode.unwrap_or_default(),
            },
            storage: StorageSettings {
                image_dir: storage
                    .image_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR)),
                video_dir: storage
                    .video_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_VIDEO_DIR)),
                preview_path: storage.preview_path,
            },
            notify: NotifySettings {
                contacts_path: notify
                    .contacts_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTACTS_PATH)),
                message_path: notify
                    .message_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MESSAGE_PATH)),
                subject: notify.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                webhook_url: notify.webhook_url.filter(|url| !url.trim().is_empty()),
            },
            log_path: Some(file.log_path.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("SENTRY_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source;
            }
        }
        if let Ok(rate) = std::env::var("SENTRY_FRAME_RATE") {
            self.capture.frame_rate = rate
                .parse()
                .map_err(|_| anyhow!("SENTRY_FRAME_RATE must be an integer frame count"))?;
        }
        if let Ok(cooldown) = std::env::var("SENTRY_COOLDOWN_SECS") {
            let seconds: u64 = cooldown.parse().map_err(|_| {
                anyhow!("SENTRY_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.alert.cooldown = Duration::from_secs(seconds);
        }
        if let Ok(backend) = std::env::var("SENTRY_VISION_BACKEND") {
            self.detection.backend = backend.parse()?;
        }
        if let Ok(mode) = std::env::var("SENTRY_COOLDOWN_MODE") {
            self.alert.cooldown_mode = mode.parse()?;
        }
        if let Ok(url) = std::env::var("SENTRY_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                self.notify.webhook_url = Some(url);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.source.trim().is_empty() {
            return Err(anyhow!("capture source must not be empty"));
        }
        if self.capture.frame_rate == 0 {
            return Err(anyhow!("frame rate must be greater than zero"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        self.detection.backend.ensure_available()?;
        if self.detection.blur_kernel == 0 || self.detection.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur kernel must be a positive odd size, got {}",
                self.detection.blur_kernel
            ));
        }
        if self.detection.noise_area.is_nan() || self.detection.noise_area < 0.0 {
            return Err(anyhow!("noise area must be a non-negative number"));
        }
        if let Some(url) = &self.notify.webhook_url {
            let parsed = url::Url::parse(url).with_context(|| format!("invalid webhook url {}", url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("webhook url must use http or https"));
            }
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_file(MonitorConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
