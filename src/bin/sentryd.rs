//! sentryd - motion sentry daemon
//!
//! This daemon:
//! 1. Opens the configured frame source and an evidence recorder
//! 2. Writes a start banner, then compares consecutive frames for movement
//! 3. Records annotated movement frames to the evidence video
//! 4. Saves a snapshot and notifies contacts, at most once per cooldown
//! 5. Stops on end of stream or Ctrl-C and releases every resource

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use motion_sentry::logging::init_logging;
use motion_sentry::{build_notifier, CaptureSession, Monitor, MonitorConfig, StopSignal};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML when the extension is .toml, JSON otherwise).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Frame source: stub://name, http(s):// camera URL, image directory or /dev/videoN.
    #[arg(long)]
    source: Option<String>,
    /// Folder for alert snapshots.
    #[arg(long)]
    img_path: Option<PathBuf>,
    /// Folder for evidence videos.
    #[arg(long)]
    vid_path: Option<PathBuf>,
    /// Contacts file, one "<name> <address>" per line.
    #[arg(long)]
    contacts_filename: Option<PathBuf>,
    /// Alert message template.
    #[arg(long)]
    msg_filename: Option<PathBuf>,
    /// Append logs to this file instead of stderr.
    #[arg(long)]
    log_path: Option<PathBuf>,
    /// Keep the latest annotated frame in this JPEG file.
    #[arg(long)]
    preview_path: Option<PathBuf>,
}

impl Args {
    fn apply(self, cfg: &mut MonitorConfig) {
        if let Some(source) = self.source {
            cfg.capture.source = source;
        }
        if let Some(path) = self.img_path {
            cfg.storage.image_dir = path;
        }
        if let Some(path) = self.vid_path {
            cfg.storage.video_dir = path;
        }
        if let Some(path) = self.contacts_filename {
            cfg.notify.contacts_path = path;
        }
        if let Some(path) = self.msg_filename {
            cfg.notify.message_path = path;
        }
        if let Some(path) = self.log_path {
            cfg.log_path = Some(path);
        }
        if let Some(path) = self.preview_path {
            cfg.storage.preview_path = Some(path);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = MonitorConfig::read(args.config.as_deref())?;
    args.apply(&mut cfg);
    cfg.validate()?;

    init_logging(cfg.log_path.as_deref())?;
    log::info!(
        "sentryd {} source={} backend={} cooldown={}s mode={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.capture.source,
        cfg.detection.backend.name(),
        cfg.alert.cooldown.as_secs(),
        cfg.alert.cooldown_mode
    );

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown signal received, stopping capture...");
            stop.stop();
        })
        .context("install Ctrl-C handler")?;
    }

    let notifier = build_notifier(&cfg.notify, &cfg.alert)?;
    let mut monitor = Monitor::new(&cfg, notifier, stop)?;

    log::info!("Warming up camera...");
    let mut session = match CaptureSession::open(&cfg, &Local::now()) {
        Ok(session) => session,
        Err(err) => {
            log::error!("startup failed: {:#}", err);
            return Err(err);
        }
    };

    log::info!("Capture started...");
    let result = monitor.run(&mut session);
    if !session.release() {
        log::warn!("some capture resources did not release cleanly");
    }

    let pending = monitor.notifications_in_flight();
    if pending > 0 {
        log::info!("waiting for {} notification(s) to finish", pending);
    }
    monitor.join_notifications();

    match result {
        Ok(summary) => {
            log::info!(
                "done: {} frames processed, {} evidence frames, {} alerts ({:?})",
                summary.frames_processed,
                summary.evidence_frames,
                summary.alerts_fired,
                summary.stop_reason
            );
            Ok(())
        }
        Err(err) => {
            log::error!("monitoring aborted: {:#}", err);
            Err(err)
        }
    }
}
