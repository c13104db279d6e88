//! Frame-by-frame monitoring loop.
//!
//! `Monitor::run` drives one capture session:
//! 1. discard warm-up frames and read the first frame pair,
//! 2. write the start banner to the evidence stream,
//! 3. per frame pair: detect, filter, annotate, throttle,
//! 4. record movement frames, snapshot and notify when the throttle fires,
//! 5. show the annotated frame, slide the window, poll for cancellation.
//!
//! The loop is single-threaded. Notifications run on dispatcher workers, and
//! the throttle state never leaves the loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::annotate::Annotator;
use crate::config::{CaptureSettings, MonitorConfig};
use crate::detect::{MotionDetector, RegionFilter};
use crate::evidence::{EvidenceRecorder, FilesystemRecorder};
use crate::frame::Frame;
use crate::ingest::{open_source, FrameSource};
use crate::notify::{NotificationDispatcher, Notifier};
use crate::preview::{FilePreview, NoPreview, PreviewSink};
use crate::throttle::{AlertDecision, AlertThrottle};

// ----------------------------------------------------------------------------
// Cancellation
// ----------------------------------------------------------------------------

/// Cooperative stop flag, polled once per loop iteration.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Clock
// ----------------------------------------------------------------------------

/// Time source for the loop: a monotonic instant for the throttle and the
/// local wall-clock time for overlays and file names.
pub trait Clock {
    fn now(&mut self) -> (Instant, DateTime<Local>);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> (Instant, DateTime<Local>) {
        (Instant::now(), Local::now())
    }
}

// ----------------------------------------------------------------------------
// CaptureSession: scoped ownership of source, recorder and preview
// ----------------------------------------------------------------------------

/// Owns the frame source, evidence recorder and preview sink for one run and
/// releases all three exactly once, on `release()` or on drop.
pub struct CaptureSession {
    source: Box<dyn FrameSource>,
    recorder: Box<dyn EvidenceRecorder>,
    preview: Box<dyn PreviewSink>,
    released: bool,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        recorder: Box<dyn EvidenceRecorder>,
        preview: Box<dyn PreviewSink>,
    ) -> Self {
        Self {
            source,
            recorder,
            preview,
            released: false,
        }
    }

    /// Open the configured source, a filesystem recorder and the preview sink.
    /// Whatever was already opened is released if a later step fails.
    pub fn open(config: &MonitorConfig, started_at: &DateTime<Local>) -> Result<Self> {
        let mut source = open_source(&config.capture)
            .with_context(|| format!("open frame source {}", config.capture.source))?;

        let recorder = match FilesystemRecorder::open(
            &config.storage.video_dir,
            &config.storage.image_dir,
            started_at,
        ) {
            Ok(recorder) => recorder,
            Err(err) => {
                release_source(source.as_mut());
                return Err(err.context("open evidence recorder"));
            }
        };

        let preview: Box<dyn PreviewSink> = match &config.storage.preview_path {
            Some(path) => match FilePreview::new(path) {
                Ok(preview) => Box::new(preview),
                Err(err) => {
                    release_source(source.as_mut());
                    let mut recorder = recorder;
                    if let Err(release_err) = recorder.release() {
                        log::error!("failed to release evidence recorder: {:#}", release_err);
                    }
                    return Err(err.context("open preview"));
                }
            },
            None => Box::new(NoPreview),
        };

        Ok(Self::new(source, Box::new(recorder), preview))
    }

    pub fn source_mut(&mut self) -> &mut dyn FrameSource {
        self.source.as_mut()
    }

    pub fn recorder_mut(&mut self) -> &mut dyn EvidenceRecorder {
        self.recorder.as_mut()
    }

    pub fn preview_mut(&mut self) -> &mut dyn PreviewSink {
        self.preview.as_mut()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release everything. Failures are logged and reported as `false`; a
    /// second call does nothing and returns `true`.
    pub fn release(&mut self) -> bool {
        if self.released {
            return true;
        }
        self.released = true;

        let mut clean = release_source(self.source.as_mut());
        if let Err(err) = self.recorder.release() {
            log::error!("failed to release evidence recorder: {:#}", err);
            clean = false;
        }
        if let Err(err) = self.preview.release() {
            log::error!("failed to release preview: {:#}", err);
            clean = false;
        }
        log::info!("capture session released");
        clean
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn release_source(source: &mut dyn FrameSource) -> bool {
    match source.release() {
        Ok(()) => true,
        Err(err) => {
            log::error!("failed to release source {}: {:#}", source.describe(), err);
            false
        }
    }
}

// ----------------------------------------------------------------------------
// Monitor
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames.
    EndOfStream,
    /// The stop signal was raised.
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Frame pairs run through detection.
    pub frames_processed: u64,
    /// Frame pairs with at least one kept region.
    pub movement_frames: u64,
    /// Annotated movement frames written to the evidence stream.
    pub evidence_frames: u64,
    /// Start banner frames written before the first pair.
    pub banner_frames: u64,
    pub alerts_fired: u64,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            frames_processed: 0,
            movement_frames: 0,
            evidence_frames: 0,
            banner_frames: 0,
            alerts_fired: 0,
            stop_reason: StopReason::EndOfStream,
        }
    }
}

pub struct Monitor {
    capture: CaptureSettings,
    detector: MotionDetector,
    filter: RegionFilter,
    annotator: Annotator,
    throttle: AlertThrottle,
    dispatcher: NotificationDispatcher,
    stop: StopSignal,
}

impl Monitor {
    /// Fails when the configured vision backend is not compiled in.
    pub fn new(
        config: &MonitorConfig,
        notifier: Arc<dyn Notifier>,
        stop: StopSignal,
    ) -> Result<Self> {
        Ok(Self {
            capture: config.capture.clone(),
            detector: MotionDetector::new(config.detection.clone())?,
            filter: RegionFilter::new(config.detection.noise_area),
            annotator: Annotator::with_backend(config.detection.backend)?,
            throttle: AlertThrottle::new(config.alert),
            dispatcher: NotificationDispatcher::new(notifier),
            stop,
        })
    }

    pub fn throttle(&self) -> &AlertThrottle {
        &self.throttle
    }

    pub fn notifications_in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Wait for outstanding notification workers.
    pub fn join_notifications(&mut self) -> usize {
        self.dispatcher.join_all()
    }

    /// Process frames until the stream ends or the stop signal is raised.
    ///
    /// Read, detection and evidence failures abort the run; the caller's
    /// session guard still releases every resource.
    pub fn run(&mut self, session: &mut CaptureSession) -> Result<RunSummary> {
        self.run_with_clock(session, &mut SystemClock)
    }

    /// `run` with an explicit time source.
    pub fn run_with_clock(
        &mut self,
        session: &mut CaptureSession,
        clock: &mut dyn Clock,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        log::info!(
            "warming up {} ({} frames)",
            session.source.describe(),
            self.capture.warmup_frames
        );
        for _ in 0..self.capture.warmup_frames {
            if self.stop.is_stopped() {
                log::info!("stop requested during warm-up");
                summary.stop_reason = StopReason::Cancelled;
                return Ok(summary);
            }
            if session.source.next_frame()?.is_none() {
                log::info!("source ended during warm-up");
                return Ok(summary);
            }
        }
        if self.stop.is_stopped() {
            summary.stop_reason = StopReason::Cancelled;
            return Ok(summary);
        }

        let Some(mut previous) = session.source.next_frame()? else {
            return Ok(summary);
        };
        let Some(mut current) = session.source.next_frame()? else {
            return Ok(summary);
        };

        let (width, height) = previous.dimensions();
        let (_, started_at) = clock.now();
        let banner = self
            .annotator
            .start_banner(width, height, &started_at)
            .context("render start banner")?;
        for _ in 0..self.capture.frame_rate {
            session
                .recorder
                .write_frame(&banner)
                .context("write start banner")?;
            summary.banner_frames += 1;
        }
        log::info!("capture started ({}x{})", width, height);

        loop {
            let next = self.process_pair(session, clock, previous, &current, &mut summary)?;
            previous = current;
            current = match next {
                Some(frame) => frame,
                None => {
                    summary.stop_reason = StopReason::EndOfStream;
                    break;
                }
            };
            if self.stop.is_stopped() {
                summary.stop_reason = StopReason::Cancelled;
                break;
            }
        }

        log::info!(
            "monitor stopped ({:?}): {} frames, {} with movement, {} alerts",
            summary.stop_reason,
            summary.frames_processed,
            summary.movement_frames,
            summary.alerts_fired
        );
        Ok(summary)
    }

    /// Run one frame pair through the pipeline and read the next frame.
    fn process_pair(
        &mut self,
        session: &mut CaptureSession,
        clock: &mut dyn Clock,
        previous: Frame,
        current: &Frame,
        summary: &mut RunSummary,
    ) -> Result<Option<Frame>> {
        let (_mask, regions) = self.detector.detect(&previous, current)?;
        let decision = self.filter.filter(regions);
        let (now, timestamp) = clock.now();
        summary.frames_processed += 1;

        let annotated = self
            .annotator
            .annotate(previous, &decision, &timestamp)
            .context("annotate frame")?;
        let alert = self.throttle.tick(now, decision.movement_detected);

        if decision.movement_detected {
            log::info!("Movement detected");
            summary.movement_frames += 1;
            session
                .recorder
                .write_frame(&annotated)
                .context("write evidence frame")?;
            summary.evidence_frames += 1;

            if alert == AlertDecision::Fire {
                let snapshot = session
                    .recorder
                    .write_snapshot(&annotated, &timestamp)
                    .context("write alert snapshot")?;
                summary.alerts_fired += 1;
                log::info!("alert snapshot saved to {}", snapshot.display());
                if let Err(err) = self.dispatcher.dispatch(snapshot) {
                    log::error!("notification not dispatched: {:#}", err);
                }
            }
        }

        if let Err(err) = session.preview.show(&annotated) {
            log::debug!("preview update failed: {:#}", err);
        }

        session.source.next_frame()
    }
}
