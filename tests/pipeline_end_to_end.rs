use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Local;

use motion_sentry::annotate::{MOVEMENT_COLOR, STATIC_COLOR};
use motion_sentry::{
    build_notifier, CaptureSession, Frame, FrameSource, MemoryRecorder, Monitor, MonitorConfig,
    NoPreview, Notifier, Rect, StopReason, StopSignal, SyntheticSource,
};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const BANNER_FRAMES: u32 = 3;

#[derive(Default)]
struct CountingNotifier {
    sent: Mutex<Vec<PathBuf>>,
}

impl CountingNotifier {
    fn count(&self) -> usize {
        self.sent.lock().expect("lock").len()
    }
}

impl Notifier for CountingNotifier {
    fn send(&self, snapshot: &Path) -> Result<()> {
        self.sent.lock().expect("lock").push(snapshot.to_path_buf());
        Ok(())
    }
}

/// Raises the stop signal once `after` frames have been handed out.
struct StoppingSource {
    inner: SyntheticSource,
    stop: StopSignal,
    after: u64,
}

impl FrameSource for StoppingSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.next_frame()?;
        if self.inner.frames_emitted() >= self.after {
            self.stop.stop();
        }
        Ok(frame)
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn release(&mut self) -> Result<()> {
        self.inner.release()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn config() -> MonitorConfig {
    let mut cfg = MonitorConfig::default();
    cfg.capture.warmup_frames = 0;
    cfg.capture.frame_rate = BANNER_FRAMES;
    cfg.capture.width = WIDTH;
    cfg.capture.height = HEIGHT;
    cfg
}

fn memory_session(source: Box<dyn FrameSource>, recorder: &MemoryRecorder) -> CaptureSession {
    CaptureSession::new(source, Box::new(recorder.clone()), Box::new(NoPreview))
}

fn count_color(frame: &Frame, color: [u8; 3], area: Rect) -> usize {
    frame
        .as_image()
        .enumerate_pixels()
        .filter(|(x, y, p)| area.contains(*x, *y) && p.0 == color)
        .count()
}

fn label_area() -> Rect {
    Rect::new(70, 0, 110, 24)
}

#[test]
fn static_stream_records_only_the_banner() -> Result<()> {
    let recorder = MemoryRecorder::new();
    let notifier = Arc::new(CountingNotifier::default());
    let source = SyntheticSource::new("stub://still?frames=20", WIDTH, HEIGHT)?;
    let mut session = memory_session(Box::new(source), &recorder);
    let mut monitor = Monitor::new(&config(), notifier.clone(), StopSignal::new())?;

    let summary = monitor.run(&mut session)?;
    assert!(session.release());
    monitor.join_notifications();

    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(summary.frames_processed, 19);
    assert_eq!(summary.movement_frames, 0);
    assert_eq!(summary.evidence_frames, 0);
    assert_eq!(summary.banner_frames, BANNER_FRAMES as u64);
    assert_eq!(recorder.frame_count(), BANNER_FRAMES as usize);
    assert_eq!(recorder.snapshot_count(), 0);
    assert_eq!(notifier.count(), 0);
    Ok(())
}

#[test]
fn cancellation_stops_the_loop_cleanly() -> Result<()> {
    let recorder = MemoryRecorder::new();
    let notifier = Arc::new(CountingNotifier::default());
    let stop = StopSignal::new();
    let source = StoppingSource {
        inner: SyntheticSource::new("stub://endless", WIDTH, HEIGHT)?,
        stop: stop.clone(),
        after: 6,
    };
    let mut session = memory_session(Box::new(source), &recorder);
    let mut monitor = Monitor::new(&config(), notifier.clone(), stop)?;

    let summary = monitor.run(&mut session)?;

    // Frame 5 is read while processing pair (3, 4); the signal is seen right after.
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.frames_processed, 4);
    assert_eq!(notifier.count(), 0);

    assert!(session.release());
    assert!(session.release());
    assert!(!session.source_mut().is_open());
    assert_eq!(recorder.evidence().releases, 1);
    Ok(())
}

#[test]
fn square_at_frame_five_fires_exactly_one_alert() -> Result<()> {
    let recorder = MemoryRecorder::new();
    let notifier = Arc::new(CountingNotifier::default());
    let source = SyntheticSource::new("stub://door?motion_at=5&size=40&frames=12", WIDTH, HEIGHT)?;
    let mut session = memory_session(Box::new(source), &recorder);
    let mut monitor = Monitor::new(&config(), notifier.clone(), StopSignal::new())?;

    let summary = monitor.run(&mut session)?;
    drop(session);
    monitor.join_notifications();

    assert_eq!(summary.frames_processed, 11);
    assert_eq!(summary.movement_frames, 1);
    assert_eq!(summary.alerts_fired, 1);
    assert_eq!(notifier.count(), 1);

    let evidence = recorder.evidence();
    assert_eq!(evidence.releases, 1);
    assert_eq!(evidence.frames.len(), BANNER_FRAMES as usize + 1);

    let movement_frame = &evidence.frames[BANNER_FRAMES as usize];
    assert!(count_color(movement_frame, MOVEMENT_COLOR, label_area()) > 0);
    assert_eq!(count_color(movement_frame, STATIC_COLOR, label_area()), 0);

    // The box surrounds the square at (60, 40) with some dilation margin.
    let box_area = Rect::new(50, 30, 60, 60);
    assert!(count_color(movement_frame, [0, 255, 0], box_area) > 0);

    assert_eq!(evidence.snapshots.len(), 1);
    let (snapshot_path, snapshot) = &evidence.snapshots[0];
    assert_eq!(snapshot, movement_frame);
    assert_eq!(notifier.sent.lock().expect("lock")[0], *snapshot_path);
    Ok(())
}

#[test]
fn small_changes_are_filtered_as_noise() -> Result<()> {
    let recorder = MemoryRecorder::new();
    let notifier = Arc::new(CountingNotifier::default());
    let source = SyntheticSource::new("stub://moth?motion_at=3&size=5&frames=8", WIDTH, HEIGHT)?;
    let mut session = memory_session(Box::new(source), &recorder);
    let mut monitor = Monitor::new(&config(), notifier.clone(), StopSignal::new())?;

    let summary = monitor.run(&mut session)?;
    monitor.join_notifications();

    assert_eq!(summary.movement_frames, 0);
    assert_eq!(notifier.count(), 0);
    assert_eq!(recorder.frame_count(), BANNER_FRAMES as usize);
    Ok(())
}

#[test]
fn sensor_noise_below_threshold_is_static() -> Result<()> {
    let recorder = MemoryRecorder::new();
    let notifier = Arc::new(CountingNotifier::default());
    let source = SyntheticSource::new("stub://grain?noise=6&frames=6", WIDTH, HEIGHT)?;
    let mut session = memory_session(Box::new(source), &recorder);
    let mut monitor = Monitor::new(&config(), notifier.clone(), StopSignal::new())?;

    let summary = monitor.run(&mut session)?;
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.movement_frames, 0);
    Ok(())
}

#[test]
fn filesystem_session_writes_video_snapshot_and_notifies() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let contacts = dir.path().join("contacts.txt");
    let message = dir.path().join("message.txt");
    std::fs::write(&contacts, "alice alice@example.com\n")?;
    std::fs::write(&message, "<p>Dear ${PERSON_NAME}, next alert in $SECONDS s.</p>")?;

    let mut cfg = config();
    cfg.capture.source = "stub://yard?motion_at=4&size=40&frames=9".to_string();
    cfg.storage.image_dir = dir.path().join("images");
    cfg.storage.video_dir = dir.path().join("videos");
    cfg.storage.preview_path = Some(dir.path().join("preview.jpg"));
    cfg.notify.contacts_path = contacts;
    cfg.notify.message_path = message;
    cfg.log_path = None;
    cfg.validate()?;

    let notifier = build_notifier(&cfg.notify, &cfg.alert)?;
    let mut session = CaptureSession::open(&cfg, &Local::now())?;
    let mut monitor = Monitor::new(&cfg, notifier, StopSignal::new())?;

    let summary = monitor.run(&mut session)?;
    assert!(session.release());
    assert_eq!(monitor.join_notifications(), 1);
    assert_eq!(summary.alerts_fired, 1);

    let videos: Vec<_> = std::fs::read_dir(&cfg.storage.video_dir)?
        .collect::<std::io::Result<Vec<_>>>()?;
    assert_eq!(videos.len(), 1);
    let video_name = videos[0].file_name().to_string_lossy().into_owned();
    assert!(video_name.starts_with("movevid_") && video_name.ends_with(".mjpeg"));
    let video = std::fs::read(videos[0].path())?;
    let jpeg_frames = video.windows(2).filter(|w| *w == [0xFF, 0xD8]).count();
    assert_eq!(jpeg_frames, BANNER_FRAMES as usize + 1);

    let images: Vec<_> = std::fs::read_dir(&cfg.storage.image_dir)?
        .collect::<std::io::Result<Vec<_>>>()?;
    assert_eq!(images.len(), 1);
    let image_name = images[0].file_name().to_string_lossy().into_owned();
    assert!(image_name.starts_with("moveimg_") && image_name.ends_with(".png"));
    let snapshot = image::open(images[0].path())?.into_rgb8();
    assert_eq!(snapshot.dimensions(), (WIDTH, HEIGHT));

    assert!(dir.path().join("preview.jpg").exists());
    Ok(())
}

#[test]
fn unopenable_source_fails_before_recording() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = config();
    cfg.capture.source = "rtsp://camera/stream".to_string();
    cfg.storage.video_dir = dir.path().join("videos");
    cfg.storage.image_dir = dir.path().join("images");

    assert!(CaptureSession::open(&cfg, &Local::now()).is_err());
    assert!(!cfg.storage.video_dir.exists());
    Ok(())
}
