//! Overlay drawing for display and evidence frames.
//!
//! Every processed frame gets a status label and a capture timestamp; kept
//! regions get a box. Recordings open with a black "Start recording" banner so
//! each evidence file has a clean marker at its start.

pub mod font;
#[cfg(feature = "backend-opencv")]
mod cv_overlay;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::detect::VisionBackend;
use crate::frame::{Frame, MotionDecision, Rect};
use font::{draw_text, TextStyle};

pub const STATUS_LABEL: &str = "Status:";
pub const MOVEMENT_LABEL: &str = "Movement detected";
pub const STATIC_LABEL: &str = "Static";
pub const BANNER_LABEL: &str = "Start recording";

pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const BOX_THICKNESS: u32 = 2;
pub const MOVEMENT_COLOR: [u8; 3] = [255, 0, 0];
pub const STATIC_COLOR: [u8; 3] = [0, 255, 0];
pub const STATUS_COLOR: [u8; 3] = [0, 0, 0];
pub const BANNER_COLOR: [u8; 3] = [0, 255, 0];
pub const BANNER_TIME_COLOR: [u8; 3] = [255, 255, 255];

/// Baseline positions of the overlay text.
pub const STATUS_ORIGIN: (i64, i64) = (10, 20);
pub const STATE_ORIGIN: (i64, i64) = (70, 20);
pub const TIMESTAMP_ORIGIN: (i64, i64) = (10, 40);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Capture timestamp with millisecond precision, e.g. `2024-05-01 03:12:45.120`.
pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// One overlay element, rendered by whichever backend the annotator uses.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Mark {
    /// Outline from `(x, y)` to `(x + w, y + h)` inclusive.
    Outline {
        rect: Rect,
        color: [u8; 3],
        thickness: u32,
    },
    /// Text with its baseline-left corner at `origin`.
    Label {
        text: String,
        origin: (i64, i64),
        color: [u8; 3],
        bold: bool,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Annotator {
    backend: VisionBackend,
}

impl Annotator {
    /// Annotator drawing with the built-in bitmap font.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: VisionBackend) -> Result<Self> {
        backend.ensure_available()?;
        Ok(Self { backend })
    }

    pub fn backend(&self) -> VisionBackend {
        self.backend
    }

    /// Draw region boxes, status label, movement state and timestamp.
    pub fn annotate(
        &self,
        frame: Frame,
        decision: &MotionDecision,
        timestamp: &DateTime<Local>,
    ) -> Result<Frame> {
        let mut marks: Vec<Mark> = decision
            .regions
            .iter()
            .map(|region| Mark::Outline {
                rect: region.bounds,
                color: BOX_COLOR,
                thickness: BOX_THICKNESS,
            })
            .collect();

        let (label, color) = if decision.movement_detected {
            (MOVEMENT_LABEL, MOVEMENT_COLOR)
        } else {
            (STATIC_LABEL, STATIC_COLOR)
        };
        marks.push(label_mark(STATUS_LABEL, STATUS_ORIGIN, STATUS_COLOR, true));
        marks.push(label_mark(
            &format_timestamp(timestamp),
            TIMESTAMP_ORIGIN,
            STATUS_COLOR,
            false,
        ));
        marks.push(label_mark(label, STATE_ORIGIN, color, true));
        self.render(frame, &marks)
    }

    /// Black frame with the recording-start marker.
    pub fn start_banner(
        &self,
        width: u32,
        height: u32,
        timestamp: &DateTime<Local>,
    ) -> Result<Frame> {
        let marks = [
            label_mark(BANNER_LABEL, STATUS_ORIGIN, BANNER_COLOR, true),
            label_mark(
                &format_timestamp(timestamp),
                TIMESTAMP_ORIGIN,
                BANNER_TIME_COLOR,
                false,
            ),
        ];
        self.render(Frame::black(width, height), &marks)
    }

    fn render(&self, frame: Frame, marks: &[Mark]) -> Result<Frame> {
        match self.backend {
            VisionBackend::Cpu => Ok(render_cpu(frame, marks)),
            #[cfg(feature = "backend-opencv")]
            VisionBackend::Opencv => cv_overlay::render(frame, marks),
            #[cfg(not(feature = "backend-opencv"))]
            VisionBackend::Opencv => {
                self.backend.ensure_available()?;
                Ok(render_cpu(frame, marks))
            }
        }
    }
}

fn label_mark(text: &str, origin: (i64, i64), color: [u8; 3], bold: bool) -> Mark {
    Mark::Label {
        text: text.to_string(),
        origin,
        color,
        bold,
    }
}

fn render_cpu(mut frame: Frame, marks: &[Mark]) -> Frame {
    for mark in marks {
        match mark {
            Mark::Outline {
                rect,
                color,
                thickness,
            } => draw_box(&mut frame, *rect, *color, *thickness),
            Mark::Label {
                text,
                origin,
                color,
                bold,
            } => draw_text(
                &mut frame,
                text,
                origin.0,
                origin.1,
                TextStyle {
                    color: *color,
                    scale: 1,
                    bold: *bold,
                },
            ),
        }
    }
    frame
}

/// Rectangle outline from `(x, y)` to `(x + w, y + h)`, stroked inward.
fn draw_box(frame: &mut Frame, rect: Rect, color: [u8; 3], thickness: u32) {
    let (x0, y0) = (rect.x as i64, rect.y as i64);
    let (x1, y1) = (x0 + rect.width as i64, y0 + rect.height as i64);
    for k in 0..thickness as i64 {
        for x in x0..=x1 {
            frame.put_clipped(x, y0 + k, color);
            frame.put_clipped(x, y1 - k, color);
        }
        for y in y0..=y1 {
            frame.put_clipped(x0 + k, y, color);
            frame.put_clipped(x1 - k, y, color);
        }
    }
}
