//! Overlay rendering through OpenCV `imgproc` (Hershey simplex, scale 0.5).

#![cfg(feature = "backend-opencv")]

use anyhow::{Context, Result};
use opencv::core::{self, Point, Scalar};
use opencv::imgproc;

use super::Mark;
use crate::cv::{frame_to_mat, mat_to_frame};
use crate::frame::Frame;

const FONT_SCALE: f64 = 0.5;

fn scalar(color: [u8; 3]) -> Scalar {
    Scalar::new(color[0] as f64, color[1] as f64, color[2] as f64, 0.0)
}

pub(super) fn render(frame: Frame, marks: &[Mark]) -> Result<Frame> {
    let mut mat = frame_to_mat(&frame)?;
    for mark in marks {
        match mark {
            Mark::Outline {
                rect,
                color,
                thickness,
            } => {
                // The rect overload stops one pixel short of x + w, y + h.
                let outline = core::Rect::new(
                    rect.x as i32,
                    rect.y as i32,
                    rect.width as i32 + 1,
                    rect.height as i32 + 1,
                );
                imgproc::rectangle(
                    &mut mat,
                    outline,
                    scalar(*color),
                    *thickness as i32,
                    imgproc::LINE_8,
                    0,
                )
                .context("draw region box")?;
            }
            Mark::Label {
                text,
                origin,
                color,
                bold,
            } => {
                imgproc::put_text(
                    &mut mat,
                    text,
                    Point::new(origin.0 as i32, origin.1 as i32),
                    imgproc::FONT_HERSHEY_SIMPLEX,
                    FONT_SCALE,
                    scalar(*color),
                    if *bold { 2 } else { 1 },
                    imgproc::LINE_8,
                    false,
                )
                .with_context(|| format!("draw label '{}'", text))?;
            }
        }
    }
    mat_to_frame(&mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rect;

    #[test]
    fn outline_covers_both_corners() -> Result<()> {
        let frame = Frame::filled(64, 48, [128, 128, 128]);
        let marks = [Mark::Outline {
            rect: Rect::new(10, 10, 20, 20),
            color: [0, 255, 0],
            thickness: 2,
        }];
        let out = render(frame, &marks)?;
        assert_eq!(out.as_image().get_pixel(10, 10).0, [0, 255, 0]);
        assert_eq!(out.as_image().get_pixel(30, 30).0, [0, 255, 0]);
        assert_eq!(out.as_image().get_pixel(20, 20).0, [128, 128, 128]);
        Ok(())
    }

    #[test]
    fn label_is_drawn_in_rgb_order() -> Result<()> {
        let frame = Frame::filled(160, 48, [128, 128, 128]);
        let marks = [Mark::Label {
            text: "Movement detected".to_string(),
            origin: (10, 20),
            color: [255, 0, 0],
            bold: true,
        }];
        let out = render(frame, &marks)?;
        let red = out
            .as_image()
            .pixels()
            .filter(|p| p.0 == [255, 0, 0])
            .count();
        assert!(red > 0);
        Ok(())
    }
}
