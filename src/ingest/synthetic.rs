//! Synthetic frame source (`stub://`).
//!
//! Produces a static textured background. Query parameters shape the scene:
//! - `motion_at=N`: a bright square appears from frame index `N` (0-based) on
//! - `size=S`: side of that square in pixels (default 40)
//! - `frames=N`: end the stream after `N` frames
//! - `noise=A`: add seeded per-pixel noise in `[-A, A]` to every frame
//!
//! Example: `stub://front_door?motion_at=5&size=40&frames=20`

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use url::Url;

use super::FrameSource;
use crate::frame::{Frame, Rect};

const DEFAULT_SQUARE_SIZE: u32 = 40;
const SQUARE_COLOR: [u8; 3] = [255, 255, 255];

/// Parsed `stub://` scene description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticScene {
    pub name: String,
    pub motion_at: Option<u64>,
    pub square_size: u32,
    pub max_frames: Option<u64>,
    pub noise: u8,
}

impl SyntheticScene {
    pub fn parse(locator: &str) -> Result<Self> {
        let url = Url::parse(locator).with_context(|| format!("parse stub locator {}", locator))?;
        if url.scheme() != "stub" {
            return Err(anyhow!("synthetic source requires stub://, got {}", locator));
        }
        let name = url.host_str().unwrap_or("stub").to_string();
        let mut scene = Self {
            name,
            motion_at: None,
            square_size: DEFAULT_SQUARE_SIZE,
            max_frames: None,
            noise: 0,
        };
        for (key, value) in url.query_pairs() {
            let parse_err = || anyhow!("invalid stub parameter {}={}", key, value);
            match key.as_ref() {
                "motion_at" => scene.motion_at = Some(value.parse().map_err(|_| parse_err())?),
                "size" => scene.square_size = value.parse().map_err(|_| parse_err())?,
                "frames" => scene.max_frames = Some(value.parse().map_err(|_| parse_err())?),
                "noise" => scene.noise = value.parse().map_err(|_| parse_err())?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        Ok(scene)
    }
}

pub struct SyntheticSource {
    locator: String,
    scene: SyntheticScene,
    background: Frame,
    frame_count: u64,
    open: bool,
}

impl SyntheticSource {
    pub fn new(locator: &str, width: u32, height: u32) -> Result<Self> {
        let scene = SyntheticScene::parse(locator)?;
        // The square is only drawn once motion starts; a still scene has no size limit.
        if scene.motion_at.is_some() && scene.square_size > width.min(height) {
            return Err(anyhow!(
                "stub square size {} does not fit a {}x{} frame",
                scene.square_size,
                width,
                height
            ));
        }
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            locator,
            width,
            height
        );
        Ok(Self {
            locator: locator.to_string(),
            background: textured_background(width, height),
            scene,
            frame_count: 0,
            open: true,
        })
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frame_count
    }

    /// Where the square is drawn once motion starts.
    pub fn square_bounds(&self) -> Rect {
        let size = self.scene.square_size;
        Rect::new(
            (self.background.width() - size) / 2,
            (self.background.height() - size) / 2,
            size,
            size,
        )
    }

    fn render(&self, index: u64) -> Frame {
        let mut frame = self.background.clone();
        if self.scene.motion_at.is_some_and(|start| index >= start) {
            frame.fill_rect(self.square_bounds(), SQUARE_COLOR);
        }
        if self.scene.noise > 0 {
            let amplitude = self.scene.noise as i16;
            let mut rng = StdRng::seed_from_u64(index);
            for value in frame.as_image_mut().iter_mut() {
                let jitter = rng.gen_range(-amplitude..=amplitude);
                *value = (*value as i16 + jitter).clamp(0, 255) as u8;
            }
        }
        frame
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(anyhow!("synthetic source {} is released", self.locator));
        }
        if self
            .scene
            .max_frames
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        let frame = self.render(self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn release(&mut self) -> Result<()> {
        if self.open {
            log::debug!(
                "SyntheticSource: released {} after {} frames",
                self.locator,
                self.frame_count
            );
        }
        self.open = false;
        Ok(())
    }

    fn describe(&self) -> String {
        self.locator.clone()
    }
}

/// Low-contrast diagonal texture, constant across frames.
fn textured_background(width: u32, height: u32) -> Frame {
    let mut frame = Frame::black(width, height);
    for (x, y, pixel) in frame.as_image_mut().enumerate_pixels_mut() {
        let shade = ((x / 8 + y / 8) % 4) as u8 * 12;
        pixel.0 = [40 + shade, 60 + shade, 80 + shade];
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scene_parameters() -> Result<()> {
        let scene = SyntheticScene::parse("stub://yard?motion_at=5&size=12&frames=9&noise=3")?;
        assert_eq!(scene.name, "yard");
        assert_eq!(scene.motion_at, Some(5));
        assert_eq!(scene.square_size, 12);
        assert_eq!(scene.max_frames, Some(9));
        assert_eq!(scene.noise, 3);
        Ok(())
    }

    #[test]
    fn rejects_unknown_parameters() {
        assert!(SyntheticScene::parse("stub://yard?colour=red").is_err());
        assert!(SyntheticScene::parse("stub://yard?motion_at=soon").is_err());
    }

    #[test]
    fn static_scene_repeats_identical_frames() -> Result<()> {
        let mut source = SyntheticSource::new("stub://static?frames=3", 32, 24)?;
        let a = source.next_frame()?.expect("frame 0");
        let b = source.next_frame()?.expect("frame 1");
        assert_eq!(a, b);
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn square_appears_at_configured_frame() -> Result<()> {
        let mut source = SyntheticSource::new("stub://door?motion_at=2&size=10", 40, 40)?;
        let bounds = source.square_bounds();
        assert_eq!(bounds, Rect::new(15, 15, 10, 10));

        let f0 = source.next_frame()?.expect("frame 0");
        let f1 = source.next_frame()?.expect("frame 1");
        let f2 = source.next_frame()?.expect("frame 2");
        assert_eq!(f0, f1);
        assert_eq!(f2.as_image().get_pixel(20, 20).0, SQUARE_COLOR);
        assert_ne!(f1.as_image().get_pixel(20, 20).0, SQUARE_COLOR);
        Ok(())
    }

    #[test]
    fn noise_is_seeded_per_frame() -> Result<()> {
        let mut a = SyntheticSource::new("stub://n?noise=4", 16, 16)?;
        let mut b = SyntheticSource::new("stub://n?noise=4", 16, 16)?;
        let a0 = a.next_frame()?.expect("frame");
        let a1 = a.next_frame()?.expect("frame");
        assert_eq!(a0, b.next_frame()?.expect("frame"));
        assert_ne!(a0, a1);
        Ok(())
    }

    #[test]
    fn oversized_square_is_rejected() {
        assert!(SyntheticSource::new("stub://x?motion_at=1&size=50", 40, 40).is_err());
    }

    #[test]
    fn still_scene_opens_on_frames_smaller_than_the_square() -> Result<()> {
        // Default square size is 40; without motion_at it is never drawn.
        let mut source = SyntheticSource::new("stub://tiny", 8, 8)?;
        assert_eq!(source.next_frame()?.expect("frame").dimensions(), (8, 8));
        assert!(SyntheticSource::new("stub://tiny?size=50", 16, 16).is_ok());
        Ok(())
    }

    #[test]
    fn release_is_idempotent() -> Result<()> {
        let mut source = SyntheticSource::new("stub://x", 8, 8)?;
        source.release()?;
        source.release()?;
        assert!(!source.is_open());
        assert!(source.next_frame().is_err());
        Ok(())
    }
}
