#![cfg(feature = "backend-opencv")]

use anyhow::{anyhow, Context, Result};
use opencv::core::{self, Mat, Point, Size, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::config::DetectionConfig;
use crate::cv::{frame_to_mat, mat_to_gray};
use crate::detect::backend::DetectorBackend;
use crate::frame::{Frame, MotionMask, Rect, Region};

/// Frame differencing on OpenCV `imgproc`.
///
/// Same stages as the CPU backend: absdiff, RGB to gray, Gaussian blur with
/// auto sigma, binary threshold, dilation with the default 3x3 element, then
/// `find_contours` with tree retrieval and simple chain approximation.
#[derive(Clone, Debug)]
pub struct OpenCvBackend {
    config: DetectionConfig,
}

impl OpenCvBackend {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    fn mask(&self, previous: &Frame, current: &Frame) -> Result<Mat> {
        let previous = frame_to_mat(previous)?;
        let current = frame_to_mat(current)?;

        let mut diff = Mat::default();
        core::absdiff(&previous, &current, &mut diff).context("absdiff")?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&diff, &mut gray, imgproc::COLOR_RGB2GRAY, 0).context("cvt_color")?;

        let kernel = self.config.blur_kernel as i32;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            &gray,
            &mut blurred,
            Size::new(kernel, kernel),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
        )
        .context("gaussian_blur")?;

        let mut binary = Mat::default();
        imgproc::threshold(
            &blurred,
            &mut binary,
            self.config.diff_threshold as f64,
            255.0,
            imgproc::THRESH_BINARY,
        )
        .context("threshold")?;

        let mut dilated = Mat::default();
        imgproc::dilate(
            &binary,
            &mut dilated,
            &Mat::default(),
            Point::new(-1, -1),
            self.config.dilate_iterations as i32,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )
        .context("dilate")?;
        Ok(dilated)
    }
}

impl DetectorBackend for OpenCvBackend {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn detect(&self, previous: &Frame, current: &Frame) -> Result<(MotionMask, Vec<Region>)> {
        if previous.dimensions() != current.dimensions() {
            return Err(anyhow!(
                "frame size mismatch: {:?} vs {:?}",
                previous.dimensions(),
                current.dimensions()
            ));
        }
        let dilated = self.mask(previous, current)?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &dilated,
            &mut contours,
            imgproc::RETR_TREE,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .context("find_contours")?;

        let mut traced = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let start = contour.get(0).context("empty contour")?;
            let bounds = imgproc::bounding_rect(&contour).context("bounding_rect")?;
            let area = imgproc::contour_area(&contour, false).context("contour_area")?;
            traced.push((
                (start.y, start.x),
                Region {
                    bounds: Rect::new(
                        bounds.x as u32,
                        bounds.y as u32,
                        bounds.width as u32,
                        bounds.height as u32,
                    ),
                    area,
                },
            ));
        }
        // OpenCV lists contours last-found first; report them in scan order.
        traced.sort_by_key(|(start, _)| *start);
        let regions = traced.into_iter().map(|(_, region)| region).collect();

        Ok((MotionMask::new(mat_to_gray(&dilated)?), regions))
    }
}
