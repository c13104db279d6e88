//! Conversions between crate frames and OpenCV matrices.
//!
//! Matrices built here keep the frame's RGB channel order, so colors passed to
//! `imgproc` drawing calls are `Scalar::new(r, g, b, 0.0)`.

#![cfg(feature = "backend-opencv")]

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;

use crate::frame::Frame;

/// Copy a frame into a continuous `CV_8UC3` matrix.
pub fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let (width, height) = frame.dimensions();
    let mut mat = Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )
    .context("allocate RGB matrix")?;
    mat.data_bytes_mut()
        .context("access RGB matrix")?
        .copy_from_slice(frame.as_raw());
    Ok(mat)
}

/// Copy a continuous `CV_8UC3` matrix back into a frame.
pub fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    let (width, height) = mat_dimensions(mat)?;
    let bytes = mat.data_bytes().context("read RGB matrix")?;
    Frame::from_rgb(width, height, bytes.to_vec())
}

/// Copy a continuous `CV_8UC1` matrix into a grayscale image.
pub fn mat_to_gray(mat: &Mat) -> Result<GrayImage> {
    let (width, height) = mat_dimensions(mat)?;
    let bytes = mat.data_bytes().context("read mask matrix")?;
    GrayImage::from_raw(width, height, bytes.to_vec())
        .ok_or_else(|| anyhow!("mask matrix is not {}x{} single channel", width, height))
}

fn mat_dimensions(mat: &Mat) -> Result<(u32, u32)> {
    let (rows, cols) = (mat.rows(), mat.cols());
    if rows <= 0 || cols <= 0 {
        return Err(anyhow!("empty matrix ({}x{})", cols, rows));
    }
    Ok((cols as u32, rows as u32))
}
