//! Raster primitives used by the motion detector.
//!
//! All operations are 8-bit and deterministic. Rounding follows the usual
//! fixed-point conventions of desktop vision libraries so masks computed here
//! line up pixel for pixel with masks computed elsewhere.

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};

/// Grayscale weights in 14-bit fixed point (R, G, B).
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;
const GRAY_SHIFT: u32 = 14;

/// Fractional bits of the blur kernel coefficients.
const KERNEL_BITS: u32 = 8;
const KERNEL_ONE: u32 = 1 << KERNEL_BITS;

/// Per-channel absolute difference. Both images must have identical dimensions.
pub fn abs_diff(previous: &RgbImage, current: &RgbImage) -> Result<RgbImage> {
    if previous.dimensions() != current.dimensions() {
        return Err(anyhow!(
            "frame dimension mismatch: previous {}x{}, current {}x{}",
            previous.width(),
            previous.height(),
            current.width(),
            current.height()
        ));
    }
    let data = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .map(|(a, b)| a.abs_diff(*b))
        .collect();
    RgbImage::from_raw(previous.width(), previous.height(), data)
        .ok_or_else(|| anyhow!("difference buffer size mismatch"))
}

/// Luma conversion (Y = 0.299 R + 0.587 G + 0.114 B).
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let data = image
        .as_raw()
        .chunks_exact(3)
        .map(|px| {
            let y = px[0] as u32 * GRAY_R
                + px[1] as u32 * GRAY_G
                + px[2] as u32 * GRAY_B
                + (1 << (GRAY_SHIFT - 1));
            (y >> GRAY_SHIFT) as u8
        })
        .collect();
    // Same pixel count as the input, so from_raw cannot fail.
    GrayImage::from_raw(image.width(), image.height(), data)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}

/// 1-D Gaussian kernel as fixed-point coefficients summing to 256.
///
/// With `sigma <= 0` the sigma is derived from the size; sizes 1, 3, 5 and 7
/// use the exact binomial tables.
pub fn gaussian_kernel(ksize: u32, sigma: f64) -> Result<Vec<u32>> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(anyhow!("gaussian kernel size must be odd, got {}", ksize));
    }
    if sigma <= 0.0 {
        match ksize {
            1 => return Ok(vec![256]),
            3 => return Ok(vec![64, 128, 64]),
            5 => return Ok(vec![16, 64, 96, 64, 16]),
            7 => return Ok(vec![8, 28, 56, 72, 56, 28, 8]),
            _ => {}
        }
    }
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let radius = (ksize / 2) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    let mut kernel: Vec<u32> = weights
        .iter()
        .map(|w| (w / total * KERNEL_ONE as f64).round() as u32)
        .collect();
    // Push the rounding residue into the center tap so the kernel sums to one.
    let sum: u32 = kernel.iter().sum();
    let center = radius as usize;
    kernel[center] = (kernel[center] + KERNEL_ONE).saturating_sub(sum);
    Ok(kernel)
}

/// Separable Gaussian blur with reflect-101 borders (`gfedcb|abcdefgh|gfedcba`).
pub fn gaussian_blur(image: &GrayImage, ksize: u32) -> Result<GrayImage> {
    let kernel = gaussian_kernel(ksize, 0.0)?;
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return Ok(image.clone());
    }
    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();

    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0u32;
            for (k, coeff) in kernel.iter().enumerate() {
                let sx = reflect_101(x as i64 + k as i64 - radius, w);
                acc += coeff * row[sx] as u32;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let round = 1u32 << (2 * KERNEL_BITS - 1);
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, coeff) in kernel.iter().enumerate() {
                let sy = reflect_101(y as i64 + k as i64 - radius, h);
                acc += coeff * horizontal[sy * w + x];
            }
            out[y * w + x] = ((acc + round) >> (2 * KERNEL_BITS)).min(255) as u8;
        }
    }

    GrayImage::from_raw(width, height, out).ok_or_else(|| anyhow!("blur buffer size mismatch"))
}

/// Binary threshold: strictly greater than `thresh` becomes 255, everything else 0.
pub fn threshold(image: &GrayImage, thresh: u8) -> GrayImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        *px = Luma([if px.0[0] > thresh { 255 } else { 0 }]);
    }
    out
}

/// Dilation with a 3x3 rectangular element applied `iterations` times.
///
/// Repeated 3x3 rectangle dilation equals a single dilation with a
/// `(2n+1)x(2n+1)` rectangle, computed here as two separable max passes.
/// Pixels outside the image never contribute.
pub fn dilate(image: &GrayImage, iterations: u32) -> GrayImage {
    if iterations == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);
    let r = iterations as usize;
    let src = image.as_raw();

    let mut horizontal = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(w - 1);
            horizontal[y * w + x] = src[y * w + lo..=y * w + hi]
                .iter()
                .copied()
                .max()
                .unwrap_or(0);
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let lo = y.saturating_sub(r);
        let hi = (y + r).min(h - 1);
        for x in 0..w {
            out[y * w + x] = (lo..=hi).map(|sy| horizontal[sy * w + x]).max().unwrap_or(0);
        }
    }

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| GrayImage::new(width, height))
}

fn reflect_101(mut i: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as i64 - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        }
        if i > last {
            i = 2 * last - i;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn abs_diff_rejects_mismatched_dimensions() {
        let a = RgbImage::new(4, 4);
        let b = RgbImage::new(4, 5);
        assert!(abs_diff(&a, &b).is_err());
    }

    #[test]
    fn abs_diff_is_symmetric() {
        let a = RgbImage::from_pixel(2, 2, Rgb([10, 200, 30]));
        let b = RgbImage::from_pixel(2, 2, Rgb([40, 100, 30]));
        let d1 = abs_diff(&a, &b).unwrap();
        let d2 = abs_diff(&b, &a).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.get_pixel(0, 0).0, [30, 100, 0]);
    }

    #[test]
    fn gray_uses_luma_weights() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = to_gray(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn kernels_sum_to_one() {
        for ksize in [1, 3, 5, 7, 9, 11] {
            let kernel = gaussian_kernel(ksize, 0.0).unwrap();
            assert_eq!(kernel.len(), ksize as usize);
            assert_eq!(kernel.iter().sum::<u32>(), 256, "ksize {}", ksize);
        }
        assert!(gaussian_kernel(4, 0.0).is_err());
        assert!(gaussian_kernel(0, 0.0).is_err());
    }

    #[test]
    fn blur_preserves_flat_images() {
        let img = GrayImage::from_pixel(9, 7, Luma([123]));
        let blurred = gaussian_blur(&img, 5).unwrap();
        assert!(blurred.pixels().all(|p| p.0[0] == 123));
    }

    #[test]
    fn blur_spreads_an_edge_by_binomial_weights() {
        // Left half 0, right half 255 along x.
        let img = GrayImage::from_fn(10, 5, |x, _| Luma([if x >= 5 { 255 } else { 0 }]));
        let blurred = gaussian_blur(&img, 5).unwrap();
        // One pixel outside the edge sees taps 1 and 4 of 16.
        assert_eq!(blurred.get_pixel(4, 2).0[0], 80);
        // Two pixels outside sees only the outer tap.
        assert_eq!(blurred.get_pixel(3, 2).0[0], 16);
        assert_eq!(blurred.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn threshold_is_strict() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([19 + x as u8]));
        let out = threshold(&img, 20);
        assert_eq!(out.as_raw(), &vec![0, 0, 255]);
    }

    #[test]
    fn dilate_grows_by_iterations() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, Luma([255]));
        let out = dilate(&img, 3);
        let set: Vec<(u32, u32)> = out
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(set.len(), 49);
        assert!(out.get_pixel(2, 2).0[0] == 255 && out.get_pixel(8, 8).0[0] == 255);
        assert_eq!(out.get_pixel(1, 5).0[0], 0);
    }

    #[test]
    fn dilate_clips_at_borders() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(0, 0, Luma([255]));
        let out = dilate(&img, 1);
        assert_eq!(out.get_pixel(1, 1).0[0], 255);
        assert_eq!(out.get_pixel(2, 0).0[0], 0);
    }
}
