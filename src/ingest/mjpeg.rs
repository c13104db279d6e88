//! HTTP camera frame source.
//!
//! `MjpegSource` reads frames from network cameras that serve either a
//! `multipart/x-mixed-replace` MJPEG stream or a single JPEG per request.
//! Frames are decoded in memory and decimated to the target frame rate.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Instant;

use url::Url;

use super::{frame_interval, FrameSource};
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub struct MjpegSource {
    url: String,
    target_fps: u32,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl MjpegSource {
    pub fn new(url: &str, target_fps: u32) -> Result<Self> {
        let parsed = Url::parse(url).context("parse camera url")?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported camera scheme '{}'; expected http(s)",
                parsed.scheme()
            ));
        }
        Ok(Self {
            url: url.to_string(),
            target_fps,
            stream: None,
            last_frame_at: None,
            frame_count: 0,
        })
    }

    /// Open the HTTP stream and detect MJPEG vs single-JPEG mode.
    pub fn connect(&mut self) -> Result<()> {
        let response = ureq::get(&self.url)
            .call()
            .with_context(|| format!("connect to camera {}", self.url))?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(reader)));
            log::info!("MjpegSource: streaming from {}", self.url);
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
            log::info!("MjpegSource: polling snapshots from {}", self.url);
        }
        Ok(())
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSource for MjpegSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} not connected", self.url))?;
        let min_interval = frame_interval(self.target_fps);
        loop {
            let jpeg_bytes = match stream {
                HttpStream::Mjpeg(stream) => match stream.read_next_jpeg()? {
                    Some(bytes) => bytes,
                    None => return Ok(None),
                },
                HttpStream::SingleJpeg => fetch_single_jpeg(&self.url)?,
            };

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    if matches!(stream, HttpStream::SingleJpeg) {
                        std::thread::sleep(min_interval - now.duration_since(last));
                    }
                    continue;
                }
            }

            let frame = decode_jpeg(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Ok(Some(frame));
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn release(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            log::debug!(
                "MjpegSource: closed {} after {} frames",
                self.url,
                self.frame_count
            );
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    /// Next complete JPEG, or `None` once the server closes the stream.
    fn read_next_jpeg(&mut self) -> Result<Option<Vec<u8>>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(Some(frame));
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes).context("decode jpeg")?;
    Ok(Frame::from_image(image.into_rgb8()))
}

/// Locate the first SOI..EOI marker pair.
fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::jpeg::JpegEncoder, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg(color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(16, 8, Rgb(color));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&image)
            .expect("encode jpeg");
        out
    }

    #[test]
    fn finds_jpeg_bounds_inside_multipart_noise() {
        let buffer = [0x00, 0x11, 0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9, 0x33];
        assert_eq!(find_jpeg_bounds(&buffer), Some((2, 8)));
        assert_eq!(find_jpeg_bounds(&[0xFF, 0xD8, 0x00]), None);
        assert_eq!(find_jpeg_bounds(&[0x00, 0x01]), None);
    }

    #[test]
    fn mjpeg_stream_splits_frames_and_ends_cleanly() -> Result<()> {
        let mut body = Vec::new();
        for color in [[255, 0, 0], [0, 0, 255]] {
            body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            body.extend_from_slice(&jpeg(color));
            body.extend_from_slice(b"\r\n");
        }
        let mut stream = MjpegStream::new(Box::new(Cursor::new(body)));

        let first = decode_jpeg(&stream.read_next_jpeg()?.expect("first jpeg"))?;
        assert_eq!(first.dimensions(), (16, 8));
        let red = first.as_image().get_pixel(8, 4).0;
        assert!(red[0] > 200 && red[2] < 50);

        let second = decode_jpeg(&stream.read_next_jpeg()?.expect("second jpeg"))?;
        let blue = second.as_image().get_pixel(8, 4).0;
        assert!(blue[2] > 200 && blue[0] < 50);

        assert!(stream.read_next_jpeg()?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(MjpegSource::new("udp://10.0.0.2:5000", 10).is_err());
        assert!(MjpegSource::new("not a url", 10).is_err());
    }

    #[test]
    fn unconnected_source_reports_closed() -> Result<()> {
        let mut source = MjpegSource::new("http://127.0.0.1:81/stream", 10)?;
        assert!(!source.is_open());
        assert!(source.next_frame().is_err());
        source.release()?;
        Ok(())
    }
}
