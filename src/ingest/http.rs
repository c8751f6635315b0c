//! HTTP camera source.
//!
//! Reads IP-webcam style endpoints: a `multipart/x-mixed-replace` MJPEG stream
//! when the camera offers one, otherwise repeated single-JPEG snapshots.
//! HTTP cameras are always live sources.

use std::io::Read;
use std::time::Instant;

use url::Url;

use super::{CaptureSource, SourceKind};
use crate::error::CaptureError;
use crate::frame::Frame;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub struct HttpSource {
    url: Url,
    stream: Option<HttpStream>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpSource {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            stream: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    /// Connect and probe one frame so an unreachable camera fails at open time.
    pub fn connect(&mut self) -> Result<(), CaptureError> {
        let open_err = |reason: String| CaptureError::open(self.url.as_str(), reason);
        let response = ureq::get(self.url.as_str())
            .call()
            .map_err(|e| open_err(e.to_string()))?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        if content_type.contains("multipart") {
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(response.into_reader())));
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
        }
        self.connected_at = Some(Instant::now());
        log::info!("HttpSource: connected to {}", self.url);
        Ok(())
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl CaptureSource for HttpSource {
    fn read_next(&mut self) -> Result<Frame, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Read("http source not connected".to_string()))?;
        let jpeg_bytes = match stream {
            HttpStream::Mjpeg(stream) => stream.read_next_jpeg()?,
            HttpStream::SingleJpeg => fetch_single_jpeg(self.url.as_str())?,
        };
        let image = image::load_from_memory(&jpeg_bytes)
            .map_err(|e| CaptureError::Read(format!("decode jpeg: {}", e)))?
            .into_rgb8();
        let frame = Frame::new(image, self.frame_count);
        self.frame_count += 1;
        Ok(frame)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    fn kind(&self) -> SourceKind {
        SourceKind::LiveStream
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send + Sync>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send + Sync>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self
                .reader
                .read(&mut chunk)
                .map_err(|e| CaptureError::Read(format!("read mjpeg chunk: {}", e)))?;
            if read == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let drain_len = self.buffer.len() - 2;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(url: &str) -> Result<Vec<u8>, CaptureError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| CaptureError::Read(format!("fetch jpeg snapshot from {}: {}", url, e)))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| CaptureError::Read(format!("read jpeg snapshot: {}", e)))?;
    if bytes.is_empty() {
        return Err(CaptureError::Read("empty jpeg snapshot".to_string()));
    }
    Ok(bytes)
}

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

    #[test]
    fn finds_jpeg_markers_in_multipart_noise() {
        let mut buf = b"--boundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        let offset = buf.len();
        buf.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        buf.extend_from_slice(b"\r\n--boundary");
        assert_eq!(find_jpeg_bounds(&buf), Some((offset, offset + 7)));
    }

    #[test]
    fn incomplete_jpeg_is_not_returned() {
        assert_eq!(find_jpeg_bounds(&[0xFF, 0xD8, 1, 2]), None);
    }
}
