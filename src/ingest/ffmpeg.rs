//! FFmpeg-backed source for local video files and RTSP streams.
//!
//! Frames are decoded in-memory and scaled to packed RGB24. Files report their
//! frame count and frame rate from the container; streams report no count.

use ffmpeg_next as ffmpeg;
use std::time::Duration;

use super::{interval_from_fps, CaptureSource, SourceKind};
use crate::error::CaptureError;
use crate::frame::Frame;

pub struct FfmpegSource {
    locator: String,
    kind: SourceKind,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_interval: Duration,
    frame_count: Option<u64>,
    decoded_frames: u64,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn open(locator: &str, kind: SourceKind) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::open(locator, reason);
        ffmpeg::init().map_err(|e| open_err(format!("initialize ffmpeg: {}", e)))?;
        let input = ffmpeg::format::input(&locator).map_err(|e| open_err(e.to_string()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_err("no video track".to_string()))?;
        let stream_index = input_stream.index();

        let rate = input_stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let frame_count = match kind {
            SourceKind::LiveStream => None,
            _ => u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0),
        };

        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| open_err(format!("load decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| open_err(format!("unsupported codec: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| open_err(format!("create scaler: {}", e)))?;

        log::info!(
            "FfmpegSource: opened {} ({:.2} fps, frames={:?})",
            locator,
            fps,
            frame_count
        );

        Ok(Self {
            locator: locator.to_string(),
            kind,
            input,
            stream_index,
            decoder,
            scaler,
            frame_interval: interval_from_fps(fps),
            frame_count,
            decoded_frames: 0,
            eof_sent: false,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame, CaptureError> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Read(format!("scale frame to RGB: {}", e)))?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        let frame = Frame::from_rgb(width, height, pixels, self.decoded_frames)
            .ok_or_else(|| CaptureError::Read("decoded frame has unexpected size".to_string()))?;
        self.decoded_frames += 1;
        Ok(frame)
    }
}

impl CaptureSource for FfmpegSource {
    fn read_next(&mut self) -> Result<Frame, CaptureError> {
        let mut decoded = ffmpeg::frame::Video::empty();

        // Drain anything the decoder already holds before feeding more packets.
        if self.decoder.receive_frame(&mut decoded).is_ok() {
            return self.convert(&decoded);
        }
        if self.eof_sent {
            return Err(CaptureError::EndOfStream);
        }

        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| CaptureError::Read(format!("send packet: {}", e)))?;
                    if self.decoder.receive_frame(&mut decoded).is_ok() {
                        return self.convert(&decoded);
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.eof_sent = true;
                    self.decoder
                        .send_eof()
                        .map_err(|e| CaptureError::Read(format!("flush decoder: {}", e)))?;
                    if self.decoder.receive_frame(&mut decoded).is_ok() {
                        return self.convert(&decoded);
                    }
                    return Err(CaptureError::EndOfStream);
                }
                Err(e) => return Err(CaptureError::Read(e.to_string())),
            }
        }
    }

    fn frame_interval_hint(&self) -> Duration {
        self.frame_interval
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.frame_count
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.locator.clone()
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32), CaptureError> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .ok_or_else(|| CaptureError::Read("frame buffer is truncated".to_string()))?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| CaptureError::Read("frame row is out of bounds".to_string()))?,
        );
    }

    Ok((pixels, width, height))
}
