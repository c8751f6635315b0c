//! Synthetic frame source (`stub://`).
//!
//! Generates deterministic frames so the loop, the stub engine and the ledger
//! can be exercised without media files or cameras. With `frames=N` the source
//! behaves like a bounded video; without it, like a live stream.

use std::time::Duration;

use image::{Rgb, RgbImage};
use url::Url;

use super::{interval_from_fps, CaptureSource, SourceKind};
use crate::error::CaptureError;
use crate::frame::Frame;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    /// Total frames; `None` makes the source live.
    pub frames: Option<u64>,
    /// Reported frame rate.
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "synthetic".to_string(),
            frames: None,
            fps: 25.0,
            width: 320,
            height: 240,
        }
    }
}

impl SyntheticConfig {
    pub fn from_url(url: &Url) -> Result<Self, CaptureError> {
        let mut cfg = Self {
            name: url.host_str().unwrap_or("synthetic").to_string(),
            ..Self::default()
        };
        for (key, value) in url.query_pairs() {
            let bad = |reason: &str| CaptureError::open(url.as_str(), format!("{key}: {reason}"));
            match key.as_ref() {
                "frames" => cfg.frames = Some(value.parse().map_err(|_| bad("not an integer"))?),
                "fps" => cfg.fps = value.parse().map_err(|_| bad("not a number"))?,
                "width" => cfg.width = value.parse().map_err(|_| bad("not an integer"))?,
                "height" => cfg.height = value.parse().map_err(|_| bad("not an integer"))?,
                _ => log::debug!("ignoring unknown stub parameter {}", key),
            }
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(CaptureError::open(url.as_str(), "frame size must be non-zero"));
        }
        Ok(cfg)
    }

    pub fn bounded(frames: u64) -> Self {
        Self {
            frames: Some(frames),
            ..Self::default()
        }
    }
}

pub(crate) fn frames_param(url: &Url) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| key == "frames")
        .and_then(|(_, value)| value.parse().ok())
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    produced: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!("SyntheticSource: connected to stub://{}", config.name);
        Self {
            config,
            produced: 0,
            scene_state: 0,
        }
    }

    /// Frames produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn generate(&mut self) -> RgbImage {
        // A new "vehicle" enters every 50 frames.
        if self.produced % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.scene_state as u32;
        RgbImage::from_fn(self.config.width, self.config.height, |x, y| {
            let v = ((x + y + shift * 37) % 256) as u8;
            Rgb([v, v.wrapping_add(shift as u8), 255 - v])
        })
    }
}

impl CaptureSource for SyntheticSource {
    fn read_next(&mut self) -> Result<Frame, CaptureError> {
        if let Some(total) = self.config.frames {
            if self.produced >= total {
                return Err(CaptureError::EndOfStream);
            }
        }
        let image = self.generate();
        let frame = Frame::new(image, self.produced);
        self.produced += 1;
        Ok(frame)
    }

    fn frame_interval_hint(&self) -> Duration {
        interval_from_fps(self.config.fps)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.config.frames
    }

    fn kind(&self) -> SourceKind {
        if self.config.frames.is_some() {
            SourceKind::Video
        } else {
            SourceKind::LiveStream
        }
    }

    fn describe(&self) -> String {
        format!("stub://{}", self.config.name)
    }
}
