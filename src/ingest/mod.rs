//! Frame ingestion sources.
//!
//! This module provides the sources the capture loop can open:
//! - Synthetic source (`stub://`), bounded or live, for tests and demos
//! - Still images (png/jpeg/bmp) as a one-frame source
//! - Local video files and RTSP streams (feature: ingest-ffmpeg)
//! - HTTP MJPEG / JPEG snapshot cameras (feature: ingest-http)
//!
//! Every source reports a natural frame interval and, when it is bounded, a
//! frame count. Opening fails with `CaptureError::Open`; once open, sources
//! only fail with `CaptureError::Read` or signal `CaptureError::EndOfStream`.

#[cfg(feature = "ingest-ffmpeg")]
pub mod ffmpeg;
#[cfg(feature = "ingest-http")]
pub mod http;
pub mod image_file;
pub mod synthetic;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::CaptureError;
use crate::frame::Frame;

#[cfg(feature = "ingest-ffmpeg")]
pub use ffmpeg::FfmpegSource;
#[cfg(feature = "ingest-http")]
pub use http::HttpSource;
pub use image_file::ImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Interval reported by sources that do not know their frame rate.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Sequential frame source. Owned exclusively by one running session.
pub trait CaptureSource: Send {
    /// Pull the next frame. Sequence numbers are assigned by the caller.
    fn read_next(&mut self) -> Result<Frame, CaptureError>;

    /// Natural inter-frame interval of the source.
    fn frame_interval_hint(&self) -> Duration {
        DEFAULT_FRAME_INTERVAL
    }

    /// Total frames for bounded sources; `None` for live streams.
    fn frame_count_hint(&self) -> Option<u64>;

    fn kind(&self) -> SourceKind;

    /// Human-readable identity for logs.
    fn describe(&self) -> String;
}

/// Slowest frame interval a source may report.
pub const MAX_FRAME_INTERVAL: Duration = Duration::from_secs(60);

/// Convert a reported frame rate to an interval, falling back to the default.
pub fn interval_from_fps(fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::try_from_secs_f64(1.0 / fps)
            .map_or(MAX_FRAME_INTERVAL, |d| d.min(MAX_FRAME_INTERVAL))
    } else {
        DEFAULT_FRAME_INTERVAL
    }
}

/// Media kind of a source; its label is what the ledger records as the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
    LiveStream,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Image => "Image",
            SourceKind::Video => "Video",
            SourceKind::LiveStream => "Live Stream",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where to capture from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    /// `stub://name?frames=N&fps=F&width=W&height=H`
    Synthetic(Url),
    /// Local still image or video file.
    File(PathBuf),
    /// Network stream (`http`, `https`, `rtsp`).
    Stream(Url),
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self, CaptureError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CaptureError::open(raw, "empty locator"));
        }
        if !trimmed.contains("://") {
            return Ok(Locator::File(PathBuf::from(trimmed)));
        }
        let url = Url::parse(trimmed).map_err(|e| CaptureError::open(trimmed, e.to_string()))?;
        match url.scheme() {
            "stub" => Ok(Locator::Synthetic(url)),
            "file" => url
                .to_file_path()
                .map(Locator::File)
                .map_err(|_| CaptureError::open(trimmed, "invalid file url")),
            "http" | "https" | "rtsp" | "rtsps" => Ok(Locator::Stream(url)),
            other => Err(CaptureError::open(
                trimmed,
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    /// IP-webcam address (`host:port`) to its `/video` stream URL.
    pub fn ip_camera(address: &str) -> Result<Self, CaptureError> {
        let address = address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(CaptureError::open(address, "empty camera address"));
        }
        Self::parse(&format!("https://{}/video", address))
    }

    /// Kind implied by the locator alone.
    pub fn kind(&self) -> SourceKind {
        match self {
            Locator::Synthetic(url) => {
                if synthetic::frames_param(url).is_some() {
                    SourceKind::Video
                } else {
                    SourceKind::LiveStream
                }
            }
            Locator::File(path) => {
                if is_still_image(path) {
                    SourceKind::Image
                } else {
                    SourceKind::Video
                }
            }
            Locator::Stream(_) => SourceKind::LiveStream,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Synthetic(url) | Locator::Stream(url) => write!(f, "{}", url),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn is_still_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

/// Open the source named by `locator` with whichever backend handles it.
pub fn open(locator: &Locator) -> Result<Box<dyn CaptureSource>, CaptureError> {
    let source: Box<dyn CaptureSource> = match locator {
        Locator::Synthetic(url) => Box::new(SyntheticSource::new(SyntheticConfig::from_url(url)?)),
        Locator::File(path) => open_file(path)?,
        Locator::Stream(url) => open_stream(url)?,
    };
    log::info!(
        "opened {} source {} (frames={:?})",
        source.kind(),
        source.describe(),
        source.frame_count_hint()
    );
    Ok(source)
}

fn open_file(path: &Path) -> Result<Box<dyn CaptureSource>, CaptureError> {
    let display = path.display().to_string();
    if !path.is_file() {
        return Err(CaptureError::open(display, "file not found"));
    }
    if is_still_image(path) {
        return Ok(Box::new(ImageSource::open(path)?));
    }
    #[cfg(feature = "ingest-ffmpeg")]
    {
        Ok(Box::new(FfmpegSource::open(&display, SourceKind::Video)?))
    }
    #[cfg(not(feature = "ingest-ffmpeg"))]
    {
        Err(CaptureError::open(
            display,
            "video files require the ingest-ffmpeg feature",
        ))
    }
}

fn open_stream(url: &Url) -> Result<Box<dyn CaptureSource>, CaptureError> {
    match url.scheme() {
        #[cfg(feature = "ingest-http")]
        "http" | "https" => {
            let mut source = HttpSource::new(url.clone());
            source.connect()?;
            Ok(Box::new(source))
        }
        #[cfg(feature = "ingest-ffmpeg")]
        _ => Ok(Box::new(FfmpegSource::open(
            url.as_str(),
            SourceKind::LiveStream,
        )?)),
        #[cfg(not(feature = "ingest-ffmpeg"))]
        other => Err(CaptureError::open(
            url.as_str(),
            format!("no stream backend compiled in for '{}'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locators_by_scheme() {
        assert!(matches!(
            Locator::parse("stub://lot?frames=3").unwrap(),
            Locator::Synthetic(_)
        ));
        assert!(matches!(
            Locator::parse("/var/media/gate.mp4").unwrap(),
            Locator::File(_)
        ));
        assert!(matches!(
            Locator::parse("rtsp://10.0.0.2:554/stream").unwrap(),
            Locator::Stream(_)
        ));
        assert!(Locator::parse("ftp://host/file").unwrap_err().is_open());
        assert!(Locator::parse("  ").unwrap_err().is_open());
    }

    #[test]
    fn ip_camera_uses_video_endpoint() {
        let locator = Locator::ip_camera("192.168.1.20:8080").unwrap();
        assert_eq!(locator.to_string(), "https://192.168.1.20:8080/video");
        assert_eq!(locator.kind(), SourceKind::LiveStream);
    }

    #[test]
    fn kind_follows_extension_and_bounds() {
        assert_eq!(
            Locator::parse("plate.jpg").unwrap().kind(),
            SourceKind::Image
        );
        assert_eq!(
            Locator::parse("clip.mp4").unwrap().kind(),
            SourceKind::Video
        );
        assert_eq!(
            Locator::parse("stub://cam").unwrap().kind(),
            SourceKind::LiveStream
        );
        assert_eq!(
            Locator::parse("stub://cam?frames=5").unwrap().kind(),
            SourceKind::Video
        );
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let locator = Locator::parse("/definitely/not/here.mp4").unwrap();
        let err = open(&locator).err().expect("open must fail");
        assert!(err.is_open());
    }

    #[test]
    fn fps_to_interval() {
        assert_eq!(interval_from_fps(25.0), Duration::from_millis(40));
        assert_eq!(interval_from_fps(0.0), DEFAULT_FRAME_INTERVAL);
        assert_eq!(interval_from_fps(f64::NAN), DEFAULT_FRAME_INTERVAL);
        assert_eq!(interval_from_fps(1e-300), MAX_FRAME_INTERVAL);
    }
}
