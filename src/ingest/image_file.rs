//! Still image source.
//!
//! A single decoded image behaves like a one-frame bounded source, so the loop
//! treats "open an image" and "open a video" identically.

use std::path::{Path, PathBuf};

use super::{CaptureSource, SourceKind};
use crate::error::CaptureError;
use crate::frame::Frame;

pub struct ImageSource {
    path: PathBuf,
    image: Option<image::RgbImage>,
}

impl ImageSource {
    /// Decode the image eagerly so an unsupported file fails at open time.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let decoded = image::open(path)
            .map_err(|e| CaptureError::open(path.display().to_string(), e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            image: Some(decoded.into_rgb8()),
        })
    }
}

impl CaptureSource for ImageSource {
    fn read_next(&mut self) -> Result<Frame, CaptureError> {
        self.image
            .take()
            .map(|image| Frame::new(image, 0))
            .ok_or(CaptureError::EndOfStream)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(1)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn yields_exactly_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])).save(&path).unwrap();

        let mut source = ImageSource::open(&path).unwrap();
        let frame = source.read_next().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert!(matches!(
            source.read_next(),
            Err(CaptureError::EndOfStream)
        ));
    }

    #[test]
    fn undecodable_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(ImageSource::open(&path).err().unwrap().is_open());
    }
}
