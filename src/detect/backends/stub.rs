use sha2::{Digest, Sha256};

use crate::detect::backend::DetectionEngine;
use crate::detect::result::Detection;
use crate::error::DetectionError;
use crate::frame::{BoundingBox, Frame};

const STUB_PLATES: &[&str] = &["LEA4821", "KHI0923", "ISB7730", "RWP1156", "LHR2207"];

/// Stub engine for demos and tests. Hashes pixels to pick a plate.
///
/// Identical frames always produce the same reading, so a static scene keeps
/// reporting one plate until the content changes.
pub struct StubEngine {
    frames_seen: u64,
    threshold: f32,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            frames_seen: 0,
            threshold: 0.0,
        }
    }

    /// Drop readings whose confidence does not exceed `threshold`.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        self.frames_seen += 1;
        let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();

        let text = STUB_PLATES[digest[0] as usize % STUB_PLATES.len()];
        let confidence = 0.80 + f32::from(digest[1] % 20) / 100.0;

        let (w, h) = (frame.width(), frame.height());
        let bbox = BoundingBox::new(w / 3, h / 3, 2 * w / 3, 2 * h / 3);
        // Anything under 2x2 is too small to hold a plate.
        if bbox.width() < 2 || bbox.height() < 2 || confidence <= self.threshold {
            return Ok(Vec::new());
        }
        Ok(vec![
            Detection::new(text, confidence, frame.crop(bbox)).with_bbox(bbox)
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn same_pixels_same_plate() {
        let mut engine = StubEngine::new();
        let frame = Frame::new(RgbImage::from_pixel(90, 60, Rgb([7, 8, 9])), 0);
        let a = engine.detect(&frame).unwrap();
        let b = engine.detect(&frame).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].text, b[0].text);
        assert!((0.0..=1.0).contains(&a[0].confidence));
        assert_eq!(a[0].crop.dimensions(), (30, 20));
        assert_eq!(engine.frames_seen(), 2);
    }

    #[test]
    fn tiny_frames_yield_nothing() {
        let mut engine = StubEngine::new();
        for (w, h) in [(2, 2), (3, 3), (90, 4)] {
            let frame = Frame::new(RgbImage::new(w, h), 0);
            assert!(engine.detect(&frame).unwrap().is_empty(), "{w}x{h}");
        }
        let frame = Frame::new(RgbImage::new(6, 6), 0);
        assert_eq!(engine.detect(&frame).unwrap()[0].crop.dimensions(), (2, 2));
    }

    #[test]
    fn threshold_filters_weak_readings() {
        let mut engine = StubEngine::new().with_threshold(1.0);
        let frame = Frame::new(RgbImage::from_pixel(90, 60, Rgb([1, 2, 3])), 0);
        assert!(engine.detect(&frame).unwrap().is_empty());
    }
}
