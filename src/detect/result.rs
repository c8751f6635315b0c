use image::RgbImage;

use crate::error::DetectionError;
use crate::frame::BoundingBox;

/// One plate reading produced for a frame.
#[derive(Clone, Debug)]
pub struct Detection {
    /// Recognized plate text.
    pub text: String,
    /// Recognizer confidence in `[0, 1]`.
    pub confidence: f32,
    /// Plate region cut from the frame.
    pub crop: RgbImage,
    /// Where the plate was found, when the engine reports it.
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32, crop: RgbImage) -> Self {
        Self {
            text: text.into(),
            confidence,
            crop,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    fn check(&self) -> Result<(), DetectionError> {
        if self.text.trim().is_empty() {
            return Err(DetectionError::Malformed("empty plate text".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DetectionError::Malformed(format!(
                "confidence {} outside [0, 1] for {}",
                self.confidence, self.text
            )));
        }
        Ok(())
    }
}

/// One OCR reading of a plate crop, before plate-text selection.
#[derive(Clone, Debug, PartialEq)]
pub struct TextCandidate {
    pub text: String,
    pub score: f32,
}

impl TextCandidate {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Reject a whole result if any detection is malformed.
pub fn validate(detections: &[Detection]) -> Result<(), DetectionError> {
    detections.iter().try_for_each(Detection::check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop() -> RgbImage {
        RgbImage::new(4, 2)
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let dets = vec![
            Detection::new("AB123", 0.9, crop()),
            Detection::new("CD456", 1.4, crop()),
        ];
        assert!(matches!(
            validate(&dets),
            Err(DetectionError::Malformed(_))
        ));
        assert!(validate(&[Detection::new("X1", f32::NAN, crop())]).is_err());
    }

    #[test]
    fn rejects_blank_text() {
        assert!(validate(&[Detection::new("  ", 0.5, crop())]).is_err());
        assert!(validate(&[Detection::new("AB123", 0.5, crop())]).is_ok());
    }
}
