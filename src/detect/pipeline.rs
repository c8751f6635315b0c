//! Two-stage plate pipeline: locate plates, then read each crop.
//!
//! Both stages are model-backed and live outside this crate; they plug in
//! through `PlateLocator` and `TextRecognizer`.

use image::RgbImage;

use super::backend::DetectionEngine;
use super::plate::select_plate_text;
use super::result::{Detection, TextCandidate};
use crate::error::DetectionError;
use crate::frame::{BoundingBox, Frame};

/// Default minimum OCR score for a plate reading.
pub const DEFAULT_TEXT_THRESHOLD: f32 = 0.5;

/// Finds plate regions in a frame.
pub trait PlateLocator: Send {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError>;
}

/// Reads text lines from a plate crop.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, crop: &RgbImage) -> Result<Vec<TextCandidate>, DetectionError>;
}

pub struct PlatePipeline<L, R> {
    locator: L,
    recognizer: R,
    threshold: f32,
}

impl<L: PlateLocator, R: TextRecognizer> PlatePipeline<L, R> {
    pub fn new(locator: L, recognizer: R) -> Self {
        Self {
            locator,
            recognizer,
            threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }
}

impl<L: PlateLocator, R: TextRecognizer> DetectionEngine for PlatePipeline<L, R> {
    fn name(&self) -> &'static str {
        "plate-pipeline"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        let boxes = self.locator.locate(frame)?;
        let mut detections = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let bbox = bbox.clamp_to(frame.width(), frame.height());
            if bbox.is_empty() {
                continue;
            }
            let crop = frame.crop(bbox);
            let candidates = self.recognizer.recognize(&crop)?;
            // Located but unreadable plates are not reported.
            if let Some((text, score)) = select_plate_text(&candidates, self.threshold) {
                detections.push(Detection::new(text, score, crop).with_bbox(bbox));
            }
        }
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct FixedBoxes(Vec<BoundingBox>);

    impl PlateLocator for FixedBoxes {
        fn locate(&mut self, _frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    /// Reads the crop width back as text so each box yields a distinct reading.
    struct WidthReader;

    impl TextRecognizer for WidthReader {
        fn recognize(&mut self, crop: &RgbImage) -> Result<Vec<TextCandidate>, DetectionError> {
            Ok(vec![
                TextCandidate::new("REGION", 0.99),
                TextCandidate::new(format!("W-{}", crop.width()), 0.8),
            ])
        }
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(100, 80, Rgb([0, 0, 0])), 3)
    }

    #[test]
    fn reads_each_located_plate() {
        let mut pipeline = PlatePipeline::new(
            FixedBoxes(vec![
                BoundingBox::new(0, 0, 30, 10),
                BoundingBox::new(50, 50, 90, 70),
            ]),
            WidthReader,
        );
        let dets = pipeline.detect(&frame()).unwrap();
        let texts: Vec<&str> = dets.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["W30", "W40"]);
        assert_eq!(dets[1].crop.dimensions(), (40, 20));
        assert_eq!(dets[1].bbox, Some(BoundingBox::new(50, 50, 90, 70)));
    }

    #[test]
    fn skips_boxes_outside_the_frame() {
        let mut pipeline = PlatePipeline::new(
            FixedBoxes(vec![BoundingBox::new(200, 200, 300, 300)]),
            WidthReader,
        );
        assert!(pipeline.detect(&frame()).unwrap().is_empty());
    }

    #[test]
    fn annotation_outlines_plates() {
        let mut pipeline =
            PlatePipeline::new(FixedBoxes(vec![BoundingBox::new(10, 10, 40, 20)]), WidthReader);
        let mut f = frame();
        let dets = pipeline.detect(&f).unwrap();
        pipeline.annotate(&mut f, &dets);
        assert_eq!(*f.image().get_pixel(10, 10), crate::frame::BOX_COLOR);
    }
}
