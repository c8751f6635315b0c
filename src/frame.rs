//! Frame container for the capture loop.
//!
//! - `Frame`: owned RGB8 pixels plus the capture sequence number.
//! - `BoundingBox`: pixel-space rectangle produced by plate locators.
//!
//! A frame is produced by a `CaptureSource`, consumed by one processing step,
//! and then handed to the display sink. Nothing in the loop retains it.

use image::{Rgb, RgbImage};

/// Annotation colour for located plates.
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Pixel-space rectangle, `x0,y0` inclusive and `x1,y1` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp to an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.min(width),
            y0: self.y0.min(height),
            x1: self.x1.min(width),
            y1: self.y1.min(height),
        }
    }
}

/// One decoded frame.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// Build a frame from packed RGB8 bytes. Returns `None` when the length does not match.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>, sequence: u64) -> Option<Self> {
        RgbImage::from_raw(width, height, pixels).map(|image| Self { image, sequence })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Copy out the region under `bbox`, clamped to the frame.
    pub fn crop(&self, bbox: BoundingBox) -> RgbImage {
        let b = bbox.clamp_to(self.width(), self.height());
        image::imageops::crop_imm(&self.image, b.x0, b.y0, b.width(), b.height()).to_image()
    }

    /// Draw a rectangle outline. Regions outside the frame are clipped.
    pub fn draw_box(&mut self, bbox: BoundingBox, color: Rgb<u8>, thickness: u32) {
        let b = bbox.clamp_to(self.width(), self.height());
        if b.is_empty() {
            return;
        }
        let (x_last, y_last) = (b.x1 - 1, b.y1 - 1);
        for t in 0..thickness {
            let (xx0, yy0) = (b.x0 + t, b.y0 + t);
            let (xx1, yy1) = (x_last.saturating_sub(t), y_last.saturating_sub(t));
            if xx0 > xx1 || yy0 > yy1 {
                break;
            }
            for x in xx0..=xx1 {
                self.image.put_pixel(x, yy0, color);
                self.image.put_pixel(x, yy1, color);
            }
            for y in yy0..=yy1 {
                self.image.put_pixel(xx0, y, color);
                self.image.put_pixel(xx1, y, color);
            }
        }
    }
}

/// Annotation stroke width for a frame of the given height.
pub fn box_thickness(frame_height: u32) -> u32 {
    frame_height / 720 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(RgbImage::from_pixel(width, height, Rgb([10, 10, 10])), 0)
    }

    #[test]
    fn from_rgb_rejects_wrong_length() {
        assert!(Frame::from_rgb(4, 4, vec![0; 10], 0).is_none());
        assert!(Frame::from_rgb(4, 4, vec![0; 48], 0).is_some());
    }

    #[test]
    fn crop_is_clamped_to_frame() {
        let frame = gray_frame(100, 50);
        let crop = frame.crop(BoundingBox::new(80, 40, 200, 90));
        assert_eq!(crop.dimensions(), (20, 10));
    }

    #[test]
    fn draw_box_outlines_without_filling() {
        let mut frame = gray_frame(20, 20);
        frame.draw_box(BoundingBox::new(2, 2, 10, 10), BOX_COLOR, 1);
        assert_eq!(*frame.image().get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*frame.image().get_pixel(9, 9), BOX_COLOR);
        assert_eq!(*frame.image().get_pixel(5, 5), Rgb([10, 10, 10]));
        assert_eq!(*frame.image().get_pixel(10, 10), Rgb([10, 10, 10]));
    }

    #[test]
    fn thickness_scales_with_height() {
        assert_eq!(box_thickness(480), 1);
        assert_eq!(box_thickness(1080), 2);
        assert_eq!(box_thickness(2160), 4);
    }
}
