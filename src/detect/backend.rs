use std::sync::{Arc, Mutex};

use crate::detect::result::Detection;
use crate::error::DetectionError;
use crate::frame::{box_thickness, Frame, BOX_COLOR};

/// Engine shared between the registry and the capture loop.
pub type SharedEngine = Arc<Mutex<dyn DetectionEngine>>;

/// Plate detection + recognition capability.
///
/// The loop treats every implementation as a black box: given a frame, return
/// zero or more readings. Errors are per-frame and never stop a session, so an
/// engine should return `Err` rather than retry internally.
pub trait DetectionEngine: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;

    /// Mark accepted detections on the frame sent to the display.
    ///
    /// The default outlines every detection that carries a bounding box.
    fn annotate(&self, frame: &mut Frame, detections: &[Detection]) {
        let thickness = box_thickness(frame.height());
        for bbox in detections.iter().filter_map(|d| d.bbox) {
            frame.draw_box(bbox, BOX_COLOR, thickness);
        }
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
}

/// Wrap an engine for sharing with the loop.
pub fn shared<E: DetectionEngine + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}
