mod backend;
mod backends;
pub mod pipeline;
pub mod plate;
mod registry;
mod result;

pub use backend::{shared, DetectionEngine, SharedEngine};
pub use backends::StubEngine;
pub use pipeline::{PlateLocator, PlatePipeline, TextRecognizer};
pub use plate::{normalize_plate_text, select_plate_text};
pub use registry::EngineRegistry;
pub use result::{validate, Detection, TextCandidate};
