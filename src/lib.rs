//! Plate Ledger
//!
//! Captures frames from a still image, video file or network stream, runs a
//! plate detection engine on each frame and keeps a deduplicated log of the
//! plates it has read.
//!
//! # Module Structure
//!
//! - `ingest`: Capture sources and locators (synthetic, image files, HTTP/MJPEG, FFmpeg)
//! - `detect`: Detection engine boundary, plate text selection, engine registry
//! - `session`: The frame loop (pacing, pause/resume/stop, single-flight processing)
//! - `ledger`: Deduplicating plate log, crop storage, filtering, export
//! - `config`: File + environment configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod ledger;
pub mod session;

pub use config::{LedgerBackend, PlateConfig};
pub use detect::{shared, Detection, DetectionEngine, EngineRegistry, SharedEngine, StubEngine};
pub use error::{CaptureError, DetectionError, LedgerError, SessionError};
pub use frame::{BoundingBox, Frame};
pub use ingest::{CaptureSource, Locator, SourceKind};
pub use ledger::{
    AcceptContext, AcceptOutcome, DedupPolicy, FilterCriteria, GlobalUniqueness, Ledger,
    LedgerEntry, PerSourceUniqueness, PolicyKind,
};
pub use session::{
    DetectionRecorder, EndReason, FrameLoop, LoopEvent, LoopOptions, LoopState, Mode, SessionId,
};
