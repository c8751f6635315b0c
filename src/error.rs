//! Error taxonomy for capture, detection, persistence and session control.
//!
//! The split matters to the frame loop: an `Open` failure is fatal before any
//! frame is produced, a `Read` failure aborts a running session, detection
//! failures are swallowed per frame, and ledger failures are surfaced to the
//! host as warnings.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Source unreachable, missing, or in a format no compiled-in backend can decode.
    #[error("cannot open source {locator}: {reason}")]
    Open { locator: String, reason: String },

    /// Transient failure on an already-open source.
    #[error("failed to read frame: {0}")]
    Read(String),

    /// The source has no more frames.
    #[error("end of stream")]
    EndOfStream,
}

impl CaptureError {
    pub fn open(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Open {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detector backend failed: {0}")]
    Backend(String),

    #[error("detector returned a malformed result: {0}")]
    Malformed(String),

    #[error("detector panicked")]
    Panicked,
}

/// Ledger read/write failures (the persistence class).
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("ledger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("crop image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("corrupt ledger row at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unsupported export target: {0}")]
    UnsupportedExport(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Open(#[from] CaptureError),

    #[error("detect mode requires a detection engine")]
    NoEngine,

    #[error("failed to spawn capture worker: {0}")]
    Spawn(#[source] io::Error),
}

impl SessionError {
    /// Single human-readable status line for the host.
    pub fn status_message(&self) -> String {
        match self {
            Self::Open(CaptureError::Open { locator, .. }) => {
                format!("Source {} is invalid or unreachable.", locator)
            }
            Self::Open(other) => format!("Source failed: {}", other),
            Self::NoEngine => "Detection is unavailable: no engine configured.".to_string(),
            Self::Spawn(_) => "Could not start processing.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_are_distinguishable_from_read_errors() {
        assert!(CaptureError::open("missing.mp4", "not found").is_open());
        assert!(!CaptureError::Read("decoder hiccup".into()).is_open());
        assert!(!CaptureError::EndOfStream.is_open());
    }

    #[test]
    fn status_message_names_the_locator() {
        let err = SessionError::from(CaptureError::open("rtsp://cam", "refused"));
        assert_eq!(
            err.status_message(),
            "Source rtsp://cam is invalid or unreachable."
        );
    }
}
