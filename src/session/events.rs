use crate::detect::Detection;
use crate::frame::Frame;
use crate::ingest::SourceKind;

use super::state::Mode;
use super::SessionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// A bounded source ran past its last frame.
    Exhausted,
    /// `stop()` was requested.
    Stopped,
    /// The source failed mid-session.
    ReadFailed,
    /// The event receiver was dropped.
    HostGone,
}

/// Messages from the worker to its host, in emission order.
///
/// For one sequence number `FrameReady` always precedes `DetectionsReady`.
pub enum LoopEvent {
    SessionStarted {
        session: SessionId,
        source: String,
        kind: SourceKind,
        mode: Mode,
        frame_count: Option<u64>,
    },
    FrameReady {
        session: SessionId,
        sequence: u64,
        frame: Frame,
    },
    DetectionsReady {
        session: SessionId,
        sequence: u64,
        source_label: String,
        detections: Vec<Detection>,
    },
    SessionEnded {
        session: SessionId,
        reason: EndReason,
        frames: u64,
    },
}

impl LoopEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::SessionStarted { session, .. }
            | Self::FrameReady { session, .. }
            | Self::DetectionsReady { session, .. }
            | Self::SessionEnded { session, .. } => *session,
        }
    }
}

impl std::fmt::Debug for LoopEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionStarted {
                session,
                source,
                kind,
                mode,
                frame_count,
            } => f
                .debug_struct("SessionStarted")
                .field("session", session)
                .field("source", source)
                .field("kind", kind)
                .field("mode", mode)
                .field("frame_count", frame_count)
                .finish(),
            Self::FrameReady {
                session, sequence, ..
            } => f
                .debug_struct("FrameReady")
                .field("session", session)
                .field("sequence", sequence)
                .finish_non_exhaustive(),
            Self::DetectionsReady {
                session,
                sequence,
                detections,
                ..
            } => f
                .debug_struct("DetectionsReady")
                .field("session", session)
                .field("sequence", sequence)
                .field("count", &detections.len())
                .finish_non_exhaustive(),
            Self::SessionEnded {
                session,
                reason,
                frames,
            } => f
                .debug_struct("SessionEnded")
                .field("session", session)
                .field("reason", reason)
                .field("frames", frames)
                .finish(),
        }
    }
}
