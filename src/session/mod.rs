//! Frame acquisition and processing loop.
//!
//! A `FrameLoop` runs at most one capture session at a time on a dedicated
//! worker thread and reports to its host over a single event channel. The host
//! drives it through `start`, `pause`, `resume` and `stop`; every request is
//! observed at the next iteration boundary. A stop lets the in-flight frame
//! finish before the capture handle is released.

mod events;
mod guard;
mod pacing;
mod recorder;
mod state;
mod worker;

pub use events::{EndReason, LoopEvent};
pub use pacing::{Pacing, DEFAULT_PACING_SCALE, MAX_PACING_INTERVAL};
pub use recorder::{DetectionRecorder, RecordSummary};
pub use state::{LoopState, Mode};

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::detect::SharedEngine;
use crate::error::SessionError;
use crate::ingest::{self, CaptureSource, Locator};

use guard::FlightFlag;
use state::Control;
use worker::Worker;

/// Identifies one capture session within a loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    /// Multiplier applied to the source frame interval to get the sleep between frames.
    pub pacing_scale: f64,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            pacing_scale: DEFAULT_PACING_SCALE,
        }
    }
}

pub struct FrameLoop {
    engine: Option<SharedEngine>,
    options: LoopOptions,
    control: Arc<Control>,
    flight: FlightFlag,
    events: Sender<LoopEvent>,
    join: Option<JoinHandle<()>>,
    current: Option<SessionId>,
    next_id: u64,
}

impl FrameLoop {
    /// Create an idle loop and the receiving end of its event channel.
    pub fn new(engine: Option<SharedEngine>, options: LoopOptions) -> (Self, Receiver<LoopEvent>) {
        let (events, rx) = mpsc::channel();
        let frame_loop = Self {
            engine,
            options,
            control: Arc::new(Control::new()),
            flight: FlightFlag::new(),
            events,
            join: None,
            current: None,
            next_id: 1,
        };
        (frame_loop, rx)
    }

    /// Open `locator` and start a session on it.
    ///
    /// A `Detect` request without an engine is rejected before anything else,
    /// leaving a running session untouched. Otherwise any running session is
    /// stopped first. Open failures are returned before a worker exists, so the
    /// loop stays `Idle` and emits nothing.
    pub fn start(&mut self, locator: &Locator, mode: Mode) -> Result<SessionId, SessionError> {
        self.check_mode(mode)?;
        self.stop();
        let source = ingest::open(locator).map_err(|err| {
            log::warn!("open {} failed: {}", locator, err);
            SessionError::from(err)
        })?;
        self.spawn(source, mode)
    }

    /// Start a session on an already opened source.
    pub fn start_with_source(
        &mut self,
        source: Box<dyn CaptureSource>,
        mode: Mode,
    ) -> Result<SessionId, SessionError> {
        self.check_mode(mode)?;
        self.stop();
        self.spawn(source, mode)
    }

    fn check_mode(&self, mode: Mode) -> Result<(), SessionError> {
        if mode == Mode::Detect && self.engine.is_none() {
            return Err(SessionError::NoEngine);
        }
        Ok(())
    }

    fn spawn(&mut self, source: Box<dyn CaptureSource>, mode: Mode) -> Result<SessionId, SessionError> {
        let session = SessionId(self.next_id);
        self.next_id += 1;

        let pacing = Pacing::new(source.frame_interval_hint(), self.options.pacing_scale);
        let describe = source.describe();
        let kind = source.kind();
        let frame_count = source.frame_count_hint();
        log::info!(
            "session {} starting: {} ({}, {:?}, pacing {:?})",
            session,
            describe,
            kind,
            mode,
            pacing.interval()
        );
        let _ = self.events.send(LoopEvent::SessionStarted {
            session,
            source: describe,
            kind,
            mode,
            frame_count,
        });

        self.control.set(LoopState::Running { mode, paused: false });
        let worker = Worker {
            session,
            source,
            engine: if mode == Mode::Detect {
                self.engine.clone()
            } else {
                None
            },
            mode,
            pacing,
            control: self.control.clone(),
            flight: self.flight.clone(),
            events: self.events.clone(),
        };
        let join = thread::Builder::new()
            .name(format!("frame-loop-{}", session.get()))
            .spawn(move || worker.run())
            .map_err(|err| {
                self.control.set(LoopState::Idle);
                SessionError::Spawn(err)
            })?;

        self.join = Some(join);
        self.current = Some(session);
        Ok(session)
    }

    pub fn pause(&self) {
        self.control.update(|state| match state {
            LoopState::Running { mode, .. } => LoopState::Running { mode, paused: true },
            other => other,
        });
    }

    pub fn resume(&self) {
        self.control.update(|state| match state {
            LoopState::Running { mode, .. } => LoopState::Running {
                mode,
                paused: false,
            },
            other => other,
        });
    }

    /// Flip between paused and playing. Returns the resulting state.
    pub fn toggle_play(&self) -> LoopState {
        self.control.update(|state| match state {
            LoopState::Running { mode, paused } => LoopState::Running {
                mode,
                paused: !paused,
            },
            other => other,
        })
    }

    /// Stop the current session and wait for its worker. No-op when idle.
    pub fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.control.update(|state| match state {
            LoopState::Running { .. } => LoopState::Stopping,
            other => other,
        });
        if join.join().is_err() {
            log::warn!("frame loop worker panicked");
        }
        self.control.set(LoopState::Idle);
        self.current = None;
    }

    /// Block until the current session ends on its own (bounded sources).
    ///
    /// Live sources never end on their own; only `stop()` ends them.
    pub fn wait(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("frame loop worker panicked");
            }
            self.control.set(LoopState::Idle);
            self.current = None;
        }
    }

    pub fn state(&self) -> LoopState {
        self.control.get()
    }

    /// Whether a frame is being processed right now.
    pub fn is_processing(&self) -> bool {
        self.flight.is_held()
    }

    /// Session started last, until it is stopped or waited for.
    pub fn current_session(&self) -> Option<SessionId> {
        self.current
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
