use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError};

use crate::detect::{validate, Detection, SharedEngine};
use crate::error::{CaptureError, DetectionError};
use crate::frame::Frame;
use crate::ingest::CaptureSource;

use super::events::{EndReason, LoopEvent};
use super::guard::FlightFlag;
use super::pacing::Pacing;
use super::state::{Boundary, Control, LoopState, Mode};
use super::SessionId;

/// Everything one session's worker thread owns.
pub(crate) struct Worker {
    pub(crate) session: SessionId,
    pub(crate) source: Box<dyn CaptureSource>,
    pub(crate) engine: Option<SharedEngine>,
    pub(crate) mode: Mode,
    pub(crate) pacing: Pacing,
    pub(crate) control: Arc<Control>,
    pub(crate) flight: FlightFlag,
    pub(crate) events: Sender<LoopEvent>,
}

enum Step {
    Next,
    End(EndReason),
}

impl Worker {
    /// Run until the source is exhausted, fails, or a stop is requested.
    pub(crate) fn run(mut self) {
        let upper = self.source.frame_count_hint().map(|n| n.checked_sub(1));
        let label = self.source.kind().label().to_string();
        let mut sequence: u64 = 0;

        let reason = loop {
            if self.control.boundary() == Boundary::Stop {
                break EndReason::Stopped;
            }
            match upper {
                // A source announcing zero frames is exhausted before it starts.
                Some(None) => break EndReason::Exhausted,
                Some(Some(upper)) if sequence > upper => break EndReason::Exhausted,
                _ => {}
            }

            let flight = self.flight.clone();
            let Some(guard) = flight.try_acquire() else {
                // Nothing was read, so the sequence number is not consumed.
                log::warn!("session {}: frame step already in flight", self.session);
                self.control.sleep(self.pacing.interval());
                continue;
            };
            if let Step::End(reason) = self.process(sequence, &label) {
                break reason;
            }
            drop(guard);

            sequence += 1;
            self.control.sleep(self.pacing.interval());
        };

        log::info!(
            "session {} ended ({:?}) after {} frames from {}",
            self.session,
            reason,
            sequence,
            self.source.describe()
        );
        let Worker {
            session,
            source,
            control,
            events,
            ..
        } = self;
        drop(source);
        control.set(LoopState::Idle);
        let _ = events.send(LoopEvent::SessionEnded {
            session,
            reason,
            frames: sequence,
        });
    }

    fn process(&mut self, sequence: u64, label: &str) -> Step {
        let mut frame = match self.source.read_next() {
            Ok(frame) => frame,
            Err(CaptureError::EndOfStream) => return Step::End(EndReason::Exhausted),
            Err(err) => {
                log::warn!("session {}: {}", self.session, err);
                return Step::End(EndReason::ReadFailed);
            }
        };
        frame.set_sequence(sequence);

        let detections = match (self.mode, &self.engine) {
            (Mode::Detect, Some(engine)) => detect_and_annotate(engine, &mut frame),
            _ => Vec::new(),
        };

        let sent = self.events.send(LoopEvent::FrameReady {
            session: self.session,
            sequence,
            frame,
        });
        if sent.is_err() {
            return Step::End(EndReason::HostGone);
        }
        if !detections.is_empty() {
            let sent = self.events.send(LoopEvent::DetectionsReady {
                session: self.session,
                sequence,
                source_label: label.to_string(),
                detections,
            });
            if sent.is_err() {
                return Step::End(EndReason::HostGone);
            }
        }
        Step::Next
    }
}

/// Run the engine on one frame. Any failure counts as zero detections.
fn detect_and_annotate(engine: &SharedEngine, frame: &mut Frame) -> Vec<Detection> {
    // A panic inside `detect` poisons the lock; the engine is still usable.
    let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.detect(frame)))
        .unwrap_or(Err(DetectionError::Panicked))
        .and_then(|detections| validate(&detections).map(|_| detections));
    match outcome {
        Ok(detections) => {
            let mut annotated = frame.clone();
            let drawn = panic::catch_unwind(AssertUnwindSafe(|| {
                engine.annotate(&mut annotated, &detections)
            }));
            match drawn {
                Ok(()) => *frame = annotated,
                Err(_) => log::debug!("frame {}: annotation panicked", frame.sequence()),
            }
            detections
        }
        Err(err) => {
            log::debug!("frame {}: {}", frame.sequence(), err);
            Vec::new()
        }
    }
}
