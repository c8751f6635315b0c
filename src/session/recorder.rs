use chrono::{Local, NaiveDateTime};

use crate::error::LedgerError;
use crate::ledger::{AcceptContext, AcceptOutcome, Ledger};

use super::events::LoopEvent;

/// What one `DetectionsReady` event did to the ledger.
#[derive(Debug, Default)]
pub struct RecordSummary {
    pub appended: Vec<String>,
    pub skipped: usize,
    /// Persistence failures. The session keeps running regardless.
    pub warnings: Vec<LedgerError>,
}

/// Feeds detections from the frame loop into a ledger, in event order.
pub struct DetectionRecorder {
    ledger: Ledger,
    clock: Box<dyn FnMut() -> NaiveDateTime + Send>,
    last_timestamp: Option<NaiveDateTime>,
}

impl DetectionRecorder {
    pub fn new(ledger: Ledger) -> Self {
        Self::with_clock(ledger, || Local::now().naive_local())
    }

    pub fn with_clock(ledger: Ledger, clock: impl FnMut() -> NaiveDateTime + Send + 'static) -> Self {
        Self {
            ledger,
            clock: Box::new(clock),
            last_timestamp: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    /// Record detections carried by `event`; other events are ignored.
    pub fn handle(&mut self, event: &LoopEvent) -> Option<RecordSummary> {
        let LoopEvent::DetectionsReady {
            sequence,
            source_label,
            detections,
            ..
        } = event
        else {
            return None;
        };

        // Wall-clock steps backwards must not reorder rows of one session.
        let now = (self.clock)();
        let timestamp = match self.last_timestamp {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);

        let ctx = AcceptContext {
            source_label: source_label.clone(),
            sequence_number: *sequence,
            timestamp,
        };
        let mut summary = RecordSummary::default();
        for detection in detections {
            match self.ledger.accept(detection, &ctx) {
                Ok(AcceptOutcome::Appended) => summary.appended.push(detection.text.clone()),
                Ok(AcceptOutcome::DuplicateSkipped) => summary.skipped += 1,
                Err(err) => {
                    log::warn!("failed to record {}: {}", detection.text, err);
                    summary.warnings.push(err);
                }
            }
        }
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::ledger::GlobalUniqueness;
    use crate::session::SessionId;
    use chrono::{Duration, NaiveDate};
    use image::RgbImage;

    fn detections_event(sequence: u64, plates: &[&str]) -> LoopEvent {
        LoopEvent::DetectionsReady {
            session: SessionId(1),
            sequence,
            source_label: "Video".into(),
            detections: plates
                .iter()
                .map(|p| Detection::new(*p, 0.9, RgbImage::new(2, 2)))
                .collect(),
        }
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut ticks = vec![base, base - Duration::hours(1)].into_iter();
        let ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
        let mut recorder = DetectionRecorder::with_clock(ledger, move || {
            ticks.next().unwrap_or(base)
        });

        recorder.handle(&detections_event(0, &["A1"])).unwrap();
        recorder.handle(&detections_event(1, &["B2"])).unwrap();
        let rows = recorder.ledger().read(None);
        assert_eq!(rows[0].timestamp, base);
        assert_eq!(rows[1].timestamp, base);
    }

    #[test]
    fn duplicates_are_counted_not_logged() {
        let mut recorder = DetectionRecorder::new(Ledger::in_memory(Box::new(GlobalUniqueness)));
        let summary = recorder
            .handle(&detections_event(0, &["A1", "A1", "B2"]))
            .unwrap();
        assert_eq!(summary.appended, vec!["A1", "B2"]);
        assert_eq!(summary.skipped, 1);
        assert!(summary.warnings.is_empty());
        assert_eq!(recorder.ledger().len(), 2);
    }
}
