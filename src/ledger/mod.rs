//! Deduplicating, append-only log of accepted plate readings.
//!
//! The ledger keeps every row in capture order and an index of dedup keys
//! derived by the configured `DedupPolicy`. The index is rebuilt from the
//! backing store whenever rows are removed.

pub mod crops;
mod entry;
pub mod export;
mod filter;
mod policy;
mod sqlite;
mod store;

pub use crops::{crop_key, CropStore, FilesystemCropStore};
pub use entry::{LedgerEntry, TIMESTAMP_FORMAT};
pub use export::{export_rows, ExportFormat};
pub use filter::{FilterCriteria, ANY_SOURCE};
pub use policy::{DedupKey, DedupPolicy, GlobalUniqueness, PerSourceUniqueness, PolicyKind};
pub use sqlite::SqliteLedgerStore;
pub use store::{CsvLedgerStore, InMemoryLedgerStore, LedgerStore, CSV_HEADER};

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::detect::Detection;
use crate::error::LedgerError;

/// Where and when a reading was captured.
#[derive(Clone, Debug)]
pub struct AcceptContext {
    pub source_label: String,
    pub sequence_number: u64,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Appended,
    DuplicateSkipped,
}

pub struct Ledger {
    store: Box<dyn LedgerStore>,
    policy: Box<dyn DedupPolicy>,
    crops: Option<Box<dyn CropStore>>,
    entries: Vec<LedgerEntry>,
    seen: HashSet<DedupKey>,
}

impl Ledger {
    pub fn open(
        store: Box<dyn LedgerStore>,
        policy: Box<dyn DedupPolicy>,
        crops: Option<Box<dyn CropStore>>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            store,
            policy,
            crops,
            entries: Vec::new(),
            seen: HashSet::new(),
        };
        ledger.reload()?;
        log::info!(
            "ledger {} opened with {} rows (policy {})",
            ledger.store.describe(),
            ledger.entries.len(),
            ledger.policy.name()
        );
        Ok(ledger)
    }

    /// In-memory ledger without crop storage.
    pub fn in_memory(policy: Box<dyn DedupPolicy>) -> Self {
        Self {
            store: Box::new(InMemoryLedgerStore::new()),
            policy,
            crops: None,
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Re-read every row from the backing store and rebuild the dedup index.
    pub fn reload(&mut self) -> Result<(), LedgerError> {
        self.entries = self.store.load()?;
        self.seen = self
            .entries
            .iter()
            .map(|e| self.policy.key(&e.plate_text, &e.source_label))
            .collect();
        Ok(())
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn is_duplicate(&self, plate_text: &str, source_label: &str) -> bool {
        self.seen.contains(&self.policy.key(plate_text, source_label))
    }

    /// Append `detection` unless the policy considers it already seen.
    pub fn accept(
        &mut self,
        detection: &Detection,
        ctx: &AcceptContext,
    ) -> Result<AcceptOutcome, LedgerError> {
        if self.is_duplicate(&detection.text, &ctx.source_label) {
            return Ok(AcceptOutcome::DuplicateSkipped);
        }
        self.append(detection, ctx)?;
        Ok(AcceptOutcome::Appended)
    }

    /// Append without the duplicate check.
    pub fn force_append(
        &mut self,
        detection: &Detection,
        ctx: &AcceptContext,
    ) -> Result<AcceptOutcome, LedgerError> {
        self.append(detection, ctx)?;
        Ok(AcceptOutcome::Appended)
    }

    fn append(&mut self, detection: &Detection, ctx: &AcceptContext) -> Result<(), LedgerError> {
        if let Some(crops) = self.crops.as_mut() {
            crops.save(&detection.text, &detection.crop)?;
        }
        let entry = LedgerEntry {
            timestamp: ctx.timestamp,
            plate_text: detection.text.clone(),
            confidence: detection.confidence,
            source_label: ctx.source_label.clone(),
            sequence_number: ctx.sequence_number,
        };
        self.store.append(&entry)?;
        self.seen
            .insert(self.policy.key(&entry.plate_text, &entry.source_label));
        log::info!(
            "logged {} ({:.2}) from {} at frame {}",
            entry.plate_text,
            entry.confidence,
            entry.source_label,
            entry.sequence_number
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Rows most-recent-first, optionally filtered.
    pub fn read(&self, criteria: Option<&FilterCriteria>) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| criteria.map_or(true, |c| c.matches(entry)))
            .cloned()
            .collect()
    }

    /// Remove the oldest row with this plate text.
    pub fn delete(&mut self, plate_text: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let removed = self.store.delete_first(plate_text)?;
        if removed.is_some() {
            self.reload()?;
        }
        Ok(removed)
    }

    /// Remove every row.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        self.store.clear()?;
        self.reload()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn crop_for(&self, plate_text: &str) -> Option<PathBuf> {
        self.crops.as_ref().and_then(|c| c.locate(plate_text))
    }
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::RgbImage;

    fn ctx(source: &str, seq: u64) -> AcceptContext {
        AcceptContext {
            source_label: source.to_string(),
            sequence_number: seq,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    fn det(text: &str) -> Detection {
        Detection::new(text, 0.9, RgbImage::new(4, 2))
    }

    #[test]
    fn read_is_most_recent_first() {
        let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
        for (i, plate) in ["A1", "B2", "C3"].iter().enumerate() {
            ledger.accept(&det(plate), &ctx("Video", i as u64)).unwrap();
        }
        let plates: Vec<String> = ledger.read(None).into_iter().map(|e| e.plate_text).collect();
        assert_eq!(plates, vec!["C3", "B2", "A1"]);
    }

    #[test]
    fn force_append_bypasses_dedup() {
        let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
        ledger.accept(&det("A1"), &ctx("Video", 0)).unwrap();
        assert_eq!(
            ledger.accept(&det("A1"), &ctx("Video", 1)).unwrap(),
            AcceptOutcome::DuplicateSkipped
        );
        assert_eq!(
            ledger.force_append(&det("A1"), &ctx("Video", 2)).unwrap(),
            AcceptOutcome::Appended
        );
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn delete_reopens_plate_for_logging() {
        let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
        ledger.accept(&det("A1"), &ctx("Video", 0)).unwrap();
        assert!(ledger.delete("A1").unwrap().is_some());
        assert!(ledger.is_empty());
        assert_eq!(
            ledger.accept(&det("A1"), &ctx("Video", 1)).unwrap(),
            AcceptOutcome::Appended
        );
    }
}
