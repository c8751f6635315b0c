use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;

use super::entry::LedgerEntry;

/// Source label that matches every source.
pub const ANY_SOURCE: &str = "All";

/// Constraints for `Ledger::read`. A row passes only when every supplied constraint holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterCriteria {
    /// Substring the plate text must contain.
    pub plate_substring: Option<String>,
    pub min_confidence: Option<f32>,
    /// Exact source label; `"All"` matches any.
    pub source_label: Option<String>,
    /// Inclusive lower bound on the entry's calendar date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the entry's calendar date.
    pub date_to: Option<NaiveDate>,
}

impl FilterCriteria {
    /// Build criteria from raw report-view inputs. Empty strings mean "not supplied".
    pub fn from_inputs(
        plate: &str,
        min_confidence: &str,
        source_label: &str,
        date_from: &str,
        date_to: &str,
    ) -> Result<Self> {
        let confidence = match non_empty(min_confidence) {
            Some(raw) => {
                let value: f32 = raw
                    .parse()
                    .with_context(|| format!("invalid confidence '{}'", raw))?;
                if !value.is_finite() {
                    return Err(anyhow!("invalid confidence '{}'", raw));
                }
                Some(value)
            }
            None => None,
        };
        Ok(Self {
            plate_substring: non_empty(plate).map(str::to_string),
            min_confidence: confidence,
            source_label: non_empty(source_label)
                .filter(|label| *label != ANY_SOURCE)
                .map(str::to_string),
            date_from: parse_date(date_from)?,
            date_to: parse_date(date_to)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(needle) = &self.plate_substring {
            if !entry.plate_text.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if entry.confidence < min {
                return false;
            }
        }
        if let Some(label) = &self.source_label {
            if label != ANY_SOURCE && entry.source_label != *label {
                return false;
            }
        }
        let date = entry.timestamp.date();
        if self.date_from.map_or(false, |from| date < from) {
            return false;
        }
        if self.date_to.map_or(false, |to| date > to) {
            return false;
        }
        true
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_date(raw: &str) -> Result<Option<NaiveDate>> {
    non_empty(raw)
        .map(|value| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .with_context(|| format!("invalid date '{}' (expected YYYY-MM-DD)", value))
        })
        .transpose()
}
