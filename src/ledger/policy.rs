use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Identity under which a reading counts as "seen before".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Plate(String),
    SourcePlate { source_label: String, plate_text: String },
}

/// Rule deciding whether a reading repeats an already-logged one.
pub trait DedupPolicy: Send {
    fn name(&self) -> &'static str;

    fn key(&self, plate_text: &str, source_label: &str) -> DedupKey;
}

/// A plate text already in the ledger is always a duplicate.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalUniqueness;

impl DedupPolicy for GlobalUniqueness {
    fn name(&self) -> &'static str {
        "global"
    }

    fn key(&self, plate_text: &str, _source_label: &str) -> DedupKey {
        DedupKey::Plate(plate_text.to_string())
    }
}

/// Duplicates are per (source, plate text); other sources may log the same plate.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerSourceUniqueness;

impl DedupPolicy for PerSourceUniqueness {
    fn name(&self) -> &'static str {
        "per-source"
    }

    fn key(&self, plate_text: &str, source_label: &str) -> DedupKey {
        DedupKey::SourcePlate {
            source_label: source_label.to_string(),
            plate_text: plate_text.to_string(),
        }
    }
}

/// Configured policy selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    Global,
    PerSource,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn DedupPolicy> {
        match self {
            PolicyKind::Global => Box::new(GlobalUniqueness),
            PolicyKind::PerSource => Box::new(PerSourceUniqueness),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(PolicyKind::Global),
            "per-source" | "per_source" => Ok(PolicyKind::PerSource),
            other => Err(anyhow!(
                "unknown dedup policy '{}' (expected global or per-source)",
                other
            )),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::Global => "global",
            PolicyKind::PerSource => "per-source",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_ignores_source() {
        let p = GlobalUniqueness;
        assert_eq!(p.key("AB123", "Video"), p.key("AB123", "Image"));
    }

    #[test]
    fn per_source_separates_sources() {
        let p = PerSourceUniqueness;
        assert_ne!(p.key("AB123", "Video"), p.key("AB123", "Image"));
        assert_eq!(p.key("AB123", "Video"), p.key("AB123", "Video"));
    }

    #[test]
    fn parses_config_names() {
        assert_eq!("global".parse::<PolicyKind>().unwrap(), PolicyKind::Global);
        assert_eq!(" Per-Source ".parse::<PolicyKind>().unwrap(), PolicyKind::PerSource);
        assert!("sometimes".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::PerSource.build().name(), "per-source");
    }
}
