use std::path::{Path, PathBuf};

use serde::Serialize;

use super::entry::LedgerEntry;
use super::store::quote_field;
use super::write_atomic;
use crate::error::LedgerError;

/// Column titles of an exported table.
pub const EXPORT_COLUMNS: [&str; 4] = ["Time", "License Plate", "Confidence", "Source"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "License Plate")]
    plate: &'a str,
    #[serde(rename = "Confidence")]
    confidence: String,
    #[serde(rename = "Source")]
    source: &'a str,
}

impl<'a> From<&'a LedgerEntry> for ExportRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            time: entry.formatted_timestamp(),
            plate: &entry.plate_text,
            confidence: entry.formatted_confidence(),
            source: &entry.source_label,
        }
    }
}

/// Resolve the target file and its format. Paths without an extension get `.csv`.
pub fn export_target(path: &Path) -> Result<(PathBuf, ExportFormat), LedgerError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        None => Ok((path.with_extension("csv"), ExportFormat::Csv)),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok((path.to_path_buf(), ExportFormat::Csv)),
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            Ok((path.to_path_buf(), ExportFormat::Json))
        }
        Some(_) => Err(LedgerError::UnsupportedExport(path.display().to_string())),
    }
}

/// Write `rows` to a tabular file in the given order. Returns the path written.
pub fn export_rows(rows: &[LedgerEntry], path: &Path) -> Result<PathBuf, LedgerError> {
    let (target, format) = export_target(path)?;
    let body = match format {
        ExportFormat::Csv => {
            let mut out = EXPORT_COLUMNS.join(",");
            out.push('\n');
            for row in rows.iter().map(ExportRow::from) {
                out.push_str(&format!(
                    "{},{},{},{}\n",
                    row.time,
                    quote_field(row.plate),
                    row.confidence,
                    quote_field(row.source)
                ));
            }
            out.into_bytes()
        }
        ExportFormat::Json => {
            let table: Vec<ExportRow<'_>> = rows.iter().map(ExportRow::from).collect();
            serde_json::to_vec_pretty(&table)?
        }
    };
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(&target, &body)?;
    log::info!("exported {} rows to {}", rows.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_follows_extension() {
        let (p, f) = export_target(Path::new("out/report")).unwrap();
        assert_eq!(p, PathBuf::from("out/report.csv"));
        assert_eq!(f, ExportFormat::Csv);
        assert_eq!(export_target(Path::new("r.JSON")).unwrap().1, ExportFormat::Json);
        assert!(matches!(
            export_target(Path::new("r.xlsx")),
            Err(LedgerError::UnsupportedExport(_))
        ));
    }
}
