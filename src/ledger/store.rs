use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::entry::{LedgerEntry, TIMESTAMP_FORMAT};
use super::write_atomic;
use crate::error::LedgerError;

/// Header line of the canonical (v1) delimited format.
pub const CSV_HEADER: &str = "timestamp,plate_text,confidence,source_label,sequence_number";

const LEGACY_TIME_FORMAT: &str = "%B %d, %Y; %I:%M %p";
const LEGACY_SOURCE_FIRST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Persistent backing for a `Ledger`. Rows are kept in capture order.
///
/// Single writer: the ledger that owns the store.
pub trait LedgerStore: Send {
    fn describe(&self) -> String;

    fn load(&mut self) -> Result<Vec<LedgerEntry>, LedgerError>;

    fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// Remove the oldest row with this plate text.
    fn delete_first(&mut self, plate_text: &str) -> Result<Option<LedgerEntry>, LedgerError>;

    fn clear(&mut self) -> Result<(), LedgerError>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryLedgerStore {
    rows: Vec<LedgerEntry>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn load(&mut self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.rows.clone())
    }

    fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.rows.push(entry.clone());
        Ok(())
    }

    fn delete_first(&mut self, plate_text: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        Ok(self
            .rows
            .iter()
            .position(|row| row.plate_text == plate_text)
            .map(|idx| self.rows.remove(idx)))
    }

    fn clear(&mut self) -> Result<(), LedgerError> {
        self.rows.clear();
        Ok(())
    }
}

/// Append-only delimited file.
///
/// Files written by older releases have no header line. They are rewritten in
/// the canonical format when opened.
pub struct CsvLedgerStore {
    path: PathBuf,
}

impl CsvLedgerStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let store = Self { path: path.into() };
        store.migrate_legacy()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_text(&self) -> Result<Option<String>, LedgerError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn migrate_legacy(&self) -> Result<(), LedgerError> {
        let Some(text) = self.read_text()? else {
            return Ok(());
        };
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        match lines.next() {
            None => return Ok(()),
            Some((_, first)) if first.trim() == CSV_HEADER => return Ok(()),
            Some(_) => {}
        }

        let rows = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .enumerate()
            .map(|(seq, (idx, line))| parse_legacy_row(idx + 1, line, seq as u64))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "migrating {} legacy rows in {} to the canonical format",
            rows.len(),
            self.path.display()
        );
        self.rewrite(&rows)
    }

    fn rewrite(&self, rows: &[LedgerEntry]) -> Result<(), LedgerError> {
        let mut out = String::with_capacity(64 * (rows.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for row in rows {
            out.push_str(&encode_row(row));
            out.push('\n');
        }
        write_atomic(&self.path, out.as_bytes())?;
        Ok(())
    }
}

impl LedgerStore for CsvLedgerStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&mut self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let Some(text) = self.read_text()? else {
            return Ok(Vec::new());
        };
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty() && line.trim() != CSV_HEADER)
            .map(|(idx, line)| parse_row(idx + 1, line))
            .collect()
    }

    fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        writeln!(file, "{}", encode_row(entry))?;
        Ok(())
    }

    fn delete_first(&mut self, plate_text: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut rows = self.load()?;
        let Some(idx) = rows.iter().position(|row| row.plate_text == plate_text) else {
            return Ok(None);
        };
        let removed = rows.remove(idx);
        self.rewrite(&rows)?;
        Ok(Some(removed))
    }

    fn clear(&mut self) -> Result<(), LedgerError> {
        match self.read_text()? {
            Some(_) => self.rewrite(&[]),
            None => Ok(()),
        }
    }
}

fn encode_row(entry: &LedgerEntry) -> String {
    [
        entry.formatted_timestamp(),
        quote_field(&entry.plate_text),
        entry.formatted_confidence(),
        quote_field(&entry.source_label),
        entry.sequence_number.to_string(),
    ]
    .join(",")
}

fn parse_row(line_no: usize, line: &str) -> Result<LedgerEntry, LedgerError> {
    let fields = split_record(line);
    let [timestamp, plate, confidence, source, sequence] = fields.as_slice() else {
        return Err(parse_error(line_no, format!("expected 5 fields, got {}", fields.len())));
    };
    Ok(LedgerEntry {
        timestamp: parse_time(line_no, timestamp, TIMESTAMP_FORMAT)?,
        plate_text: plate.clone(),
        confidence: parse_confidence(line_no, confidence)?,
        source_label: source.clone(),
        sequence_number: sequence
            .trim()
            .parse()
            .map_err(|_| parse_error(line_no, format!("bad sequence number '{}'", sequence)))?,
    })
}

/// Rows from older releases: `{time, plate, confidence, camera}` or
/// `{source, plate, timestamp}`. They carry no sequence number, so row order is used.
fn parse_legacy_row(line_no: usize, line: &str, sequence: u64) -> Result<LedgerEntry, LedgerError> {
    let fields = split_record(line);
    match fields.as_slice() {
        [time, plate, confidence, camera] => Ok(LedgerEntry {
            // Legacy rows carry a 12-hour clock with no AM/PM marker.
            timestamp: parse_time(line_no, &format!("{} AM", time.trim()), LEGACY_TIME_FORMAT)?,
            plate_text: plate.clone(),
            confidence: parse_confidence(line_no, confidence)?,
            source_label: camera.clone(),
            sequence_number: sequence,
        }),
        [source, plate, time] => Ok(LedgerEntry {
            timestamp: parse_time(line_no, time, LEGACY_SOURCE_FIRST_TIME_FORMAT)?,
            plate_text: plate.clone(),
            confidence: 0.0,
            source_label: source.clone(),
            sequence_number: sequence,
        }),
        other => Err(parse_error(
            line_no,
            format!("unrecognised legacy row with {} fields", other.len()),
        )),
    }
}

fn parse_time(line_no: usize, raw: &str, format: &str) -> Result<NaiveDateTime, LedgerError> {
    NaiveDateTime::parse_from_str(raw.trim(), format)
        .map_err(|e| parse_error(line_no, format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_confidence(line_no: usize, raw: &str) -> Result<f32, LedgerError> {
    raw.trim()
        .parse()
        .map_err(|_| parse_error(line_no, format!("bad confidence '{}'", raw)))
}

fn parse_error(line: usize, reason: String) -> LedgerError {
    LedgerError::Parse { line, reason }
}

/// Quote a field when it contains a delimiter, quote or line break.
pub(crate) fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split one delimited line, honouring double-quoted fields.
pub(crate) fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_quotes() {
        assert_eq!(
            split_record(r#""January 05, 2024; 03:15",AB123,0.9100,Video"#),
            vec!["January 05, 2024; 03:15", "AB123", "0.9100", "Video"]
        );
        assert_eq!(split_record(r#"a,"say ""hi""",c"#), vec!["a", r#"say "hi""#, "c"]);
        assert_eq!(split_record(""), vec![""]);
    }

    #[test]
    fn encode_then_parse_keeps_awkward_labels() {
        let entry = LedgerEntry {
            timestamp: NaiveDateTime::parse_from_str("2024-03-01 10:00:00", TIMESTAMP_FORMAT)
                .unwrap(),
            plate_text: "AB,12".into(),
            confidence: 0.5,
            source_label: "Live Stream".into(),
            sequence_number: 9,
        };
        assert_eq!(parse_row(1, &encode_row(&entry)).unwrap(), entry);
    }

    #[test]
    fn legacy_rows_of_both_shapes_parse() {
        let four = parse_legacy_row(1, r#""January 05, 2024; 03:15",AB123,0.9100,Video"#, 0)
            .unwrap();
        assert_eq!(four.formatted_timestamp(), "2024-01-05 03:15:00");
        assert_eq!(four.source_label, "Video");

        let three = parse_legacy_row(2, "clip.mp4,XY99,2024-02-10 18:45:12.123456", 1).unwrap();
        assert_eq!(three.source_label, "clip.mp4");
        assert_eq!(three.plate_text, "XY99");
        assert_eq!(three.sequence_number, 1);

        assert!(matches!(
            parse_legacy_row(3, "only,two", 2),
            Err(LedgerError::Parse { line: 3, .. })
        ));
    }
}
