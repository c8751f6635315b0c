use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::entry::{LedgerEntry, TIMESTAMP_FORMAT};
use super::store::LedgerStore;
use crate::error::LedgerError;

pub struct SqliteLedgerStore {
    conn: Connection,
    label: String,
}

impl SqliteLedgerStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)?;
        let mut store = Self {
            conn,
            label: format!("sqlite:{}", db_path.display()),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
            label: "sqlite::memory:".to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<(), LedgerError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS plate_ledger (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              recorded_at TEXT NOT NULL,
              plate_text TEXT NOT NULL,
              confidence REAL NOT NULL,
              source_label TEXT NOT NULL,
              sequence_number INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_plate ON plate_ledger(plate_text);
            "#,
        )?;
        Ok(())
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, LedgerEntry)> {
    let id: i64 = row.get(0)?;
    let recorded_at: String = row.get(1)?;
    let timestamp = NaiveDateTime::parse_from_str(&recorded_at, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let confidence: f64 = row.get(3)?;
    let sequence_number: i64 = row.get(5)?;
    Ok((
        id,
        LedgerEntry {
            timestamp,
            plate_text: row.get(2)?,
            confidence: confidence as f32,
            source_label: row.get(4)?,
            sequence_number: sequence_number.max(0) as u64,
        },
    ))
}

const SELECT_COLUMNS: &str =
    "SELECT id, recorded_at, plate_text, confidence, source_label, sequence_number FROM plate_ledger";

impl LedgerStore for SqliteLedgerStore {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn load(&mut self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.1);
        }
        Ok(out)
    }

    fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let sequence_number = i64::try_from(entry.sequence_number).unwrap_or(i64::MAX);
        self.conn.execute(
            r#"
            INSERT INTO plate_ledger(recorded_at, plate_text, confidence, source_label, sequence_number)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.formatted_timestamp(),
                entry.plate_text,
                f64::from(entry.confidence),
                entry.source_label,
                sequence_number
            ],
        )?;
        Ok(())
    }

    fn delete_first(&mut self, plate_text: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let found = self
            .conn
            .query_row(
                &format!("{} WHERE plate_text = ?1 ORDER BY id ASC LIMIT 1", SELECT_COLUMNS),
                params![plate_text],
                row_to_entry,
            )
            .optional()?;
        let Some((id, entry)) = found else {
            return Ok(None);
        };
        self.conn
            .execute("DELETE FROM plate_ledger WHERE id = ?1", params![id])?;
        Ok(Some(entry))
    }

    fn clear(&mut self) -> Result<(), LedgerError> {
        self.conn.execute("DELETE FROM plate_ledger", [])?;
        Ok(())
    }
}
