use chrono::{NaiveDate, NaiveDateTime};
use image::{Rgb, RgbImage};

use plate_ledger::ledger::{
    export_rows, CsvLedgerStore, FilesystemCropStore, InMemoryLedgerStore, LedgerStore,
    SqliteLedgerStore, CSV_HEADER,
};
use plate_ledger::{
    AcceptContext, AcceptOutcome, Detection, FilterCriteria, GlobalUniqueness, Ledger,
    LedgerError, PerSourceUniqueness,
};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn ctx(source: &str, seq: u64, timestamp: NaiveDateTime) -> AcceptContext {
    AcceptContext {
        source_label: source.to_string(),
        sequence_number: seq,
        timestamp,
    }
}

fn det(text: &str, confidence: f32) -> Detection {
    Detection::new(text, confidence, RgbImage::from_pixel(12, 6, Rgb([200, 200, 0])))
}

#[test]
fn global_policy_skips_repeat_plate() {
    let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
    let t = at(2024, 1, 5, 10);
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Video", 0, t)).unwrap(),
        AcceptOutcome::Appended
    );
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Video", 1, t)).unwrap(),
        AcceptOutcome::DuplicateSkipped
    );
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Image", 2, t)).unwrap(),
        AcceptOutcome::DuplicateSkipped
    );
    let rows = ledger.read(None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plate_text, "AB123");
}

#[test]
fn per_source_policy_accepts_other_sources() {
    let mut ledger = Ledger::in_memory(Box::new(PerSourceUniqueness));
    let t = at(2024, 1, 5, 10);
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Video", 0, t)).unwrap(),
        AcceptOutcome::Appended
    );
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Image", 0, t)).unwrap(),
        AcceptOutcome::Appended
    );
    assert_eq!(
        ledger.accept(&det("AB123", 0.9), &ctx("Image", 1, t)).unwrap(),
        AcceptOutcome::DuplicateSkipped
    );
    assert_eq!(ledger.len(), 2);
}

#[test]
fn filter_round_trip() {
    let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
    ledger
        .accept(&det("XY12", 0.95), &ctx("Image", 0, at(2024, 1, 5, 9)))
        .unwrap();
    ledger
        .accept(&det("QQ77", 0.60), &ctx("Video", 1, at(2024, 1, 6, 9)))
        .unwrap();

    let criteria =
        FilterCriteria::from_inputs("XY", "0.9", "Image", "2024-01-01", "2024-01-31").unwrap();
    let rows = ledger.read(Some(&criteria));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].plate_text, "XY12");
    assert_eq!(rows[0].source_label, "Image");

    let everything = FilterCriteria::from_inputs("", "", "All", "", "").unwrap();
    assert_eq!(ledger.read(Some(&everything)).len(), 2);

    let too_late = FilterCriteria::from_inputs("", "", "All", "2024-01-07", "").unwrap();
    assert!(ledger.read(Some(&too_late)).is_empty());
}

#[test]
fn csv_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    {
        let store = CsvLedgerStore::open(&path).unwrap();
        let mut ledger = Ledger::open(Box::new(store), Box::new(GlobalUniqueness), None).unwrap();
        ledger
            .accept(&det("LEA4821", 0.91), &ctx("Live Stream", 3, at(2024, 2, 1, 8)))
            .unwrap();
        ledger
            .accept(&det("KHI0923", 0.82), &ctx("Live Stream", 7, at(2024, 2, 1, 9)))
            .unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some(CSV_HEADER));
    assert!(text.contains("2024-02-01 08:00:00,LEA4821,0.9100,Live Stream,3"));

    let store = CsvLedgerStore::open(&path).unwrap();
    let mut ledger = Ledger::open(Box::new(store), Box::new(GlobalUniqueness), None).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.read(None)[0].plate_text, "KHI0923");
    assert_eq!(
        ledger
            .accept(&det("LEA4821", 0.99), &ctx("Image", 0, at(2024, 2, 2, 8)))
            .unwrap(),
        AcceptOutcome::DuplicateSkipped
    );
}

#[test]
fn sqlite_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    {
        let store = SqliteLedgerStore::open(&path).unwrap();
        let mut ledger =
            Ledger::open(Box::new(store), Box::new(PerSourceUniqueness), None).unwrap();
        ledger
            .accept(&det("ISB7730", 0.88), &ctx("Video", 0, at(2024, 3, 1, 12)))
            .unwrap();
    }
    let store = SqliteLedgerStore::open(&path).unwrap();
    let ledger = Ledger::open(Box::new(store), Box::new(PerSourceUniqueness), None).unwrap();
    let rows = ledger.read(None);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, at(2024, 3, 1, 12));
    assert!((rows[0].confidence - 0.88).abs() < 1e-6);
    assert!(ledger.is_duplicate("ISB7730", "Video"));
    assert!(!ledger.is_duplicate("ISB7730", "Image"));
}

#[test]
fn legacy_csv_is_migrated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(
        &path,
        "\"January 05, 2024; 03:15\",AB123,0.9100,Video\n\
         \"January 06, 2024; 11:40\",CD456,0.7000,Image\n",
    )
    .unwrap();

    let store = CsvLedgerStore::open(&path).unwrap();
    let ledger = Ledger::open(Box::new(store), Box::new(GlobalUniqueness), None).unwrap();
    let rows = ledger.read(None);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].plate_text, "CD456");
    assert_eq!(rows[1].formatted_timestamp(), "2024-01-05 03:15:00");
    assert!(ledger.is_duplicate("AB123", "anything"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some(CSV_HEADER));
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn corrupt_rows_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, format!("{}\nnot,a,row\n", CSV_HEADER)).unwrap();
    let store = CsvLedgerStore::open(&path).unwrap();
    let err = Ledger::open(Box::new(store), Box::new(GlobalUniqueness), None)
        .err()
        .unwrap();
    assert!(matches!(err, LedgerError::Parse { line: 2, .. }));
}

#[test]
fn delete_removes_oldest_match_and_clear_empties() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvLedgerStore::open(dir.path().join("data.csv")).unwrap();
    let mut ledger = Ledger::open(Box::new(store), Box::new(PerSourceUniqueness), None).unwrap();
    ledger
        .accept(&det("AB1", 0.9), &ctx("Video", 0, at(2024, 1, 1, 1)))
        .unwrap();
    ledger
        .accept(&det("AB1", 0.8), &ctx("Image", 0, at(2024, 1, 1, 2)))
        .unwrap();

    let removed = ledger.delete("AB1").unwrap().unwrap();
    assert_eq!(removed.source_label, "Video");
    assert_eq!(ledger.len(), 1);
    assert!(!ledger.is_duplicate("AB1", "Video"));
    assert!(ledger.is_duplicate("AB1", "Image"));
    assert!(ledger.delete("ZZ9").unwrap().is_none());

    ledger.clear().unwrap();
    assert!(ledger.is_empty());
    ledger.reload().unwrap();
    assert!(ledger.is_empty());
}

#[test]
fn crops_are_written_for_appended_plates_only() {
    let dir = tempfile::tempdir().unwrap();
    let crops = FilesystemCropStore::new(dir.path().join("license_plates")).unwrap();
    let mut ledger = Ledger::open(
        Box::new(InMemoryLedgerStore::new()),
        Box::new(GlobalUniqueness),
        Some(Box::new(crops)),
    )
    .unwrap();

    let t = at(2024, 1, 5, 10);
    ledger.accept(&det("AB123", 0.9), &ctx("Video", 0, t)).unwrap();
    let path = ledger.crop_for("AB123").expect("crop stored");
    assert_eq!(path.file_name().unwrap(), "AB123.jpg");
    let before = std::fs::metadata(&path).unwrap().modified().unwrap();

    let skipped = ledger.accept(&det("AB123", 0.9), &ctx("Video", 1, t)).unwrap();
    assert_eq!(skipped, AcceptOutcome::DuplicateSkipped);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), before);
    assert!(ledger.crop_for("ZZ999").is_none());
}

#[test]
fn export_preserves_rendered_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = Ledger::in_memory(Box::new(GlobalUniqueness));
    for (i, plate) in ["A1", "B2", "C3"].iter().enumerate() {
        ledger
            .accept(&det(plate, 0.5), &ctx("Video", i as u64, at(2024, 1, 1, i as u32)))
            .unwrap();
    }
    let rows = ledger.read(None);

    let csv = export_rows(&rows, &dir.path().join("report")).unwrap();
    assert_eq!(csv.extension().unwrap(), "csv");
    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Time,License Plate,Confidence,Source");
    assert_eq!(lines[1], "2024-01-01 02:00:00,C3,0.5000,Video");
    assert_eq!(lines.len(), 4);

    let json = export_rows(&rows, &dir.path().join("report.json")).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
    assert_eq!(parsed[2]["License Plate"], "A1");

    assert_eq!(ledger.len(), 3);
}

#[test]
fn in_memory_store_deletes_first_match() {
    let mut store = InMemoryLedgerStore::new();
    let mut ledger_rows = Ledger::in_memory(Box::new(GlobalUniqueness));
    ledger_rows
        .force_append(&det("AB1", 0.5), &ctx("Video", 0, at(2024, 1, 1, 0)))
        .unwrap();
    ledger_rows
        .force_append(&det("AB1", 0.6), &ctx("Video", 1, at(2024, 1, 1, 1)))
        .unwrap();
    for row in ledger_rows.read(None).iter().rev() {
        store.append(row).unwrap();
    }
    let removed = store.delete_first("AB1").unwrap().unwrap();
    assert_eq!(removed.sequence_number, 0);
    assert_eq!(store.load().unwrap().len(), 1);
}
