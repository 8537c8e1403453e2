//! CSV store integration tests
//!
//! Writes small plant exports to temp files and drives them through
//! `CsvStore` and the `DetectionEngine`.

use plantwatch::alerts::LogNotifier;
use plantwatch::config::PlantConfig;
use plantwatch::engine::DetectionEngine;
use plantwatch::store::{CsvStore, ReadingStore, StoreError};
use plantwatch::types::{IntervalEnd, MachineState};
use plantwatch::ThresholdScorer;

use chrono::{TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const EXPORT: &str = "\
Timestamp,G19,G26
2025-03-01 10:00:00,40.0,12.0
2025-03-01 08:00:00,41.0,11.0
2025-03-01 09:00:00,0.0,11.5
2025-03-01 11:00:00,0.1,
";

#[tokio::test]
async fn test_fetch_sorts_and_expands_rows() {
    let file = write_csv(EXPORT);
    let store = CsvStore::new(file.path());

    let readings = store.fetch_readings(None).await.unwrap();
    assert_eq!(readings.len(), 8);
    assert!(readings.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(
        readings.first().unwrap().timestamp,
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    );

    let absent = readings
        .iter()
        .find(|r| r.machine_id == "G26" && r.timestamp.format("%H").to_string() == "11")
        .unwrap();
    assert_eq!(absent.value, None);
}

#[tokio::test]
async fn test_fetch_since_filters_older_rows() {
    let file = write_csv(EXPORT);
    let store = CsvStore::new(file.path());

    let since = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let readings = store.fetch_readings(Some(since)).await.unwrap();
    assert_eq!(readings.len(), 4);
    assert!(readings.iter().all(|r| r.timestamp >= since));
}

#[tokio::test]
async fn test_missing_file_is_data_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = CsvStore::new(dir.path().join("absent.csv"));
    let err = store.fetch_readings(None).await.unwrap_err();
    assert!(matches!(err, StoreError::DataUnavailable(_)), "{err:?}");
}

#[tokio::test]
async fn test_bad_header_is_malformed() {
    let file = write_csv("Date;G19\n2025-03-01;1.0\n");
    let err = CsvStore::new(file.path()).fetch_readings(None).await.unwrap_err();
    assert!(matches!(err, StoreError::Malformed(_)), "{err:?}");
}

#[tokio::test]
async fn test_engine_over_csv_export() {
    let file = write_csv(EXPORT);
    let mut config = PlantConfig::default();
    config.plant.machines = vec!["G19".to_string(), "G26".to_string()];

    let engine = DetectionEngine::new(
        Arc::new(config),
        Arc::new(CsvStore::new(file.path())),
        Arc::new(ThresholdScorer::default()),
        Arc::new(LogNotifier),
    );

    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    let status = engine.machine_status_at(now).await.unwrap();
    assert_eq!(status.machine("G19").unwrap().state, MachineState::Stopped);
    assert_eq!(status.machine("G26").unwrap().state, MachineState::Disconnected);

    // G19 stopped 09:00-10:00 (exactly 1h, reported) and again from 11:00.
    // G26 went silent at 11:00; only half an hour has elapsed.
    let half_past = Utc.with_ymd_and_hms(2025, 3, 1, 11, 30, 0).unwrap();
    let stops = engine.stop_intervals_at(half_past).await.unwrap();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].machine_id, "G19");
    assert_eq!(
        stops[0].end,
        IntervalEnd::At(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap())
    );
    assert!((stops[0].duration_hours - 1.0).abs() < 1e-9);

    let later = Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 0).unwrap();
    let stops = engine.stop_intervals_at(later).await.unwrap();
    let open: Vec<_> = stops.iter().filter(|s| s.end == IntervalEnd::Open).collect();
    assert_eq!(open.len(), 2);
    assert_eq!(stops.len(), 3);
    assert!(open.iter().all(|s| (s.duration_hours - 3.5).abs() < 1e-9));
}
