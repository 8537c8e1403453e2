//! CSV reading store.
//!
//! Reads the plant's wide energy export:
//!
//! ```text
//! Timestamp,G19,G26,MISFAT_3_Compresseur_3
//! 2025-03-01 08:00:00,41.2,,12.0
//! 2025-03-01 08:05:00,40.8,0.0,11.7
//! ```
//!
//! The first column is the timestamp; every further header names a machine.
//! An empty cell (or `NULL`/`NaN`) is an absent measurement. The file is
//! re-read on every fetch so a periodically rewritten export is picked up.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::PathBuf;

use super::{ReadingStore, StoreError};
use crate::types::Reading;

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReadingStore for CsvStore {
    async fn fetch_readings(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Reading>, StoreError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StoreError::DataUnavailable(format!("cannot read {}: {e}", self.path.display()))
        })?;

        let mut readings = parse_wide_csv(&contents)?;
        if let Some(since) = since {
            readings.retain(|r| r.timestamp >= since);
        }
        readings.sort_by_key(|r| r.timestamp);

        if readings.is_empty() {
            return Err(StoreError::DataUnavailable(format!(
                "no readings in {}",
                self.path.display()
            )));
        }

        tracing::debug!(count = readings.len(), path = %self.path.display(), "Loaded readings from CSV");
        Ok(readings)
    }

    fn store_name(&self) -> &str {
        "CSV"
    }
}

/// Parse a wide export into long-form readings (one per machine cell).
///
/// Lines with an unparseable timestamp are skipped with a warning; so are
/// unparseable value cells.
pub fn parse_wide_csv(contents: &str) -> Result<Vec<Reading>, StoreError> {
    let mut lines = contents.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break line,
            None => return Ok(Vec::new()),
        }
    };

    let machines: Vec<String> = header
        .split(',')
        .skip(1)
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();
    if machines.is_empty() || machines.iter().any(String::is_empty) {
        return Err(StoreError::Malformed(format!(
            "header must be 'Timestamp,<machine>...', got '{header}'"
        )));
    }

    let mut readings = Vec::new();
    for (idx, line) in lines {
        let line_num = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let timestamp = match fields.next().map(parse_timestamp) {
            Some(Ok(ts)) => ts,
            Some(Err(e)) => {
                tracing::warn!(line = line_num, error = %e, "Error parsing CSV line");
                continue;
            }
            None => continue,
        };

        for (machine, cell) in machines.iter().zip(fields.chain(std::iter::repeat(""))) {
            let value = match parse_cell(cell) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(line = line_num, machine = %machine, error = %e, "Bad CSV value, treating as absent");
                    None
                }
            };
            readings.push(Reading::new(machine.as_str(), timestamp, value));
        }
    }

    Ok(readings)
}

fn parse_cell(cell: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim().trim_matches('"');
    if cell.is_empty() || cell.eq_ignore_ascii_case("null") || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| format!("invalid number '{cell}': {e}"))
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]` (taken as UTC) or RFC 3339.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim().trim_matches('"');

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }

    Err(format!("Invalid timestamp: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXPORT: &str = "Timestamp,G19,G26\n\
2025-03-01 08:00:00,41.2,\n\
2025-03-01 08:05:00,40.8,0.0\n\
garbage,1,2\n\
2025-03-01T08:10:00Z,NULL,3.5\n";

    #[test]
    fn test_parse_wide_csv_long_form() {
        let readings = parse_wide_csv(EXPORT).unwrap();
        // 3 good rows x 2 machines
        assert_eq!(readings.len(), 6);
        assert_eq!(readings[0].machine_id, "G19");
        assert_eq!(readings[0].value, Some(41.2));
        assert_eq!(readings[1].machine_id, "G26");
        assert_eq!(readings[1].value, None);
        assert_eq!(readings[4].value, None);
        assert_eq!(
            readings[5].timestamp,
            Utc.with_ymd_and_hms(2025, 3, 1, 8, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_short_row_pads_absent() {
        let readings = parse_wide_csv("Timestamp,A,B\n2025-03-01 08:00:00,1.0\n").unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].value, None);
    }

    #[test]
    fn test_bad_cell_is_absent() {
        let readings = parse_wide_csv("Timestamp,A\n2025-03-01 08:00:00,abc\n").unwrap();
        assert_eq!(readings[0].value, None);
    }

    #[test]
    fn test_header_without_machines_is_malformed() {
        assert!(matches!(
            parse_wide_csv("Timestamp\n2025-03-01 08:00:00\n"),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01 08:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T08:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T09:00:00+01:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
