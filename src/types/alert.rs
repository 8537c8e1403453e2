//! Alert identity and payload types

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

/// Which monitoring condition produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Stop,
    Anomaly,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Stop => write!(f, "stop"),
            AlertKind::Anomaly => write!(f, "anomaly"),
        }
    }
}

/// Deduplication key for one alert-worthy condition instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AlertFingerprint {
    pub kind: AlertKind,
    pub machine_id: String,
    pub bucket_key: String,
}

impl AlertFingerprint {
    /// Stop alert bucket: the episode start plus elapsed hours floored to a
    /// multiple of `every_hours`.
    pub fn stop(machine_id: &str, episode_start: DateTime<Utc>, elapsed_hours: i64, every_hours: i64) -> Self {
        let bucket = elapsed_hours - elapsed_hours.rem_euclid(every_hours.max(1));
        Self {
            kind: AlertKind::Stop,
            machine_id: machine_id.to_string(),
            bucket_key: format!("{}/{}h", episode_start.format("%Y-%m-%dT%H:%M:%S"), bucket),
        }
    }

    /// Anomaly alert bucket: reading timestamp truncated to the minute.
    pub fn anomaly(machine_id: &str, timestamp: DateTime<Utc>) -> Self {
        let minute = timestamp
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(timestamp);
        Self {
            kind: AlertKind::Anomaly,
            machine_id: machine_id.to_string(),
            bucket_key: minute.format("%Y-%m-%dT%H:%M").to_string(),
        }
    }
}

impl std::fmt::Display for AlertFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.machine_id, self.bucket_key)
    }
}

/// Rendered alert ready for a notifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub subject: String,
    pub html_body: String,
    pub recipient: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stop_bucket_floors_to_cadence() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(
            AlertFingerprint::stop("G19", start, 5, 2),
            AlertFingerprint::stop("G19", start, 4, 2)
        );
        assert_ne!(
            AlertFingerprint::stop("G19", start, 4, 2),
            AlertFingerprint::stop("G19", start, 6, 2)
        );
        assert_eq!(
            AlertFingerprint::stop("G19", start, 4, 2).bucket_key,
            "2025-03-01T06:00:00/4h"
        );
    }

    #[test]
    fn anomaly_bucket_truncates_to_minute() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 6, 15, 3).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 1, 6, 15, 59).unwrap();
        assert_eq!(AlertFingerprint::anomaly("G26", a), AlertFingerprint::anomaly("G26", b));
        assert_eq!(AlertFingerprint::anomaly("G26", a).to_string(), "anomaly:G26:2025-03-01T06:15");
    }
}
