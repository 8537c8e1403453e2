//! Stop interval types

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// End of a stop interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalEnd {
    /// Machine resumed running at this instant.
    At(DateTime<Utc>),
    /// Machine is still stopped at evaluation time.
    Open,
}

impl Serialize for IntervalEnd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IntervalEnd::At(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            IntervalEnd::Open => serializer.serialize_str("open"),
        }
    }
}

/// A contiguous run of stopped readings for one machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopInterval {
    pub machine_id: String,
    pub start: DateTime<Utc>,
    pub end: IntervalEnd,
    /// Duration in hours, rounded to two decimals.
    pub duration_hours: f64,
}

impl StopInterval {
    /// Whether the machine is still stopped (no closing Running reading yet).
    pub fn is_open(&self) -> bool {
        matches!(self.end, IntervalEnd::Open)
    }

    /// Whole hours elapsed since the stop began, measured at `now`.
    pub fn elapsed_whole_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start).num_seconds().max(0) / 3600
    }
}
