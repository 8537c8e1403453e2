//! Meter reading type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single consumption sample for one machine.
///
/// `value` is `None` when the meter reported nothing for that timestamp
/// (machine disconnected or channel dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub machine_id: String,
    pub value: Option<f64>,
}

impl Reading {
    pub fn new(machine_id: impl Into<String>, timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        Self {
            timestamp,
            machine_id: machine_id.into(),
            value,
        }
    }

    /// The value if present and finite.
    pub fn valid_value(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}
