//! Anomaly detection result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One out-of-band consumption reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub machine_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub mean: f64,
    /// Decision score from a learned model, or the z-score for threshold scoring.
    #[serde(default)]
    pub score: Option<f64>,
}

/// Outcome of scoring one machine's window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreOutcome {
    /// Number of valid (non-null) readings considered.
    pub total_points: usize,
    pub anomalies: Vec<AnomalyEvent>,
    /// Mean score over every valid point (None when nothing was scored).
    pub mean_score: Option<f64>,
}

/// Per-machine result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineReportStatus {
    Success,
    Warning,
    Error,
}

/// Anomaly detection result for a single machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineAnomalyReport {
    pub status: MachineReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_points: usize,
    pub anomalies_count: usize,
    pub anomalies: Vec<AnomalyEvent>,
    pub mean_score: Option<f64>,
}

impl MachineAnomalyReport {
    pub fn success(outcome: ScoreOutcome) -> Self {
        Self {
            status: MachineReportStatus::Success,
            message: None,
            total_points: outcome.total_points,
            anomalies_count: outcome.anomalies.len(),
            anomalies: outcome.anomalies,
            mean_score: outcome.mean_score,
        }
    }

    pub fn warning(total_points: usize, message: impl Into<String>) -> Self {
        Self {
            status: MachineReportStatus::Warning,
            message: Some(message.into()),
            total_points,
            anomalies_count: 0,
            anomalies: Vec::new(),
            mean_score: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: MachineReportStatus::Error,
            message: Some(message.into()),
            total_points: 0,
            anomalies_count: 0,
            anomalies: Vec::new(),
            mean_score: None,
        }
    }
}

/// Summary block of an anomaly detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalySummary {
    pub machines_count: usize,
    /// Machines whose window was scored successfully.
    pub machines_processed: usize,
    pub anomalies_found: bool,
    pub timestamp: DateTime<Utc>,
}

/// Full anomaly detection result: per-machine reports in configured order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    #[serde(serialize_with = "as_ordered_map")]
    pub machines: Vec<(String, MachineAnomalyReport)>,
    pub summary: AnomalySummary,
}

fn as_ordered_map<S: serde::Serializer>(
    machines: &[(String, MachineAnomalyReport)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(machines.len()))?;
    for (id, report) in machines {
        map.serialize_entry(id, report)?;
    }
    map.end()
}

impl AnomalyReport {
    pub fn machine(&self, machine_id: &str) -> Option<&MachineAnomalyReport> {
        self.machines
            .iter()
            .find(|(id, _)| id == machine_id)
            .map(|(_, r)| r)
    }
}
