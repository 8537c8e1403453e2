//! Machine operating state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating state of a machine, derived from its latest reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    Running,
    Stopped,
    Disconnected,
}

impl MachineState {
    /// Whether this state counts toward a stop episode.
    ///
    /// A disconnected meter is treated like a stopped machine.
    pub fn is_stopped(&self) -> bool {
        !matches!(self, MachineState::Running)
    }
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineState::Running => write!(f, "Running"),
            MachineState::Stopped => write!(f, "Stopped"),
            MachineState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Current state of one machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStatus {
    pub machine_id: String,
    pub state: MachineState,
    /// Timestamp of the reading the state was derived from (None if the
    /// machine has no readings at all).
    pub last_seen: Option<DateTime<Utc>>,
    pub value: Option<f64>,
}

/// Snapshot of every monitored machine, in configured order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineStatusReport {
    pub timestamp: DateTime<Utc>,
    pub machines: Vec<MachineStatus>,
}

impl MachineStatusReport {
    pub fn machine(&self, machine_id: &str) -> Option<&MachineStatus> {
        self.machines.iter().find(|m| m.machine_id == machine_id)
    }
}
