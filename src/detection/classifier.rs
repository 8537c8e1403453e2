//! Reading -> machine state classification.

use crate::config::defaults;
use crate::types::{MachineState, Reading};

/// Maps a single reading to `Running`, `Stopped` or `Disconnected`.
#[derive(Debug, Clone, Copy)]
pub struct StateClassifier {
    running_threshold: f64,
}

impl Default for StateClassifier {
    fn default() -> Self {
        Self::new(defaults::RUNNING_THRESHOLD)
    }
}

impl StateClassifier {
    pub fn new(running_threshold: f64) -> Self {
        Self { running_threshold }
    }

    pub fn running_threshold(&self) -> f64 {
        self.running_threshold
    }

    /// `Disconnected` for an absent or non-finite value, `Stopped` below the
    /// running threshold (threshold itself counts as running), else `Running`.
    pub fn classify(&self, reading: &Reading) -> MachineState {
        self.classify_value(reading.value)
    }

    pub fn classify_value(&self, value: Option<f64>) -> MachineState {
        match value {
            Some(v) if v.is_finite() => {
                if v < self.running_threshold {
                    MachineState::Stopped
                } else {
                    MachineState::Running
                }
            }
            _ => MachineState::Disconnected,
        }
    }

    /// Stop-detection view: anything that is not running counts as stopped.
    pub fn is_stopped(&self, reading: &Reading) -> bool {
        self.classify(reading).is_stopped()
    }
}
