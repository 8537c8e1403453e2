//! Anomaly scoring.
//!
//! Two interchangeable scorers sit behind [`AnomalyScorer`]:
//!
//! - [`ThresholdScorer`]: mean ± k·σ band over the window
//! - [`ModelScorer`]: per-machine learned envelope models
//!
//! Which one runs is chosen by `[anomaly] scorer` in the config. Scoring is
//! synchronous CPU work so machines can be scored on a rayon pool.

mod model;
mod threshold;

pub use model::{EnvelopeModel, Label, ModelRegistry, ModelScorer, Prediction, Predictor};
pub use threshold::ThresholdScorer;

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Reading, ScoreOutcome};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("No trained model for machine {0}")]
    ModelUnavailable(String),

    #[error("Prediction failed for machine {machine}: {reason}")]
    Prediction { machine: String, reason: String },

    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
}

/// Scores one machine's window of readings.
///
/// Returning fewer than `min_valid_points` in `total_points` with no
/// anomalies is the insufficient-data outcome; it is not an error.
pub trait AnomalyScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum valid readings required before anything is scored.
    fn min_valid_points(&self) -> usize;

    fn score(&self, machine_id: &str, window: &[Reading]) -> Result<ScoreOutcome, ScoringError>;
}

/// Valid (present, finite) readings of a window with their values.
pub(crate) fn valid_points(window: &[Reading]) -> Vec<(&Reading, f64)> {
    window
        .iter()
        .filter_map(|r| r.valid_value().map(|v| (r, v)))
        .collect()
}
