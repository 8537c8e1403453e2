//! Learned-model scorer.
//!
//! Models are trained offline, one per machine, and shipped as JSON
//! descriptors in `[anomaly] models_dir`:
//!
//! ```text
//! models/G19.json   {"location": 0.48, "scale": 0.17, "offset": 9.0}
//! ```
//!
//! The file stem is the machine id. At scoring time each window is min-max
//! scaled to [0, 1] and every valid reading is run through the machine's
//! [`Predictor`].

use serde::Deserialize;
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{valid_points, AnomalyScorer, ScoringError};
use crate::types::{AnomalyEvent, Reading, ScoreOutcome};

// ============================================================================
// Predictor seam
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Normal,
    Anomalous,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    /// Decision score; negative means outside the learned envelope.
    pub score: f64,
}

/// A trained per-machine model.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<Prediction, String>;

    /// Raw-value band the model accepts, given the window's scaling range.
    /// `None` when the model has no closed-form boundary.
    fn bounds(&self, _min: f64, _max: f64) -> Option<(f64, f64)> {
        None
    }
}

// ============================================================================
// Envelope model
// ============================================================================

/// One-dimensional elliptic envelope over the scaled consumption value.
///
/// `score = offset - ((x - location) / scale)^2`; a point is anomalous when
/// the score drops below zero.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EnvelopeModel {
    pub location: f64,
    pub scale: f64,
    pub offset: f64,
}

impl Predictor for EnvelopeModel {
    fn predict(&self, features: &[f64]) -> Result<Prediction, String> {
        let x = *features.first().ok_or("empty feature vector")?;
        if !(self.scale > 0.0) {
            return Err(format!("invalid envelope scale {}", self.scale));
        }
        let d = (x - self.location) / self.scale;
        let score = self.offset - d * d;
        let label = if score < 0.0 { Label::Anomalous } else { Label::Normal };
        Ok(Prediction { label, score })
    }

    fn bounds(&self, min: f64, max: f64) -> Option<(f64, f64)> {
        if self.offset < 0.0 || !(self.scale > 0.0) {
            return None;
        }
        let half = self.scale * self.offset.sqrt();
        let unscale = |s: f64| min + s * (max - min);
        Some((unscale(self.location - half).max(0.0), unscale(self.location + half)))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Trained models keyed by machine id.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn Predictor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, machine_id: impl Into<String>, model: Arc<dyn Predictor>) {
        self.models.insert(machine_id.into(), model);
    }

    pub fn get(&self, machine_id: &str) -> Option<&Arc<dyn Predictor>> {
        self.models.get(machine_id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Load every `*.json` envelope descriptor in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, ScoringError> {
        let load_err = |path: &Path, reason: String| ScoringError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };

        let entries = std::fs::read_dir(dir).map_err(|e| load_err(dir, e.to_string()))?;
        let mut registry = Self::new();

        for entry in entries {
            let path = entry.map_err(|e| load_err(dir, e.to_string()))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(machine_id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(|e| load_err(&path, e.to_string()))?;
            let model: EnvelopeModel =
                serde_json::from_str(&raw).map_err(|e| load_err(&path, e.to_string()))?;

            tracing::debug!(machine = %machine_id, path = %path.display(), "Loaded envelope model");
            registry.insert(machine_id, Arc::new(model));
        }

        tracing::info!(count = registry.len(), dir = %dir.display(), "Model registry loaded");
        Ok(registry)
    }
}

// ============================================================================
// Scorer
// ============================================================================

pub struct ModelScorer {
    registry: ModelRegistry,
    min_valid_points: usize,
}

impl ModelScorer {
    pub fn new(registry: ModelRegistry, min_valid_points: usize) -> Self {
        Self {
            registry,
            min_valid_points,
        }
    }
}

impl AnomalyScorer for ModelScorer {
    fn name(&self) -> &'static str {
        "model"
    }

    fn min_valid_points(&self) -> usize {
        self.min_valid_points
    }

    fn score(&self, machine_id: &str, window: &[Reading]) -> Result<ScoreOutcome, ScoringError> {
        let model = self
            .registry
            .get(machine_id)
            .ok_or_else(|| ScoringError::ModelUnavailable(machine_id.to_string()))?;

        let points = valid_points(window);
        if points.len() < self.min_valid_points {
            return Ok(ScoreOutcome {
                total_points: points.len(),
                ..ScoreOutcome::default()
            });
        }

        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().mean();
        let range = max - min;
        let scale = |v: f64| if range > 0.0 { (v - min) / range } else { 0.0 };
        let (lower, upper) = model.bounds(min, max).unwrap_or((min, max));

        let mut scores = Vec::with_capacity(points.len());
        let mut anomalies = Vec::new();
        for (reading, value) in &points {
            let prediction = model.predict(&[scale(*value)]).map_err(|reason| ScoringError::Prediction {
                machine: machine_id.to_string(),
                reason,
            })?;
            scores.push(prediction.score);
            if prediction.label == Label::Anomalous {
                anomalies.push(AnomalyEvent {
                    machine_id: machine_id.to_string(),
                    timestamp: reading.timestamp,
                    value: *value,
                    lower_bound: lower,
                    upper_bound: upper,
                    mean,
                    score: Some(prediction.score),
                });
            }
        }

        Ok(ScoreOutcome {
            total_points: points.len(),
            anomalies,
            mean_score: Some(scores.iter().mean()),
        })
    }
}
