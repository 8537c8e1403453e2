//! Statistical band scorer.

use statrs::statistics::Statistics;

use super::{valid_points, AnomalyScorer, ScoringError};
use crate::config::{defaults, AnomalyConfig};
use crate::types::{AnomalyEvent, Reading, ScoreOutcome};

/// Flags readings outside `mean ± sigma·std` of the window.
///
/// Low-side hits are only reported while the machine is running (value above
/// the running threshold), so a stopped machine never shows up as a low
/// consumption anomaly.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdScorer {
    sigma: f64,
    min_valid_points: usize,
    running_threshold: f64,
}

impl Default for ThresholdScorer {
    fn default() -> Self {
        Self {
            sigma: defaults::ANOMALY_SIGMA,
            min_valid_points: defaults::MIN_VALID_POINTS,
            running_threshold: defaults::RUNNING_THRESHOLD,
        }
    }
}

impl ThresholdScorer {
    pub fn new(sigma: f64, min_valid_points: usize, running_threshold: f64) -> Self {
        Self {
            sigma,
            min_valid_points,
            running_threshold,
        }
    }

    pub fn from_config(anomaly: &AnomalyConfig, running_threshold: f64) -> Self {
        Self::new(anomaly.sigma, anomaly.min_valid_points, running_threshold)
    }

    /// Score a window. Each event carries its signed z-score; `mean_score`
    /// is the mean absolute z-score over every valid reading.
    pub fn score_window(&self, window: &[Reading]) -> ScoreOutcome {
        let points = valid_points(window);
        if points.len() < self.min_valid_points {
            return ScoreOutcome {
                total_points: points.len(),
                ..ScoreOutcome::default()
            };
        }

        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let mean = values.iter().mean();
        let std = values.iter().std_dev();

        let upper = mean + self.sigma * std;
        let lower = (mean - self.sigma * std).max(0.0);
        let z = |v: f64| if std > 0.0 { (v - mean) / std } else { 0.0 };

        let anomalies = points
            .iter()
            .filter(|(_, v)| *v > upper || (*v < lower && *v > self.running_threshold))
            .map(|(r, v)| AnomalyEvent {
                machine_id: r.machine_id.clone(),
                timestamp: r.timestamp,
                value: *v,
                lower_bound: lower,
                upper_bound: upper,
                mean,
                score: Some(z(*v)),
            })
            .collect();

        let mean_score = values.iter().map(|v| z(*v).abs()).mean();

        ScoreOutcome {
            total_points: points.len(),
            anomalies,
            mean_score: Some(mean_score),
        }
    }
}

impl AnomalyScorer for ThresholdScorer {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn min_valid_points(&self) -> usize {
        self.min_valid_points
    }

    fn score(&self, _machine_id: &str, window: &[Reading]) -> Result<ScoreOutcome, ScoringError> {
        Ok(self.score_window(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn window(values: &[Option<f64>]) -> Vec<Reading> {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Reading::new("G19", t0 + Duration::minutes(10 * i as i64), *v))
            .collect()
    }

    #[test]
    fn test_fewer_than_five_valid_points_is_empty() {
        let w = window(&[Some(1.0), Some(500.0), None, Some(2.0), Some(3.0), None]);
        let outcome = ThresholdScorer::default().score_window(&w);
        assert_eq!(outcome.total_points, 4);
        assert!(outcome.anomalies.is_empty());
        assert!(outcome.mean_score.is_none());
    }

    #[test]
    fn test_high_spike_flagged() {
        let mut values = vec![Some(100.0); 30];
        values.push(Some(400.0));
        let outcome = ThresholdScorer::default().score_window(&window(&values));
        assert_eq!(outcome.total_points, 31);
        assert_eq!(outcome.anomalies.len(), 1);
        let event = &outcome.anomalies[0];
        assert_eq!(event.value, 400.0);
        assert!(event.value > event.upper_bound);
        assert!(event.score.unwrap() > 3.0);
    }

    #[test]
    fn test_band_with_known_mean_and_std() {
        // Alternating 90/110 gives mean 100 and sample std close to 10.
        let mut values: Vec<Option<f64>> = (0..400)
            .map(|i| Some(if i % 2 == 0 { 90.0 } else { 110.0 }))
            .collect();
        values.extend([Some(135.0), Some(60.0), Some(0.3)]);
        let outcome = ThresholdScorer::default().score_window(&window(&values));

        let flagged: Vec<f64> = outcome.anomalies.iter().map(|e| e.value).collect();
        assert!(flagged.contains(&135.0), "{flagged:?}");
        assert!(flagged.contains(&60.0), "{flagged:?}");
        assert!(!flagged.contains(&0.3), "stopped reading must not be a low anomaly");
    }

    #[test]
    fn test_lower_bound_clamped_at_zero() {
        let values: Vec<Option<f64>> = [1.0, 50.0, 2.0, 60.0, 1.5, 55.0].iter().map(|v| Some(*v)).collect();
        let outcome = ThresholdScorer::default().score_window(&window(&values));
        assert!(outcome.anomalies.is_empty());
        assert!(outcome.mean_score.is_some());
    }

    #[test]
    fn test_constant_window_flags_nothing() {
        let outcome = ThresholdScorer::default().score_window(&window(&vec![Some(42.0); 10]));
        assert!(outcome.anomalies.is_empty());
        assert_eq!(outcome.mean_score, Some(0.0));
    }
}
