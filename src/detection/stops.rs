//! Stop interval detection via edge detection on the stopped/running signal.

use chrono::{DateTime, Utc};

use super::StateClassifier;
use crate::config::defaults;
use crate::types::{IntervalEnd, Reading, StopInterval};

/// Finds maximal stopped runs in one machine's ordered readings.
#[derive(Debug, Clone, Copy)]
pub struct StopDetector {
    classifier: StateClassifier,
    min_duration_hours: f64,
}

impl Default for StopDetector {
    fn default() -> Self {
        Self::new(StateClassifier::default(), defaults::MIN_STOP_DURATION_HOURS)
    }
}

impl StopDetector {
    pub fn new(classifier: StateClassifier, min_duration_hours: f64) -> Self {
        Self {
            classifier,
            min_duration_hours,
        }
    }

    /// Detect stop intervals in `readings` (ascending, single machine).
    ///
    /// A closed interval runs from the first stopped reading of a run to the
    /// first running reading after it. A run still stopped at the last
    /// reading yields one open interval measured up to `now`. Intervals
    /// shorter than the minimum duration are dropped; fewer than two
    /// readings yield nothing.
    ///
    /// The first reading is not a state change: a stopped run already under
    /// way there has no observed start and is only reported while it is
    /// still open.
    pub fn detect_stops(&self, readings: &[Reading], now: DateTime<Utc>) -> Vec<StopInterval> {
        if readings.len() < 2 {
            return Vec::new();
        }

        let stopped: Vec<bool> = readings.iter().map(|r| self.classifier.is_stopped(r)).collect();

        let mut intervals = Vec::new();
        let mut run_start = stopped[0].then_some(0);

        for i in 1..stopped.len() {
            if stopped[i] == stopped[i - 1] {
                continue;
            }
            if stopped[i] {
                run_start = Some(i);
            } else if let Some(start) = run_start.take().filter(|&start| start > 0) {
                let start_ts = readings[start].timestamp;
                let end_ts = readings[i].timestamp;
                if let Some(interval) = self.qualify(&readings[start], IntervalEnd::At(end_ts), end_ts - start_ts) {
                    intervals.push(interval);
                }
            }
        }

        if let Some(start) = run_start {
            let elapsed = now - readings[start].timestamp;
            if let Some(interval) = self.qualify(&readings[start], IntervalEnd::Open, elapsed) {
                intervals.push(interval);
            }
        }

        intervals
    }

    fn qualify(&self, first: &Reading, end: IntervalEnd, span: chrono::Duration) -> Option<StopInterval> {
        let hours = span.num_milliseconds() as f64 / 3_600_000.0;
        if hours < self.min_duration_hours {
            return None;
        }
        Some(StopInterval {
            machine_id: first.machine_id.clone(),
            start: first.timestamp,
            end,
            duration_hours: (hours * 100.0).round() / 100.0,
        })
    }
}
