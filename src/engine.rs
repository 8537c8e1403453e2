//! Detection engine.
//!
//! Glues the reading store, the detectors, the anomaly scorer, the alert
//! deduplicator and the notifier together. Every produced interface (status,
//! stops, anomalies, readings) and both monitoring cycles live here; the
//! HTTP layer and the scheduler only call into it.
//!
//! Each public operation has an `_at(now)` form so tests can pin the clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::alerts::{templates, AlertDeduplicator, Notifier};
use crate::config::PlantConfig;
use crate::detection::{StateClassifier, StopDetector};
use crate::monitoring::{CycleReport, CycleRunner, MonitorError, MonitorKind};
use crate::scoring::AnomalyScorer;
use crate::store::{self, ReadingStore};
use crate::types::{
    AlertFingerprint, AlertPayload, AnomalyEvent, AnomalyReport, AnomalySummary, MachineAnomalyReport,
    IntervalEnd, MachineReportStatus, MachineState, MachineStatus, MachineStatusReport, Reading,
    StopInterval,
};

pub struct DetectionEngine {
    config: Arc<PlantConfig>,
    store: Arc<dyn ReadingStore>,
    classifier: StateClassifier,
    detector: StopDetector,
    scorer: Arc<dyn AnomalyScorer>,
    dedup: Arc<AlertDeduplicator>,
    notifier: Arc<dyn Notifier>,
}

impl DetectionEngine {
    pub fn new(
        config: Arc<PlantConfig>,
        store: Arc<dyn ReadingStore>,
        scorer: Arc<dyn AnomalyScorer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let classifier = StateClassifier::new(config.classifier.running_threshold);
        let detector = StopDetector::new(classifier, config.stops.min_duration_hours);
        let dedup = Arc::new(AlertDeduplicator::new(
            config.anomaly.cooldown_hours,
            config.monitoring.fingerprint_retention_hours,
        ));

        Self {
            config,
            store,
            classifier,
            detector,
            scorer,
            dedup,
            notifier,
        }
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn dedup(&self) -> &AlertDeduplicator {
        &self.dedup
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn store_name(&self) -> &str {
        self.store.store_name()
    }

    pub fn notifier_name(&self) -> &'static str {
        self.notifier.name()
    }

    /// Run `f` for each machine, on the rayon pool when configured. Output
    /// order always follows `machines`.
    fn map_machines<T, F>(&self, machines: &[String], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&String) -> T + Sync + Send,
    {
        if self.config.monitoring.parallel_machines {
            machines.par_iter().map(f).collect()
        } else {
            machines.iter().map(f).collect()
        }
    }

    async fn grouped_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<(Vec<String>, HashMap<String, Vec<Reading>>), MonitorError> {
        let readings = self.store.fetch_readings(since).await?;
        let grouped = store::group_by_machine(readings);
        let machines = store::machine_order(self.config.machines(), &grouped);
        Ok((machines, grouped))
    }

    // ========================================================================
    // Produced interfaces
    // ========================================================================

    pub async fn machine_status(&self) -> Result<MachineStatusReport, MonitorError> {
        self.machine_status_at(Utc::now()).await
    }

    /// State of every machine from its latest reading. A machine with no
    /// readings at all is reported `Disconnected`.
    pub async fn machine_status_at(&self, now: DateTime<Utc>) -> Result<MachineStatusReport, MonitorError> {
        let since = self.config.stops.lookback().map(|d| now - d);
        let readings = self.store.fetch_readings(since).await?;
        let latest = store::latest_per_machine(&readings);

        let mut ids: Vec<String> = self.config.machines().to_vec();
        if ids.is_empty() {
            ids = latest.keys().map(|k| k.to_string()).collect();
            ids.sort();
        }

        let machines = ids
            .into_iter()
            .map(|machine_id| match latest.get(machine_id.as_str()) {
                Some(reading) => MachineStatus {
                    state: self.classifier.classify(reading),
                    last_seen: Some(reading.timestamp),
                    value: reading.valid_value(),
                    machine_id,
                },
                None => MachineStatus {
                    machine_id,
                    state: MachineState::Disconnected,
                    last_seen: None,
                    value: None,
                },
            })
            .collect();

        Ok(MachineStatusReport { timestamp: now, machines })
    }

    pub async fn stop_intervals(&self) -> Result<Vec<StopInterval>, MonitorError> {
        self.stop_intervals_at(Utc::now()).await
    }

    /// Stop intervals for every machine, concatenated in machine order.
    ///
    /// Detection always runs over the full history so an interval keeps its
    /// real start however long the stop lasts. The lookback only limits which
    /// closed intervals are reported; open intervals are always reported.
    pub async fn stop_intervals_at(&self, now: DateTime<Utc>) -> Result<Vec<StopInterval>, MonitorError> {
        let (machines, grouped) = self.grouped_since(None).await?;
        let reported_since = self.config.stops.lookback().map(|d| now - d);

        let per_machine = self.map_machines(&machines, |id| {
            grouped
                .get(id)
                .map(|readings| self.detector.detect_stops(readings, now))
                .unwrap_or_default()
        });

        Ok(per_machine
            .into_iter()
            .flatten()
            .filter(|interval| match (interval.end, reported_since) {
                (IntervalEnd::At(end), Some(since)) => end >= since,
                _ => true,
            })
            .collect())
    }

    pub async fn detect_anomalies(&self, window_hours: u64) -> Result<AnomalyReport, MonitorError> {
        self.detect_anomalies_at(Utc::now(), window_hours).await
    }

    /// Score each machine's trailing `window_hours` of readings. Per-machine
    /// failures are reported in that machine's entry and never abort others.
    pub async fn detect_anomalies_at(
        &self,
        now: DateTime<Utc>,
        window_hours: u64,
    ) -> Result<AnomalyReport, MonitorError> {
        let since = now - Duration::hours(window_hours as i64);
        let (machines, grouped) = self.grouped_since(Some(since)).await?;
        let min_points = self.scorer.min_valid_points();

        let reports = self.map_machines(&machines, |id| {
            let window = grouped
                .get(id)
                .map(|r| store::window_since(r, since))
                .unwrap_or_default();

            let report = if window.is_empty() {
                MachineAnomalyReport::warning(0, "no readings in window")
            } else {
                match self.scorer.score(id, window) {
                    Ok(outcome) if outcome.total_points < min_points => MachineAnomalyReport::warning(
                        outcome.total_points,
                        format!(
                            "insufficient data: {} valid readings, {} required",
                            outcome.total_points, min_points
                        ),
                    ),
                    Ok(outcome) => MachineAnomalyReport::success(outcome),
                    Err(e) => {
                        warn!(machine = %id, error = %e, "Anomaly scoring failed");
                        MachineAnomalyReport::error(e.to_string())
                    }
                }
            };
            (id.clone(), report)
        });

        let machines_processed = reports
            .iter()
            .filter(|(_, r)| r.status == MachineReportStatus::Success)
            .count();
        let anomalies_found = reports.iter().any(|(_, r)| r.anomalies_count > 0);

        Ok(AnomalyReport {
            summary: AnomalySummary {
                machines_count: reports.len(),
                machines_processed,
                anomalies_found,
                timestamp: now,
            },
            machines: reports,
        })
    }

    pub async fn readings(&self, hours: u64) -> Result<Vec<Reading>, MonitorError> {
        self.readings_at(Utc::now(), hours).await
    }

    /// Raw readings in the trailing `hours`.
    pub async fn readings_at(&self, now: DateTime<Utc>, hours: u64) -> Result<Vec<Reading>, MonitorError> {
        Ok(self
            .store
            .fetch_readings(Some(now - Duration::hours(hours as i64)))
            .await?)
    }

    // ========================================================================
    // Monitoring cycles
    // ========================================================================

    async fn dispatch(&self, fingerprint: &AlertFingerprint, payload: &AlertPayload, report: &mut CycleReport) {
        match self.notifier.send_alert(payload).await {
            Ok(()) => {
                report.alerts_sent += 1;
                info!(fingerprint = %fingerprint, subject = %payload.subject, "Alert sent");
            }
            Err(e) => {
                // The fingerprint stays marked: at most one attempt per fingerprint.
                report.alerts_failed += 1;
                error!(fingerprint = %fingerprint, error = %e, "Alert delivery failed");
            }
        }
    }

    /// One stop-monitor cycle: alert on every open stop whose elapsed whole
    /// hours is a positive multiple of the alert cadence.
    pub async fn run_stop_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, MonitorError> {
        let mut report = CycleReport {
            fingerprints_evicted: self.dedup.evict_expired(now),
            ..CycleReport::default()
        };

        let intervals = self.stop_intervals_at(now).await?;
        report.machines_checked = intervals
            .iter()
            .map(|i| i.machine_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        let every = self.config.stops.alert_every_hours;
        for interval in intervals.iter().filter(|i| i.is_open()) {
            let hours = interval.elapsed_whole_hours(now);
            if hours <= 0 || hours % every != 0 {
                continue;
            }
            report.candidates += 1;

            let fingerprint = AlertFingerprint::stop(&interval.machine_id, interval.start, hours, every);
            if !self.dedup.should_fire(&fingerprint, now) {
                debug!(fingerprint = %fingerprint, "Stop alert already sent");
                continue;
            }

            let payload = templates::stop_alert(
                &interval.machine_id,
                interval.start,
                hours,
                &self.config.notify.recipient,
                now,
            );
            self.dispatch(&fingerprint, &payload, &mut report).await;
        }

        Ok(report)
    }

    /// One anomaly-monitor cycle: score the configured window and send one
    /// alert per machine carrying only anomalies not alerted within the
    /// cooldown.
    pub async fn run_anomaly_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport, MonitorError> {
        let mut report = CycleReport {
            fingerprints_evicted: self.dedup.evict_expired(now),
            ..CycleReport::default()
        };

        let anomalies = self
            .detect_anomalies_at(now, self.config.anomaly.window_hours)
            .await?;
        report.machines_checked = anomalies.summary.machines_count;

        for (machine_id, machine_report) in &anomalies.machines {
            if machine_report.anomalies.is_empty() {
                continue;
            }
            report.candidates += machine_report.anomalies.len();

            let fresh: Vec<AnomalyEvent> = machine_report
                .anomalies
                .iter()
                .filter(|e| self.dedup.should_fire(&AlertFingerprint::anomaly(machine_id, e.timestamp), now))
                .cloned()
                .collect();
            if fresh.is_empty() {
                debug!(machine = %machine_id, "All anomalies already alerted");
                continue;
            }

            let payload = templates::anomaly_alert(
                machine_id,
                &fresh,
                self.scorer.name(),
                &self.config.notify.recipient,
                now,
            );
            let fingerprint = AlertFingerprint::anomaly(machine_id, fresh[0].timestamp);
            self.dispatch(&fingerprint, &payload, &mut report).await;
        }

        Ok(report)
    }

    /// Operator-triggered anomaly alert. Fingerprints of the given events are
    /// marked fired only once the notifier accepted the alert.
    pub async fn send_manual_alert(
        &self,
        machine_id: &str,
        events: &[AnomalyEvent],
        now: DateTime<Utc>,
    ) -> Result<AlertPayload, MonitorError> {
        if machine_id.trim().is_empty() {
            return Err(MonitorError::InvalidRequest("machine is required".to_string()));
        }
        if events.is_empty() {
            return Err(MonitorError::InvalidRequest("no anomalies to send".to_string()));
        }

        let payload = templates::anomaly_alert(
            machine_id,
            events,
            self.scorer.name(),
            &self.config.notify.recipient,
            now,
        );
        self.notifier.send_alert(&payload).await?;

        for event in events {
            self.dedup
                .mark_fired(&AlertFingerprint::anomaly(machine_id, event.timestamp), now);
        }
        info!(machine = %machine_id, count = events.len(), "Manual alert sent");
        Ok(payload)
    }
}

#[async_trait]
impl CycleRunner for DetectionEngine {
    async fn run_cycle(&self, kind: MonitorKind) -> Result<CycleReport, MonitorError> {
        let now = Utc::now();
        match kind {
            MonitorKind::Stop => self.run_stop_cycle_at(now).await,
            MonitorKind::Anomaly => self.run_anomaly_cycle_at(now).await,
        }
    }
}
