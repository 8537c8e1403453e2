//! Fingerprint-based alert deduplication.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::config::defaults;
use crate::types::{AlertFingerprint, AlertKind};

/// Remembers which alert fingerprints have fired and when.
///
/// Stop fingerprints fire once per bucket for as long as they are retained.
/// Anomaly fingerprints may fire again once the cooldown has passed. The
/// check and the reservation happen under one lock, so two monitoring
/// cycles racing on the same fingerprint cannot both fire it.
pub struct AlertDeduplicator {
    fired: Mutex<HashMap<AlertFingerprint, DateTime<Utc>>>,
    anomaly_cooldown: Duration,
    retention: Duration,
}

impl Default for AlertDeduplicator {
    fn default() -> Self {
        Self::new(
            defaults::ANOMALY_COOLDOWN_HOURS,
            defaults::FINGERPRINT_RETENTION_HOURS,
        )
    }
}

impl AlertDeduplicator {
    pub fn new(anomaly_cooldown_hours: u64, retention_hours: u64) -> Self {
        Self {
            fired: Mutex::new(HashMap::new()),
            anomaly_cooldown: Duration::hours(anomaly_cooldown_hours as i64),
            retention: Duration::hours(retention_hours as i64),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AlertFingerprint, DateTime<Utc>>> {
        self.fired.lock().unwrap_or_else(|e| {
            warn!("Fingerprint map mutex poisoned, recovering");
            e.into_inner()
        })
    }

    /// Returns true if `fingerprint` may fire at `now`, and if so marks it
    /// fired in the same step. A second call with the same fingerprint
    /// inside its suppression window returns false.
    pub fn should_fire(&self, fingerprint: &AlertFingerprint, now: DateTime<Utc>) -> bool {
        let mut fired = self.lock();
        let allowed = match fired.get(fingerprint) {
            None => true,
            Some(last) => match fingerprint.kind {
                AlertKind::Stop => false,
                AlertKind::Anomaly => now - *last > self.anomaly_cooldown,
            },
        };
        if allowed {
            fired.insert(fingerprint.clone(), now);
        }
        allowed
    }

    /// Record `fingerprint` as fired at `now`, regardless of prior state.
    pub fn mark_fired(&self, fingerprint: &AlertFingerprint, now: DateTime<Utc>) {
        self.lock().insert(fingerprint.clone(), now);
    }

    /// Drop fingerprints last fired more than the retention period before
    /// `now`. Returns the number removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut fired = self.lock();
        let before = fired.len();
        fired.retain(|_, last| now - *last <= self.retention);
        before - fired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
