//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. `plantwatch.toml` overrides the
//! ones that have a config key.

// ============================================================================
// Classification
// ============================================================================

/// Unit-consumption cutoff below which a machine counts as stopped.
pub const RUNNING_THRESHOLD: f64 = 0.5;

// ============================================================================
// Stop Detection
// ============================================================================

/// Minimum stop duration that gets reported (hours).
pub const MIN_STOP_DURATION_HOURS: f64 = 1.0;

/// Stop alerts fire at every multiple of this many elapsed hours.
pub const STOP_ALERT_EVERY_HOURS: i64 = 2;

// ============================================================================
// Anomaly Scoring
// ============================================================================

/// Default trailing window scored by the anomaly monitor (hours).
pub const ANOMALY_WINDOW_HOURS: u64 = 12;

/// Default window for on-demand anomaly detection (hours).
pub const ON_DEMAND_ANOMALY_WINDOW_HOURS: u64 = 48;

/// Band half-width in standard deviations.
pub const ANOMALY_SIGMA: f64 = 3.0;

/// Minimum valid readings in a window before statistics are computed.
pub const MIN_VALID_POINTS: usize = 5;

/// Anomaly fingerprint cooldown (hours).
pub const ANOMALY_COOLDOWN_HOURS: u64 = 4;

// ============================================================================
// Monitoring
// ============================================================================

/// Stop monitor polling interval (minutes).
pub const STOP_MONITOR_INTERVAL_MINUTES: u64 = 5;

/// Anomaly monitor polling interval (minutes).
pub const ANOMALY_MONITOR_INTERVAL_MINUTES: u64 = 60;

/// How long a fired fingerprint is remembered (hours).
///
/// Longer than the anomaly cooldown and longer than any scored window, so
/// evicting older entries can never re-enable a suppressed alert.
pub const FINGERPRINT_RETENTION_HOURS: u64 = 24;

// ============================================================================
// Notification
// ============================================================================

/// HTTP timeout for the webhook notifier (seconds).
pub const NOTIFY_HTTP_TIMEOUT_SECS: u64 = 30;

/// Machines metered by the plant's energy monitoring export.
pub const DEFAULT_MACHINES: &[&str] = &[
    "G19",
    "G26",
    "MISFAT_3_Compresseur_3",
    "MISFAT_3_G39f",
    "MISFAT_3_D18f",
    "MISFAT_3_G10f",
    "MISFAT_3_TGBT_N3f",
];
