//! Plant Configuration - detection thresholds and monitoring cadence as TOML values
//!
//! Each struct implements `Default` with the values the plant has been
//! running with, so an absent config file changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable holding an explicit config path.
pub const CONFIG_ENV_VAR: &str = "PLANTWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "plantwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a plant deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Plant identification and metered machines
    #[serde(default)]
    pub plant: PlantInfo,

    /// Running / stopped cutoff
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Stop detection and stop alert cadence
    #[serde(default)]
    pub stops: StopConfig,

    /// Anomaly scoring
    #[serde(default)]
    pub anomaly: AnomalyConfig,

    /// Monitoring loop cadence
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Alert delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Reading source
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl PlantConfig {
    /// Load configuration using the standard search order:
    /// 1. `explicit` path, when given
    /// 2. `$PLANTWATCH_CONFIG` environment variable
    /// 3. `./plantwatch.toml` in the current working directory
    /// 4. Built-in defaults
    ///
    /// An explicit path that fails to load is an error; the implicit
    /// locations fall back with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), plant = %config.plant.name, "Loaded plant config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), plant = %config.plant.name, "Loaded plant config from PLANTWATCH_CONFIG");
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from PLANTWATCH_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "PLANTWATCH_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(plant = %config.plant.name, "Loaded plant config from ./plantwatch.toml");
                    return Ok(config);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./plantwatch.toml, using defaults");
                }
            }
        }

        info!("No plantwatch.toml found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are reported as warnings and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate ranges and internal consistency.
    ///
    /// Suspicious-but-possible values are logged as warnings; impossible
    /// values are collected into a single `ConfigError::Validation`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Machines to evaluate, in report order.
    pub fn machines(&self) -> &[String] {
        &self.plant.machines
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Plant Info
// ============================================================================

/// Plant identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantInfo {
    /// Plant name used in alert subjects and logs
    #[serde(default = "default_plant_name")]
    pub name: String,

    /// Metered machine identifiers, in report order.
    ///
    /// An empty list means "every machine present in the data, sorted".
    #[serde(default = "default_machines")]
    pub machines: Vec<String>,
}

fn default_plant_name() -> String {
    "plant".to_string()
}

fn default_machines() -> Vec<String> {
    defaults::DEFAULT_MACHINES.iter().map(|m| (*m).to_string()).collect()
}

impl Default for PlantInfo {
    fn default() -> Self {
        Self {
            name: default_plant_name(),
            machines: default_machines(),
        }
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Consumption at or above this value means the machine is running.
    #[serde(default = "default_running_threshold")]
    pub running_threshold: f64,
}

fn default_running_threshold() -> f64 { defaults::RUNNING_THRESHOLD }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            running_threshold: default_running_threshold(),
        }
    }
}

// ============================================================================
// Stops
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopConfig {
    /// Stops shorter than this are not reported (hours).
    #[serde(default = "default_min_stop_hours")]
    pub min_duration_hours: f64,

    /// A running stop alerts once at every multiple of this many hours.
    #[serde(default = "default_alert_every_hours")]
    pub alert_every_hours: i64,

    /// Closed stop intervals that ended longer ago than this are not
    /// reported, and machine status only looks at readings this recent
    /// (hours). Open stops are always reported with their real start.
    /// 0 means no limit.
    #[serde(default)]
    pub lookback_hours: u64,
}

fn default_min_stop_hours() -> f64 { defaults::MIN_STOP_DURATION_HOURS }
fn default_alert_every_hours() -> i64 { defaults::STOP_ALERT_EVERY_HOURS }

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            min_duration_hours: default_min_stop_hours(),
            alert_every_hours: default_alert_every_hours(),
            lookback_hours: 0,
        }
    }
}

impl StopConfig {
    /// Lookback as an optional duration (`None` = full history).
    pub fn lookback(&self) -> Option<chrono::Duration> {
        (self.lookback_hours > 0).then(|| chrono::Duration::hours(self.lookback_hours as i64))
    }
}

// ============================================================================
// Anomaly
// ============================================================================

/// Which scorer implementation the engine uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// Rolling mean ± sigma·std band
    #[default]
    Threshold,
    /// Per-machine learned envelope models
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default)]
    pub scorer: ScorerKind,

    /// Trailing window scored by the anomaly monitor (hours).
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,

    /// Band half-width in standard deviations.
    #[serde(default = "default_sigma")]
    pub sigma: f64,

    /// Minimum valid readings before a window is scored.
    #[serde(default = "default_min_valid_points")]
    pub min_valid_points: usize,

    /// Same-minute anomaly alerts are suppressed for this long (hours).
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,

    /// Directory of `*.json` envelope models (used by the `model` scorer).
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
}

fn default_window_hours() -> u64 { defaults::ANOMALY_WINDOW_HOURS }
fn default_sigma() -> f64 { defaults::ANOMALY_SIGMA }
fn default_min_valid_points() -> usize { defaults::MIN_VALID_POINTS }
fn default_cooldown_hours() -> u64 { defaults::ANOMALY_COOLDOWN_HOURS }
fn default_models_dir() -> PathBuf { PathBuf::from("models") }

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerKind::default(),
            window_hours: default_window_hours(),
            sigma: default_sigma(),
            min_valid_points: default_min_valid_points(),
            cooldown_hours: default_cooldown_hours(),
            models_dir: default_models_dir(),
        }
    }
}

// ============================================================================
// Monitoring
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_stop_interval")]
    pub stop_interval_minutes: u64,

    #[serde(default = "default_anomaly_interval")]
    pub anomaly_interval_minutes: u64,

    /// Start both monitors when the process starts.
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Fired fingerprints older than this are evicted (hours).
    #[serde(default = "default_retention_hours")]
    pub fingerprint_retention_hours: u64,

    /// Evaluate machines on the rayon pool within a cycle.
    #[serde(default)]
    pub parallel_machines: bool,
}

fn default_stop_interval() -> u64 { defaults::STOP_MONITOR_INTERVAL_MINUTES }
fn default_anomaly_interval() -> u64 { defaults::ANOMALY_MONITOR_INTERVAL_MINUTES }
fn default_autostart() -> bool { true }
fn default_retention_hours() -> u64 { defaults::FINGERPRINT_RETENTION_HOURS }

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stop_interval_minutes: default_stop_interval(),
            anomaly_interval_minutes: default_anomaly_interval(),
            autostart: default_autostart(),
            fingerprint_retention_hours: default_retention_hours(),
            parallel_machines: false,
        }
    }
}

impl MonitoringConfig {
    pub fn stop_interval(&self) -> Duration {
        Duration::from_secs(self.stop_interval_minutes * 60)
    }

    pub fn anomaly_interval(&self) -> Duration {
        Duration::from_secs(self.anomaly_interval_minutes * 60)
    }
}

// ============================================================================
// Notify
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Alert recipient address
    #[serde(default = "default_recipient")]
    pub recipient: String,

    /// Webhook receiving alert payloads as JSON. Alerts are only logged when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_recipient() -> String {
    "maintenance@localhost".to_string()
}
fn default_notify_timeout() -> u64 { defaults::NOTIFY_HTTP_TIMEOUT_SECS }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
            webhook_url: None,
            timeout_secs: default_notify_timeout(),
        }
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Wide-format CSV export (`Timestamp,<machine>,...`).
    /// Demo data is generated when unset.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `PLANTWATCH_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = PlantConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: PlantConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.classifier.running_threshold, 0.5);
        assert_eq!(config.stops.alert_every_hours, 2);
        assert_eq!(config.anomaly.min_valid_points, 5);
        assert_eq!(config.anomaly.cooldown_hours, 4);
        assert_eq!(config.anomaly.scorer, ScorerKind::Threshold);
        assert_eq!(config.plant.machines.len(), 7);
        assert!(config.monitoring.autostart);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[plant]
name = "Line-3"
machines = ["G19", "G26"]

[anomaly]
scorer = "model"
window_hours = 6
"#;
        let config = PlantConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.plant.name, "Line-3");
        assert_eq!(config.machines(), ["G19".to_string(), "G26".to_string()]);
        assert_eq!(config.anomaly.scorer, ScorerKind::Model);
        assert_eq!(config.anomaly.window_hours, 6);
        // Non-overridden values retain defaults
        assert_eq!(config.anomaly.sigma, 3.0);
        assert_eq!(config.monitoring.stop_interval_minutes, 5);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = PlantConfig::default();
        config.monitoring.stop_interval_minutes = 0;
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_lookback_zero_means_full_history() {
        let mut stops = StopConfig::default();
        assert!(stops.lookback().is_none());
        stops.lookback_hours = 72;
        assert_eq!(stops.lookback(), Some(chrono::Duration::hours(72)));
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = PlantConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped: PlantConfig = toml::from_str(&toml_str).expect("deserialization should work");
        assert_eq!(original.plant.machines, roundtripped.plant.machines);
        assert_eq!(original.anomaly.sigma, roundtripped.anomaly.sigma);
        assert!(toml_str.contains("[monitoring]"), "Missing [monitoring] section");
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let result = PlantConfig::load_from_file(Path::new("/nonexistent/plantwatch.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
