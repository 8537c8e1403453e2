//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for PlantConfig.
///
/// Maintained by hand to match the struct hierarchy in plant_config.rs.
/// Any new field added to PlantConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [plant]
        "plant",
        "plant.name",
        "plant.machines",
        // [classifier]
        "classifier",
        "classifier.running_threshold",
        // [stops]
        "stops",
        "stops.min_duration_hours",
        "stops.alert_every_hours",
        "stops.lookback_hours",
        // [anomaly]
        "anomaly",
        "anomaly.scorer",
        "anomaly.window_hours",
        "anomaly.sigma",
        "anomaly.min_valid_points",
        "anomaly.cooldown_hours",
        "anomaly.models_dir",
        // [monitoring]
        "monitoring",
        "monitoring.stop_interval_minutes",
        "monitoring.anomaly_interval_minutes",
        "monitoring.autostart",
        "monitoring.fingerprint_retention_hours",
        "monitoring.parallel_machines",
        // [notify]
        "notify",
        "notify.recipient",
        "notify.webhook_url",
        "notify.timeout_secs",
        // [store]
        "store",
        "store.csv_path",
        // [server]
        "server",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| {
            let suggestion = suggest_correction(&key, &known);
            ValidationWarning {
                message: format!("Unknown config key '{key}'"),
                field: key,
                suggestion,
            }
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed PlantConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &super::PlantConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let threshold = config.classifier.running_threshold;
    if !threshold.is_finite() || threshold < 0.0 {
        errors.push(format!(
            "classifier.running_threshold = {threshold} must be a finite value >= 0"
        ));
    }

    if !(config.stops.min_duration_hours >= 0.0) {
        errors.push(format!(
            "stops.min_duration_hours = {} must be >= 0",
            config.stops.min_duration_hours
        ));
    }
    if config.stops.alert_every_hours <= 0 {
        errors.push(format!(
            "stops.alert_every_hours = {} must be > 0",
            config.stops.alert_every_hours
        ));
    }

    let a = &config.anomaly;
    if !(a.sigma > 0.0) || !a.sigma.is_finite() {
        errors.push(format!("anomaly.sigma = {} must be > 0", a.sigma));
    }
    if a.min_valid_points < 2 {
        errors.push(format!(
            "anomaly.min_valid_points = {} must be >= 2 (sample std needs two points)",
            a.min_valid_points
        ));
    }
    if a.window_hours == 0 {
        errors.push("anomaly.window_hours must be > 0".to_string());
    }

    let m = &config.monitoring;
    if m.stop_interval_minutes == 0 {
        errors.push("monitoring.stop_interval_minutes must be > 0".to_string());
    }
    if m.anomaly_interval_minutes == 0 {
        errors.push("monitoring.anomaly_interval_minutes must be > 0".to_string());
    }

    // Evicting before the cooldown or the scored window elapses would let a
    // suppressed anomaly alert fire again.
    let retention = m.fingerprint_retention_hours;
    if retention < a.cooldown_hours || retention < a.window_hours {
        warnings.push(ValidationWarning {
            field: "monitoring.fingerprint_retention_hours".to_string(),
            message: format!(
                "fingerprint_retention_hours = {retention} is shorter than the anomaly cooldown ({}h) or window ({}h); repeat alerts are possible",
                a.cooldown_hours, a.window_hours
            ),
            suggestion: None,
        });
    }

    if config.plant.machines.is_empty() {
        warnings.push(ValidationWarning {
            field: "plant.machines".to_string(),
            message: "plant.machines is empty; every machine found in the data will be evaluated"
                .to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlantConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("treshold", "threshold"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [anomaly]
            sigma = 2.5
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"anomaly".to_string()));
        assert!(keys.contains(&"anomaly.sigma".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[classifier]
running_treshold = 0.4
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("running_treshold"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("classifier.running_threshold")
        );
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_ranges_defaults_clean() {
        let (errors, warnings) = validate_ranges(&PlantConfig::default());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_ranges_negative_sigma_is_error() {
        let mut config = PlantConfig::default();
        config.anomaly.sigma = -1.0;
        let (errors, _) = validate_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("anomaly.sigma")));
    }

    #[test]
    fn test_ranges_short_retention_warns() {
        let mut config = PlantConfig::default();
        config.monitoring.fingerprint_retention_hours = 2;
        let (errors, warnings) = validate_ranges(&config);
        assert!(errors.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.field == "monitoring.fingerprint_retention_hours"));
    }
}
