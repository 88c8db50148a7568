use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BLOCK_CLEARANCE_MINUTES, DEFAULT_DECISION_ENDPOINT, DEFAULT_DECISION_TIMEOUT_SECS,
    DEFAULT_JUNCTION_CLEARANCE_MINUTES, LOOP_LINE_FOLLOW_GAP_MINUTES, RESOLUTION_HISTORY_CAPACITY,
    RESOLVED_GRACE_SECONDS,
};
use crate::error::ConfigError;

const ENV_DECISION_URL: &str = "RAIL_DECISION_URL";
const ENV_DECISION_TIMEOUT: &str = "RAIL_DECISION_TIMEOUT_SECS";

/// Thresholds the detectors read. Kept separate from the service settings so
/// detection stays a pure function of trains, time and these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub default_block_clearance_min: f64,
    pub default_junction_clearance_min: f64,
    pub loop_follow_gap_min: i64,
    pub resolved_grace_secs: i64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            default_block_clearance_min: DEFAULT_BLOCK_CLEARANCE_MINUTES,
            default_junction_clearance_min: DEFAULT_JUNCTION_CLEARANCE_MINUTES,
            loop_follow_gap_min: LOOP_LINE_FOLLOW_GAP_MINUTES,
            resolved_grace_secs: RESOLVED_GRACE_SECONDS,
        }
    }
}

/// Settings for a running engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub detection: DetectionSettings,
    pub history_capacity: usize,
    pub decision_endpoint: String,
    pub decision_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            detection: DetectionSettings::default(),
            history_capacity: RESOLUTION_HISTORY_CAPACITY,
            decision_endpoint: DEFAULT_DECISION_ENDPOINT.to_string(),
            decision_timeout_secs: DEFAULT_DECISION_TIMEOUT_SECS,
        }
    }
}

impl EngineSettings {
    /// Parse settings from JSON; missing keys keep their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `RAIL_DECISION_URL` and `RAIL_DECISION_TIMEOUT_SECS` from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout variable is not a positive integer
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ENV_DECISION_URL) {
            self.decision_endpoint = url;
        }
        if let Some(raw) = lookup(ENV_DECISION_TIMEOUT) {
            self.decision_timeout_secs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_DECISION_TIMEOUT.to_string(),
                value: raw.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, bool, String); 4] = [
            (
                "decision_timeout_secs",
                self.decision_timeout_secs > 0,
                self.decision_timeout_secs.to_string(),
            ),
            (
                "history_capacity",
                self.history_capacity > 0,
                self.history_capacity.to_string(),
            ),
            (
                "detection.default_block_clearance_min",
                self.detection.default_block_clearance_min > 0.0,
                self.detection.default_block_clearance_min.to_string(),
            ),
            (
                "detection.default_junction_clearance_min",
                self.detection.default_junction_clearance_min > 0.0,
                self.detection.default_junction_clearance_min.to_string(),
            ),
        ];
        match checks.into_iter().find(|(_, ok, _)| !ok) {
            Some((key, _, value)) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_documented_thresholds() {
        let settings = EngineSettings::default();
        assert_eq!(settings.detection.default_block_clearance_min, 3.0);
        assert_eq!(settings.detection.default_junction_clearance_min, 5.0);
        assert_eq!(settings.detection.loop_follow_gap_min, 5);
        assert_eq!(settings.detection.resolved_grace_secs, 300);
        assert_eq!(settings.history_capacity, 50);
        assert_eq!(settings.decision_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_json_keeps_defaults_for_missing_keys() {
        let settings = EngineSettings::from_json_str(r#"{"decision_endpoint": "http://ops:9000/suggest"}"#)
            .expect("valid settings");
        assert_eq!(settings.decision_endpoint, "http://ops:9000/suggest");
        assert_eq!(settings.history_capacity, 50);
        assert_eq!(settings.detection, DetectionSettings::default());
    }

    #[test]
    fn test_from_json_rejects_zero_timeout() {
        let result = EngineSettings::from_json_str(r#"{"decision_timeout_secs": 0}"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "decision_timeout_secs"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DECISION_URL, "http://gateway/ai-suggest"),
            (ENV_DECISION_TIMEOUT, "3"),
        ]
        .into_iter()
        .collect();
        let settings = EngineSettings::default()
            .with_overrides(|key| vars.get(key).map(ToString::to_string))
            .expect("valid overrides");
        assert_eq!(settings.decision_endpoint, "http://gateway/ai-suggest");
        assert_eq!(settings.decision_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_env_override_rejects_garbage_timeout() {
        let result = EngineSettings::default()
            .with_overrides(|key| (key == ENV_DECISION_TIMEOUT).then(|| "soon".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
