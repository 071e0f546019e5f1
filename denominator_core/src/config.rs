//! Process-wide, read-only configuration for denominator actors.

use crate::duration;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration shared by every actor in a run.
///
/// Loaded once (usually from JSON) and handed to actors by reference;
/// actors never mutate it.
///
/// ```json
/// { "eureka_poll": "500ms", "zone_names": ["zoneA", "zoneB"], "regions": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenominatorConfig {
    /// Interval between discovery fan-outs (default: 1s)
    #[serde(with = "duration::literal")]
    pub eureka_poll: Duration,

    /// Availability zones per region
    pub zone_names: Vec<String>,

    /// Number of regions
    pub regions: usize,

    /// Log every inbound message at debug level
    pub msglog: bool,

    /// Directory for histogram/guess artifacts (None = keep in memory)
    pub collect_dir: Option<PathBuf>,
}

impl Default for DenominatorConfig {
    fn default() -> Self {
        Self {
            eureka_poll: Duration::from_secs(1),
            zone_names: vec!["zoneA".into(), "zoneB".into(), "zoneC".into()],
            regions: 1,
            msglog: false,
            collect_dir: None,
        }
    }
}

impl DenominatorConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.eureka_poll.is_zero() {
            return Err(CoreError::invalid_config("eureka_poll must be non-zero"));
        }
        if self.regions == 0 {
            return Err(CoreError::invalid_config("regions must be at least 1"));
        }
        Ok(())
    }

    /// Expected number of registries (one per zone per region).
    pub fn registry_capacity(&self) -> usize {
        self.zone_names.len() * self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = DenominatorConfig::default();
        assert_eq!(config.eureka_poll, Duration::from_secs(1));
        assert_eq!(config.registry_capacity(), 3);
        assert!(!config.msglog);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config =
            DenominatorConfig::from_json_str(r#"{ "eureka_poll": "250ms", "regions": 2 }"#)
                .unwrap();

        assert_eq!(config.eureka_poll, Duration::from_millis(250));
        assert_eq!(config.regions, 2);
        assert_eq!(config.zone_names.len(), 3);
        assert_eq!(config.registry_capacity(), 6);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(DenominatorConfig::from_json_str(r#"{ "eureka_poll": "soon" }"#).is_err());
        assert!(matches!(
            DenominatorConfig::from_json_str(r#"{ "eureka_poll": "0" }"#),
            Err(CoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            DenominatorConfig::from_json_str(r#"{ "regions": 0 }"#),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_json_roundtrip_keeps_literals() {
        let config = DenominatorConfig {
            eureka_poll: Duration::from_millis(1500),
            msglog: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1500ms\""));
        assert_eq!(DenominatorConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "zone_names": ["a", "b"], "msglog": true }}"#).unwrap();

        let config = DenominatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.zone_names, vec!["a".to_string(), "b".to_string()]);
        assert!(config.msglog);
    }
}
