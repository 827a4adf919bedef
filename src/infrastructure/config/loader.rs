use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".kospeak";

const ENV_PREFIX: &str = "KOSPEAK_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid band lower bounds {0:?}. Must start at 0.0 and strictly increase")]
    InvalidBandBounds([f64; 6]),

    #[error("Invalid weight for {name}: {value}. Must be finite and positive")]
    InvalidWeight { name: String, value: f64 },

    #[error("Invalid confidence prior: {0}. Must be finite and non-negative")]
    InvalidConfidencePrior(f64),

    #[error("Invalid average_turn_seconds: {0}. Must be positive")]
    InvalidTurnLength(f64),

    #[error("Invalid recommended duration range: {0}-{1} minutes")]
    InvalidDurationRange(f64, f64),

    #[error("Invalid correction density table {0:?}. Values must be 0-3 and non-increasing")]
    InvalidCorrectionDensity([u8; 6]),

    #[error("Invalid {name}: {value}. Must be within [0, 1]")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid max_highlights: {0}. Must be between 1 and 3")]
    InvalidMaxHighlights(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .kospeak/config.yaml (project config, created by init)
    /// 3. .kospeak/local.yaml (local overrides, optional)
    /// 4. Environment variables (KOSPEAK_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from_project(Path::new("."))
    }

    /// Load configuration for the project rooted at `root`.
    pub fn load_from_project(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment
    /// overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        let scoring = &config.scoring;
        let bounds = scoring.band_lower_bounds;
        let increasing = bounds.windows(2).all(|w| w[0] < w[1]);
        if bounds[0] != 0.0 || !increasing || bounds.iter().any(|b| !b.is_finite()) {
            return Err(ConfigError::InvalidBandBounds(bounds));
        }
        let weights = scoring
            .domain_weights
            .iter()
            .map(|(d, w)| (format!("domain {d}"), *w))
            .chain(
                scoring
                    .item_type_weights
                    .iter()
                    .map(|(t, w)| (format!("item type {}", t.as_str()), *w)),
            );
        for (name, value) in weights {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if !scoring.confidence_prior.is_finite() || scoring.confidence_prior < 0.0 {
            return Err(ConfigError::InvalidConfidencePrior(scoring.confidence_prior));
        }

        let goals = &config.goals;
        for (name, value) in [
            ("recency_weight", goals.recency_weight),
            ("progression_weight", goals.progression_weight),
            ("context_weight", goals.context_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: name.to_string(),
                    value,
                });
            }
        }
        if goals.recency_window_sessions == 0 {
            return Err(ConfigError::ValidationFailed(
                "recency_window_sessions must be at least 1".to_string(),
            ));
        }

        let planner = &config.planner;
        if !planner.average_turn_seconds.is_finite() || planner.average_turn_seconds <= 0.0 {
            return Err(ConfigError::InvalidTurnLength(planner.average_turn_seconds));
        }
        if planner.min_turns == 0 {
            return Err(ConfigError::ValidationFailed("min_turns must be at least 1".to_string()));
        }
        if planner.recommended_min_minutes <= 0.0
            || planner.recommended_min_minutes > planner.recommended_max_minutes
        {
            return Err(ConfigError::InvalidDurationRange(
                planner.recommended_min_minutes,
                planner.recommended_max_minutes,
            ));
        }
        let density = planner.correction_density_by_stage;
        if density.iter().any(|d| *d > 3) || density.windows(2).any(|w| w[0] < w[1]) {
            return Err(ConfigError::InvalidCorrectionDensity(density));
        }

        let tracker = &config.tracker;
        for (name, value) in [
            ("min_utterance_confidence", tracker.min_utterance_confidence),
            ("min_word_confidence", tracker.min_word_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if tracker.max_consecutive_unusable == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_consecutive_unusable must be at least 1".to_string(),
            ));
        }

        if !(1..=3).contains(&config.debrief.max_highlights) {
            return Err(ConfigError::InvalidMaxHighlights(config.debrief.max_highlights));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Domain;
    use std::fs;

    fn write_project(root: &Path, config: &str, local: Option<&str>) {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), config).unwrap();
        if let Some(local) = local {
            fs::write(dir.join("local.yaml"), local).unwrap();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".kospeak/kospeak.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.planner.correction_density_by_stage, [3, 3, 2, 1, 1, 0]);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
scoring:
  band_lower_bounds: [0.0, 0.15, 0.35, 0.55, 0.75, 0.95]
  domain_weights:
    pronunciation: 0.5
goals:
  recency_window_sessions: 4
logging:
  level: debug
  format: json
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.scoring.band_lower_bounds[1], 0.15);
        assert_eq!(config.scoring.domain_weight(Domain::Pronunciation), 0.5);
        assert_eq!(config.scoring.domain_weight(Domain::Grammar), 1.0);
        assert_eq!(config.goals.recency_window_sessions, 4);
        assert_eq!(config.goals.context_weight, 0.5);
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        write_project(
            dir.path(),
            "logging:\n  level: info\n  format: json\nplanner:\n  average_turn_seconds: 30.0\n",
            Some("logging:\n  level: debug\n"),
        );

        temp_env::with_vars_unset(["KOSPEAK_LOGGING__LEVEL", "KOSPEAK_PLANNER__MIN_TURNS"], || {
            let config = ConfigLoader::load_from_project(dir.path()).unwrap();
            assert_eq!(config.logging.level, "debug", "local overrides project config");
            assert_eq!(config.logging.format, "json", "unset keys keep project value");
            assert_eq!(config.planner.average_turn_seconds, 30.0);
        });
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        write_project(dir.path(), "logging:\n  level: warn\n", None);

        temp_env::with_vars(
            [
                ("KOSPEAK_LOGGING__LEVEL", Some("trace")),
                ("KOSPEAK_PLANNER__MIN_TURNS", Some("6")),
            ],
            || {
                let config = ConfigLoader::load_from_project(dir.path()).unwrap();
                assert_eq!(config.logging.level, "trace");
                assert_eq!(config.planner.min_turns, 6);
            },
        );
    }

    #[test]
    fn test_missing_project_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars_unset(["KOSPEAK_LOGGING__LEVEL", "KOSPEAK_PLANNER__MIN_TURNS"], || {
            let config = ConfigLoader::load_from_project(dir.path()).unwrap();
            assert_eq!(config.database.path, ".kospeak/kospeak.db");
        });
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::load_from_file(dir.path().join("nope.yaml")).is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "debrief:\n  max_highlights: 5\n").unwrap();
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("max_highlights"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogRotation(_))
        ));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_band_bounds() {
        let mut config = Config::default();
        config.scoring.band_lower_bounds = [0.1, 0.2, 0.4, 0.6, 0.8, 1.0];
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBandBounds(_))));

        config.scoring.band_lower_bounds = [0.0, 0.4, 0.4, 0.6, 0.8, 1.0];
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidBandBounds(_))));
    }

    #[test]
    fn test_validate_weights() {
        let mut config = Config::default();
        config.scoring.domain_weights.insert(Domain::Grammar, 0.0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeight { .. })
        ));

        let mut config = Config::default();
        config.goals.recency_weight = -1.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn test_validate_planner() {
        let mut config = Config::default();
        config.planner.correction_density_by_stage = [3, 2, 3, 1, 1, 0];
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidCorrectionDensity(_))
        ));

        let mut config = Config::default();
        config.planner.average_turn_seconds = 0.0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidTurnLength(_))));

        let mut config = Config::default();
        config.planner.recommended_min_minutes = 12.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDurationRange(..))
        ));
    }

    #[test]
    fn test_validate_tracker_and_debrief() {
        let mut config = Config::default();
        config.tracker.min_word_confidence = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThreshold { name: "min_word_confidence", .. })
        ));

        let mut config = Config::default();
        config.debrief.max_highlights = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxHighlights(0))
        ));
    }
}
