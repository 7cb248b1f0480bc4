//! Configuration loading and typed config structures for the Doodle server.
//!
//! The canonical configuration lives in `doodle-config.yaml` in the
//! working directory. Every field has a default, so a missing file or a
//! partial file is valid. Selected values can be overridden through
//! environment variables for container deployments.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use doodle_types::RoundDefinition;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
///
/// Mirrors the structure of `doodle-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Listen address and per-connection queue sizing.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Countdown timer settings.
    #[serde(default)]
    pub timer: TimerConfig,

    /// Inference scheduling settings.
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Blocking worker pool settings.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Canvas archive settings.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Round catalog, in play order.
    #[serde(default = "default_rounds")]
    pub rounds: Vec<RoundDefinition>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            timer: TimerConfig::default(),
            prediction: PredictionConfig::default(),
            workers: WorkerConfig::default(),
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
            rounds: default_rounds(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `DOODLE_HOST` overrides `network.host`
    /// - `DOODLE_PORT` overrides `network.port`
    /// - `DOODLE_HISTORY_DIR` overrides `history.dir`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `DOODLE_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("DOODLE_HOST") {
            self.network.host = val;
        }
        if let Ok(val) = std::env::var("DOODLE_PORT") {
            self.network.port = val.parse().map_err(|e| ConfigError::Invalid {
                field: "network.port",
                reason: format!("DOODLE_PORT={val}: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("DOODLE_HISTORY_DIR") {
            self.history.dir = PathBuf::from(val);
        }
        Ok(())
    }

    /// Reject values the runtime cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.step_ms == 0 {
            return Err(invalid("timer.step_ms", "must be positive"));
        }
        if self.prediction.interval_ms == 0 {
            return Err(invalid("prediction.interval_ms", "must be positive"));
        }
        if self.workers.pool_size == 0 {
            return Err(invalid("workers.pool_size", "must be positive"));
        }
        if self.network.listener_queue_capacity == 0 {
            return Err(invalid("network.listener_queue_capacity", "must be positive"));
        }
        if self.rounds.is_empty() {
            return Err(invalid("rounds", "at least one round is required"));
        }
        let mut seen = BTreeSet::new();
        for round in &self.rounds {
            if round.label.is_empty() {
                return Err(invalid("rounds", "round labels must not be empty"));
            }
            if !seen.insert(round.label.as_str()) {
                return Err(ConfigError::Invalid {
                    field: "rounds",
                    reason: format!("duplicate round label {}", round.label),
                });
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

/// Listen address and connection sizing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound frames buffered per listener before it is dropped as stalled.
    #[serde(default = "default_listener_queue_capacity")]
    pub listener_queue_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            listener_queue_capacity: default_listener_queue_capacity(),
        }
    }
}

/// Countdown timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimerConfig {
    /// Value the countdown starts from.
    #[serde(default = "default_timer_max_value")]
    pub max_value: u32,

    /// Wall-clock length of one countdown step in milliseconds.
    #[serde(default = "default_timer_step_ms")]
    pub step_ms: u64,
}

impl TimerConfig {
    /// Length of one countdown step.
    pub const fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_value: default_timer_max_value(),
            step_ms: default_timer_step_ms(),
        }
    }
}

/// Inference scheduling settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PredictionConfig {
    /// Minimum spacing between classifier cycle starts, in milliseconds.
    #[serde(default = "default_prediction_interval_ms")]
    pub interval_ms: u64,
}

impl PredictionConfig {
    /// Minimum spacing between classifier cycle starts.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_prediction_interval_ms(),
        }
    }
}

/// Blocking worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of concurrent classifier or archiver calls.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

/// Canvas archive settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryConfig {
    /// Directory archived canvases are written to.
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

const fn default_listener_queue_capacity() -> usize {
    64
}

const fn default_timer_max_value() -> u32 {
    90
}

const fn default_timer_step_ms() -> u64 {
    1000
}

const fn default_prediction_interval_ms() -> u64 {
    1000
}

/// Half the available cores, at least one.
fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .checked_div(2)
        .unwrap_or(1)
        .max(1)
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("history")
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_rounds() -> Vec<RoundDefinition> {
    vec![
        RoundDefinition::new("alice_margatroid", "Alice Margatroid"),
        RoundDefinition::new("konpaku_youmu", "Konpaku Youmu"),
        RoundDefinition::new("tamatsukuri_misumaru", "Tamatsukuri Misumaru"),
        RoundDefinition::new("usami_renko", "Usami Renko"),
        RoundDefinition::new("ebisu_eika", "Ebisu Eika"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GameConfig::default();
        assert_eq!(config.network.port, 8000);
        assert_eq!(config.timer.max_value, 90);
        assert_eq!(config.timer.step(), Duration::from_secs(1));
        assert_eq!(config.prediction.interval(), Duration::from_secs(1));
        assert!(config.workers.pool_size >= 1);
        assert_eq!(config.rounds.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
network:
  host: "127.0.0.1"
  port: 9100
  listener_queue_capacity: 8

timer:
  max_value: 30
  step_ms: 250

prediction:
  interval_ms: 500

workers:
  pool_size: 3

history:
  dir: "/var/lib/doodle/history"

logging:
  level: "debug"
  format: "json"

rounds:
  - label: "fox"
    display_name: "Fox"
  - label: "owl"
    display_name: "Owl"
"#;
        let config: GameConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.network.host, "127.0.0.1");
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.network.listener_queue_capacity, 8);
        assert_eq!(config.timer.max_value, 30);
        assert_eq!(config.timer.step(), Duration::from_millis(250));
        assert_eq!(config.prediction.interval_ms, 500);
        assert_eq!(config.workers.pool_size, 3);
        assert_eq!(config.history.dir, PathBuf::from("/var/lib/doodle/history"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.rounds.len(), 2);
        assert_eq!(config.rounds[1].display_name, "Owl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_yaml_uses_defaults() {
        let config: GameConfig = serde_yml::from_str("timer:\n  max_value: 10\n").unwrap();
        assert_eq!(config.timer.max_value, 10);
        assert_eq!(config.timer.step_ms, 1000);
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.rounds, default_rounds());
    }

    #[test]
    fn validate_rejects_zero_and_duplicates() {
        let mut config = GameConfig::default();
        config.timer.step_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "timer.step_ms", .. })
        ));

        let mut config = GameConfig::default();
        config.rounds.push(RoundDefinition::new("fox", "Fox"));
        config.rounds.push(RoundDefinition::new("fox", "Another fox"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "rounds", .. })
        ));

        let mut config = GameConfig::default();
        config.rounds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = GameConfig::parse("timer: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
