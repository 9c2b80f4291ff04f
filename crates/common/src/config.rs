use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::error::ConfigError;
use crate::mapper::{
    IndicationMapper, DEFAULT_MAX_LAT_FORCE, DEFAULT_VERTICAL_THRESHOLD, SLIP_MARGIN,
};
use crate::profile::{default_profiles, ModeSet, ThresholdProfile};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: f64,
    /// Vehicle's absolute lateral grip limit in g, independent of ride mode.
    #[serde(default = "default_max_lat_force")]
    pub max_lat_force: f64,
    #[serde(default = "default_vertical_threshold")]
    pub vertical_threshold: f64,
    /// Ride mode active at startup; the first profile when unset.
    #[serde(default)]
    pub initial_mode: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default = "default_profiles")]
    pub profiles: Vec<ThresholdProfile>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit a debug line for every monitor cycle.
    #[serde(default)]
    pub enable_cycle_logging: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecorderConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default)]
    pub format: RecordFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Jsonl,
    Csv,
}

fn default_poll_rate_hz() -> f64 {
    1000.0
}

fn default_max_lat_force() -> f64 {
    DEFAULT_MAX_LAT_FORCE
}

fn default_vertical_threshold() -> f64 {
    DEFAULT_VERTICAL_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_output_path() -> String {
    "log.jsonl".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enable_cycle_logging: false,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            format: RecordFormat::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_rate_hz: default_poll_rate_hz(),
            max_lat_force: default_max_lat_force(),
            vertical_threshold: default_vertical_threshold(),
            initial_mode: None,
            logging: LoggingConfig::default(),
            recorder: RecorderConfig::default(),
            profiles: default_profiles(),
        }
    }
}

pub fn load_config(path: &str) -> Result<MonitorConfig, ConfigError> {
    MonitorConfig::from_file(path)
}

impl MonitorConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.poll_rate_hz > 0.0 && self.poll_rate_hz.is_finite()) {
            return Err(ConfigError::InvalidPollRate(self.poll_rate_hz));
        }
        // at or below the margin every out-of-tolerance sample would warn
        if !(self.max_lat_force > SLIP_MARGIN && self.max_lat_force.is_finite()) {
            return Err(ConfigError::InvalidLimit {
                field: "max_lat_force",
                min: SLIP_MARGIN,
                value: self.max_lat_force,
            });
        }
        if !(self.vertical_threshold > 0.0) {
            return Err(ConfigError::InvalidLimit {
                field: "vertical_threshold",
                min: 0.0,
                value: self.vertical_threshold,
            });
        }
        self.mode_set().map(|_| ())
    }

    /// The configured ride modes with the initial mode selected.
    pub fn mode_set(&self) -> Result<ModeSet, ConfigError> {
        let mut modes = ModeSet::new(self.profiles.clone())?;
        if let Some(name) = &self.initial_mode {
            modes.select(name)?;
        }
        Ok(modes)
    }

    pub fn mapper(&self) -> IndicationMapper {
        IndicationMapper::new(self.max_lat_force, self.vertical_threshold)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.poll_rate_hz)
    }
}
