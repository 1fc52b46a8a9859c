//! Configuration for the biosignal monitor.
//!
//! Pipeline constants are fixed once a pipeline is constructed; changing the
//! file only affects the next run.

use crate::core::Sample;
use crate::sensor::AdcSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Signal processing constants
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Sampling clock and ADC model
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Caller-level monitoring policies
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Local dashboard settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Path for storing session statistics
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            sampling: SamplingConfig::default(),
            monitor: MonitorConfig::default(),
            server: ServerSettings::default(),
            data_path: default_data_path(),
        }
    }
}

fn default_data_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("biosignal-monitor")
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("biosignal-monitor")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.sampling.validate()?;
        Ok(())
    }
}

/// Constants the signal pipeline is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw samples kept for mean/variance/quality
    pub sample_window: usize,
    /// Moving-average length
    pub filter_window: usize,
    /// Filtered amplitude a beat must exceed
    pub beat_threshold: Sample,
    /// Beat intervals averaged for the heart rate
    pub interval_window: usize,
    /// Shortest plausible beat interval (200 BPM)
    pub min_interval_ms: u32,
    /// Longest plausible beat interval (30 BPM)
    pub max_interval_ms: u32,
    /// Quality below this is poor (%)
    pub min_signal_quality: u8,
    /// Quality at or above this is good (%)
    pub good_signal_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_window: 100,
            filter_window: 5,
            beat_threshold: 2048,
            interval_window: 10,
            min_interval_ms: 300,
            max_interval_ms: 2000,
            min_signal_quality: 20,
            good_signal_quality: 70,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_window == 0 || self.filter_window == 0 || self.interval_window == 0 {
            return Err(ConfigError::Invalid(
                "window sizes must be at least 1".to_string(),
            ));
        }
        if self.min_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "min_interval_ms must be positive".to_string(),
            ));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "min_interval_ms ({}) exceeds max_interval_ms ({})",
                self.min_interval_ms, self.max_interval_ms
            )));
        }
        if self.min_signal_quality > self.good_signal_quality || self.good_signal_quality > 100 {
            return Err(ConfigError::Invalid(
                "quality thresholds must satisfy min <= good <= 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sampling clock and converter model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Samples per second
    pub sample_rate_hz: u32,
    /// ADC resolution in bits
    pub adc_resolution_bits: u8,
    /// ADC reference voltage
    pub reference_voltage: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 500,
            adc_resolution_bits: 12,
            reference_voltage: 3.3,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 || self.sample_rate_hz > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "sample_rate_hz must be in 1..=10000, got {}",
                self.sample_rate_hz
            )));
        }
        if !(1..=16).contains(&self.adc_resolution_bits) {
            return Err(ConfigError::Invalid(format!(
                "adc_resolution_bits must be in 1..=16, got {}",
                self.adc_resolution_bits
            )));
        }
        Ok(())
    }

    /// Time between samples.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.sample_rate_hz.max(1)))
    }

    /// Logical timestamp of the `index`-th sample in milliseconds.
    pub fn timestamp_ms(&self, index: u64) -> u64 {
        index * 1000 / u64::from(self.sample_rate_hz.max(1))
    }

    /// Converter model for bounding and scaling raw values.
    pub fn adc(&self) -> AdcSpec {
        AdcSpec::new(self.adc_resolution_bits, self.reference_voltage)
    }
}

/// Policies applied on top of the pipeline outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Raise a no-heartbeat condition after this long without a beat
    #[serde(with = "duration_serde")]
    pub heartbeat_timeout: Duration,
    /// How often the run loop logs a status line
    #[serde(with = "duration_serde")]
    pub status_interval: Duration,
    /// Reset the pipeline when leads reconnect
    pub reset_on_reconnect: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_millis(5000),
            status_interval: Duration::from_millis(1000),
            reset_on_reconnect: true,
        }
    }
}

/// Local dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port to bind on localhost (0 for random)
    pub port: u16,
    /// Dashboard polling interval for waveform data
    #[serde(with = "duration_serde")]
    pub data_update_interval: Duration,
    /// Dashboard polling interval for status
    #[serde(with = "duration_serde")]
    pub status_update_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            data_update_interval: Duration::from_millis(20),
            status_update_interval: Duration::from_millis(1000),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.sample_window, 100);
        assert_eq!(config.pipeline.filter_window, 5);
        assert_eq!(config.pipeline.beat_threshold, 2048);
        assert_eq!(config.pipeline.interval_window, 10);
        assert_eq!(config.pipeline.min_interval_ms, 300);
        assert_eq!(config.pipeline.max_interval_ms, 2000);
        assert_eq!(config.sampling.sample_rate_hz, 500);
        assert_eq!(config.monitor.heartbeat_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"heartbeat_timeout\":5000"));

        let parsed = Config::from_json(&json).unwrap();
        assert_eq!(parsed.pipeline, config.pipeline);
        assert_eq!(parsed.monitor, config.monitor);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{"pipeline": {"beat_threshold": 1800}}"#).unwrap();
        assert_eq!(config.pipeline.beat_threshold, 1800);
        assert_eq!(config.pipeline.filter_window, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_pipeline_rejected() {
        let result = Config::from_json(r#"{"pipeline": {"min_interval_ms": 2500}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_json(r#"{"pipeline": {"filter_window": 0}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_json(r#"{"sampling": {"sample_rate_hz": 0}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sample_clock() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.sample_interval(), Duration::from_micros(2000));
        assert_eq!(sampling.timestamp_ms(0), 0);
        assert_eq!(sampling.timestamp_ms(250), 500);
        assert_eq!(sampling.adc().max_value(), 4095);
    }
}
