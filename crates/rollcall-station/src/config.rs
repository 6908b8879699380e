//! Configuration types for the attendance station.
//!
//! Every setting has a default matching the station's fixed wiring and
//! timing, so the station runs without a config file at all. A
//! `rollcall.json` next to the binary overrides individual keys.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rollcall_hardware::LightPins;
use serde::{Deserialize, Serialize};

use crate::course::DEFAULT_COURSES;
use crate::error::{Result, StationError};
use crate::retry::RetryPolicy;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "rollcall.json";

/// Default path of the remote store credentials.
///
/// The file uses the station's own format (`projectId`, `apiKey` or
/// `accessToken`), not a Firebase service-account key.
fn default_credentials_path() -> PathBuf {
    PathBuf::from("/etc/rollcall/credentials.json")
}

/// Default armed wait before each read, in milliseconds.
const fn default_armed_delay_ms() -> u64 {
    5000
}

/// Default course codes drawn from on each successful student match.
fn default_courses() -> Vec<String> {
    DEFAULT_COURSES.iter().map(ToString::to_string).collect()
}

/// Default per-call directory timeout, in milliseconds.
const fn default_service_timeout_ms() -> u64 {
    10_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_ms() -> u64 {
    250
}

const fn default_max_backoff_ms() -> u64 {
    2000
}

/// Main configuration for the attendance station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path to the remote store credentials file.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// How long the indicator shows the armed color before each read.
    #[serde(default = "default_armed_delay_ms")]
    pub armed_delay_ms: u64,

    /// Course codes a scan is attributed to.
    #[serde(default = "default_courses")]
    pub courses: Vec<String>,

    /// Upper bound for a single directory call.
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,

    /// Retry behavior for directory calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Indicator backend.
    #[serde(default)]
    pub indicator: IndicatorBackend,

    /// BCM pins of the indicator lines.
    #[serde(default)]
    pub pins: LightPins,

    /// Tag reader settings.
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            armed_delay_ms: default_armed_delay_ms(),
            courses: default_courses(),
            service_timeout_ms: default_service_timeout_ms(),
            retry: RetrySettings::default(),
            indicator: IndicatorBackend::default(),
            pins: LightPins::default(),
            reader: ReaderConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `rollcall.json` in the current directory. If not found,
    /// returns the default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StationError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_file(&current_dir.join(CONFIG_FILE))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StationError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `StationError::ConfigValidationError` if the configuration values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StationError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StationError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `courses` must be non-empty, without blank or duplicate codes
    /// - `serviceTimeoutMs` must be greater than 0
    /// - `retry.maxAttempts` must be greater than 0
    /// - `retry.maxBackoffMs` must not be below `retry.backoffMs`
    /// - the three indicator pins must be distinct
    /// - `credentialsPath` must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.courses.is_empty() {
            return Err(StationError::config_validation(
                "courses must not be empty",
                "List at least one course code in rollcall.json, e.g. \"courses\": [\"CSCI300\"]",
            ));
        }

        if self.courses.iter().any(|c| c.trim().is_empty()) {
            return Err(StationError::config_validation(
                "courses must not contain blank codes",
                "Remove empty entries from the courses list in rollcall.json",
            ));
        }

        let unique: HashSet<&str> = self.courses.iter().map(String::as_str).collect();
        if unique.len() != self.courses.len() {
            return Err(StationError::config_validation(
                "courses must not contain duplicates",
                "List each course code once; duplicates would bias the course draw",
            ));
        }

        if self.service_timeout_ms == 0 {
            return Err(StationError::config_validation(
                "serviceTimeoutMs must be greater than 0",
                "Set serviceTimeoutMs to at least 1 in rollcall.json",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(StationError::config_validation(
                "retry.maxAttempts must be greater than 0",
                "Set retry.maxAttempts to at least 1 (1 disables retries)",
            ));
        }

        if self.retry.max_backoff_ms < self.retry.backoff_ms {
            return Err(StationError::config_validation(
                "retry.maxBackoffMs must not be below retry.backoffMs",
                "Raise retry.maxBackoffMs or lower retry.backoffMs in rollcall.json",
            ));
        }

        let pins = self.pins;
        if pins.red == pins.green || pins.red == pins.blue || pins.green == pins.blue {
            return Err(StationError::config_validation(
                "indicator pins must be distinct",
                "Assign a different BCM pin to each of pins.red, pins.green and pins.blue",
            ));
        }

        if self.credentials_path.as_os_str().is_empty() {
            return Err(StationError::config_validation(
                "credentialsPath must not be empty",
                "Point credentialsPath at the store credentials JSON file",
            ));
        }

        Ok(())
    }

    /// The armed wait as a duration.
    #[must_use]
    pub const fn armed_delay(&self) -> Duration {
        Duration::from_millis(self.armed_delay_ms)
    }

    /// The per-call directory timeout as a duration.
    #[must_use]
    pub const fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    /// The retry policy for directory calls.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_millis(self.retry.backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            call_timeout: self.service_timeout(),
        }
    }
}

/// Retry settings for directory calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each further retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Cap on the delay between retries.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Which backend drives the indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndicatorBackend {
    /// Raspberry Pi GPIO lines (default).
    #[default]
    Gpio,
    /// Tracing output only, for bench runs without the light attached.
    Log,
}

impl IndicatorBackend {
    /// Parses a string into an `IndicatorBackend`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gpio" => Some(Self::Gpio),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    /// The backend's config name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gpio => "gpio",
            Self::Log => "log",
        }
    }
}

impl<'de> Deserialize<'de> for IndicatorBackend {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid indicator backend '{s}': expected one of 'gpio', 'log'"
            ))
        })
    }
}

impl Serialize for IndicatorBackend {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Tag reader settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderConfig {
    /// Line-oriented reader device; standard input when unset.
    #[serde(default)]
    pub device: Option<PathBuf>,
}
