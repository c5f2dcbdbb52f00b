//! Runtime configuration.
//!
//! [`ForgeConfig`] loads from JSON, from environment variables, or both
//! (JSON first, then environment overrides). Every field has a default.

use crate::deploy::DeploymentConfig;
use crate::errors::{ConfigErrorCode, ConfigurationError, ForgeError};
use crate::pipeline::{JitterStrategy, KeywordClassifier, RetryPolicy, DEFAULT_RETRY_KEYWORDS};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming the cloud project.
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
/// Environment variable naming the cloud location.
pub const ENV_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
/// Environment variable naming the staging bucket.
pub const ENV_STAGING_BUCKET: &str = "STAGING_BUCKET";
/// Environment variable overriding the attempt cap.
pub const ENV_MAX_ATTEMPTS: &str = "AGENTFORGE_MAX_ATTEMPTS";
/// Environment variable overriding the base backoff delay.
pub const ENV_BASE_DELAY_MS: &str = "AGENTFORGE_BASE_DELAY_MS";
/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "AGENTFORGE_LOG_FORMAT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Retry settings for remote calls.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Deployment target.
    #[serde(default)]
    pub deployment: DeploymentSettings,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ForgeConfig {
    /// Parses a JSON document. Missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Serialization` for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ForgeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds a config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an unparsable numeric or enum
    /// value.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overrides fields from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an unparsable numeric or enum
    /// value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(project) = lookup(ENV_PROJECT) {
            self.deployment.project_id = Some(project);
        }
        if let Some(location) = lookup(ENV_LOCATION) {
            self.deployment.location = location;
        }
        if let Some(bucket) = lookup(ENV_STAGING_BUCKET) {
            self.deployment.staging_bucket = Some(bucket);
        }
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = parse_setting(ENV_MAX_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BASE_DELAY_MS) {
            self.retry.base_delay_ms = parse_setting(ENV_BASE_DELAY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            self.logging.format = parse_setting(ENV_LOG_FORMAT, &raw)?;
        }
        Ok(())
    }
}

fn parse_setting<T>(name: &str, raw: &str) -> Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        ConfigurationError::new(
            ConfigErrorCode::InvalidSetting,
            format!("{name}='{raw}' is invalid: {e}"),
        )
    })
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_growth_factor() -> u32 {
    2
}

/// Retry settings, converted to a [`RetryPolicy`] on use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of calls, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied per further failure.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: u32,
    /// Ceiling for any single delay, in milliseconds.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Keywords treated as retryable in addition to the defaults.
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            growth_factor: default_growth_factor(),
            max_delay_ms: None,
            jitter: JitterStrategy::None,
            extra_keywords: Vec::new(),
        }
    }
}

impl RetrySettings {
    /// Builds and validates the retry policy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `max_attempts` or
    /// `growth_factor` is zero.
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigurationError> {
        let mut policy = RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_growth_factor(self.growth_factor)
            .with_jitter(self.jitter);
        if let Some(max) = self.max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(max));
        }
        if !self.extra_keywords.is_empty() {
            let keywords = DEFAULT_RETRY_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .chain(self.extra_keywords.iter().cloned());
            policy = policy.with_classifier(KeywordClassifier::new(keywords));
        }
        policy.validate()?;
        Ok(policy)
    }
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_display_name() -> String {
    "generated_agent".to_string()
}

fn default_max_instances() -> u32 {
    1
}

/// Deployment target settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Cloud project identifier.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Region identifier.
    #[serde(default = "default_location")]
    pub location: String,
    /// Staging bucket URI.
    #[serde(default)]
    pub staging_bucket: Option<String>,
    /// Display name of the deployed resource.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Minimum instance count.
    #[serde(default)]
    pub min_instances: u32,
    /// Maximum instance count.
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            staging_bucket: None,
            display_name: default_display_name(),
            min_instances: 0,
            max_instances: default_max_instances(),
        }
    }
}

impl DeploymentSettings {
    /// Converts to a deployment config.
    ///
    /// Missing identifiers become empty strings, which the config's own
    /// validation reports as errors.
    #[must_use]
    pub fn to_config(&self) -> DeploymentConfig {
        DeploymentConfig::new(
            self.project_id.clone().unwrap_or_default(),
            self.staging_bucket.clone().unwrap_or_default(),
        )
        .with_location(&self.location)
        .with_display_name(&self.display_name)
        .with_instances(self.min_instances, self.max_instances)
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected compact or json")),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Compact,
        }
    }
}
