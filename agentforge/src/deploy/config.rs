//! Deployment configuration and requests.

use crate::validation::{ArtifactSet, ValidationReport};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Locations known to host the managed agent runtime.
pub const COMMON_LOCATIONS: &[&str] = &[
    "us-central1",
    "us-east1",
    "us-west1",
    "europe-west1",
    "europe-west4",
    "asia-northeast1",
    "asia-southeast1",
];

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_display_name() -> String {
    "generated_agent".to_string()
}

fn default_max_instances() -> u32 {
    1
}

/// Target of a remote deployment.
///
/// The orchestrator checks these fields before deploying and otherwise
/// passes them through to the remote API unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Cloud project identifier.
    pub project_id: String,
    /// Region identifier.
    #[serde(default = "default_location")]
    pub location: String,
    /// Staging bucket, a `gs://` URI.
    pub staging_bucket: String,
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

impl DeploymentConfig {
    /// Creates a config with default location, name and limits.
    #[must_use]
    pub fn new(project_id: impl Into<String>, staging_bucket: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: default_location(),
            staging_bucket: staging_bucket.into(),
            display_name: default_display_name(),
            min_instances: 0,
            max_instances: default_max_instances(),
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the instance limits.
    #[must_use]
    pub const fn with_instances(mut self, min: u32, max: u32) -> Self {
        self.min_instances = min;
        self.max_instances = max;
        self
    }

    /// Checks the config before any remote call.
    ///
    /// An uncommon location is only a warning.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.project_id.trim().is_empty() {
            report.push_error("project_id is empty");
        }

        if self.staging_bucket.trim().is_empty() {
            report.push_error("Invalid or missing staging_bucket");
        } else if !self.staging_bucket.starts_with("gs://") {
            report.push_error("staging_bucket must start with 'gs://'");
        }

        if !COMMON_LOCATIONS.contains(&self.location.as_str()) {
            report.push_warning(format!(
                "Location '{}' may not support the agent runtime. Common locations: {}",
                self.location,
                COMMON_LOCATIONS[..3].join(", ")
            ));
        }

        if self.max_instances < 1 {
            report.push_error("max_instances must be at least 1");
        }
        if self.min_instances > self.max_instances {
            report.push_error(format!(
                "min_instances ({}) exceeds max_instances ({})",
                self.min_instances, self.max_instances
            ));
        }

        report
    }
}

/// Everything a remote create call receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Deployment target.
    pub config: DeploymentConfig,
    /// Artifacts to deploy.
    pub artifacts: ArtifactSet,
    /// Stable key for de-duplicating repeated create calls.
    pub idempotency_key: String,
}

impl DeploymentRequest {
    /// Creates a request and derives its idempotency key.
    #[must_use]
    pub fn new(config: DeploymentConfig, artifacts: ArtifactSet) -> Self {
        let idempotency_key = idempotency_key(&config, &artifacts);
        Self {
            config,
            artifacts,
            idempotency_key,
        }
    }
}

/// Hashes the config and artifacts into a hex SHA-256 digest.
///
/// Equal inputs produce equal keys, so every retry of one deployment sends
/// the same key.
#[must_use]
pub fn idempotency_key(config: &DeploymentConfig, artifacts: &ArtifactSet) -> String {
    let mut hasher = Sha256::new();
    for field in [
        &config.project_id,
        &config.location,
        &config.staging_bucket,
        &config.display_name,
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(config.min_instances.to_le_bytes());
    hasher.update(config.max_instances.to_le_bytes());
    for (name, content) in artifacts.iter() {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
