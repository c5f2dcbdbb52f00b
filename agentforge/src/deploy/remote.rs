//! Remote deployment boundary.

use super::DeploymentRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifies a created remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Fully qualified resource identifier.
    pub resource_id: String,
    /// Endpoint serving the resource.
    pub endpoint: String,
}

impl ResourceHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(resource_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Builds the conventional reasoning-engine handle for `engine_id`.
    #[must_use]
    pub fn reasoning_engine(project_id: &str, location: &str, engine_id: &str) -> Self {
        let resource_id =
            format!("projects/{project_id}/locations/{location}/reasoningEngines/{engine_id}");
        let endpoint = format!("https://{location}-aiplatform.googleapis.com/v1/{resource_id}");
        Self {
            resource_id,
            endpoint,
        }
    }
}

/// An error reported by the remote API.
///
/// The display form includes the status code, so keyword classification
/// sees `429` and `503` as well as the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{message}", .status.map(|s| format!("{s} ")).unwrap_or_default())]
pub struct RemoteError {
    /// HTTP-like status code, when known.
    pub status: Option<u16>,
    /// Error message.
    pub message: String,
}

impl RemoteError {
    /// Creates an error with no status code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Attaches a status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Result of a post-deployment health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the resource answered as healthy.
    pub healthy: bool,
    /// Human-readable status.
    pub status: String,
}

impl HealthStatus {
    /// A healthy status.
    #[must_use]
    pub fn healthy(status: impl Into<String>) -> Self {
        Self {
            healthy: true,
            status: status.into(),
        }
    }

    /// An unhealthy status.
    #[must_use]
    pub fn unhealthy(status: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status: status.into(),
        }
    }
}

/// Creates resources on the managed runtime.
///
/// Implementations should honor `request.idempotency_key` so a retried
/// create does not produce a second resource.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteDeployer: Send + Sync {
    /// Creates the resource described by `request`.
    async fn create(&self, request: &DeploymentRequest) -> Result<ResourceHandle, RemoteError>;
}

/// Checks a freshly created resource.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probes the resource behind `handle`.
    async fn check(&self, handle: &ResourceHandle) -> Result<HealthStatus, RemoteError>;
}

/// Health probe that issues a GET against the resource endpoint.
#[cfg(feature = "http-probe")]
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    timeout: std::time::Duration,
}

#[cfg(feature = "http-probe")]
impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http-probe")]
impl HttpHealthProbe {
    /// Creates a probe with a 10 second timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: std::time::Duration::from_secs(10),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(feature = "http-probe")]
#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, handle: &ResourceHandle) -> Result<HealthStatus, RemoteError> {
        let response = self
            .client
            .get(&handle.endpoint)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let error = RemoteError::new(format!("health request failed: {e}"));
                match e.status() {
                    Some(status) => error.with_status(status.as_u16()),
                    None => error,
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(HealthStatus::healthy(format!("endpoint answered {status}")))
        } else {
            Ok(HealthStatus::unhealthy(format!("endpoint answered {status}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reasoning_engine_handle() {
        let handle = ResourceHandle::reasoning_engine("demo", "us-central1", "42");
        assert_eq!(
            handle.resource_id,
            "projects/demo/locations/us-central1/reasoningEngines/42"
        );
        assert_eq!(
            handle.endpoint,
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/reasoningEngines/42"
        );
    }

    #[test]
    fn test_remote_error_display_includes_status() {
        let error = RemoteError::new("Too Many Requests").with_status(429);
        assert_eq!(error.to_string(), "429 Too Many Requests");
        assert_eq!(RemoteError::new("denied").to_string(), "denied");
    }
}
