//! Validate, deploy and verify as one checked flow.

use super::{DeploymentConfig, DeploymentRequest, HealthProbe, HealthStatus, RemoteDeployer};
use crate::cancellation::CancellationToken;
use crate::core::AttemptRecord;
use crate::errors::ConfigurationError;
use crate::events::{types, EventSink, NoOpEventSink};
use crate::pipeline::{RetryPolicy, RetryingExecutor, TerminalReason};
use crate::validation::{ArtifactSet, ArtifactValidator, ValidationReport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Phase of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    /// Checking artifacts and config.
    Validating,
    /// Creating the remote resource.
    Deploying,
    /// Probing the created resource.
    Verifying,
    /// The resource exists.
    Succeeded,
    /// No resource was created.
    Failed,
}

impl DeploymentPhase {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns the phase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Deploying => "deploying",
            Self::Verifying => "verifying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a deployment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentFailure {
    /// Artifacts or config did not validate. No create call was made.
    Validation,
    /// The remote API returned a non-retryable error.
    Fatal,
    /// Every allowed attempt failed with a retryable error.
    Exhausted,
    /// The deployment was cancelled between attempts.
    Cancelled,
}

impl From<TerminalReason> for DeploymentFailure {
    fn from(reason: TerminalReason) -> Self {
        match reason {
            TerminalReason::Exhausted => Self::Exhausted,
            TerminalReason::Fatal => Self::Fatal,
            TerminalReason::Cancelled => Self::Cancelled,
        }
    }
}

/// Outcome of one deployment.
///
/// `resource_id` and `endpoint` are present exactly when `success` is
/// true, and `error` exactly when it is false. Verification problems are
/// warnings and never change `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Whether the remote resource was created.
    pub success: bool,
    /// Created resource identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Endpoint of the created resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Every create attempt, in order.
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    /// Terminal error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DeploymentFailure>,
    /// Validation and verification warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Phases entered, in order.
    #[serde(default)]
    pub phases: Vec<DeploymentPhase>,
    /// Report from the validating phase.
    pub validation: ValidationReport,
    /// Result of the health probe, if one ran and answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthStatus>,
    /// Idempotency key sent with every create call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl DeploymentRecord {
    fn new(validation: ValidationReport) -> Self {
        Self {
            success: false,
            resource_id: None,
            endpoint: None,
            attempts: Vec::new(),
            error: None,
            failure: None,
            warnings: validation.warnings.clone(),
            phases: Vec::new(),
            validation,
            health: None,
            idempotency_key: None,
        }
    }

    /// Number of create attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// The last phase entered.
    #[must_use]
    pub fn final_phase(&self) -> Option<DeploymentPhase> {
        self.phases.last().copied()
    }

    /// Converts to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }
}

/// Runs the validate, deploy, verify state machine.
pub struct DeploymentOrchestrator {
    validator: ArtifactValidator,
    executor: RetryingExecutor,
    deployer: Arc<dyn RemoteDeployer>,
    probe: Option<Arc<dyn HealthProbe>>,
    event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("validator", &self.validator)
            .field("executor", &self.executor)
            .field("has_probe", &self.probe.is_some())
            .finish_non_exhaustive()
    }
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator using the standard artifact validator.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the retry policy is unusable.
    pub fn new(
        deployer: Arc<dyn RemoteDeployer>,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigurationError> {
        let executor = RetryingExecutor::new(policy)?.with_operation("deployment.create");
        Ok(Self {
            validator: ArtifactValidator::default(),
            executor,
            deployer,
            probe: None,
            event_sink: Arc::new(NoOpEventSink),
        })
    }

    /// Replaces the artifact validator.
    #[must_use]
    pub fn with_validator(mut self, validator: ArtifactValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Probes created resources with `probe`.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Emits `deployment.phase` and `retry.*` events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.executor = self.executor.with_event_sink(Arc::clone(&sink));
        self.event_sink = sink;
        self
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Deploys an artifact set.
    pub async fn deploy(
        &self,
        artifacts: &ArtifactSet,
        config: &DeploymentConfig,
        cancel: &CancellationToken,
    ) -> DeploymentRecord {
        let report = self.validator.validate(artifacts);
        self.run(report, artifacts, config, cancel).await
    }

    /// Deploys a JSON mapping of artifact name to content.
    ///
    /// Non-string contents and non-mapping values fail validation.
    pub async fn deploy_json(
        &self,
        project_files: &serde_json::Value,
        config: &DeploymentConfig,
        cancel: &CancellationToken,
    ) -> DeploymentRecord {
        let report = self.validator.validate_json(project_files);
        let artifacts = ArtifactSet::from_json(project_files)
            .map(|(set, _)| set)
            .unwrap_or_default();
        self.run(report, &artifacts, config, cancel).await
    }

    async fn run(
        &self,
        mut report: ValidationReport,
        artifacts: &ArtifactSet,
        config: &DeploymentConfig,
        cancel: &CancellationToken,
    ) -> DeploymentRecord {
        report.merge(config.validate());
        let mut record = DeploymentRecord::new(report);
        self.enter(&mut record.phases, DeploymentPhase::Validating);

        if !record.validation.valid {
            let message = format!(
                "Validation failed: {}",
                record.validation.errors.join("; ")
            );
            return self.fail(record, DeploymentFailure::Validation, message);
        }

        self.enter(&mut record.phases, DeploymentPhase::Deploying);
        let request = DeploymentRequest::new(config.clone(), artifacts.clone());
        record.idempotency_key = Some(request.idempotency_key.clone());

        let handle = match self
            .executor
            .execute(|_attempt| self.deployer.create(&request), cancel)
            .await
        {
            Ok(retried) => {
                record.attempts = retried.attempts;
                retried.value
            }
            Err(terminal) => {
                let message = format!(
                    "Failed after {} attempts: {}",
                    terminal.attempt_count(),
                    terminal.last_error
                );
                let failure = DeploymentFailure::from(terminal.reason);
                record.attempts = terminal.attempts;
                return self.fail(record, failure, message);
            }
        };

        info!(
            resource_id = %handle.resource_id,
            attempts = record.attempts.len(),
            "Deployment created"
        );
        record.success = true;
        record.resource_id = Some(handle.resource_id.clone());
        record.endpoint = Some(handle.endpoint.clone());

        if let Some(probe) = &self.probe {
            self.enter(&mut record.phases, DeploymentPhase::Verifying);
            match probe.check(&handle).await {
                Ok(health) => {
                    if !health.healthy {
                        warn!(status = %health.status, "Deployment verification unhealthy");
                        record
                            .warnings
                            .push(format!("Verification reported unhealthy: {}", health.status));
                    }
                    record.health = Some(health);
                }
                Err(e) => {
                    warn!(error = %e, "Deployment verification failed");
                    record.warnings.push(format!("Verification failed: {e}"));
                }
            }
        }

        self.enter(&mut record.phases, DeploymentPhase::Succeeded);
        record
    }

    fn fail(
        &self,
        mut record: DeploymentRecord,
        failure: DeploymentFailure,
        message: String,
    ) -> DeploymentRecord {
        error!(failure = ?failure, error = %message, "Deployment failed");
        record.success = false;
        record.failure = Some(failure);
        record.error = Some(message);
        self.enter(&mut record.phases, DeploymentPhase::Failed);
        record
    }

    fn enter(&self, phases: &mut Vec<DeploymentPhase>, phase: DeploymentPhase) {
        info!(phase = %phase, "Deployment phase");
        phases.push(phase);
        self.event_sink
            .emit(types::DEPLOYMENT_PHASE, Some(serde_json::json!({ "phase": phase })));
    }
}
