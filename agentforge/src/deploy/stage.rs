//! Pipeline stage that deploys generated project files.

use super::{DeploymentConfig, DeploymentFailure, DeploymentOrchestrator};
use crate::context::StageContext;
use crate::core::StageOutput;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Default input key holding the generated files.
pub const PROJECT_FILES_KEY: &str = "project_files";

/// Metadata key holding the serialized record of a failed deployment.
pub const DEPLOYMENT_RECORD_METADATA: &str = "deployment_record";

/// Runs the deployment orchestrator over a mapping of generated files.
///
/// On success the serialized [`super::DeploymentRecord`] becomes the stage
/// output. A failed deployment ends the stage with the record's error and
/// attempt log, and the record itself is kept under
/// [`DEPLOYMENT_RECORD_METADATA`] so its classification survives.
#[derive(Debug, Clone)]
pub struct DeploymentStage {
    orchestrator: Arc<DeploymentOrchestrator>,
    config: DeploymentConfig,
    input_key: String,
}

impl DeploymentStage {
    /// Creates a stage reading [`PROJECT_FILES_KEY`].
    #[must_use]
    pub fn new(orchestrator: Arc<DeploymentOrchestrator>, config: DeploymentConfig) -> Self {
        Self {
            orchestrator,
            config,
            input_key: PROJECT_FILES_KEY.to_string(),
        }
    }

    /// Reads the files from another input key.
    #[must_use]
    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    /// Returns the deployment target.
    #[must_use]
    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }
}

#[async_trait]
impl Stage for DeploymentStage {
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let files = match ctx.inputs().get(&self.input_key) {
            Ok(Some(files)) => files,
            Ok(None) => {
                return StageOutput::fail(format!("input '{}' is not available", self.input_key))
            }
            Err(e) => return StageOutput::fail(e.to_string()),
        };

        let record = self
            .orchestrator
            .deploy_json(files, &self.config, ctx.cancellation())
            .await;
        let attempts = record.attempts.clone();
        let warnings = record.warnings.clone();

        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                return StageOutput::fail(format!("cannot serialize deployment record: {e}"))
                    .with_attempts(attempts)
            }
        };

        if record.success {
            return StageOutput::ok(value)
                .with_attempts(attempts)
                .with_warnings(warnings);
        }

        let error = record
            .error
            .clone()
            .unwrap_or_else(|| "deployment failed".to_string());
        warn!(
            stage = ctx.stage_name(),
            failure = ?record.failure,
            error = %error,
            "Deployment stage failed"
        );
        let output = if record.failure == Some(DeploymentFailure::Cancelled) {
            StageOutput::cancel(error)
        } else {
            StageOutput::fail(error)
        };
        output
            .with_attempts(attempts)
            .with_warnings(warnings)
            .add_metadata(DEPLOYMENT_RECORD_METADATA, value)
    }
}
