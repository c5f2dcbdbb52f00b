//! Persistable record of a pipeline run.

use crate::core::{AttemptRecord, StageStatus};
use crate::deploy::{DeploymentFailure, DeploymentRecord, DEPLOYMENT_RECORD_METADATA};
use crate::errors::ForgeError;
use crate::pipeline::{PipelineRunResult, RunOutcome, DEPLOYMENT_RESULT_KEY};
use crate::stages::StageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// One stage's entry in a [`RunRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    /// Stage name.
    pub name: String,
    /// Final status.
    pub status: StageStatus,
    /// Wall time in milliseconds.
    pub duration_ms: i64,
    /// Error, if the stage failed or was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Missing inputs, if the stage was blocked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_inputs: Vec<String>,
    /// Every attempt of any retried call the stage made.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    /// Warnings the stage reported about its output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<&StageRecord> for StageSummary {
    fn from(record: &StageRecord) -> Self {
        Self {
            name: record.name.clone(),
            status: record.status,
            duration_ms: record.duration_ms(),
            error: record.error.clone(),
            missing_inputs: record.missing_inputs.clone(),
            attempts: record.attempts.clone(),
            warnings: record.warnings.clone(),
        }
    }
}

/// Summary of a finished run for structured logs and audit.
///
/// Holds the state keys but not their values, plus the deployment record
/// when the run produced one. A failed deployment's record is recovered
/// from the failing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Terminal outcome.
    pub outcome: RunOutcome,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub ended_at: DateTime<Utc>,
    /// One entry per stage that ran or was blocked.
    pub stages: Vec<StageSummary>,
    /// Keys present in the final state, in write order.
    pub state_keys: Vec<String>,
    /// Deployment record, successful or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentRecord>,
}

impl RunRecord {
    /// Builds a record from a run result.
    #[must_use]
    pub fn from_result(result: &PipelineRunResult) -> Self {
        let deployment = result
            .state
            .get(DEPLOYMENT_RESULT_KEY)
            .or_else(|| {
                result
                    .stages
                    .iter()
                    .rev()
                    .find_map(|s| s.metadata_value(DEPLOYMENT_RECORD_METADATA))
            })
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Self {
            run_id: result.run_id,
            pipeline: result.pipeline.clone(),
            outcome: result.outcome.clone(),
            started_at: result.started_at,
            ended_at: result.ended_at,
            stages: result.stages.iter().map(StageSummary::from).collect(),
            state_keys: result.state.keys().to_vec(),
            deployment,
        }
    }

    /// Failure classification of the deployment, if it failed.
    #[must_use]
    pub fn deployment_failure(&self) -> Option<DeploymentFailure> {
        self.deployment.as_ref().and_then(|d| d.failure)
    }

    /// Total attempts across all stages.
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        self.stages.iter().map(|s| s.attempts.len()).sum()
    }

    /// Serializes as indented JSON.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::Serialization` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ForgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Logs a one-line summary at info level.
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            pipeline = %self.pipeline,
            outcome = %self.outcome,
            stages = self.stages.len(),
            attempts = self.total_attempts(),
            deployed = self.deployment.as_ref().is_some_and(|d| d.success),
            "Pipeline run finished"
        );
    }
}

impl From<&PipelineRunResult> for RunRecord {
    fn from(result: &PipelineRunResult) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineState;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::MockStage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_from_blocked_run() {
        let pipeline = PipelineBuilder::new("demo")
            .stage("first", &[], "a", MockStage::ok_arc(json!(1)))
            .unwrap()
            .stage("second", &["missing"], "b", MockStage::ok_arc(json!(2)))
            .unwrap()
            .build()
            .unwrap();
        let result = pipeline.run(PipelineState::new()).await.unwrap();

        let record = RunRecord::from_result(&result);
        assert_eq!(record.state_keys, vec!["a"]);
        assert_eq!(record.stages.len(), 2);
        assert_eq!(record.stages[1].status, StageStatus::Blocked);
        assert_eq!(record.stages[1].missing_inputs, vec!["missing"]);
        assert!(record.deployment.is_none());

        let json: serde_json::Value =
            serde_json::from_str(&record.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["outcome"]["status"], json!("blocked"));
    }
}
