//! Sequential pipeline execution.
//!
//! Stages run strictly in declaration order, one at a time. Before a stage
//! runs, its declared inputs must all be present; the stage then sees only
//! those keys and its single output is written under its declared key.

use super::StageDescriptor;
use crate::cancellation::CancellationToken;
use crate::context::{PipelineState, RunIdentity, StageContext, StageInputs};
use crate::core::{StageOutput, StageStatus};
use crate::errors::{ConfigErrorCode, ConfigurationError};
use crate::events::{types, EventSink};
use crate::stages::StageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// The stage's own logic failed.
    StageFailed,
    /// The stage broke its declared contract (wrong output key).
    Configuration,
    /// The stage's write conflicted with an existing key.
    DataConflict,
}

/// The error that failed a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    /// Classification.
    pub kind: StageErrorKind,
    /// The error message.
    pub message: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The terminal outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every stage ran and wrote its key.
    Completed,
    /// A stage's inputs were missing; it and every later stage was skipped.
    Blocked {
        /// The blocked stage.
        stage: String,
        /// Its missing input keys.
        missing: Vec<String>,
    },
    /// A stage failed; later stages were skipped.
    Failed {
        /// The failing stage.
        stage: String,
        /// What went wrong.
        error: StageError,
    },
    /// The run was cancelled between stages or by a stage.
    Cancelled {
        /// The cancel reason.
        reason: String,
        /// The stage that was cancelled or would have run next.
        stage: String,
    },
}

impl RunOutcome {
    /// Returns the outcome name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Blocked { .. } => "blocked",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns the stage the run stopped at, if it did not complete.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Blocked { stage, .. }
            | Self::Failed { stage, .. }
            | Self::Cancelled { stage, .. } => Some(stage),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Blocked { stage, missing } => {
                write!(f, "blocked at '{stage}' (missing: {})", missing.join(", "))
            }
            Self::Failed { stage, error } => write!(f, "failed at '{stage}': {error}"),
            Self::Cancelled { reason, stage } => write!(f, "cancelled at '{stage}': {reason}"),
        }
    }
}

/// The result of a pipeline run.
///
/// The final state always holds every key written before the run stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    /// Unique run id.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// The terminal outcome.
    pub outcome: RunOutcome,
    /// The final state.
    pub state: PipelineState,
    /// One record per stage that ran or was blocked, in order.
    pub stages: Vec<StageRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub ended_at: DateTime<Utc>,
}

impl PipelineRunResult {
    /// Returns true if every stage ran.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Returns true if the run was blocked.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.outcome, RunOutcome::Blocked { .. })
    }

    /// Returns true if a stage failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    /// Returns the record of a stage.
    #[must_use]
    pub fn record(&self, stage: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.name == stage)
    }

    /// Returns the run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Converts the result summary to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("pipeline".to_string(), serde_json::json!(self.pipeline));
        map.insert("outcome".to_string(), serde_json::json!(self.outcome));
        map.insert("state_keys".to_string(), serde_json::json!(self.state.keys()));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms()));
        map
    }
}

/// A validated, ordered sequence of stages.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageDescriptor>,
    event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

/// Why a single stage stopped the run.
enum StageStop {
    Failed(StageError),
    Cancelled(String),
}

impl Pipeline {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageDescriptor>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            stages,
            event_sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the output keys in execution order.
    #[must_use]
    pub fn output_keys(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.output_key.as_str()).collect()
    }

    /// Runs the pipeline without an external cancellation signal.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run_with_cancel`].
    pub async fn run(&self, initial: PipelineState) -> Result<PipelineRunResult, ConfigurationError> {
        self.run_with_cancel(initial, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs the pipeline.
    ///
    /// Cancellation is checked between stages; a stage that is already
    /// running is not interrupted by the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` before any stage runs if the initial
    /// state already contains a key some stage declares as its output.
    /// Stage failures are reported in the result's outcome instead.
    pub async fn run_with_cancel(
        &self,
        initial: PipelineState,
        cancel: Arc<CancellationToken>,
    ) -> Result<PipelineRunResult, ConfigurationError> {
        self.check_initial_state(&initial)?;

        let identity = Arc::new(RunIdentity::new(&self.name));
        let started_at = Utc::now();
        let mut state = initial;
        let mut records = Vec::with_capacity(self.stages.len());
        let mut outcome = RunOutcome::Completed;

        info!(
            pipeline = %self.name,
            run_id = %identity.pipeline_run_id,
            stages = self.stages.len(),
            "Pipeline run started"
        );
        self.event_sink.emit(
            types::PIPELINE_STARTED,
            Some(serde_json::json!({
                "pipeline": self.name,
                "run_id": identity.run_id_str(),
                "stages": self.stages.len(),
            })),
        );

        for descriptor in &self.stages {
            if let Err(cancelled) = cancel.check() {
                info!(stage = %descriptor.name, reason = %cancelled.reason, "Run cancelled before stage");
                outcome = RunOutcome::Cancelled {
                    reason: cancelled.reason,
                    stage: descriptor.name.clone(),
                };
                break;
            }

            let missing = descriptor.missing_inputs(|k| state.contains_key(k));
            if !missing.is_empty() {
                warn!(stage = %descriptor.name, missing = ?missing, "Stage blocked on missing inputs");
                self.event_sink.emit(
                    types::STAGE_BLOCKED,
                    Some(serde_json::json!({"stage": descriptor.name, "missing": missing})),
                );
                records.push(StageRecord::blocked(
                    &descriptor.name,
                    &descriptor.output_key,
                    missing.clone(),
                ));
                outcome = RunOutcome::Blocked {
                    stage: descriptor.name.clone(),
                    missing,
                };
                break;
            }

            let ctx = StageContext::new(
                &descriptor.name,
                &descriptor.output_key,
                StageInputs::new(
                    state.project(&descriptor.inputs),
                    descriptor.inputs.clone(),
                    &descriptor.name,
                ),
                identity.clone(),
                cancel.clone(),
                self.event_sink.clone(),
            );

            debug!(stage = %descriptor.name, "Stage started");
            self.event_sink.emit(
                types::STAGE_STARTED,
                Some(serde_json::json!({"stage": descriptor.name})),
            );

            let stage_started = Utc::now();
            let output = descriptor.runner.execute(&ctx).await;
            let (record, stop) = Self::apply_output(descriptor, output, stage_started, &mut state);
            records.push(record);

            match stop {
                None => {
                    info!(stage = %descriptor.name, key = %descriptor.output_key, "Stage completed");
                    self.event_sink.emit(
                        types::STAGE_COMPLETED,
                        Some(serde_json::json!({
                            "stage": descriptor.name,
                            "output_key": descriptor.output_key,
                        })),
                    );
                }
                Some(StageStop::Failed(error)) => {
                    warn!(stage = %descriptor.name, kind = ?error.kind, error = %error, "Stage failed");
                    self.event_sink.emit(
                        types::STAGE_FAILED,
                        Some(serde_json::json!({"stage": descriptor.name, "error": error})),
                    );
                    outcome = RunOutcome::Failed {
                        stage: descriptor.name.clone(),
                        error,
                    };
                    break;
                }
                Some(StageStop::Cancelled(reason)) => {
                    info!(stage = %descriptor.name, reason = %reason, "Stage cancelled the run");
                    outcome = RunOutcome::Cancelled {
                        reason,
                        stage: descriptor.name.clone(),
                    };
                    break;
                }
            }
        }

        let ended_at = Utc::now();
        info!(
            pipeline = %self.name,
            run_id = %identity.pipeline_run_id,
            outcome = outcome.as_str(),
            "Pipeline run finished"
        );
        self.event_sink.emit(
            types::PIPELINE_FINISHED,
            Some(serde_json::json!({
                "pipeline": self.name,
                "run_id": identity.run_id_str(),
                "outcome": outcome,
            })),
        );

        Ok(PipelineRunResult {
            run_id: identity.pipeline_run_id,
            pipeline: self.name.clone(),
            outcome,
            state,
            stages: records,
            started_at,
            ended_at,
        })
    }

    fn check_initial_state(&self, initial: &PipelineState) -> Result<(), ConfigurationError> {
        if let Some(descriptor) = self
            .stages
            .iter()
            .find(|s| initial.contains_key(&s.output_key))
        {
            return Err(ConfigurationError::new(
                ConfigErrorCode::OutputKeyPreseeded,
                format!(
                    "Initial state already contains '{}', the output key of stage '{}'",
                    descriptor.output_key, descriptor.name
                ),
            )
            .with_stages([descriptor.name.clone()]));
        }
        Ok(())
    }

    fn apply_output(
        descriptor: &StageDescriptor,
        output: StageOutput,
        started_at: DateTime<Utc>,
        state: &mut PipelineState,
    ) -> (StageRecord, Option<StageStop>) {
        let record = StageRecord::finished(
            &descriptor.name,
            &descriptor.output_key,
            output.status,
            started_at,
        )
        .with_attempts(output.attempts.clone())
        .with_warnings(output.warnings.clone())
        .with_metadata(output.metadata.clone());

        match output.status {
            StageStatus::Ok => {
                let target = output.target_key(&descriptor.output_key);
                if target != descriptor.output_key {
                    let error = ConfigurationError::new(
                        ConfigErrorCode::OutputKeyMismatch,
                        format!(
                            "Stage '{}' wrote '{}' but declares '{}'",
                            descriptor.name, target, descriptor.output_key
                        ),
                    )
                    .with_stages([descriptor.name.clone()]);
                    return Self::failed(record, StageErrorKind::Configuration, error.to_string());
                }

                let value = output.value.unwrap_or(serde_json::Value::Null);
                match state.insert(&descriptor.output_key, value, &descriptor.name) {
                    Ok(()) => (record, None),
                    Err(conflict) => {
                        Self::failed(record, StageErrorKind::DataConflict, conflict.to_string())
                    }
                }
            }
            StageStatus::Cancel => {
                let reason = output
                    .cancel_reason
                    .unwrap_or_else(|| "cancelled by stage".to_string());
                (record.with_error(&reason), Some(StageStop::Cancelled(reason)))
            }
            StageStatus::Fail => {
                let message = output
                    .error
                    .unwrap_or_else(|| "stage failed without an error message".to_string());
                Self::failed(record, StageErrorKind::StageFailed, message)
            }
            other => Self::failed(
                record,
                StageErrorKind::StageFailed,
                format!("stage returned non-terminal status '{other}'"),
            ),
        }
    }

    fn failed(
        mut record: StageRecord,
        kind: StageErrorKind,
        message: String,
    ) -> (StageRecord, Option<StageStop>) {
        record.status = StageStatus::Fail;
        record.error = Some(message.clone());
        (record, Some(StageStop::Failed(StageError { kind, message })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::MockStage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn three_stage(second: Arc<dyn crate::stages::Stage>) -> Pipeline {
        PipelineBuilder::new("three")
            .stage("first", &[], "a", MockStage::ok_arc(json!("A")))
            .unwrap()
            .stage("second", &["a"], "b", second)
            .unwrap()
            .stage("third", &["a", "b"], "c", MockStage::ok_arc(json!("C")))
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_completed_run_writes_each_key_once() {
        let pipeline = three_stage(MockStage::ok_arc(json!("B")));
        let result = pipeline.run(PipelineState::new()).await.unwrap();

        assert!(result.is_completed());
        assert_eq!(result.state.keys(), &["a", "b", "c"]);
        assert_eq!(result.state.writer_of("b"), Some(Some("second")));
        assert_eq!(result.stages.len(), 3);
        assert!(result.stages.iter().all(StageRecord::is_success));
    }

    #[tokio::test]
    async fn test_stage_sees_only_declared_inputs() {
        let probe = Arc::new(MockStage::inspect(|ctx| {
            let declared = ctx.inputs().get("a").is_ok();
            let undeclared = ctx.inputs().get("seed").is_err();
            json!({"declared": declared, "undeclared_rejected": undeclared})
        }));
        let pipeline = three_stage(probe);
        let initial = PipelineState::seeded([("seed".to_string(), json!(1))]);

        let result = pipeline.run(initial).await.unwrap();
        assert_eq!(
            result.state.get("b"),
            Some(&json!({"declared": true, "undeclared_rejected": true}))
        );
    }

    #[tokio::test]
    async fn test_failure_stops_run_and_keeps_state() {
        let pipeline = three_stage(MockStage::fail_arc("model refused"));
        let result = pipeline.run(PipelineState::new()).await.unwrap();

        assert_eq!(
            result.outcome,
            RunOutcome::Failed {
                stage: "second".to_string(),
                error: StageError {
                    kind: StageErrorKind::StageFailed,
                    message: "model refused".to_string(),
                },
            }
        );
        assert_eq!(result.state.get("a"), Some(&json!("A")));
        assert!(!result.state.contains_key("c"));
        assert_eq!(result.stages.len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_output_key_is_a_configuration_failure() {
        let rogue = Arc::new(MockStage::new(StageOutput::ok_keyed("c", json!("stolen"))));
        let pipeline = three_stage(rogue);
        let result = pipeline.run(PipelineState::new()).await.unwrap();

        match &result.outcome {
            RunOutcome::Failed { stage, error } => {
                assert_eq!(stage, "second");
                assert_eq!(error.kind, StageErrorKind::Configuration);
                assert!(error.message.contains("CONFIG-OUTPUT-MISMATCH"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!result.state.contains_key("c"));
    }

    #[tokio::test]
    async fn test_preseeded_output_key_fails_fast() {
        let pipeline = three_stage(MockStage::ok_arc(json!("B")));
        let initial = PipelineState::seeded([("b".to_string(), json!("early"))]);

        let err = pipeline.run(initial).await.unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::OutputKeyPreseeded);
        assert_eq!(err.stages, vec!["second"]);
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let token = Arc::new(CancellationToken::new());
        let canceller = token.clone();
        let cancelling = Arc::new(MockStage::inspect(move |_| {
            canceller.cancel("user abort");
            json!("B")
        }));

        let pipeline = three_stage(cancelling);
        let result = pipeline
            .run_with_cancel(PipelineState::new(), token)
            .await
            .unwrap();

        assert_eq!(
            result.outcome,
            RunOutcome::Cancelled {
                reason: "user abort".to_string(),
                stage: "third".to_string(),
            }
        );
        assert!(result.state.contains_key("b"));
        assert_eq!(result.stages.len(), 2);
    }

    #[tokio::test]
    async fn test_stage_cancel_output() {
        let pipeline = three_stage(Arc::new(MockStage::new(StageOutput::cancel("nothing to do"))));
        let result = pipeline.run(PipelineState::new()).await.unwrap();

        assert!(result.is_cancelled());
        assert_eq!(result.outcome.stage(), Some("second"));
        assert_eq!(result.stages[1].status, StageStatus::Cancel);
    }

    #[tokio::test]
    async fn test_events_emitted_in_order() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("events")
            .stage("only", &[], "out", MockStage::ok_arc(json!(1)))
            .unwrap()
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        pipeline.run(PipelineState::new()).await.unwrap();
        assert_eq!(
            sink.event_types(),
            vec![
                types::PIPELINE_STARTED,
                types::STAGE_STARTED,
                types::STAGE_COMPLETED,
                types::PIPELINE_FINISHED,
            ]
        );
    }
}
