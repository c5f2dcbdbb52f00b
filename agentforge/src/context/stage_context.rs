//! Per-stage execution context.

use super::{RunIdentity, StageInputs};
use crate::cancellation::CancellationToken;
use crate::events::EventSink;
use std::sync::Arc;

/// The context handed to a stage for one execution.
///
/// It exposes the stage's restricted input view, the run identity, the
/// run's cancellation token and the event sink. Stages have no way to
/// write to the pipeline state other than returning a `StageOutput`.
#[derive(Clone)]
pub struct StageContext {
    stage_name: String,
    output_key: String,
    inputs: StageInputs,
    identity: Arc<RunIdentity>,
    cancel: Arc<CancellationToken>,
    event_sink: Arc<dyn EventSink>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        stage_name: impl Into<String>,
        output_key: impl Into<String>,
        inputs: StageInputs,
        identity: Arc<RunIdentity>,
        cancel: Arc<CancellationToken>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            output_key: output_key.into(),
            inputs,
            identity,
            cancel,
            event_sink,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the key this stage is expected to write.
    #[must_use]
    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Returns the stage inputs.
    #[must_use]
    pub fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Emits an event tagged with the stage name and run id.
    pub fn emit_event(&self, event_type: &str, data: serde_json::Value) {
        let payload = serde_json::json!({
            "stage": self.stage_name,
            "pipeline_run_id": self.identity.run_id_str(),
            "data": data,
        });
        self.event_sink.emit(event_type, Some(payload));
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage_name", &self.stage_name)
            .field("output_key", &self.output_key)
            .field("pipeline_run_id", &self.identity.pipeline_run_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
