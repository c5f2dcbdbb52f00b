//! Events reported by the pipeline, the executor and the orchestrator.
//!
//! Sinks receive every state transition as a type name from [`types`] plus
//! an optional JSON payload.

mod sink;

pub use sink::{CollectingEventSink, EventSink, NoOpEventSink, RecordedEvent};

/// Event type names emitted by agentforge.
pub mod types {
    /// A pipeline run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline run reached a terminal outcome.
    pub const PIPELINE_FINISHED: &str = "pipeline.finished";
    /// A stage started executing.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage wrote its output key.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage produced output with non-blocking warnings.
    pub const STAGE_WARNING: &str = "stage.warning";
    /// A stage was skipped because an input key was missing.
    pub const STAGE_BLOCKED: &str = "stage.blocked";
    /// A retried operation made an attempt.
    pub const RETRY_ATTEMPT: &str = "retry.attempt";
    /// A retried operation gave up.
    pub const RETRY_EXHAUSTED: &str = "retry.exhausted";
    /// The deployment orchestrator entered a new phase.
    pub const DEPLOYMENT_PHASE: &str = "deployment.phase";
    /// The discovery probe finished scanning.
    pub const DISCOVERY_FINISHED: &str = "discovery.finished";
}
