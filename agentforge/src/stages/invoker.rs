//! The language-model invocation boundary.
//!
//! The model call is opaque to the pipeline: a [`StageInvoker`] receives the
//! stage name and its restricted inputs and returns one structured value.

use super::Stage;
use crate::context::{StageContext, StageInputs};
use crate::core::StageOutput;
use crate::events::types;
use crate::validation::ValidationReport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by a stage invoker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The model call itself failed.
    #[error("model call failed: {0}")]
    Model(String),

    /// The model returned something that is not a usable value.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// The call did not return in time.
    #[error("invocation timed out after {0:?}")]
    Timeout(Duration),
}

/// The opaque `invoke(stage_name, inputs) -> value` boundary.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    /// Invokes the model for a stage.
    async fn invoke(
        &self,
        stage_name: &str,
        inputs: &StageInputs,
    ) -> Result<serde_json::Value, InvocationError>;
}

/// A check applied to an invoker's output before it is accepted.
pub type OutputCheck = Arc<dyn Fn(&serde_json::Value) -> ValidationReport + Send + Sync>;

/// A stage whose logic is a single invoker call.
///
/// An optional output check turns an invalid model output into a stage
/// failure; its warnings are attached to the output.
#[derive(Clone)]
pub struct InvokerStage {
    invoker: Arc<dyn StageInvoker>,
    timeout: Option<Duration>,
    check: Option<OutputCheck>,
}

impl InvokerStage {
    /// Creates a new invoker-backed stage.
    #[must_use]
    pub fn new(invoker: Arc<dyn StageInvoker>) -> Self {
        Self {
            invoker,
            timeout: None,
            check: None,
        }
    }

    /// Bounds the invocation time.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates the output before it is written.
    #[must_use]
    pub fn with_check(mut self, check: OutputCheck) -> Self {
        self.check = Some(check);
        self
    }

    async fn call(&self, ctx: &StageContext) -> Result<serde_json::Value, InvocationError> {
        let call = self.invoker.invoke(ctx.stage_name(), ctx.inputs());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| InvocationError::Timeout(limit))?,
            None => call.await,
        }
    }
}

impl std::fmt::Debug for InvokerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokerStage")
            .field("timeout", &self.timeout)
            .field("has_check", &self.check.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for InvokerStage {
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        let value = match self.call(ctx).await {
            Ok(value) => value,
            Err(e) => {
                warn!(stage = ctx.stage_name(), error = %e, "Stage invocation failed");
                return StageOutput::fail(e.to_string());
            }
        };

        let Some(check) = &self.check else {
            return StageOutput::ok(value);
        };

        let report = check(&value);
        if !report.valid {
            debug!(stage = ctx.stage_name(), errors = ?report.errors, "Stage output rejected");
            return StageOutput::fail(format!(
                "output of '{}' is invalid: {}",
                ctx.stage_name(),
                report.errors.join("; ")
            ));
        }

        if !report.warnings.is_empty() {
            debug!(stage = ctx.stage_name(), warnings = ?report.warnings, "Stage output has warnings");
            ctx.emit_event(
                types::STAGE_WARNING,
                serde_json::json!({ "warnings": report.warnings }),
            );
        }
        StageOutput::ok(value).with_warnings(report.warnings)
    }
}
