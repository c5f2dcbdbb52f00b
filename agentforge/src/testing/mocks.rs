//! Scripted stand-ins for stages and external collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{StageContext, StageInputs};
use crate::core::StageOutput;
use crate::deploy::{
    DeploymentRequest, HealthProbe, HealthStatus, RemoteDeployer, RemoteError, ResourceHandle,
};
use crate::stages::{InvocationError, Stage, StageInvoker};

type Inspector = Box<dyn Fn(&StageContext) -> serde_json::Value + Send + Sync>;

enum Behavior {
    Fixed(StageOutput),
    Inspect(Inspector),
}

/// A stage that returns a fixed output or computes one from its context.
pub struct MockStage {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl fmt::Debug for MockStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MockStage");
        if let Behavior::Fixed(output) = &self.behavior {
            s.field("output", output);
        }
        s.field("calls", &self.call_count()).finish_non_exhaustive()
    }
}

impl MockStage {
    /// Creates a stage that always returns `output`.
    #[must_use]
    pub fn new(output: StageOutput) -> Self {
        Self {
            behavior: Behavior::Fixed(output),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a stage whose successful value is computed from its context.
    #[must_use]
    pub fn inspect<F>(f: F) -> Self
    where
        F: Fn(&StageContext) -> serde_json::Value + Send + Sync + 'static,
    {
        Self {
            behavior: Behavior::Inspect(Box::new(f)),
            calls: AtomicUsize::new(0),
        }
    }

    /// A shared stage that succeeds with `value`.
    #[must_use]
    pub fn ok_arc(value: serde_json::Value) -> Arc<Self> {
        Arc::new(Self::new(StageOutput::ok(value)))
    }

    /// A shared stage that fails with `error`.
    #[must_use]
    pub fn fail_arc(error: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(StageOutput::fail(error)))
    }

    /// Number of executions so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for MockStage {
    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Fixed(output) => output.clone(),
            Behavior::Inspect(f) => StageOutput::ok(f(ctx)),
        }
    }
}

/// An invoker that answers each stage from a script.
///
/// Stages without a scripted answer fail with a model error.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    responses: HashMap<String, Result<serde_json::Value, String>>,
    latency: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `stage` with `value`.
    #[must_use]
    pub fn respond(mut self, stage: impl Into<String>, value: serde_json::Value) -> Self {
        self.responses.insert(stage.into(), Ok(value));
        self
    }

    /// Fails `stage` with `error`.
    #[must_use]
    pub fn fail(mut self, stage: impl Into<String>, error: impl Into<String>) -> Self {
        self.responses.insert(stage.into(), Err(error.into()));
        self
    }

    /// Delays every answer.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stage names invoked, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        stage_name: &str,
        _inputs: &StageInputs,
    ) -> Result<serde_json::Value, InvocationError> {
        self.calls.lock().push(stage_name.to_string());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.responses.get(stage_name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(InvocationError::Model(error.clone())),
            None => Err(InvocationError::Model(format!(
                "no scripted response for '{stage_name}'"
            ))),
        }
    }
}

/// A deployer that fails with scripted errors, then succeeds.
#[derive(Debug, Default)]
pub struct ScriptedDeployer {
    errors: Mutex<VecDeque<RemoteError>>,
    forever: Option<RemoteError>,
    keys: Mutex<Vec<String>>,
}

impl ScriptedDeployer {
    /// Creates a deployer that succeeds on the first call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deployer that fails every call with `message`.
    #[must_use]
    pub fn failing_forever(message: impl Into<String>) -> Self {
        Self {
            forever: Some(RemoteError::new(message)),
            ..Self::default()
        }
    }

    /// Queues a failure for the next unscripted call.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.errors.lock().push_back(RemoteError::new(message));
        self
    }

    /// Number of create calls so far.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.keys.lock().len()
    }

    /// Idempotency keys received, in call order.
    #[must_use]
    pub fn idempotency_keys(&self) -> Vec<String> {
        self.keys.lock().clone()
    }
}

#[async_trait]
impl RemoteDeployer for ScriptedDeployer {
    async fn create(&self, request: &DeploymentRequest) -> Result<ResourceHandle, RemoteError> {
        let call = {
            let mut keys = self.keys.lock();
            keys.push(request.idempotency_key.clone());
            keys.len()
        };
        if let Some(error) = self.errors.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = &self.forever {
            return Err(error.clone());
        }
        Ok(ResourceHandle::reasoning_engine(
            &request.config.project_id,
            &request.config.location,
            &format!("generated-{call}"),
        ))
    }
}

/// A health probe with a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    answer: Result<HealthStatus, RemoteError>,
}

impl StaticProbe {
    /// Always reports healthy.
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            answer: Ok(HealthStatus::healthy("Agent is deployed and ready")),
        }
    }

    /// Always reports unhealthy with `status`.
    #[must_use]
    pub fn unhealthy(status: impl Into<String>) -> Self {
        Self {
            answer: Ok(HealthStatus::unhealthy(status)),
        }
    }

    /// Always fails with `message`.
    #[must_use]
    pub fn erroring(message: impl Into<String>) -> Self {
        Self {
            answer: Err(RemoteError::new(message)),
        }
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self, _handle: &ResourceHandle) -> Result<HealthStatus, RemoteError> {
        self.answer.clone()
    }
}
