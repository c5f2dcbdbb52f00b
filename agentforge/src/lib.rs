//! # Agentforge
//!
//! The deterministic core of an LLM-driven agent builder.
//!
//! Agentforge provides:
//!
//! - **Stage pipeline**: named stages run in declaration order over a
//!   write-once state, each reading only its declared inputs
//! - **Retrying executor**: bounded exponential backoff with pluggable
//!   error classification and cancellation between attempts
//! - **Validation engine**: pure syntax, presence and heuristic checks over
//!   generated artifacts
//! - **Deployment orchestrator**: validate, deploy under retry, verify
//! - **Discovery probe**: fault-tolerant lookup of optional tool registries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentforge::prelude::*;
//!
//! let orchestrator = DeploymentOrchestrator::new(deployer, RetryPolicy::default())?;
//! let pipeline = standard_pipeline(invoker, Arc::new(orchestrator), config)?.build()?;
//!
//! let result = pipeline.run(PipelineState::new()).await?;
//! RunRecord::from_result(&result).log();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod deploy;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::ForgeConfig;
    pub use crate::context::{PipelineState, StageContext, StageInputs};
    pub use crate::core::{AttemptRecord, StageOutput, StageStatus};
    pub use crate::deploy::{
        DeploymentConfig, DeploymentOrchestrator, DeploymentRecord, HealthProbe, RemoteDeployer,
    };
    pub use crate::discovery::{discover, DiscoveryResult, Location};
    pub use crate::errors::{ConfigurationError, ForgeError};
    pub use crate::events::{CollectingEventSink, EventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, RunRecord};
    pub use crate::pipeline::{
        standard_pipeline, Pipeline, PipelineBuilder, PipelineRunResult, RetryPolicy,
        RetryingExecutor, RunOutcome,
    };
    pub use crate::stages::{InvokerStage, Stage, StageInvoker};
    pub use crate::validation::{validate, ArtifactSet, ValidationReport};
}
