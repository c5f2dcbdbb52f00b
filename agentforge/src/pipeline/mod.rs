//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage descriptors and a validating builder
//! - A strictly sequential runner with blocked/failed/cancelled outcomes
//! - The retrying executor used for remote calls
//! - The standard agent-builder stage catalog

pub mod agent_builder;
mod builder;
mod retry;
mod runner;
mod spec;

#[cfg(test)]
mod integration_tests;

pub use agent_builder::{
    standard_pipeline, AgentBuilderPipeline, CatalogEntry, DEPLOYMENT_RESULT_KEY, STAGE_CATALOG,
};
pub use builder::PipelineBuilder;
pub use retry::{
    ErrorClassifier, FnClassifier, JitterStrategy, KeywordClassifier, Retried, RetryPolicy,
    RetryingExecutor, TerminalError, TerminalReason, DEFAULT_RETRY_KEYWORDS,
};
pub use runner::{Pipeline, PipelineRunResult, RunOutcome, StageError, StageErrorKind};
pub use spec::StageDescriptor;
