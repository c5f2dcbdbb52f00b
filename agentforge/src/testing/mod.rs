//! Testing utilities for agentforge pipelines.
//!
//! This module provides:
//! - Mock stages and a stage context builder
//! - Scripted invoker, deployer and health probe
//! - A clean sample artifact set

mod fixtures;
mod mocks;

pub use fixtures::{sample_artifacts, stage_context};
pub use mocks::{MockStage, ScriptedDeployer, ScriptedInvoker, StaticProbe};
