//! Context management for pipeline execution.
//!
//! This module provides:
//! - The append-only pipeline state owned by a run
//! - Restricted, read-only stage input views
//! - Per-stage execution contexts

mod identity;
mod inputs;
mod stage_context;
mod state;

pub use identity::RunIdentity;
pub use inputs::StageInputs;
pub use stage_context::StageContext;
pub use state::PipelineState;
