//! Core domain model types for agentforge.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage status and kind enums
//! - Stage output type with factory methods
//! - Attempt records written by the retrying executor

mod attempt;
mod output;
mod status;

pub use attempt::{AttemptOutcome, AttemptRecord};
pub use output::StageOutput;
pub use status::{StageKind, StageStatus};
