//! Observability utilities.
//!
//! Tracing subscriber setup and a serializable record of a finished run.

mod logging;
mod record;

pub use logging::init_tracing;
pub use record::{RunRecord, StageSummary};
