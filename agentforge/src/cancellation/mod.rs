//! Cooperative cancellation.
//!
//! The pipeline checks the token between stages and the retrying executor
//! checks it between attempts. Neither interrupts a stage or an operation
//! mid-flight.

mod token;

pub use token::{CancellationToken, Cancelled};
