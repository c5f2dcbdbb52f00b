//! Attempt records produced by the retrying executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single call to a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The operation succeeded.
    Success,
    /// The operation failed with a transient error and will be retried.
    RetryableFailure,
    /// The operation failed and no further attempt will be made.
    FatalFailure,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::RetryableFailure => write!(f, "retryable_failure"),
            Self::FatalFailure => write!(f, "fatal_failure"),
        }
    }
}

/// One entry of an attempt log.
///
/// Records are appended in strictly increasing attempt order and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The attempt number (1-indexed).
    pub attempt: u32,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
    /// The outcome of the attempt.
    pub outcome: AttemptOutcome,
    /// The error message for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Backoff applied after this attempt, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl AttemptRecord {
    /// Records a successful attempt.
    #[must_use]
    pub fn success(attempt: u32) -> Self {
        Self {
            attempt,
            timestamp: Utc::now(),
            outcome: AttemptOutcome::Success,
            error: None,
            delay_ms: None,
        }
    }

    /// Records a transient failure followed by the given backoff.
    #[must_use]
    pub fn retryable(attempt: u32, error: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            attempt,
            timestamp: Utc::now(),
            outcome: AttemptOutcome::RetryableFailure,
            error: Some(error.into()),
            delay_ms: Some(delay_ms),
        }
    }

    /// Records a terminal failure.
    #[must_use]
    pub fn fatal(attempt: u32, error: impl Into<String>) -> Self {
        Self {
            attempt,
            timestamp: Utc::now(),
            outcome: AttemptOutcome::FatalFailure,
            error: Some(error.into()),
            delay_ms: None,
        }
    }

    /// Returns true if the attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}
