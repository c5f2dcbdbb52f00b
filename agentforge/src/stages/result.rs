//! Per-stage execution records.

use crate::core::{AttemptRecord, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What happened to one stage during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// The key the stage owns.
    pub output_key: String,
    /// Final stage status.
    pub status: StageStatus,
    /// When the stage started (or was found blocked).
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Error message if the stage failed or was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Input keys that were missing when the stage was blocked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_inputs: Vec<String>,
    /// Attempt log of any retried call made by the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,
    /// Warnings the stage reported about its output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Metadata the stage attached to its output.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageRecord {
    /// Creates a record for a stage that finished with the given status.
    #[must_use]
    pub fn finished(
        name: impl Into<String>,
        output_key: impl Into<String>,
        status: StageStatus,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            output_key: output_key.into(),
            status,
            started_at,
            ended_at: Utc::now(),
            error: None,
            missing_inputs: Vec::new(),
            attempts: Vec::new(),
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a record for a stage skipped due to missing inputs.
    #[must_use]
    pub fn blocked(
        name: impl Into<String>,
        output_key: impl Into<String>,
        missing_inputs: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            output_key: output_key.into(),
            status: StageStatus::Blocked,
            started_at: now,
            ended_at: now,
            error: None,
            missing_inputs,
            attempts: Vec::new(),
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Sets the error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the attempt log.
    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the warnings.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns a metadata entry.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
