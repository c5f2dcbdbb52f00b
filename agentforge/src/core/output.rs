//! Stage output type with factory methods.

use super::{AttemptRecord, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a stage execution.
///
/// A successful output carries exactly one value. The pipeline stores it
/// under the stage's declared output key; an output that names a different
/// key (via [`StageOutput::ok_keyed`]) fails the run with a configuration
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// The key the stage claims to write. `None` means the declared key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// The produced value (for successful executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Error message (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Cancel reason (for cancelled executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    /// Attempt log of any retried remote call made by the stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,

    /// Non-blocking problems found in the produced value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            key: None,
            value: None,
            error: None,
            cancel_reason: None,
            attempts: Vec::new(),
            warnings: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Creates a successful output written to the stage's declared key.
    #[must_use]
    pub fn ok(value: serde_json::Value) -> Self {
        Self {
            value: Some(value),
            ..Self::with_status(StageStatus::Ok)
        }
    }

    /// Creates a successful output that names the key it writes.
    #[must_use]
    pub fn ok_keyed(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value),
            ..Self::with_status(StageStatus::Ok)
        }
    }

    /// Creates a failure output with an error message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Creates a cancel output with a reason.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self {
            cancel_reason: Some(reason.into()),
            ..Self::with_status(StageStatus::Cancel)
        }
    }

    /// Attaches the attempt log of a retried call.
    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.attempts = attempts;
        self
    }

    /// Attaches warnings about the produced value.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if the output indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns the key this output writes, given the stage's declared key.
    #[must_use]
    pub fn target_key<'a>(&'a self, declared: &'a str) -> &'a str {
        self.key.as_deref().unwrap_or(declared)
    }

    /// Converts the output to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("status".to_string(), serde_json::json!(self.status.to_string()));

        if let Some(ref key) = self.key {
            map.insert("key".to_string(), serde_json::json!(key));
        }
        if let Some(ref value) = self.value {
            map.insert("value".to_string(), value.clone());
        }
        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }
        if let Some(ref reason) = self.cancel_reason {
            map.insert("cancel_reason".to_string(), serde_json::json!(reason));
        }
        if !self.attempts.is_empty() {
            map.insert("attempts".to_string(), serde_json::json!(self.attempts));
        }
        if !self.warnings.is_empty() {
            map.insert("warnings".to_string(), serde_json::json!(self.warnings));
        }
        if !self.metadata.is_empty() {
            let meta: serde_json::Map<String, serde_json::Value> =
                self.metadata.clone().into_iter().collect();
            map.insert("metadata".to_string(), serde_json::Value::Object(meta));
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_output_targets_declared_key() {
        let output = StageOutput::ok(json!({"purpose": "triage"}));
        assert!(output.is_success());
        assert_eq!(output.target_key("requirements_spec"), "requirements_spec");
    }

    #[test]
    fn test_keyed_output_overrides_target() {
        let output = StageOutput::ok_keyed("other", json!(1));
        assert_eq!(output.target_key("declared"), "other");
    }

    #[test]
    fn test_fail_output() {
        let output = StageOutput::fail("model returned garbage");
        assert_eq!(output.status, StageStatus::Fail);
        assert!(output.is_failure());
        assert!(output.value.is_none());
    }

    #[test]
    fn test_cancel_output() {
        let output = StageOutput::cancel("user interrupt");
        assert_eq!(output.status, StageStatus::Cancel);
        assert_eq!(output.cancel_reason.as_deref(), Some("user interrupt"));
    }

    #[test]
    fn test_to_dict_includes_attempts() {
        let output = StageOutput::ok(json!(true))
            .with_attempts(vec![AttemptRecord::success(1)])
            .add_metadata("phase", json!("verifying"));
        let dict = output.to_dict();

        assert_eq!(dict.get("status"), Some(&json!("ok")));
        assert_eq!(dict["attempts"].as_array().map(Vec::len), Some(1));
        assert_eq!(dict["metadata"]["phase"], "verifying");
    }
}
