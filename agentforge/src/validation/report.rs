//! Validation report type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The result of a validation pass.
///
/// `valid` is true exactly when `errors` is empty. Use the `push_*`
/// helpers rather than editing the lists directly to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether no blocking error was found.
    pub valid: bool,
    /// Blocking errors, in discovery order.
    pub errors: Vec<String>,
    /// Non-blocking warnings, in discovery order.
    pub warnings: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    /// Creates an empty, valid report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Creates a report with a single error.
    #[must_use]
    pub fn with_error(error: impl Into<String>) -> Self {
        let mut report = Self::new();
        report.push_error(error);
        report
    }

    /// Records a blocking error.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.valid = false;
    }

    /// Records a warning.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Appends another report's findings after this one's.
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.valid = self.errors.is_empty();
    }

    /// Returns true if there are warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns a one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.valid {
            format!("valid ({} warning(s))", self.warnings.len())
        } else {
            format!(
                "invalid: {} error(s), {} warning(s)",
                self.errors.len(),
                self.warnings.len()
            )
        }
    }

    /// Converts the report to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("valid".to_string(), serde_json::json!(self.valid));
        map.insert("errors".to_string(), serde_json::json!(self.errors));
        map.insert("warnings".to_string(), serde_json::json!(self.warnings));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_valid() {
        let report = ValidationReport::new();
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_warning_keeps_report_valid() {
        let mut report = ValidationReport::new();
        report.push_warning("Optional file not generated: tools_py");
        assert!(report.valid);
        assert!(report.has_warnings());
    }

    #[test]
    fn test_error_invalidates_report() {
        let mut report = ValidationReport::new();
        report.push_error("Missing required file: agent_py");
        assert!(!report.valid);
        assert_eq!(report.summary(), "invalid: 1 error(s), 0 warning(s)");
    }

    #[test]
    fn test_merge_preserves_order_and_validity() {
        let mut first = ValidationReport::new();
        first.push_warning("w1");
        let mut second = ValidationReport::with_error("e1");
        second.push_warning("w2");

        first.merge(second);
        assert!(!first.valid);
        assert_eq!(first.errors, vec!["e1"]);
        assert_eq!(first.warnings, vec!["w1", "w2"]);
    }
}
