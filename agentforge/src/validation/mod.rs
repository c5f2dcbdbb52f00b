//! Validation engine for generated artifacts.
//!
//! Validation is pure: it reads only the content it is given. Checks run
//! in a fixed order (syntax, required presence, heuristics) and every check
//! runs even after earlier failures, so one pass yields the complete
//! report.

mod heuristics;
mod report;
mod specs;
mod syntax;

pub use heuristics::count_test_functions;
pub use report::ValidationReport;
pub use specs::{validate_architecture, validate_requirements, validate_tool_spec};
pub use syntax::{check_env, check_json, check_python, check_requirements, Grammar, SyntaxError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Artifact names a generated agent project must contain.
pub const REQUIRED_ARTIFACTS: &[&str] = &["agent_py", "requirements_txt", "readme_md"];

/// Artifact names that are recommended but not required.
pub const OPTIONAL_ARTIFACTS: &[&str] = &["tools_py", "env_example", "deploy_py", "tests_py"];

/// A set of generated artifacts keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    files: BTreeMap<String, String>,
}

impl ArtifactSet {
    /// Creates an empty artifact set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    /// Adds or replaces an artifact.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    /// Gets an artifact's content.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Iterates artifacts in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the artifact names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    /// Returns the number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if there are no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Builds a set from a JSON mapping of name to content.
    ///
    /// Entries whose content is not a string are returned separately.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<(Self, Vec<String>)> {
        let map = value.as_object()?;
        let mut set = Self::new();
        let mut rejected = Vec::new();
        for (name, content) in map {
            match content.as_str() {
                Some(text) => set.insert(name.clone(), text),
                None => rejected.push(name.clone()),
            }
        }
        Some((set, rejected))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Validates artifact sets against required and optional names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactValidator {
    required: Vec<String>,
    optional: Vec<String>,
}

impl Default for ArtifactValidator {
    fn default() -> Self {
        Self::new(REQUIRED_ARTIFACTS, OPTIONAL_ARTIFACTS)
    }
}

impl ArtifactValidator {
    /// Creates a validator with the given name lists.
    #[must_use]
    pub fn new<S: AsRef<str>>(required: &[S], optional: &[S]) -> Self {
        Self {
            required: required.iter().map(|s| s.as_ref().to_string()).collect(),
            optional: optional.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Returns the required artifact names.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Returns the optional artifact names.
    #[must_use]
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Validates an artifact set.
    #[must_use]
    pub fn validate(&self, artifacts: &ArtifactSet) -> ValidationReport {
        self.run(artifacts, &[])
    }

    /// Validates a JSON mapping of artifact name to content.
    ///
    /// Non-string contents are blocking errors.
    #[must_use]
    pub fn validate_json(&self, value: &serde_json::Value) -> ValidationReport {
        let Some((artifacts, rejected)) = ArtifactSet::from_json(value) else {
            return ValidationReport::with_error(
                "project files should be a mapping of artifact name to content",
            );
        };

        let mut report = ValidationReport::new();
        for name in &rejected {
            report.push_error(format!("File {name} content should be a string"));
        }
        report.merge(self.run(&artifacts, &rejected));
        report
    }

    fn run(&self, artifacts: &ArtifactSet, rejected: &[String]) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (name, content) in artifacts.iter() {
            if content.trim().is_empty() {
                continue;
            }
            let grammar = Grammar::for_artifact(name);
            if let Err(e) = grammar.check(content) {
                report.push_error(format!("{name}: {grammar} syntax error at {e}"));
            }
        }

        for name in &self.required {
            if rejected.contains(name) {
                continue;
            }
            match artifacts.get(name) {
                None => report.push_error(format!("Missing required file: {name}")),
                Some(content) if content.trim().is_empty() => {
                    report.push_error(format!("File {name} is empty"));
                }
                Some(_) => {}
            }
        }

        for name in &self.optional {
            if rejected.contains(name) {
                continue;
            }
            if artifacts.get(name).map_or(true, |c| c.trim().is_empty()) {
                report.push_warning(format!("Optional file not generated: {name}"));
            }
        }

        for (name, content) in artifacts.iter() {
            if Grammar::for_artifact(name) == Grammar::Python {
                heuristics::check_python(name, content, &mut report);
            }
            heuristics::check_placeholders(name, content, &mut report);
        }

        debug!(
            artifacts = artifacts.len(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Validated artifact set"
        );
        report
    }
}

/// Validates an artifact set with the default required and optional names.
#[must_use]
pub fn validate(artifacts: &ArtifactSet) -> ValidationReport {
    ArtifactValidator::default().validate(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_artifacts;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_sample_artifacts_are_valid() {
        let report = validate(&sample_artifacts());
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);
    }

    #[test]
    fn test_missing_required_and_optional() {
        let artifacts = ArtifactSet::new()
            .with("agent_py", "\"\"\"Agent.\"\"\"\nroot_agent = None\n")
            .with("readme_md", "   ");

        let report = validate(&artifacts);
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec!["Missing required file: requirements_txt", "File readme_md is empty"]
        );
        assert_eq!(report.warnings.len(), 4);
    }

    #[test]
    fn test_all_checks_run_after_syntax_failure() {
        let artifacts = sample_artifacts()
            .with("agent_py", "from x import *\ndef broken(:\n")
            .with("tools_py", "");

        let report = validate(&artifacts);
        assert!(!report.valid);
        assert!(report.errors[0].starts_with("agent_py: python syntax error at line 2"));
        assert!(report.warnings.contains(&"Optional file not generated: tools_py".to_string()));
        assert!(report.warnings.contains(&"agent_py: wildcard import at line 1".to_string()));
    }

    #[test]
    fn test_heuristics_never_block() {
        let artifacts = sample_artifacts().with("deploy_py", "PROJECT = \"your-project-id\"\n");
        let report = validate(&artifacts);
        assert!(report.valid);
        assert_eq!(
            report.warnings,
            vec!["deploy_py: unresolved placeholder 'your-project-id' at line 1"]
        );
    }

    #[test]
    fn test_validate_json_rejects_non_string_content() {
        let mut value = serde_json::to_value(sample_artifacts()).unwrap();
        value["agent_py"] = json!({"not": "text"});

        let report = ArtifactValidator::default().validate_json(&value);
        assert_eq!(report.errors, vec!["File agent_py content should be a string"]);

        let mut value = serde_json::to_value(sample_artifacts()).unwrap();
        value["tools_py"] = json!(42);
        let report = ArtifactValidator::default().validate_json(&value);
        assert_eq!(report.errors, vec!["File tools_py content should be a string"]);
        assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);

        let report = ArtifactValidator::default().validate_json(&json!(["agent_py"]));
        assert!(!report.valid);
    }

    #[test]
    fn test_custom_required_names() {
        let validator = ArtifactValidator::new(&["main_py"], &[]);
        let report = validator.validate(&ArtifactSet::new().with("main_py", "print('hi')\n"));
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }
}
