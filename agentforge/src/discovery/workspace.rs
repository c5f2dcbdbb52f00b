//! Workspace context detection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const PYTHON_MARKERS: &[&str] = &["setup.py", "pyproject.toml", "requirements.txt", "Pipfile"];
const DOC_MARKERS: &[&str] = &["README.md", "docs", "documentation"];
const CLOUD_MARKERS: &[(&str, &[&str])] = &[
    ("gcp", &[".gcloudignore", "app.yaml", "cloudbuild.yaml"]),
    ("aws", &[".aws", "cloudformation.yaml", "serverless.yml"]),
    ("azure", &["azure-pipelines.yml", ".azure"]),
];

/// Project patterns detected in a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceContext {
    /// Whether anything useful for agent design was found.
    pub has_context: bool,
    /// Detected patterns, e.g. `git_repository` or `python_project`.
    pub patterns: Vec<String>,
    /// Suggested integrations for the detected patterns.
    pub suggestions: Vec<String>,
    /// Non-fatal errors while probing.
    pub errors: Vec<String>,
}

impl WorkspaceContext {
    /// Returns true if a pattern was detected.
    #[must_use]
    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|p| p == pattern)
    }

    fn detect(&mut self, pattern: impl Into<String>, suggestion: Option<String>) {
        self.patterns.push(pattern.into());
        if let Some(suggestion) = suggestion {
            self.suggestions.push(suggestion);
            self.has_context = true;
        }
    }

    fn exists(&mut self, dir: &Path, name: &str) -> bool {
        match dir.join(name).try_exists() {
            Ok(found) => found,
            Err(e) => {
                self.errors.push(format!("{}: {e}", dir.join(name).display()));
                false
            }
        }
    }

    fn any_exists(&mut self, dir: &Path, names: &[&str]) -> bool {
        names.iter().any(|name| self.exists(dir, name))
    }
}

/// Inspects `dir` for project patterns that inform agent design. Never fails.
#[must_use]
pub fn probe_workspace(dir: &Path) -> WorkspaceContext {
    let mut ctx = WorkspaceContext::default();

    if ctx.exists(dir, ".git") {
        ctx.detect(
            "git_repository",
            Some("Consider using GitHub/GitLab MCP for repository operations".to_string()),
        );
    }
    if ctx.any_exists(dir, PYTHON_MARKERS) {
        ctx.detect(
            "python_project",
            Some("Python project detected - code execution tools recommended".to_string()),
        );
    }
    if ctx.exists(dir, "package.json") {
        ctx.detect(
            "nodejs_project",
            Some("Node.js project detected - npm/filesystem tools recommended".to_string()),
        );
    }
    for (cloud, markers) in CLOUD_MARKERS {
        if ctx.any_exists(dir, markers) {
            ctx.detect(
                format!("{cloud}_project"),
                Some(format!(
                    "{} project detected - cloud integration tools recommended",
                    cloud.to_uppercase()
                )),
            );
        }
    }
    if ctx.any_exists(dir, DOC_MARKERS) {
        ctx.detect("has_documentation", None);
    }

    debug!(dir = %dir.display(), patterns = ?ctx.patterns, "Probed workspace");
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_empty_dir_has_no_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = probe_workspace(dir.path());
        assert_eq!(ctx, WorkspaceContext::default());
    }

    #[test]
    fn test_detects_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        fs::write(dir.path().join("cloudbuild.yaml"), "steps: []\n").unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

        let ctx = probe_workspace(dir.path());

        assert!(ctx.has_context);
        assert_eq!(
            ctx.patterns,
            vec!["git_repository", "python_project", "gcp_project", "has_documentation"]
        );
        assert_eq!(ctx.suggestions.len(), 3);
        assert!(ctx.suggestions[2].starts_with("GCP project detected"));
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_documentation_alone_is_not_context() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();

        let ctx = probe_workspace(dir.path());
        assert!(!ctx.has_context);
        assert!(ctx.has_pattern("has_documentation"));
    }
}
