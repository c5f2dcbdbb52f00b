//! Structural heuristics over artifact content.
//!
//! Findings here are warnings only.

use super::ValidationReport;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static WILDCARD_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*from\s+\S+\s+import\s+\*").expect("wildcard pattern is valid")
});

#[allow(clippy::expect_used)]
static TODO_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s*(TODO|FIXME)\b").expect("todo pattern is valid"));

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{\s*[\w.]+\s*\}\}|<YOUR[_-][A-Za-z_-]+>|(?i:your[-_]project[-_]id)|(?i:your[-_]bucket[-_]name)|REPLACE_ME",
    )
    .expect("placeholder pattern is valid")
});

#[allow(clippy::expect_used)]
static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)").expect("def pattern is valid")
});

#[allow(clippy::expect_used)]
static TEST_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(async\s+)?def\s+test_\w*\s*\(").expect("test pattern is valid")
});

/// Counts `def test_*` functions in a Python source.
#[must_use]
pub fn count_test_functions(source: &str) -> usize {
    source.lines().filter(|l| TEST_FUNCTION.is_match(l)).count()
}

/// Warns about unresolved template placeholders in any artifact.
pub fn check_placeholders(name: &str, content: &str, report: &mut ValidationReport) {
    for (idx, line) in content.lines().enumerate() {
        if let Some(m) = PLACEHOLDER.find(line) {
            report.push_warning(format!(
                "{name}: unresolved placeholder '{}' at line {}",
                m.as_str(),
                idx + 1
            ));
        }
    }
}

/// Warns about Python-specific smells.
pub fn check_python(name: &str, source: &str, report: &mut ValidationReport) {
    let lines: Vec<&str> = source.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if WILDCARD_IMPORT.is_match(line) {
            report.push_warning(format!("{name}: wildcard import at line {line_no}"));
        }
        if TODO_MARKER.is_match(line) {
            report.push_warning(format!("{name}: TODO/FIXME marker at line {line_no}"));
        }
        if let Some(function) = FUNCTION_DEF.captures(line).and_then(|c| c.get(2)) {
            let function = function.as_str();
            if !function.starts_with("test_")
                && line.trim_end().ends_with(':')
                && !has_docstring(&lines[idx + 1..])
            {
                report.push_warning(format!(
                    "{name}: function '{function}' at line {line_no} has no docstring"
                ));
            }
        }
    }

    if is_test_artifact(name) && count_test_functions(source) == 0 {
        report.push_warning(format!("{name}: no test functions found"));
    }
}

fn has_docstring(body: &[&str]) -> bool {
    body.iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_some_and(|l| {
            let unprefixed = l.trim_start_matches(['r', 'R', 'u', 'U']);
            unprefixed.starts_with("\"\"\"") || unprefixed.starts_with("'''")
        })
}

fn is_test_artifact(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("test") || lower.contains("_test") || lower.contains("tests_")
}
