//! Checks for the intermediate outputs of the agent-builder stages.
//!
//! Each check has the [`OutputCheck`](crate::stages::OutputCheck) shape and
//! can be attached to an invoker-backed stage.

use super::ValidationReport;
use crate::stages::patterns::{google_tool, google_tools, AgentType};
use serde_json::Value;

const COMPLEXITY_LEVELS: &[&str] = &["simple", "moderate", "complex"];

const REQUIREMENT_FLAGS: &[&str] = &[
    "needs_sub_agents",
    "needs_parallel_execution",
    "needs_iteration",
    "needs_custom_logic",
];

/// Validates a requirements specification.
#[must_use]
pub fn validate_requirements(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(spec) = value.as_object() else {
        report.push_error(format!(
            "requirements should be a mapping, got {}",
            type_name(value)
        ));
        return report;
    };

    for field in ["purpose", "use_case"] {
        if !is_truthy(spec.get(field)) {
            report.push_error(format!("Missing '{field}' field"));
        }
    }

    let complexity = spec.get("complexity").and_then(Value::as_str).unwrap_or("");
    if !COMPLEXITY_LEVELS.contains(&complexity) {
        report.push_warning(format!(
            "Invalid complexity '{complexity}', expected one of {}",
            COMPLEXITY_LEVELS.join(", ")
        ));
    }

    for field in REQUIREMENT_FLAGS {
        match spec.get(*field) {
            None | Some(Value::Null | Value::Bool(_)) => {}
            Some(other) => report.push_warning(format!(
                "Field '{field}' should be boolean, got {}",
                type_name(other)
            )),
        }
    }

    for field in ["suggested_mcps", "custom_tool_requirements"] {
        if let Some(other) = spec.get(field).filter(|v| !v.is_array()) {
            report.push_error(format!(
                "Field '{field}' should be a list, got {}",
                type_name(other)
            ));
        }
    }

    report
}

/// Validates an architecture design.
#[must_use]
pub fn validate_architecture(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(design) = value.as_object() else {
        report.push_error(format!(
            "architecture should be a mapping, got {}",
            type_name(value)
        ));
        return report;
    };

    if !is_truthy(design.get("agent_type")) {
        report.push_error("Missing 'agent_type' field");
    }

    let agent_type = design.get("agent_type").and_then(Value::as_str).unwrap_or("");
    if agent_type.parse::<AgentType>().is_err() {
        let known: Vec<&str> = AgentType::ALL.iter().map(|t| t.as_str()).collect();
        report.push_warning(format!(
            "Unusual agent type '{agent_type}', expected one of {}",
            known.join(", ")
        ));
    }

    match design.get("model_suggestion") {
        Some(Value::String(model)) if !model.is_empty() && !model.starts_with("gemini") => {
            report.push_warning(format!("Non-Gemini model suggested: {model}"));
        }
        Some(other) if !other.is_string() && is_truthy(Some(other)) => {
            report.push_warning(format!("Non-Gemini model suggested: {other}"));
        }
        _ => {}
    }

    if !is_truthy(design.get("rationale")) {
        report.push_warning("Missing rationale for architecture choice");
    }

    report
}

/// Validates a tool specification.
#[must_use]
pub fn validate_tool_spec(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(spec) = value.as_object() else {
        report.push_error(format!(
            "tool specification should be a mapping, got {}",
            type_name(value)
        ));
        return report;
    };

    for field in ["mcp_tools", "google_tools"] {
        if spec.get(field).is_some_and(|v| !v.is_array()) {
            report.push_error(format!("'{field}' should be a list"));
        }
    }

    let unknown_google = spec
        .get("google_tools")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|name| google_tool(name).is_none());
    for name in unknown_google {
        let known: Vec<&str> = google_tools().iter().map(|t| t.name).collect();
        report.push_warning(format!(
            "Unknown Google tool '{name}', available: {}",
            known.join(", ")
        ));
    }

    match spec.get("custom_functions") {
        None => {}
        Some(Value::Array(functions)) => {
            for (i, func) in functions.iter().enumerate() {
                check_custom_function(i, func, &mut report);
            }
        }
        Some(_) => report.push_error("'custom_functions' should be a list"),
    }

    let has_tools = ["mcp_tools", "google_tools", "custom_functions"]
        .iter()
        .any(|field| is_truthy(spec.get(*field)));
    if !has_tools {
        report.push_warning("No tools specified - agent may have limited capabilities");
    }

    report
}

fn check_custom_function(index: usize, func: &Value, report: &mut ValidationReport) {
    let Some(func) = func.as_object() else {
        report.push_error(format!("custom_functions[{index}] should be a mapping"));
        return;
    };

    if !is_truthy(func.get("name")) {
        report.push_error(format!("custom_functions[{index}] missing 'name'"));
    }
    if !is_truthy(func.get("description")) {
        report.push_warning(format!("custom_functions[{index}] missing 'description'"));
    }
    if func.get("params").is_some_and(|v| !v.is_array()) {
        report.push_error(format!("custom_functions[{index}]['params'] should be a list"));
    }
}

/// Empty strings, collections, zero, false and null count as absent.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_complete_requirements_are_clean() {
        let report = validate_requirements(&json!({
            "purpose": "Answer billing questions",
            "use_case": "customer support",
            "complexity": "moderate",
            "needs_sub_agents": false,
            "suggested_mcps": ["filesystem"],
            "custom_tool_requirements": []
        }));
        assert!(report.valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_requirements_missing_fields() {
        let report = validate_requirements(&json!({"purpose": "", "suggested_mcps": "filesystem"}));
        assert_eq!(
            report.errors,
            vec![
                "Missing 'purpose' field",
                "Missing 'use_case' field",
                "Field 'suggested_mcps' should be a list, got string",
            ]
        );
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_requirements_flag_type_is_a_warning() {
        let report = validate_requirements(&json!({
            "purpose": "p", "use_case": "u", "complexity": "simple", "needs_iteration": "yes"
        }));
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["Field 'needs_iteration' should be boolean, got string"]);
    }

    #[test]
    fn test_architecture_checks() {
        let report = validate_architecture(&json!({
            "agent_type": "SwarmAgent",
            "model_suggestion": "gpt-4o"
        }));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 3);

        let report = validate_architecture(&json!({}));
        assert_eq!(report.errors, vec!["Missing 'agent_type' field"]);
    }

    #[test]
    fn test_tool_spec_custom_functions() {
        let report = validate_tool_spec(&json!({
            "google_tools": ["google_search"],
            "custom_functions": [
                {"name": "lookup", "description": "Looks up an order", "params": []},
                {"description": "no name", "params": "order_id"},
                "not a mapping"
            ]
        }));
        assert_eq!(
            report.errors,
            vec![
                "custom_functions[1] missing 'name'",
                "custom_functions[1]['params'] should be a list",
                "custom_functions[2] should be a mapping",
            ]
        );
    }

    #[test]
    fn test_tool_spec_unknown_google_tool_warns() {
        let report = validate_tool_spec(&json!({"google_tools": ["google_search", "web_browser"]}));
        assert!(report.valid);
        assert_eq!(
            report.warnings,
            vec!["Unknown Google tool 'web_browser', available: google_search, code_execution, vertex_ai_search"]
        );
    }

    #[test]
    fn test_tool_spec_without_tools_warns() {
        let report = validate_tool_spec(&json!({"mcp_tools": [], "custom_functions": []}));
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["No tools specified - agent may have limited capabilities"]);
    }

    #[test]
    fn test_non_mapping_output_is_an_error() {
        assert!(!validate_requirements(&json!("text")).valid);
        assert!(!validate_architecture(&json!([1])).valid);
        assert!(!validate_tool_spec(&json!(null)).valid);
    }
}
