//! Read-only stage inputs restricted to declared keys.

use crate::errors::UndeclaredInputError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Provides an immutable view of the pipeline state for one stage.
///
/// Only the stage's declared input keys are copied into the view, and
/// reading any other key is an error. This keeps stages from coupling to
/// keys owned by unrelated stages.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    values: HashMap<String, serde_json::Value>,
    declared: Vec<String>,
    stage_name: String,
}

impl StageInputs {
    /// Creates new stage inputs.
    #[must_use]
    pub fn new(
        values: HashMap<String, serde_json::Value>,
        declared: Vec<String>,
        stage_name: impl Into<String>,
    ) -> Self {
        let values = values
            .into_iter()
            .filter(|(k, _)| declared.contains(k))
            .collect();
        Self {
            values,
            declared,
            stage_name: stage_name.into(),
        }
    }

    /// Gets a declared input.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredInputError` if `key` is not a declared input.
    pub fn get(&self, key: &str) -> Result<Option<&serde_json::Value>, UndeclaredInputError> {
        if !self.declared.iter().any(|d| d == key) {
            return Err(UndeclaredInputError::new(&self.stage_name, key));
        }
        Ok(self.values.get(key))
    }

    /// Gets a declared input and deserializes it.
    ///
    /// Returns `Ok(None)` if the value is absent or has a different shape.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredInputError` if `key` is not a declared input.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, UndeclaredInputError> {
        Ok(self
            .get(key)?
            .and_then(|v| serde_json::from_value(v.clone()).ok()))
    }

    /// Checks if a declared input is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the declared input keys in declaration order.
    #[must_use]
    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    /// Returns the stage this view belongs to.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Converts the view into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .declared
            .iter()
            .filter_map(|k| self.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_values() -> HashMap<String, serde_json::Value> {
        let mut values = HashMap::new();
        values.insert("requirements_spec".to_string(), json!({"purpose": "triage"}));
        values.insert("architecture_design".to_string(), json!({"agent_type": "LlmAgent"}));
        values
    }

    #[test]
    fn test_declared_input_is_readable() {
        let inputs = StageInputs::new(
            sample_values(),
            vec!["requirements_spec".to_string()],
            "architecture_designer",
        );

        let value = inputs.get("requirements_spec").unwrap();
        assert_eq!(value, Some(&json!({"purpose": "triage"})));
    }

    #[test]
    fn test_undeclared_input_is_rejected() {
        let inputs = StageInputs::new(
            sample_values(),
            vec!["requirements_spec".to_string()],
            "architecture_designer",
        );

        let err = inputs.get("architecture_design").unwrap_err();
        assert_eq!(err.stage, "architecture_designer");
        assert_eq!(err.key, "architecture_design");
    }

    #[test]
    fn test_undeclared_values_are_not_copied() {
        let inputs = StageInputs::new(sample_values(), vec!["requirements_spec".to_string()], "s");
        assert!(!inputs.contains("architecture_design"));
        assert_eq!(inputs.to_json(), json!({"requirements_spec": {"purpose": "triage"}}));
    }

    #[test]
    fn test_get_as_deserializes() {
        #[derive(serde::Deserialize)]
        struct Arch {
            agent_type: String,
        }

        let inputs = StageInputs::new(sample_values(), vec!["architecture_design".to_string()], "s");
        let arch: Arch = inputs.get_as("architecture_design").unwrap().unwrap();
        assert_eq!(arch.agent_type, "LlmAgent");
    }
}
