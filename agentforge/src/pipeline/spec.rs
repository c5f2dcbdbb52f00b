//! Stage descriptors.

use crate::core::StageKind;
use crate::errors::{ConfigErrorCode, ConfigurationError};
use crate::stages::Stage;
use std::sync::Arc;

/// Describes one stage of a pipeline.
///
/// A descriptor is fixed at configuration time: the stage's name, the keys
/// it reads (in order), the single key it writes, and its logic.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// The unique name of the stage.
    pub name: String,
    /// Keys that must be present before the stage runs.
    pub inputs: Vec<String>,
    /// The key the stage writes.
    pub output_key: String,
    /// The kind of stage.
    pub kind: StageKind,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

impl StageDescriptor {
    /// Creates a new stage descriptor with no inputs.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        output_key: impl Into<String>,
        runner: Arc<dyn Stage>,
    ) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            output_key: output_key.into(),
            kind: StageKind::Work,
            runner,
        }
    }

    /// Sets the required input keys.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a required input key.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Sets the stage kind.
    #[must_use]
    pub fn with_kind(mut self, kind: StageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the declared inputs that are not in `present`.
    #[must_use]
    pub fn missing_inputs(&self, present: impl Fn(&str) -> bool) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|k| !present(k.as_str()))
            .cloned()
            .collect()
    }

    /// Validates the descriptor on its own.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the name or output key is blank or
    /// the stage reads its own output key.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::new(
                ConfigErrorCode::InvalidSetting,
                "Stage name cannot be empty",
            ));
        }
        if self.output_key.trim().is_empty() {
            return Err(ConfigurationError::new(
                ConfigErrorCode::InvalidSetting,
                format!("Stage '{}' has an empty output key", self.name),
            )
            .with_stages([self.name.clone()]));
        }
        if self.inputs.contains(&self.output_key) {
            return Err(ConfigurationError::new(
                ConfigErrorCode::SelfInput,
                format!(
                    "Stage '{}' lists its own output key '{}' as an input",
                    self.name, self.output_key
                ),
            )
            .with_stages([self.name.clone()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStage;

    #[test]
    fn test_descriptor_builder() {
        let desc = StageDescriptor::new("tool_specification", "tool_specs", MockStage::ok_arc(serde_json::json!({})))
            .with_inputs(["requirements_spec"])
            .with_input("architecture_design")
            .with_kind(StageKind::Agent);

        assert_eq!(desc.inputs, vec!["requirements_spec", "architecture_design"]);
        assert_eq!(desc.kind, StageKind::Agent);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_missing_inputs() {
        let desc = StageDescriptor::new("s", "out", MockStage::ok_arc(serde_json::json!(1)))
            .with_inputs(["a", "b", "c"]);
        let missing = desc.missing_inputs(|k| k == "b");
        assert_eq!(missing, vec!["a", "c"]);
    }

    #[test]
    fn test_self_input_rejected() {
        let desc = StageDescriptor::new("loop", "x", MockStage::ok_arc(serde_json::json!(1)))
            .with_inputs(["x"]);
        let err = desc.validate().unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::SelfInput);
        assert_eq!(err.stages, vec!["loop"]);
    }
}
