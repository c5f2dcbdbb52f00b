//! Pipeline builder with validation.

use super::{Pipeline, StageDescriptor};
use crate::errors::{ConfigErrorCode, ConfigurationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::Stage;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Every stage is checked as it is added: names must be unique, each
/// output key must be owned by exactly one stage, and a stage may not read
/// the key it writes.
#[derive(Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageDescriptor>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            event_sink: None,
        }
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the stage conflicts with one
    /// already added.
    pub fn stage(
        mut self,
        name: impl Into<String>,
        inputs: &[&str],
        output_key: impl Into<String>,
        runner: Arc<dyn Stage>,
    ) -> Result<Self, ConfigurationError> {
        let descriptor =
            StageDescriptor::new(name, output_key, runner).with_inputs(inputs.iter().copied());
        self.add_descriptor(descriptor)?;
        Ok(self)
    }

    /// Adds a stage from a descriptor.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the descriptor is invalid or
    /// conflicts with one already added.
    pub fn add_descriptor(&mut self, descriptor: StageDescriptor) -> Result<(), ConfigurationError> {
        descriptor.validate()?;

        if let Some(existing) = self.stages.iter().find(|s| s.name == descriptor.name) {
            return Err(ConfigurationError::new(
                ConfigErrorCode::DuplicateStage,
                format!("Stage '{}' is defined twice", existing.name),
            )
            .with_stages([existing.name.clone()]));
        }

        if let Some(owner) = self
            .stages
            .iter()
            .find(|s| s.output_key == descriptor.output_key)
        {
            return Err(ConfigurationError::new(
                ConfigErrorCode::DuplicateOutputKey,
                format!(
                    "Stages '{}' and '{}' both declare output key '{}'",
                    owner.name, descriptor.name, descriptor.output_key
                ),
            )
            .with_stages([owner.name.clone(), descriptor.name.clone()]));
        }

        self.stages.push(descriptor);
        Ok(())
    }

    /// Sets the event sink for runs of the built pipeline.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the builder has no stages.
    pub fn build(self) -> Result<Pipeline, ConfigurationError> {
        if self.stages.is_empty() {
            return Err(ConfigurationError::new(
                ConfigErrorCode::EmptyPipeline,
                format!("Pipeline '{}' has no stages", self.name),
            ));
        }

        let sink = self
            .event_sink
            .unwrap_or_else(|| Arc::new(NoOpEventSink));
        Ok(Pipeline::new(self.name, self.stages, sink))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStage;
    use serde_json::json;

    #[test]
    fn test_build_in_declaration_order() {
        let pipeline = PipelineBuilder::new("demo")
            .stage("first", &[], "a", MockStage::ok_arc(json!(1)))
            .unwrap()
            .stage("second", &["a"], "b", MockStage::ok_arc(json!(2)))
            .unwrap()
            .build()
            .unwrap();

        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(pipeline.name(), "demo");
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = PipelineBuilder::new("empty").build().unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::EmptyPipeline);
    }

    #[test]
    fn test_duplicate_output_key_rejected() {
        let err = PipelineBuilder::new("dup")
            .stage("first", &[], "shared", MockStage::ok_arc(json!(1)))
            .unwrap()
            .stage("second", &[], "shared", MockStage::ok_arc(json!(2)))
            .unwrap_err();

        assert_eq!(err.code, ConfigErrorCode::DuplicateOutputKey);
        assert_eq!(err.stages, vec!["first", "second"]);
        assert!(err.to_string().starts_with("[CONFIG-DUPLICATE-OUTPUT]"));
    }

    #[test]
    fn test_duplicate_stage_name_rejected() {
        let err = PipelineBuilder::new("dup")
            .stage("same", &[], "a", MockStage::ok_arc(json!(1)))
            .unwrap()
            .stage("same", &[], "b", MockStage::ok_arc(json!(2)))
            .unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::DuplicateStage);
    }

    #[test]
    fn test_self_input_rejected() {
        let err = PipelineBuilder::new("loop")
            .stage("s", &["x"], "x", MockStage::ok_arc(json!(1)))
            .unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::SelfInput);
    }
}
