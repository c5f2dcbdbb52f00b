//! The standard five-stage agent-builder pipeline.
//!
//! | stage                   | reads                                        | writes                |
//! |-------------------------|----------------------------------------------|-----------------------|
//! | `requirements_gatherer` |                                              | `requirements_spec`   |
//! | `architecture_designer` | `requirements_spec`                          | `architecture_design` |
//! | `tool_specification`    | `requirements_spec`, `architecture_design`   | `tool_specs`          |
//! | `code_generator`        | the three above                              | `project_files`       |
//! | `validation_deployment` | `project_files`                              | `deployment_result`   |

use super::{PipelineBuilder, StageDescriptor};
use crate::core::StageKind;
use crate::deploy::{DeploymentConfig, DeploymentOrchestrator, DeploymentStage};
use crate::errors::ConfigurationError;
use crate::stages::{InvokerStage, OutputCheck, StageInvoker};
use crate::validation::{validate_architecture, validate_requirements, validate_tool_spec};
use std::sync::Arc;
use std::time::Duration;

/// Gathers requirements from the conversation.
pub const REQUIREMENTS_GATHERER: &str = "requirements_gatherer";
/// Chooses an agent architecture.
pub const ARCHITECTURE_DESIGNER: &str = "architecture_designer";
/// Selects tools and custom functions.
pub const TOOL_SPECIFICATION: &str = "tool_specification";
/// Generates the project files.
pub const CODE_GENERATOR: &str = "code_generator";
/// Validates and deploys the project.
pub const VALIDATION_DEPLOYMENT: &str = "validation_deployment";

/// Output of [`REQUIREMENTS_GATHERER`].
pub const REQUIREMENTS_SPEC_KEY: &str = "requirements_spec";
/// Output of [`ARCHITECTURE_DESIGNER`].
pub const ARCHITECTURE_DESIGN_KEY: &str = "architecture_design";
/// Output of [`TOOL_SPECIFICATION`].
pub const TOOL_SPECS_KEY: &str = "tool_specs";
/// Output of [`CODE_GENERATOR`].
pub const PROJECT_FILES_KEY: &str = crate::deploy::PROJECT_FILES_KEY;
/// Output of [`VALIDATION_DEPLOYMENT`].
pub const DEPLOYMENT_RESULT_KEY: &str = "deployment_result";

/// One row of the stage catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Stage name.
    pub name: &'static str,
    /// Declared inputs.
    pub inputs: &'static [&'static str],
    /// Output key.
    pub output_key: &'static str,
}

/// The five stages, in run order.
pub const STAGE_CATALOG: [CatalogEntry; 5] = [
    CatalogEntry {
        name: REQUIREMENTS_GATHERER,
        inputs: &[],
        output_key: REQUIREMENTS_SPEC_KEY,
    },
    CatalogEntry {
        name: ARCHITECTURE_DESIGNER,
        inputs: &[REQUIREMENTS_SPEC_KEY],
        output_key: ARCHITECTURE_DESIGN_KEY,
    },
    CatalogEntry {
        name: TOOL_SPECIFICATION,
        inputs: &[REQUIREMENTS_SPEC_KEY, ARCHITECTURE_DESIGN_KEY],
        output_key: TOOL_SPECS_KEY,
    },
    CatalogEntry {
        name: CODE_GENERATOR,
        inputs: &[REQUIREMENTS_SPEC_KEY, ARCHITECTURE_DESIGN_KEY, TOOL_SPECS_KEY],
        output_key: PROJECT_FILES_KEY,
    },
    CatalogEntry {
        name: VALIDATION_DEPLOYMENT,
        inputs: &[PROJECT_FILES_KEY],
        output_key: DEPLOYMENT_RESULT_KEY,
    },
];

/// Assembles the standard pipeline.
#[derive(Clone)]
pub struct AgentBuilderPipeline {
    invoker: Arc<dyn StageInvoker>,
    orchestrator: Arc<DeploymentOrchestrator>,
    config: DeploymentConfig,
    invocation_timeout: Option<Duration>,
    check_outputs: bool,
}

impl AgentBuilderPipeline {
    /// Creates the assembler. Model stages go through `invoker`; the last
    /// stage deploys to `config` with `orchestrator`.
    #[must_use]
    pub fn new(
        invoker: Arc<dyn StageInvoker>,
        orchestrator: Arc<DeploymentOrchestrator>,
        config: DeploymentConfig,
    ) -> Self {
        Self {
            invoker,
            orchestrator,
            config,
            invocation_timeout: None,
            check_outputs: true,
        }
    }

    /// Bounds every model invocation.
    #[must_use]
    pub const fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = Some(timeout);
        self
    }

    /// Disables the structural checks on intermediate outputs.
    #[must_use]
    pub const fn without_output_checks(mut self) -> Self {
        self.check_outputs = false;
        self
    }

    /// Returns a builder holding the five stages.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the catalog is inconsistent.
    pub fn builder(&self) -> Result<PipelineBuilder, ConfigurationError> {
        let mut builder = PipelineBuilder::new("agent_builder");
        for entry in &STAGE_CATALOG {
            let descriptor = if entry.name == VALIDATION_DEPLOYMENT {
                let stage =
                    DeploymentStage::new(Arc::clone(&self.orchestrator), self.config.clone());
                StageDescriptor::new(entry.name, entry.output_key, Arc::new(stage))
                    .with_kind(StageKind::Work)
            } else {
                let stage = self.model_stage(entry.name);
                StageDescriptor::new(entry.name, entry.output_key, Arc::new(stage))
                    .with_kind(StageKind::Agent)
            };
            builder.add_descriptor(descriptor.with_inputs(entry.inputs.iter().copied()))?;
        }
        Ok(builder)
    }

    fn model_stage(&self, name: &str) -> InvokerStage {
        let mut stage = InvokerStage::new(Arc::clone(&self.invoker));
        if let Some(timeout) = self.invocation_timeout {
            stage = stage.with_timeout(timeout);
        }
        if self.check_outputs {
            if let Some(check) = output_check(name) {
                stage = stage.with_check(check);
            }
        }
        stage
    }
}

impl std::fmt::Debug for AgentBuilderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBuilderPipeline")
            .field("orchestrator", &self.orchestrator)
            .field("config", &self.config)
            .field("invocation_timeout", &self.invocation_timeout)
            .field("check_outputs", &self.check_outputs)
            .finish_non_exhaustive()
    }
}

fn output_check(stage: &str) -> Option<OutputCheck> {
    let check: OutputCheck = match stage {
        REQUIREMENTS_GATHERER => Arc::new(validate_requirements),
        ARCHITECTURE_DESIGNER => Arc::new(validate_architecture),
        TOOL_SPECIFICATION => Arc::new(validate_tool_spec),
        _ => return None,
    };
    Some(check)
}

/// Builds the standard pipeline in one call.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the catalog is inconsistent.
pub fn standard_pipeline(
    invoker: Arc<dyn StageInvoker>,
    orchestrator: Arc<DeploymentOrchestrator>,
    config: DeploymentConfig,
) -> Result<PipelineBuilder, ConfigurationError> {
    AgentBuilderPipeline::new(invoker, orchestrator, config).builder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RetryPolicy;
    use crate::testing::{ScriptedDeployer, ScriptedInvoker};
    use pretty_assertions::assert_eq;

    fn assembler() -> AgentBuilderPipeline {
        let orchestrator =
            DeploymentOrchestrator::new(Arc::new(ScriptedDeployer::new()), RetryPolicy::default())
                .unwrap();
        AgentBuilderPipeline::new(
            Arc::new(ScriptedInvoker::new()),
            Arc::new(orchestrator),
            DeploymentConfig::new("demo-project", "gs://demo-staging"),
        )
    }

    #[test]
    fn test_catalog_order_and_keys() {
        let pipeline = assembler().builder().unwrap().build().unwrap();
        let stages: Vec<(&str, &str)> = pipeline
            .stages()
            .iter()
            .map(|s| (s.name.as_str(), s.output_key.as_str()))
            .collect();
        assert_eq!(
            stages,
            vec![
                ("requirements_gatherer", "requirements_spec"),
                ("architecture_designer", "architecture_design"),
                ("tool_specification", "tool_specs"),
                ("code_generator", "project_files"),
                ("validation_deployment", "deployment_result"),
            ]
        );
        assert_eq!(pipeline.stages()[3].inputs.len(), 3);
        assert_eq!(pipeline.stages()[4].kind, StageKind::Work);
        assert_eq!(pipeline.stages()[0].kind, StageKind::Agent);
    }

    #[test]
    fn test_catalog_inputs_are_earlier_outputs() {
        for (idx, entry) in STAGE_CATALOG.iter().enumerate() {
            for input in entry.inputs {
                assert!(
                    STAGE_CATALOG[..idx].iter().any(|e| e.output_key == *input),
                    "{} reads {input} before it is written",
                    entry.name
                );
            }
        }
    }
}
