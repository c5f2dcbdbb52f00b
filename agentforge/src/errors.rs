//! Error types for the agentforge crate.
//!
//! Configuration problems are programming errors and surface as
//! [`ConfigurationError`] before any external call is made. Runtime
//! failures of stages, remote calls and discovery are reported as data on
//! the respective result types instead (see `RunOutcome`, `TerminalError`,
//! `DeploymentRecord` and `DiscoveryResult`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for agentforge operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A pipeline or policy was configured incorrectly.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A key was written twice to the pipeline state.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// A stage read a key it did not declare as an input.
    #[error("{0}")]
    UndeclaredInput(#[from] UndeclaredInputError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Stable codes attached to configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigErrorCode {
    /// The pipeline has no stages.
    EmptyPipeline,
    /// Two stages share a name.
    DuplicateStage,
    /// Two stages declare the same output key.
    DuplicateOutputKey,
    /// A declared output key already exists in the initial state.
    OutputKeyPreseeded,
    /// A stage wrote a key other than the one it declared.
    OutputKeyMismatch,
    /// A stage lists its own output key as an input.
    SelfInput,
    /// A retry policy is not usable.
    InvalidRetryPolicy,
    /// A setting could not be parsed.
    InvalidSetting,
}

impl ConfigErrorCode {
    /// Returns the code as a string (e.g. `CONFIG-DUPLICATE-OUTPUT`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "CONFIG-EMPTY",
            Self::DuplicateStage => "CONFIG-DUPLICATE-STAGE",
            Self::DuplicateOutputKey => "CONFIG-DUPLICATE-OUTPUT",
            Self::OutputKeyPreseeded => "CONFIG-OUTPUT-PRESEEDED",
            Self::OutputKeyMismatch => "CONFIG-OUTPUT-MISMATCH",
            Self::SelfInput => "CONFIG-SELF-INPUT",
            Self::InvalidRetryPolicy => "CONFIG-RETRY-POLICY",
            Self::InvalidSetting => "CONFIG-SETTING",
        }
    }

    /// Returns a default hint for fixing the error.
    #[must_use]
    pub fn fix_hint(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "Add at least one stage before running the pipeline.",
            Self::DuplicateStage => "Give every stage a unique name.",
            Self::DuplicateOutputKey => {
                "Each stage owns exactly one output key; rename one of the conflicting keys."
            }
            Self::OutputKeyPreseeded => {
                "Remove the key from the initial state or let the stage produce it."
            }
            Self::OutputKeyMismatch => {
                "Return the declared output key from the stage, or update the descriptor."
            }
            Self::SelfInput => "A stage cannot depend on the key it produces.",
            Self::InvalidRetryPolicy => "Use max_attempts >= 1 and growth_factor >= 1.",
            Self::InvalidSetting => "Check the value of the named setting.",
        }
    }
}

impl std::fmt::Display for ConfigErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a pipeline, stage or policy is configured incorrectly.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ConfigurationError {
    /// Stable error code.
    pub code: ConfigErrorCode,
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(code: ConfigErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the hint for fixing the error.
    #[must_use]
    pub fn fix_hint(&self) -> &'static str {
        self.code.fix_hint()
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code.as_str()));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("fix_hint".to_string(), serde_json::json!(self.fix_hint()));
        if !self.stages.is_empty() {
            map.insert("stages".to_string(), serde_json::json!(self.stages));
        }
        map
    }
}

/// Error raised when writing to an existing key in the pipeline state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Data conflict: key '{key}' already written by {}", .existing_writer.as_deref().unwrap_or("the initial state"))]
pub struct DataConflictError {
    /// The conflicting key.
    pub key: String,
    /// The stage that wrote the key first, if any.
    pub existing_writer: Option<String>,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>, existing_writer: Option<String>) -> Self {
        Self {
            key: key.into(),
            existing_writer,
        }
    }
}

/// Error raised when a stage reads a key outside its declared inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Undeclared input: stage '{stage}' attempted to read '{key}' which is not one of its declared inputs")]
pub struct UndeclaredInputError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared key.
    pub key: String,
}

impl UndeclaredInputError {
    /// Creates a new undeclared input error.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}
