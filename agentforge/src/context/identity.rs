//! Run identity for tracking pipeline executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub pipeline_run_id: Uuid,

    /// The pipeline name.
    pub pipeline: String,

    /// The session ID of the conversation driving the run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// When the run identity was created.
    pub created_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a new run identity with a generated pipeline run ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline_run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            session_id: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Returns the pipeline run ID as a string.
    #[must_use]
    pub fn run_id_str(&self) -> String {
        self.pipeline_run_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_identities_are_unique() {
        let a = RunIdentity::new("agent_builder");
        let b = RunIdentity::new("agent_builder");
        assert_ne!(a.pipeline_run_id, b.pipeline_run_id);
        assert_eq!(a.pipeline, "agent_builder");
    }

    #[test]
    fn test_session_id_serialization() {
        let id = RunIdentity::new("p");
        let json = serde_json::to_value(&id).unwrap();
        assert!(json.get("session_id").is_none());

        let json = serde_json::to_value(id.with_session_id("s-1")).unwrap();
        assert_eq!(json["session_id"], "s-1");
    }
}
