//! Fixtures for stage and pipeline tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::context::{RunIdentity, StageContext, StageInputs};
use crate::events::NoOpEventSink;
use crate::validation::ArtifactSet;

/// Builds a stage context whose declared inputs are exactly `inputs`.
#[must_use]
pub fn stage_context<const N: usize>(
    stage_name: &str,
    output_key: &str,
    inputs: [(&str, serde_json::Value); N],
) -> StageContext {
    let declared: Vec<String> = inputs.iter().map(|(k, _)| (*k).to_string()).collect();
    let values: HashMap<String, serde_json::Value> = inputs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    StageContext::new(
        stage_name,
        output_key,
        StageInputs::new(values, declared, stage_name),
        Arc::new(RunIdentity::new("test")),
        Arc::new(CancellationToken::new()),
        Arc::new(NoOpEventSink),
    )
}

const AGENT_PY: &str = r#""""Customer support triage agent."""

from google.adk.agents import LlmAgent

from .tools import lookup_order


def build_agent():
    """Builds the root agent."""
    return LlmAgent(
        name="support_triage",
        model="gemini-2.0-flash",
        instruction="Classify incoming tickets and look up orders when asked.",
        tools=[lookup_order],
    )


root_agent = build_agent()
"#;

const TOOLS_PY: &str = r#""""Tools for the support triage agent."""


def lookup_order(order_id: str) -> dict:
    """Returns the shipping status of an order."""
    return {"order_id": order_id, "status": "shipped"}
"#;

const DEPLOY_PY: &str = r#""""Deploys the agent to the managed runtime."""

import os

from vertexai import agent_engines

from agent import root_agent


def main():
    """Creates the remote agent."""
    remote = agent_engines.create(
        agent_engine=root_agent,
        requirements=["google-adk>=1.0.0"],
    )
    print(remote.resource_name)


if __name__ == "__main__":
    main()
"#;

const TESTS_PY: &str = r#""""Tests for the support triage agent."""

from tools import lookup_order


def test_lookup_order_reports_status():
    result = lookup_order("A-1")
    assert result["status"] == "shipped"
"#;

const REQUIREMENTS_TXT: &str = "\
# runtime
google-adk>=1.0.0
google-cloud-aiplatform[adk,agent_engines]>=1.88.0
python-dotenv
";

const ENV_EXAMPLE: &str = "\
# Copy to .env and fill in
GOOGLE_CLOUD_PROJECT=
GOOGLE_CLOUD_LOCATION=us-central1
STAGING_BUCKET=
";

const README_MD: &str = "\
# Support triage agent

Classifies support tickets and looks up order status.

## Run locally

    pip install -r requirements.txt
    adk run .
";

/// A complete artifact set that validates with no errors or warnings.
#[must_use]
pub fn sample_artifacts() -> ArtifactSet {
    ArtifactSet::new()
        .with("agent_py", AGENT_PY)
        .with("tools_py", TOOLS_PY)
        .with("deploy_py", DEPLOY_PY)
        .with("tests_py", TESTS_PY)
        .with("requirements_txt", REQUIREMENTS_TXT)
        .with("env_example", ENV_EXAMPLE)
        .with("readme_md", README_MD)
}
