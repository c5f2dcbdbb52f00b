//! End-to-end tests over the five-stage agent-builder pipeline.

use super::agent_builder::{
    AgentBuilderPipeline, ARCHITECTURE_DESIGNER, ARCHITECTURE_DESIGN_KEY, CODE_GENERATOR,
    DEPLOYMENT_RESULT_KEY, PROJECT_FILES_KEY, REQUIREMENTS_GATHERER, REQUIREMENTS_SPEC_KEY,
    STAGE_CATALOG, TOOL_SPECIFICATION, TOOL_SPECS_KEY, VALIDATION_DEPLOYMENT,
};
use super::{PipelineBuilder, RetryPolicy, RunOutcome, StageDescriptor, StageErrorKind};
use crate::cancellation::CancellationToken;
use crate::context::PipelineState;
use crate::core::{AttemptOutcome, StageOutput, StageStatus};
use crate::deploy::{
    DeploymentConfig, DeploymentFailure, DeploymentOrchestrator, DeploymentPhase, DeploymentRecord,
};
use crate::events::{types, CollectingEventSink};
use crate::observability::RunRecord;
use crate::stages::InvokerStage;
use crate::testing::{sample_artifacts, MockStage, ScriptedDeployer, ScriptedInvoker, StaticProbe};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn scripted_invoker() -> ScriptedInvoker {
    ScriptedInvoker::new()
        .respond(
            REQUIREMENTS_GATHERER,
            json!({
                "purpose": "Triage customer support tickets",
                "use_case": "support",
                "complexity": "moderate",
                "needs_sub_agents": false,
                "suggested_mcps": [],
                "custom_tool_requirements": ["order lookup"],
            }),
        )
        .respond(
            ARCHITECTURE_DESIGNER,
            json!({
                "agent_type": "LlmAgent",
                "model_suggestion": "gemini-2.0-flash",
                "rationale": "A single conversational agent is enough.",
            }),
        )
        .respond(
            TOOL_SPECIFICATION,
            json!({
                "mcp_tools": [],
                "google_tools": ["google_search"],
                "custom_functions": [
                    {"name": "lookup_order", "description": "Order status", "params": ["order_id"]}
                ],
            }),
        )
        .respond(CODE_GENERATOR, serde_json::to_value(sample_artifacts()).unwrap())
}

fn config() -> DeploymentConfig {
    DeploymentConfig::new("demo-project", "gs://demo-staging")
}

fn agent_builder(
    invoker: ScriptedInvoker,
    deployer: Arc<ScriptedDeployer>,
    sink: Arc<CollectingEventSink>,
) -> super::Pipeline {
    let orchestrator = DeploymentOrchestrator::new(deployer, RetryPolicy::default())
        .unwrap()
        .with_probe(Arc::new(StaticProbe::healthy()))
        .with_event_sink(sink.clone());
    AgentBuilderPipeline::new(Arc::new(invoker), Arc::new(orchestrator), config())
        .builder()
        .unwrap()
        .with_event_sink(sink)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_with_rate_limited_deployment() {
    let deployer = Arc::new(
        ScriptedDeployer::new()
            .fail("429 rate limit exceeded")
            .fail("Rate limit exceeded, try again later"),
    );
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline = agent_builder(scripted_invoker(), deployer.clone(), sink.clone());

    let started = tokio::time::Instant::now();
    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert_eq!(deployer.create_calls(), 3);

    let record: DeploymentRecord =
        serde_json::from_value(result.state.get(DEPLOYMENT_RESULT_KEY).unwrap().clone()).unwrap();
    assert!(record.success);
    assert!(record.resource_id.unwrap().ends_with("generated-3"));
    let outcomes: Vec<AttemptOutcome> = record.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AttemptOutcome::RetryableFailure,
            AttemptOutcome::RetryableFailure,
            AttemptOutcome::Success,
        ]
    );

    let stage = result.record(VALIDATION_DEPLOYMENT).unwrap();
    assert_eq!(stage.attempts.len(), 3);
    assert_eq!(sink.events_of_type(types::RETRY_ATTEMPT).len(), 2);

    let run = RunRecord::from_result(&result);
    assert_eq!(run.total_attempts(), 3);
    assert_eq!(run.deployment.map(|d| d.success), Some(true));
}

#[tokio::test]
async fn test_every_key_written_once_by_its_owner() {
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline = agent_builder(
        scripted_invoker(),
        Arc::new(ScriptedDeployer::new()),
        sink,
    );

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert!(result.is_completed());
    let keys: Vec<&str> = result.state.keys().iter().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            REQUIREMENTS_SPEC_KEY,
            ARCHITECTURE_DESIGN_KEY,
            TOOL_SPECS_KEY,
            PROJECT_FILES_KEY,
            DEPLOYMENT_RESULT_KEY,
        ]
    );
    for entry in &STAGE_CATALOG {
        assert_eq!(result.state.writer_of(entry.output_key), Some(Some(entry.name)));
    }
}

#[tokio::test]
async fn test_rewriting_an_owned_key_fails_and_keeps_value() {
    let pipeline = PipelineBuilder::new("rogue")
        .stage(
            REQUIREMENTS_GATHERER,
            &[],
            REQUIREMENTS_SPEC_KEY,
            MockStage::ok_arc(json!({"purpose": "original"})),
        )
        .unwrap()
        .stage(
            ARCHITECTURE_DESIGNER,
            &[REQUIREMENTS_SPEC_KEY],
            ARCHITECTURE_DESIGN_KEY,
            Arc::new(MockStage::new(StageOutput::ok_keyed(
                REQUIREMENTS_SPEC_KEY,
                json!({"purpose": "overwritten"}),
            ))),
        )
        .unwrap()
        .build()
        .unwrap();

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    match &result.outcome {
        RunOutcome::Failed { stage, error } => {
            assert_eq!(stage, ARCHITECTURE_DESIGNER);
            assert_eq!(error.kind, StageErrorKind::Configuration);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        result.state.get(REQUIREMENTS_SPEC_KEY),
        Some(&json!({"purpose": "original"}))
    );
}

#[tokio::test]
async fn test_tool_stage_blocked_without_architecture() {
    let invoker = Arc::new(scripted_invoker());
    let mut builder = PipelineBuilder::new("partial");
    for entry in STAGE_CATALOG.iter().take(3) {
        if entry.name == ARCHITECTURE_DESIGNER {
            continue;
        }
        let stage = Arc::new(InvokerStage::new(invoker.clone()));
        builder
            .add_descriptor(
                StageDescriptor::new(entry.name, entry.output_key, stage)
                    .with_inputs(entry.inputs.iter().copied()),
            )
            .unwrap();
    }
    let pipeline = builder.build().unwrap();

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert_eq!(
        result.outcome,
        RunOutcome::Blocked {
            stage: TOOL_SPECIFICATION.to_string(),
            missing: vec![ARCHITECTURE_DESIGN_KEY.to_string()],
        }
    );
    assert!(result.state.contains_key(REQUIREMENTS_SPEC_KEY));
    assert!(!result.state.contains_key(TOOL_SPECS_KEY));
    assert_eq!(
        result.record(TOOL_SPECIFICATION).unwrap().status,
        StageStatus::Blocked
    );
    assert_eq!(invoker.calls(), vec![REQUIREMENTS_GATHERER.to_string()]);
}

#[tokio::test]
async fn test_invalid_generated_code_never_deploys() {
    let invoker = scripted_invoker().respond(
        CODE_GENERATOR,
        json!({"agent_py": "def broken(:\n", "requirements_txt": "google-adk\n", "readme_md": "# x\n"}),
    );
    let deployer = Arc::new(ScriptedDeployer::new());
    let pipeline = agent_builder(invoker, deployer.clone(), Arc::new(CollectingEventSink::new()));

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert!(result.is_failed());
    assert_eq!(result.outcome.stage(), Some(VALIDATION_DEPLOYMENT));
    assert_eq!(deployer.create_calls(), 0);
    assert!(result.state.contains_key(PROJECT_FILES_KEY));
    assert!(!result.state.contains_key(DEPLOYMENT_RESULT_KEY));

    let run = RunRecord::from_result(&result);
    assert_eq!(run.deployment_failure(), Some(DeploymentFailure::Validation));
    let deployment = run.deployment.unwrap();
    assert!(!deployment.validation.valid);
    assert!(deployment.attempts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_deployment_keeps_classification() {
    let deployer = Arc::new(ScriptedDeployer::failing_forever("429 rate limit exceeded"));
    let pipeline = agent_builder(
        scripted_invoker(),
        deployer.clone(),
        Arc::new(CollectingEventSink::new()),
    );

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert!(result.is_failed());
    assert_eq!(deployer.create_calls(), 3);
    assert!(!result.state.contains_key(DEPLOYMENT_RESULT_KEY));

    let run = RunRecord::from_result(&result);
    assert_eq!(run.deployment_failure(), Some(DeploymentFailure::Exhausted));
    let deployment = run.deployment.clone().unwrap();
    assert!(!deployment.success);
    assert_eq!(deployment.attempt_count(), 3);
    assert_eq!(deployment.final_phase(), Some(DeploymentPhase::Failed));

    let json: serde_json::Value = serde_json::from_str(&run.to_json_pretty().unwrap()).unwrap();
    assert_eq!(json["deployment"]["failure"], json!("exhausted"));
}

#[tokio::test]
async fn test_output_check_warnings_reach_run_record() {
    let invoker = scripted_invoker().respond(
        REQUIREMENTS_GATHERER,
        json!({
            "purpose": "Triage customer support tickets",
            "use_case": "support",
            "complexity": "huge",
            "suggested_mcps": [],
            "custom_tool_requirements": [],
        }),
    );
    let sink = Arc::new(CollectingEventSink::new());
    let pipeline = agent_builder(invoker, Arc::new(ScriptedDeployer::new()), sink.clone());

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert!(result.is_completed());
    let warned = sink.events_of_type(types::STAGE_WARNING);
    assert_eq!(warned.len(), 1);
    assert_eq!(warned[0].data.as_ref().unwrap()["stage"], json!(REQUIREMENTS_GATHERER));
    let stage = result.record(REQUIREMENTS_GATHERER).unwrap();
    assert_eq!(stage.warnings.len(), 1);
    assert!(stage.warnings[0].contains("Invalid complexity"));

    let run = RunRecord::from_result(&result);
    assert!(run.to_json_pretty().unwrap().contains("Invalid complexity"));
}

#[tokio::test]
async fn test_invalid_requirements_output_fails_first_stage() {
    let invoker = scripted_invoker().respond(REQUIREMENTS_GATHERER, json!({"purpose": "x"}));
    let pipeline = agent_builder(
        invoker,
        Arc::new(ScriptedDeployer::new()),
        Arc::new(CollectingEventSink::new()),
    );

    let result = pipeline.run(PipelineState::new()).await.unwrap();

    assert_eq!(result.outcome.stage(), Some(REQUIREMENTS_GATHERER));
    assert!(result.state.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_deployment_backoff() {
    let deployer = Arc::new(ScriptedDeployer::failing_forever("503 service unavailable"));
    let pipeline = agent_builder(
        scripted_invoker(),
        deployer.clone(),
        Arc::new(CollectingEventSink::new()),
    );
    let token = Arc::new(CancellationToken::new());
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel("operator abort");
    });

    let result = pipeline
        .run_with_cancel(PipelineState::new(), token)
        .await
        .unwrap();

    assert!(result.is_cancelled());
    assert_eq!(result.outcome.stage(), Some(VALIDATION_DEPLOYMENT));
    assert_eq!(deployer.create_calls(), 1);
    let stage = result.record(VALIDATION_DEPLOYMENT).unwrap();
    assert_eq!(stage.status, StageStatus::Cancel);
    assert_eq!(stage.attempts.len(), 1);
}
