//! End-to-end tests for config-described workflows.
//!
//! These run the same pipeline `cadence run` builds (config, built-in
//! tools, session manager, configured workflow) against a scripted provider.

use std::path::Path;
use std::sync::{Arc, Mutex};

use cadence_agent::testing::{ScriptedProvider, tool_call};
use cadence_config::{AppConfig, PhaseConfig, WorkflowConfig};
use cadence_core::context::{ContextMap, keys};
use cadence_core::error::ProviderError;
use cadence_core::message::Role;
use cadence_core::provider::CompletionResponse;
use cadence_core::tool::ToolRegistry;
use cadence_session::{SessionManager, SessionStore};
use cadence_tools::{READ_CONTEXT_TOOL, RECORD_RESULT_TOOL, register_builtin_tools};
use cadence_workflow::{ConfiguredWorkflow, PhaseContext, PhaseStatus, Workflow};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────

fn research_and_write(output_dir: &Path) -> WorkflowConfig {
    let mut research = PhaseConfig::new(
        "research",
        "You are a careful analyst.",
        "Collect facts for: {{input}}",
    );
    research.required_keys = vec!["input".into()];

    let mut write = PhaseConfig::new(
        "write",
        "You are a concise writer.",
        "Facts: {{facts}}\nWrite about: {{input}}",
    );
    write.required_keys = vec!["facts".into()];
    write.tools = vec![READ_CONTEXT_TOOL.into(), RECORD_RESULT_TOOL.into()];
    write.completion_tool = Some(RECORD_RESULT_TOOL.into());
    write.output_key = Some("answer".into());

    WorkflowConfig {
        name: "research-and-write".into(),
        output_dir: output_dir.to_path_buf(),
        report_file: Some("report.json".into()),
        phases: vec![research, write],
        ..WorkflowConfig::default()
    }
}

fn builtin_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry).unwrap();
    Arc::new(registry)
}

fn seed(input: &str) -> ContextMap {
    let mut data = ContextMap::new();
    keys::INPUT.set(&mut data, input.to_string()).unwrap();
    data
}

fn context(
    workflow: &ConfiguredWorkflow,
    provider: Arc<ScriptedProvider>,
    sessions: Arc<SessionManager>,
) -> PhaseContext {
    PhaseContext::new(workflow.config(), sessions, provider, builtin_registry())
        .with_data(seed("interval training"))
}

/// Scripts a full successful run of [`research_and_write`].
fn happy_path_provider() -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(vec![
        CompletionResponse::text(r#"```json
{"facts": ["raises VO2max", "short sessions"]}
```"#),
        CompletionResponse::tool_calls(
            "",
            vec![tool_call("c1", READ_CONTEXT_TOOL, json!({"key": "facts"}))],
        ),
        CompletionResponse::tool_calls(
            "",
            vec![tool_call(
                "c2",
                RECORD_RESULT_TOOL,
                json!({"key": "answer", "value": "Intervals build fitness fast."}),
            )],
        ),
    ]))
}

// ── Full pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn research_then_write_produces_report() {
    let out = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let provider = happy_path_provider();
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new()));

    let result = workflow.execute(ctx).await;

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.workflow_name, "research-and-write");
    assert_eq!(result.phase_results.len(), 2);
    assert_eq!(provider.calls(), 3);
    assert_eq!(result.total_tokens_used, 45);

    assert_eq!(result.final_data["input"], "interval training");
    assert_eq!(result.final_data["facts"][0], "raises VO2max");
    assert_eq!(result.final_data["answer"], "Intervals build fitness fast.");

    let report_path = out.path().join("report.json");
    assert_eq!(result.output_files, vec![report_path.clone()]);
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(report["answer"], "Intervals build fitness fast.");
}

#[tokio::test]
async fn prompts_are_rendered_from_accumulated_data() {
    let out = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let provider = happy_path_provider();
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new()));

    workflow.execute(ctx).await;
    let requests = provider.requests();

    let first_user = requests[0].messages.last().unwrap();
    assert_eq!(first_user.role, Role::User);
    assert_eq!(first_user.content, "Collect facts for: interval training");
    // The research phase lists no tools, so the model is offered none
    assert!(requests[0].tools.is_empty());

    let second_user = requests[1].messages.last().unwrap();
    assert!(second_user.content.contains("raises VO2max"));
    let offered: Vec<&str> = requests[1].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(offered, vec![READ_CONTEXT_TOOL, RECORD_RESULT_TOOL]);

    // The read_context result is fed back before the next call
    let last = requests[2].messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
}

#[tokio::test]
async fn progress_reports_every_transition() {
    let out = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let log: Arc<Mutex<Vec<(String, PhaseStatus)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();

    let ctx = context(&workflow, happy_path_provider(), Arc::new(SessionManager::new()))
        .with_progress(Arc::new(move |phase: &str, status: PhaseStatus| {
            sink.lock().unwrap().push((phase.to_string(), status));
        }));
    workflow.execute(ctx).await;

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            ("research".to_string(), PhaseStatus::InProgress),
            ("research".to_string(), PhaseStatus::Completed),
            ("write".to_string(), PhaseStatus::InProgress),
            ("write".to_string(), PhaseStatus::Completed),
        ]
    );
}

// ── Failure handling ─────────────────────────────────────────────────────

#[tokio::test]
async fn provider_failure_stops_the_workflow() {
    let out = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let provider = Arc::new(ScriptedProvider::failing(ProviderError::ApiError {
        status_code: 500,
        message: "upstream down".into(),
    }));
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new()));

    let result = workflow.execute(ctx).await;

    assert!(!result.success());
    assert_eq!(result.phase_results.len(), 1);
    assert_eq!(result.phase_results[0].status, PhaseStatus::Failed);
    assert!(result.phase_results[0].errors[0].contains("upstream down"));
    assert_eq!(result.failed_phase().unwrap().phase_name, "research");
    assert_eq!(provider.calls(), 1);
    assert!(!out.path().join("report.json").exists());
}

#[tokio::test]
async fn missing_required_input_fails_before_calling_the_model() {
    let out = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let provider = happy_path_provider();
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new()))
        .with_data(ContextMap::new());

    let result = workflow.execute(ctx).await;

    assert!(!result.success());
    assert!(result.phase_results[0].errors[0].contains("input"));
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn runaway_phase_hits_iteration_cap() {
    let out = tempfile::tempdir().unwrap();
    let mut config = research_and_write(out.path());
    config.phases[1].max_iterations = Some(2);
    let workflow = ConfiguredWorkflow::from_config(config).unwrap();

    let read = || {
        CompletionResponse::tool_calls(
            "",
            vec![tool_call("c", READ_CONTEXT_TOOL, json!({}))],
        )
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        CompletionResponse::text(r#"{"facts": []}"#),
        read(),
        read(),
        read(),
    ]));
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new()));

    let result = workflow.execute(ctx).await;

    assert!(!result.success());
    assert_eq!(result.phase_results[1].status, PhaseStatus::Failed);
    assert!(result.phase_results[1].errors[0].contains('2'));
    assert_eq!(provider.calls(), 3);
    // Tokens spent by the failed phase still count toward the total
    assert_eq!(result.phase_results[1].tokens_used, 30);
    assert_eq!(result.total_tokens_used, 45);
}

// ── Skipping ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn skip_when_bypasses_phase_and_still_succeeds() {
    let out = tempfile::tempdir().unwrap();
    let mut config = research_and_write(out.path());
    config.phases[0].skip_when = Some("facts".into());
    let workflow = ConfiguredWorkflow::from_config(config).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::tool_calls(
        "",
        vec![tool_call(
            "c1",
            RECORD_RESULT_TOOL,
            json!({"key": "answer", "value": "done"}),
        )],
    )]));
    let mut data = seed("interval training");
    data.insert("facts".into(), json!(["already known"]));
    let ctx = context(&workflow, provider.clone(), Arc::new(SessionManager::new())).with_data(data);

    let result = workflow.execute(ctx).await;

    assert!(result.success(), "errors: {:?}", result.errors);
    assert_eq!(result.phase_results[0].status, PhaseStatus::Skipped);
    assert!(result.phase_results[0].passed());
    assert_eq!(result.phase_results[1].status, PhaseStatus::Completed);
    assert_eq!(provider.calls(), 1);
    assert_eq!(result.final_data["answer"], "done");
}

// ── Persistence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn phase_sessions_are_persisted_to_the_store() {
    let out = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let workflow = ConfiguredWorkflow::from_config(research_and_write(out.path())).unwrap();
    let sessions = Arc::new(SessionManager::with_store(SessionStore::new(store_dir.path())));
    let ctx = context(&workflow, happy_path_provider(), sessions);

    assert!(workflow.execute(ctx).await.success());

    // A fresh manager sees both phase sessions on disk
    let fresh = SessionManager::with_store(SessionStore::new(store_dir.path()));
    let stored = fresh.list_sessions().await.unwrap();
    assert_eq!(stored.len(), 2);

    let write_session = stored
        .iter()
        .find(|s| s.context.contains_key("answer"))
        .expect("write phase session");
    assert_eq!(write_session.system_prompt(), Some("You are a concise writer."));
    assert_eq!(write_session.context["facts"][1], "short sessions");
    assert!(write_session.messages.iter().any(|m| m.role == Role::Tool));
}

// ── Config ───────────────────────────────────────────────────────────────

#[test]
fn workflow_loads_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
default_provider = "openrouter"

[workflow]
name = "from-file"
max_iterations = 4

[[workflow.phases]]
name = "only"
system_prompt = "sys"
user_message = "Say something about {{input}}"
output_key = "summary"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    let workflow = ConfiguredWorkflow::from_config(config.workflow).unwrap();
    assert_eq!(workflow.name(), "from-file");
    assert_eq!(workflow.phase_names(), vec!["only"]);
}

#[test]
fn report_file_outside_output_dir_is_rejected() {
    let out = tempfile::tempdir().unwrap();
    let mut config = research_and_write(out.path());
    config.report_file = Some("../escape.json".into());
    assert!(ConfiguredWorkflow::from_config(config).is_err());
}
