//! `cadence init`: write a default config with a sample workflow.

use cadence_config::{AppConfig, PhaseConfig, WorkflowConfig};
use cadence_tools::{READ_CONTEXT_TOOL, RECORD_RESULT_TOOL};
use std::path::PathBuf;

pub async fn run(config_path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);

    if path.exists() && !force {
        println!("Config already exists: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let config = AppConfig {
        workflow: sample_workflow(),
        ..AppConfig::default()
    };
    std::fs::write(&path, toml::to_string_pretty(&config)?)?;
    println!("✅ Wrote {}", path.display());

    let sessions = config.sessions.resolved_dir();
    std::fs::create_dir_all(&sessions)?;
    println!("✅ Session directory: {}", sessions.display());

    if !config.has_api_key() {
        println!("\nSet an API key to get started:");
        println!("  export OPENROUTER_API_KEY=sk-or-...");
    }
    println!("\nThen try:");
    println!("  cadence run --input \"Summarize the benefits of interval training\"");

    Ok(())
}

/// A two-phase research-then-write workflow.
fn sample_workflow() -> WorkflowConfig {
    let mut research = PhaseConfig::new(
        "research",
        "You are a careful analyst. Answer only with a JSON object.",
        "List the key facts needed to address this request as \
         {\"facts\": [..]}:\n\n{{input}}",
    );
    research.required_keys = vec!["input".into()];

    let mut write = PhaseConfig::new(
        "write",
        "You are a concise technical writer.",
        "Using these facts: {{facts}}\n\nWrite a short answer to: {{input}}\n\n\
         Read earlier results with read_context if needed, then call record_result \
         with key \"answer\" and your text as value.",
    );
    write.required_keys = vec!["facts".into()];
    write.tools = vec![READ_CONTEXT_TOOL.into(), RECORD_RESULT_TOOL.into()];
    write.completion_tool = Some(RECORD_RESULT_TOOL.into());
    write.output_key = Some("answer".into());

    WorkflowConfig {
        name: "research-and-write".into(),
        report_file: Some("report.json".into()),
        phases: vec![research, write],
        ..WorkflowConfig::default()
    }
}
