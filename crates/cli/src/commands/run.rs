//! `cadence run`: execute the configured workflow on one input.

use cadence_config::AppConfig;
use cadence_core::context::{ContextMap, keys};
use cadence_core::tool::ToolRegistry;
use cadence_session::{SessionManager, SessionStore};
use cadence_workflow::{ConfiguredWorkflow, PhaseContext, PhaseStatus, Workflow, WorkflowResult};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(
    config_path: Option<PathBuf>,
    input: String,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);
    let config = super::load_config(&path)?;

    if config.workflow.phases.is_empty() {
        return Err(format!(
            "No phases configured in {}. Run `cadence init` or add [[workflow.phases]].",
            path.display()
        )
        .into());
    }

    let router = cadence_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or_else(|| format!("Provider '{}' is not configured", router.default_name()))?;

    let mut registry = ToolRegistry::new();
    cadence_tools::register_builtin_tools(&mut registry)?;

    let sessions = session_manager(&config);
    let workflow = ConfiguredWorkflow::from_config(config.workflow.clone())?;

    let mut seed = ContextMap::new();
    keys::INPUT.set(&mut seed, input)?;

    let model = model.or_else(|| Some(config.default_model.clone()));
    let context = PhaseContext::new(workflow.config(), sessions, provider, Arc::new(registry))
        .with_data(seed)
        .with_model(model)
        .with_progress(Arc::new(print_progress));

    println!(
        "▶ {} ({} phases via {})\n",
        workflow.name(),
        workflow.phase_names().len(),
        router.default_name()
    );

    let result = workflow.execute(context).await;
    print_summary(&result);

    if result.success() {
        Ok(())
    } else {
        Err(format!("Workflow '{}' failed", result.workflow_name).into())
    }
}

fn session_manager(config: &AppConfig) -> Arc<SessionManager> {
    if config.sessions.persist {
        Arc::new(SessionManager::with_store(SessionStore::new(
            config.sessions.resolved_dir(),
        )))
    } else {
        Arc::new(SessionManager::new())
    }
}

fn print_progress(phase: &str, status: PhaseStatus) {
    let marker = match status {
        PhaseStatus::Pending => "·",
        PhaseStatus::InProgress => "…",
        PhaseStatus::Completed => "✅",
        PhaseStatus::Failed => "❌",
        PhaseStatus::Skipped => "⏭",
    };
    println!("  {marker} {phase}: {status}");
}

fn print_summary(result: &WorkflowResult) {
    println!("\n📊 Summary");
    println!("  ─────────────────────────────");
    for phase in &result.phase_results {
        println!(
            "  {:<20} {:<10} {:>6.1}s {:>8} tokens",
            phase.phase_name, phase.status, phase.execution_time_seconds, phase.tokens_used
        );
        for error in &phase.errors {
            println!("    ↳ {error}");
        }
    }
    println!("  ─────────────────────────────");
    println!(
        "  Total: {:.1}s, {} tokens",
        result.total_execution_time_seconds, result.total_tokens_used
    );

    for file in &result.output_files {
        println!("  📄 {}", file.display());
    }
    for error in &result.errors {
        println!("  ⚠️  {error}");
    }

    if let Some(last) = result.phase_results.iter().rev().find(|p| p.success()) {
        if !last.agent_response.is_empty() {
            println!("\n{}", last.agent_response);
        }
    }
}
