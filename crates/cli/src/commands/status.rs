//! `cadence status`: show what a run would use.

use cadence_providers::PricingTable;
use cadence_session::SessionStore;
use std::path::PathBuf;

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_file(config_path);
    let config = super::load_config(&path)?;

    println!("🎼 Cadence Status");
    println!("  ─────────────────────────────");
    println!(
        "  Config:       {} {}",
        path.display(),
        if path.exists() { "✅" } else { "(defaults)" }
    );
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!(
        "  API key:      {}",
        if config.has_api_key() { "✅ set" } else { "❌ not set" }
    );

    let pricing = PricingTable::with_defaults();
    match pricing.get(&config.default_model) {
        Some(p) => println!(
            "  Pricing:      ${:.2} in / ${:.2} out per 1M tokens",
            p.input_per_m, p.output_per_m
        ),
        None => println!("  Pricing:      unknown"),
    }

    println!(
        "  Retry:        {} attempts, {}ms base delay",
        config.retry.max_attempts, config.retry.base_delay_ms
    );

    let sessions_dir = config.sessions.resolved_dir();
    if config.sessions.persist {
        let count = SessionStore::new(&sessions_dir).list().await?.len();
        println!("  Sessions:     {} ({count} stored)", sessions_dir.display());
    } else {
        println!("  Sessions:     in-memory only");
    }

    if let Some(log) = &config.logging.interaction_log {
        println!("  Interactions: {}", log.display());
    }

    println!("  ─────────────────────────────");
    println!("  Workflow:     {}", config.workflow.name);
    if config.workflow.phases.is_empty() {
        println!("    (no phases configured)");
    }
    for (i, phase) in config.workflow.phases.iter().enumerate() {
        let tools = if phase.tools.is_empty() {
            "no tools".to_string()
        } else {
            phase.tools.join(", ")
        };
        println!("    {}. {} [{tools}]", i + 1, phase.name);
    }

    Ok(())
}
