//! `cadence sessions`: inspect persisted sessions.

use cadence_session::{SessionManager, SessionStore};
use std::path::PathBuf;

fn manager(config_path: Option<PathBuf>) -> Result<SessionManager, Box<dyn std::error::Error>> {
    let config = super::load_config(&super::config_file(config_path))?;
    Ok(SessionManager::with_store(SessionStore::new(
        config.sessions.resolved_dir(),
    )))
}

pub async fn list(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config_path)?;
    let sessions = manager.list_sessions().await?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!("{:<38} {:<12} {:>8}  LAST ACTIVITY", "ID", "PROVIDER", "MESSAGES");
    for session in &sessions {
        println!(
            "{:<38} {:<12} {:>8}  {}",
            session.session_id,
            session.provider_name,
            session.message_count(),
            session.last_activity.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("\n{} session(s)", sessions.len());
    Ok(())
}

pub async fn show(config_path: Option<PathBuf>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config_path)?;
    let handle = manager.get_session(id).await?;
    let session = handle.read().await;

    println!("Session:  {}", session.session_id);
    println!("Provider: {}", session.provider_name);
    println!("Model:    {}", session.model.as_deref().unwrap_or("(default)"));
    println!("Created:  {}", session.created_at.to_rfc3339());
    println!("Context:  {}", serde_json::to_string_pretty(&session.context)?);
    println!();

    for message in &session.messages {
        println!("[{}] {}", message.role, message.content);
        for call in &message.tool_calls {
            println!("    → {}({})", call.name, serde_json::Value::Object(call.arguments.clone()));
        }
    }
    Ok(())
}

pub async fn delete(config_path: Option<PathBuf>, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manager = manager(config_path)?;
    manager.delete_session(id).await?;
    println!("🗑  Deleted session {id}");
    Ok(())
}
