//! Workflows described entirely in configuration.
//!
//! Each [`PhaseConfig`] becomes a [`TemplatePhase`]; a [`WorkflowConfig`]
//! becomes a [`ConfiguredWorkflow`]. Prompts are resolved through the
//! context's [`PromptsManager`](crate::PromptsManager) and rendered with the
//! accumulated data.

use async_trait::async_trait;
use cadence_config::{PhaseConfig, WorkflowConfig};
use cadence_core::context::{ContextMap, is_truthy};
use cadence_core::error::{Error, Result};
use cadence_session::ConversationSession;
use cadence_tools::ToolAllowlist;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::PhaseContext;
use crate::phase::Phase;
use crate::workflow::Workflow;

/// A phase whose prompts, tools and data contract come from [`PhaseConfig`].
#[derive(Debug, Clone)]
pub struct TemplatePhase {
    config: PhaseConfig,
}

impl TemplatePhase {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }
}

#[async_trait]
impl Phase for TemplatePhase {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn validate_context(&self, context: &PhaseContext) -> Result<()> {
        let missing: Vec<&str> = self
            .config
            .required_keys
            .iter()
            .filter(|key| !context.previous_phase_data.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ContextValidation(format!(
                "phase '{}' requires data from earlier phases that is missing: {}",
                self.config.name,
                missing.join(", ")
            )))
        }
    }

    fn build_system_prompt(&self, context: &PhaseContext) -> Result<String> {
        context
            .prompts
            .load_and_render(&self.config.system_prompt, &context.previous_phase_data)
    }

    fn build_user_message(&self, context: &PhaseContext) -> Result<String> {
        context
            .prompts
            .load_and_render(&self.config.user_message, &context.previous_phase_data)
    }

    fn allowed_tools(&self) -> ToolAllowlist {
        ToolAllowlist::only(self.config.tools.iter().cloned())
    }

    fn completion_tool(&self) -> Option<&str> {
        self.config.completion_tool.as_deref()
    }

    fn force_tool_call(&self) -> bool {
        self.config.force_tool_call
    }

    fn max_iterations(&self, context: &PhaseContext) -> u32 {
        self.config
            .max_iterations
            .unwrap_or(context.config.max_iterations)
    }

    /// A JSON object answer is merged as-is. Otherwise the answer text is
    /// stored under `output_key`. A value a tool wrote under `output_key`
    /// during this phase takes precedence; values seeded from earlier phases
    /// never do.
    fn extract_data(&self, session: &ConversationSession) -> Result<ContextMap> {
        let mut data = ContextMap::new();
        let answer = session.last_assistant_text().unwrap_or_default();

        if let Some(object) = parse_json_object(answer) {
            data.extend(object);
        } else if let Some(key) = &self.config.output_key {
            data.insert(key.clone(), serde_json::Value::String(answer.to_string()));
        }

        if let Some(key) = &self.config.output_key {
            if let Some(value) = session.updated_value(key) {
                data.insert(key.clone(), value.clone());
            }
        }

        debug!(
            phase = %self.config.name,
            keys = ?data.keys().collect::<Vec<_>>(),
            "Extracted phase data"
        );
        Ok(data)
    }
}

/// Parse `text` as a JSON object, tolerating a surrounding Markdown code fence.
fn parse_json_object(text: &str) -> Option<ContextMap> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    match serde_json::from_str(body.trim()) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// A workflow built from [`WorkflowConfig`].
pub struct ConfiguredWorkflow {
    config: Arc<WorkflowConfig>,
    phases: Vec<Arc<TemplatePhase>>,
}

impl ConfiguredWorkflow {
    pub fn from_config(config: WorkflowConfig) -> Result<Self> {
        config.validate()?;
        if let Some(report) = &config.report_file {
            validate_report_name(report)?;
        }

        let phases = config
            .phases
            .iter()
            .cloned()
            .map(|p| Arc::new(TemplatePhase::new(p)))
            .collect();

        Ok(Self {
            config: Arc::new(config),
            phases,
        })
    }

    pub fn config(&self) -> Arc<WorkflowConfig> {
        self.config.clone()
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name()).collect()
    }
}

fn validate_report_name(name: &str) -> Result<()> {
    if Path::new(name).file_name().and_then(|f| f.to_str()) == Some(name) {
        Ok(())
    } else {
        Err(Error::Config {
            message: format!("report_file must be a plain file name, got '{name}'"),
        })
    }
}

#[async_trait]
impl Workflow for ConfiguredWorkflow {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn get_phases(&self) -> Vec<Arc<dyn Phase>> {
        self.phases
            .iter()
            .map(|p| p.clone() as Arc<dyn Phase>)
            .collect()
    }

    fn should_skip(&self, phase: &dyn Phase, data: &ContextMap) -> bool {
        self.phases
            .iter()
            .find(|p| p.name() == phase.name())
            .and_then(|p| p.config.skip_when.as_deref())
            .and_then(|key| data.get(key))
            .is_some_and(is_truthy)
    }

    /// Write the accumulated data to `report_file` inside `output_dir`.
    async fn finalize(&self, _context: &PhaseContext, data: &ContextMap) -> Result<Vec<PathBuf>> {
        let Some(report) = &self.config.report_file else {
            return Ok(Vec::new());
        };

        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            Error::Internal(format!(
                "Failed to create output directory {}: {e}",
                dir.display()
            ))
        })?;

        let path = dir.join(report);
        let content = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&path, content).await.map_err(|e| {
            Error::Internal(format!("Failed to write report {}: {e}", path.display()))
        })?;

        info!(workflow = %self.config.name, path = %path.display(), "Report written");
        Ok(vec![path])
    }
}
