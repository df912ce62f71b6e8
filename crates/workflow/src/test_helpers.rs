//! Shared test helpers for phase and workflow tests.

use async_trait::async_trait;
use cadence_agent::testing::ScriptedProvider;
use cadence_config::WorkflowConfig;
use cadence_core::context::ContextMap;
use cadence_core::error::{Error, Result};
use cadence_core::tool::ToolRegistry;
use cadence_session::{ConversationSession, SessionManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::{PhaseContext, ProgressCallback};
use crate::phase::Phase;
use crate::result::{PhaseResult, PhaseStatus};

pub fn test_context(provider: Arc<ScriptedProvider>) -> PhaseContext {
    PhaseContext::new(
        Arc::new(WorkflowConfig::default()),
        Arc::new(SessionManager::new()),
        provider,
        Arc::new(ToolRegistry::new()),
    )
}

pub type ProgressLog = Arc<Mutex<Vec<(String, PhaseStatus)>>>;

pub fn progress_log() -> (ProgressLog, ProgressCallback) {
    let log: ProgressLog = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let callback: ProgressCallback = Arc::new(move |phase: &str, status: PhaseStatus| {
        sink.lock().unwrap().push((phase.to_string(), status));
    });
    (log, callback)
}

/// A phase running the real template, with fixed prompts. The final assistant
/// text is parsed as a JSON object for `extract_data`.
pub struct RecordingPhase {
    name: String,
    required: Option<String>,
    max_iterations: Option<u32>,
}

impl RecordingPhase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            required: None,
            max_iterations: None,
        }
    }

    pub fn requiring(mut self, key: &str) -> Self {
        self.required = Some(key.into());
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }
}

#[async_trait]
impl Phase for RecordingPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_system_prompt(&self, _context: &PhaseContext) -> Result<String> {
        Ok(format!("system for {}", self.name))
    }

    fn build_user_message(&self, _context: &PhaseContext) -> Result<String> {
        Ok(format!("user for {}", self.name))
    }

    fn validate_context(&self, context: &PhaseContext) -> Result<()> {
        match &self.required {
            Some(key) if !context.previous_phase_data.contains_key(key) => Err(
                Error::ContextValidation(format!("missing required key '{key}'")),
            ),
            _ => Ok(()),
        }
    }

    fn max_iterations(&self, context: &PhaseContext) -> u32 {
        self.max_iterations.unwrap_or(context.config.max_iterations)
    }

    fn extract_data(&self, session: &ConversationSession) -> Result<ContextMap> {
        let text = session.last_assistant_text().unwrap_or("{}");
        Ok(serde_json::from_str(text).unwrap_or_default())
    }
}

/// A phase that skips the agent entirely and returns a fixed outcome,
/// recording every context it is handed.
pub struct FixedPhase {
    name: String,
    output: ContextMap,
    fail: bool,
    tokens: u64,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<ContextMap>>,
}

impl FixedPhase {
    pub fn ok(name: &str, output: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            output: output.as_object().cloned().unwrap_or_default(),
            fail: false,
            tokens: 10,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            output: ContextMap::new(),
            fail: true,
            tokens: 0,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Phase for FixedPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_system_prompt(&self, _context: &PhaseContext) -> Result<String> {
        Ok(String::new())
    }

    fn build_user_message(&self, _context: &PhaseContext) -> Result<String> {
        Ok(String::new())
    }

    fn extract_data(&self, _session: &ConversationSession) -> Result<ContextMap> {
        Ok(self.output.clone())
    }

    async fn execute(&self, mut context: PhaseContext) -> PhaseResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push(context.previous_phase_data.clone());
        // Scribble on the local copy; nobody else may observe it
        context
            .previous_phase_data
            .insert("scratch".into(), serde_json::json!(self.name));

        if self.fail {
            PhaseResult::failed(&self.name, vec![format!("{} exploded", self.name)], 0.0)
        } else {
            PhaseResult::completed(&self.name, "done", self.output.clone(), 0.0, self.tokens)
        }
    }
}
