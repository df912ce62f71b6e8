//! Per-phase execution context.

use cadence_config::WorkflowConfig;
use cadence_core::context::ContextMap;
use cadence_core::event::{DomainEvent, EventBus};
use cadence_core::provider::Provider;
use cadence_core::tool::ToolRegistry;
use cadence_session::SessionManager;
use std::sync::Arc;

use crate::prompts::PromptsManager;
use crate::result::PhaseStatus;

/// Called on every phase status transition.
pub type ProgressCallback = Arc<dyn Fn(&str, PhaseStatus) + Send + Sync>;

/// Everything a phase needs to run.
///
/// The shared collaborators are reference counted; `previous_phase_data` is
/// owned, so every phase gets its own copy of the accumulated data.
#[derive(Clone)]
pub struct PhaseContext {
    pub config: Arc<WorkflowConfig>,

    /// Data extracted by earlier phases (seeded with the workflow input)
    pub previous_phase_data: ContextMap,

    pub session_manager: Arc<SessionManager>,

    pub provider: Arc<dyn Provider>,

    pub prompts: Arc<PromptsManager>,

    pub tools: Arc<ToolRegistry>,

    /// Model override for every phase
    pub model: Option<String>,

    pub progress: Option<ProgressCallback>,

    pub events: Option<Arc<EventBus>>,
}

impl PhaseContext {
    /// A context with prompts loaded from `config.prompts_dir`.
    pub fn new(
        config: Arc<WorkflowConfig>,
        session_manager: Arc<SessionManager>,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let prompts = Arc::new(PromptsManager::new(config.prompts_dir.clone()));
        Self {
            config,
            previous_phase_data: ContextMap::new(),
            session_manager,
            provider,
            prompts,
            tools,
            model: None,
            progress: None,
            events: None,
        }
    }

    /// Seed the data the first phase sees.
    pub fn with_data(mut self, data: ContextMap) -> Self {
        self.previous_phase_data = data;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptsManager) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// A context for the next phase, carrying its own copy of `data`.
    pub fn for_phase(&self, data: &ContextMap) -> Self {
        Self {
            previous_phase_data: data.clone(),
            ..self.clone()
        }
    }

    pub fn report_progress(&self, phase: &str, status: PhaseStatus) {
        if let Some(callback) = &self.progress {
            callback(phase, status);
        }
    }

    pub fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for PhaseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseContext")
            .field("workflow", &self.config.name)
            .field("previous_phase_data", &self.previous_phase_data)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.len())
            .field("model", &self.model)
            .finish()
    }
}
