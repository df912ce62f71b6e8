//! The phase template: one bounded agent conversation per phase.

use async_trait::async_trait;
use cadence_agent::LlmAgent;
use cadence_core::context::ContextMap;
use cadence_core::error::{Error, Result};
use cadence_session::ConversationSession;
use cadence_tools::{ToolAllowlist, ToolExecutor};
use std::time::Instant;
use tracing::{info, warn};

use crate::context::PhaseContext;
use crate::result::{PhaseResult, PhaseStatus};

/// What a successful conversation produced.
#[derive(Debug, Clone)]
pub struct PhaseOutput {
    pub response: String,
    pub extracted_data: ContextMap,
    pub tokens_used: u64,
}

/// Why a phase failed, with the tokens spent before it did.
#[derive(Debug)]
pub struct PhaseFailure {
    pub error: Error,
    pub tokens_used: u64,
}

impl From<Error> for PhaseFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            tokens_used: 0,
        }
    }
}

/// One unit of a workflow.
///
/// Implementors supply the hooks; [`execute`](Phase::execute) is the fixed
/// algorithm and should not normally be overridden:
///
/// 1. `validate_context`
/// 2. progress `InProgress`
/// 3. fresh session seeded with `previous_phase_data` and the system prompt
/// 4. agent restricted to `allowed_tools`, fed `build_user_message`
/// 5. `extract_data` from the finished session
///
/// Any error along the way becomes a `Failed` result; nothing is raised.
#[async_trait]
pub trait Phase: Send + Sync {
    fn name(&self) -> &str;

    fn build_system_prompt(&self, context: &PhaseContext) -> Result<String>;

    fn build_user_message(&self, context: &PhaseContext) -> Result<String>;

    /// Pull the data this phase hands forward out of its finished session.
    fn extract_data(&self, session: &ConversationSession) -> Result<ContextMap>;

    /// Pre-flight check, run before any session or provider work.
    fn validate_context(&self, _context: &PhaseContext) -> Result<()> {
        Ok(())
    }

    /// Tools the agent may see. No tools unless a phase asks for them.
    fn allowed_tools(&self) -> ToolAllowlist {
        ToolAllowlist::none()
    }

    /// Tool whose successful call ends the conversation early.
    fn completion_tool(&self) -> Option<&str> {
        None
    }

    fn force_tool_call(&self) -> bool {
        false
    }

    fn max_iterations(&self, context: &PhaseContext) -> u32 {
        context.config.max_iterations
    }

    async fn execute(&self, context: PhaseContext) -> PhaseResult {
        let name = self.name().to_string();
        let start = Instant::now();

        match run_phase(self, &context).await {
            Ok(output) => {
                let elapsed = start.elapsed().as_secs_f64();
                info!(
                    phase = %name,
                    tokens = output.tokens_used,
                    keys = ?output.extracted_data.keys().collect::<Vec<_>>(),
                    elapsed_s = elapsed,
                    "Phase completed"
                );
                context.report_progress(&name, PhaseStatus::Completed);
                PhaseResult::completed(
                    name,
                    output.response,
                    output.extracted_data,
                    elapsed,
                    output.tokens_used,
                )
            }
            Err(failure) => {
                let elapsed = start.elapsed().as_secs_f64();
                warn!(
                    phase = %name,
                    error = %failure.error,
                    tokens = failure.tokens_used,
                    "Phase failed"
                );
                context.report_progress(&name, PhaseStatus::Failed);
                PhaseResult::failed(name, vec![failure.error.to_string()], elapsed)
                    .with_tokens(failure.tokens_used)
            }
        }
    }
}

/// The body of [`Phase::execute`], with errors still raised.
pub async fn run_phase<P: Phase + ?Sized>(
    phase: &P,
    context: &PhaseContext,
) -> std::result::Result<PhaseOutput, PhaseFailure> {
    phase.validate_context(context)?;
    context.report_progress(phase.name(), PhaseStatus::InProgress);

    let system_prompt = phase.build_system_prompt(context)?;
    let user_message = phase.build_user_message(context)?;

    // Only extracted data crosses the phase boundary, never message history
    let session = context
        .session_manager
        .create_session(
            context.provider.name(),
            context.model.clone(),
            context.previous_phase_data.clone(),
            Some(&system_prompt),
        )
        .await
        .map_err(Error::from)?;

    let executor =
        ToolExecutor::new(context.tools.clone()).with_allowlist(phase.allowed_tools());

    let mut agent = LlmAgent::new(context.provider.clone(), executor, session.clone())
        .with_max_iterations(phase.max_iterations(context))
        .with_force_tool_call(phase.force_tool_call())
        .with_session_manager(context.session_manager.clone());
    if let Some(tool) = phase.completion_tool() {
        agent = agent.with_completion_tool(tool);
    }
    if let Some(model) = &context.model {
        agent = agent.with_model(model.clone());
    }
    if let Some(bus) = &context.events {
        agent = agent.with_event_bus(bus.clone());
    }

    let spent = |error: Error| PhaseFailure {
        error,
        tokens_used: agent.tokens_used(),
    };
    let response = agent.process_message(&user_message).await.map_err(spent)?;
    let extracted_data = phase
        .extract_data(&*session.read().await)
        .map_err(spent)?;

    Ok(PhaseOutput {
        response,
        extracted_data,
        tokens_used: agent.tokens_used(),
    })
}
