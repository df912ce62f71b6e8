//! The bounded tool-calling loop.

use cadence_core::error::{Error, Result};
use cadence_core::event::{DomainEvent, EventBus};
use cadence_core::message::{ConversationMessage, ToolResultRef};
use cadence_core::provider::{CompletionRequest, Provider};
use cadence_session::{SessionHandle, SessionManager};
use cadence_tools::ToolExecutor;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Assistant message appended when the completion tool succeeds.
pub const COMPLETION_CONFIRMATION: &str =
    "The requested work has been finalized and the results have been recorded.";

const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Drives one session through model responses and tool calls.
///
/// Each iteration either ends the turn (the model answered without tool
/// calls, or the completion tool succeeded) or executes the requested tools
/// in model order and asks again. `max_iterations` bounds provider calls per
/// [`process_message`](Self::process_message).
pub struct LlmAgent {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Executor bound to `session`
    executor: ToolExecutor,

    /// The session this agent works on
    session: SessionHandle,

    /// Persists the session after every round when set
    session_manager: Option<Arc<SessionManager>>,

    /// Maximum provider calls per turn
    max_iterations: u32,

    /// Tool whose successful call finalizes the turn
    completion_tool: Option<String>,

    /// Ask the provider to force a tool call
    force_tool_call: bool,

    /// How many trailing messages to send; all when `None`
    max_history: Option<usize>,

    /// Model override for provider requests
    model: Option<String>,

    /// Event bus for domain events
    event_bus: Option<Arc<EventBus>>,

    /// Tokens reported by the provider across this agent's lifetime
    tokens_used: AtomicU64,
}

impl LlmAgent {
    /// Create an agent over `session`. The executor is rebound to it.
    pub fn new(provider: Arc<dyn Provider>, executor: ToolExecutor, session: SessionHandle) -> Self {
        Self {
            provider,
            executor: executor.with_session(session.clone()),
            session,
            session_manager: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            completion_tool: None,
            force_tool_call: false,
            max_history: None,
            model: None,
            event_bus: None,
            tokens_used: AtomicU64::new(0),
        }
    }

    /// Set the maximum number of provider calls per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Designate the tool whose successful call ends the turn.
    pub fn with_completion_tool(mut self, name: impl Into<String>) -> Self {
        self.completion_tool = Some(name.into());
        self
    }

    pub fn with_force_tool_call(mut self, force: bool) -> Self {
        self.force_tool_call = force;
        self
    }

    /// Only send the last `max` messages to the provider.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = Some(max);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Persist the session through `manager` after every round.
    pub fn with_session_manager(mut self, manager: Arc<SessionManager>) -> Self {
        self.session_manager = Some(manager);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Total tokens the provider reported for this agent's calls.
    pub fn tokens_used(&self) -> u64 {
        self.tokens_used.load(Ordering::Relaxed)
    }

    /// The live message sequence.
    pub async fn get_conversation_history(&self) -> Vec<ConversationMessage> {
        self.session.read().await.messages.clone()
    }

    /// Truncate history to nothing, or to only system messages.
    pub async fn clear_history(&self, keep_system: bool) -> Result<()> {
        self.session.write().await.clear_messages(keep_system);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        if let Some(manager) = &self.session_manager {
            manager.update_session(&self.session).await?;
        }
        Ok(())
    }

    async fn append(&self, message: ConversationMessage) {
        self.session.write().await.add_message(message);
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Process one user message and return the final assistant text.
    ///
    /// Provider and tool faults propagate unchanged; whatever was appended to
    /// the session before the fault stays there.
    pub async fn process_message(&self, user_text: &str) -> Result<String> {
        let session_id = self.session.read().await.session_id.clone();
        info!(
            session_id = %session_id,
            provider = %self.provider.name(),
            max_iterations = self.max_iterations,
            "Processing message"
        );

        self.append(ConversationMessage::user(user_text)).await;

        let tools = self.executor.available_tools();

        for iteration in 1..=self.max_iterations {
            debug!(session_id = %session_id, iteration, "Agent loop iteration");

            let messages = self.session.read().await.get_messages_for_llm(self.max_history);
            let request = CompletionRequest::new(messages)
                .with_tools(tools.clone())
                .force_tool_call(self.force_tool_call)
                .with_model(self.model.clone());

            let response = self.provider.create_completion(request).await?;

            if let Some(usage) = &response.usage {
                self.tokens_used
                    .fetch_add(u64::from(usage.total_tokens), Ordering::Relaxed);
                self.publish(DomainEvent::ResponseGenerated {
                    session_id: session_id.clone(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if !response.has_tool_calls() {
                self.append(ConversationMessage::assistant(&response.content)).await;
                self.persist().await?;
                info!(session_id = %session_id, iteration, "Agent produced final response");
                return Ok(response.content);
            }

            debug!(
                session_id = %session_id,
                tool_count = response.tool_calls.len(),
                "Executing tool calls"
            );

            let tool_calls = response.tool_calls;
            self.append(ConversationMessage::assistant_tool_calls(
                response.content,
                tool_calls.clone(),
            ))
            .await;

            let mut finalized = false;
            for call in &tool_calls {
                let start = std::time::Instant::now();
                let result = self
                    .executor
                    .execute_tool(&call.name, call.arguments.clone())
                    .await?;
                let duration_ms = start.elapsed().as_millis() as u64;

                if !result.success {
                    warn!(tool = %call.name, errors = ?result.errors, "Tool call failed");
                }

                self.publish(DomainEvent::ToolExecuted {
                    session_id: session_id.clone(),
                    tool_name: call.name.clone(),
                    success: result.success,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                self.append(ConversationMessage::tool(
                    result.to_message_content(&call.name),
                    ToolResultRef {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        success: result.success,
                        format: result.format,
                    },
                ))
                .await;

                if result.success && self.completion_tool.as_deref() == Some(call.name.as_str()) {
                    finalized = true;
                }
            }

            if finalized {
                info!(session_id = %session_id, iteration, "Completion tool succeeded, finalizing");
                self.append(ConversationMessage::assistant(COMPLETION_CONFIRMATION))
                    .await;
                self.persist().await?;
                return Ok(COMPLETION_CONFIRMATION.to_string());
            }

            self.persist().await?;
            // Loop back: the model will see the tool results and decide what to do next
        }

        warn!(
            session_id = %session_id,
            max_iterations = self.max_iterations,
            "Max iterations reached without a final response"
        );
        Err(Error::MaxIterationsExceeded {
            max_iterations: self.max_iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, tool_call};
    use async_trait::async_trait;
    use cadence_core::context::ContextMap;
    use cadence_core::error::{ProviderError, ToolError};
    use cadence_core::message::Role;
    use cadence_core::provider::CompletionResponse;
    use cadence_core::tool::{Tool, ToolExecutionResult, ToolInput, ToolRegistry};
    use cadence_tools::ToolAllowlist;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo text"
        }
        async fn execute(&self, input: ToolInput) -> std::result::Result<ToolExecutionResult, ToolError> {
            Ok(ToolExecutionResult::text(input.str_param("text").unwrap_or("")))
        }
    }

    struct Finalize {
        succeed: bool,
    }

    #[async_trait]
    impl Tool for Finalize {
        fn name(&self) -> &str {
            "finalize"
        }
        fn description(&self) -> &str {
            "Record the final result"
        }
        async fn execute(&self, _input: ToolInput) -> std::result::Result<ToolExecutionResult, ToolError> {
            if self.succeed {
                Ok(ToolExecutionResult::ok(json!({"saved": true})))
            } else {
                Ok(ToolExecutionResult::failure(vec!["validation failed".into()]))
            }
        }
    }

    struct Explode;

    #[async_trait]
    impl Tool for Explode {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "Faults"
        }
        async fn execute(&self, _input: ToolInput) -> std::result::Result<ToolExecutionResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "explode".into(),
                reason: "boom".into(),
            })
        }
    }

    fn registry(finalize_succeeds: bool) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        registry.register(Finalize { succeed: finalize_succeeds }).unwrap();
        registry.register(Explode).unwrap();
        Arc::new(registry)
    }

    async fn agent_with(provider: Arc<ScriptedProvider>, finalize_succeeds: bool) -> LlmAgent {
        let manager = SessionManager::new();
        let session = manager
            .create_session("scripted", None, ContextMap::new(), Some("system prompt"))
            .await
            .unwrap();
        LlmAgent::new(provider, ToolExecutor::new(registry(finalize_succeeds)), session)
    }

    #[tokio::test]
    async fn simple_text_response_appends_two_messages() {
        let provider = Arc::new(ScriptedProvider::text("Hello! How can I help?"));
        let agent = agent_with(provider.clone(), true).await;
        let before = agent.get_conversation_history().await.len();

        let response = agent.process_message("Hello!").await.unwrap();
        assert_eq!(response, "Hello! How can I help?");

        let history = agent.get_conversation_history().await;
        assert_eq!(history.len(), before + 2);
        assert_eq!(history[before].role, Role::User);
        assert_eq!(history[before + 1].role, Role::Assistant);
        assert_eq!(provider.calls(), 1);
        assert_eq!(agent.tokens_used(), 15);
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::tool_then_text(
            vec![tool_call("c1", "echo", json!({"text": "ping"}))],
            "pong received",
        ));
        let agent = agent_with(provider.clone(), true).await;

        let response = agent.process_message("ping it").await.unwrap();
        assert_eq!(response, "pong received");

        let history = agent.get_conversation_history().await;
        // system, user, assistant(tool_calls), tool, assistant
        assert_eq!(history.len(), 5);
        assert_eq!(history[2].tool_calls.len(), 1);
        assert_eq!(history[3].role, Role::Tool);
        assert_eq!(history[3].content, "ping");
        let result = &history[3].tool_results[0];
        assert_eq!(result.tool_call_id, "c1");
        assert_eq!(result.tool_name, "echo");
        assert!(result.success);

        // The second request carried the tool result back to the model
        let requests = provider.requests();
        assert_eq!(requests[1].messages.len(), 4);
        assert_eq!(requests[0].tools.len(), 3);
    }

    #[tokio::test]
    async fn parameters_keyed_call_reaches_tool_intact() {
        let raw = json!({
            "id": "p1",
            "name": "echo",
            "parameters": {"text": "via parameters"}
        });
        let call = cadence_core::message::ToolCall::from_raw(&raw).unwrap();
        let provider = Arc::new(ScriptedProvider::tool_then_text(vec![call], "ok"));
        let agent = agent_with(provider, true).await;

        agent.process_message("echo this").await.unwrap();

        let history = agent.get_conversation_history().await;
        assert_eq!(history[2].tool_calls[0].arguments["text"], "via parameters");
        assert_eq!(history[3].content, "via parameters");
        assert!(history[3].tool_results[0].success);
    }

    #[tokio::test]
    async fn malformed_session_context_argument_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::tool_then_text(
            vec![tool_call(
                "c1",
                "echo",
                json!({"text": "x", "session_context": "oops"}),
            )],
            "recovered",
        ));
        let agent = agent_with(provider.clone(), true).await;

        let response = agent.process_message("go").await.unwrap();
        assert_eq!(response, "recovered");
        assert_eq!(provider.calls(), 2);

        let history = agent.get_conversation_history().await;
        assert_eq!(history[3].role, Role::Tool);
        assert!(!history[3].tool_results[0].success);
        assert!(history[3].content.contains("must be an object"));
    }

    #[tokio::test]
    async fn rounds_below_limit_succeed() {
        let max = 4;
        let mut script = Vec::new();
        for i in 0..(max - 1) {
            script.push(CompletionResponse::tool_calls(
                "",
                vec![tool_call(&format!("c{i}"), "echo", json!({"text": "x"}))],
            ));
        }
        script.push(CompletionResponse::text("done"));
        let provider = Arc::new(ScriptedProvider::new(script));
        let agent = agent_with(provider.clone(), true)
            .await
            .with_max_iterations(max as u32);

        assert_eq!(agent.process_message("go").await.unwrap(), "done");
        assert_eq!(provider.calls(), max);
    }

    #[tokio::test]
    async fn unterminated_rounds_raise_max_iterations() {
        let max = 3;
        let script = (0..max)
            .map(|i| {
                CompletionResponse::tool_calls(
                    "",
                    vec![tool_call(&format!("c{i}"), "echo", json!({"text": "again"}))],
                )
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(script));
        let agent = agent_with(provider.clone(), true)
            .await
            .with_max_iterations(max as u32);

        let err = agent.process_message("loop forever").await.unwrap_err();
        assert!(matches!(err, Error::MaxIterationsExceeded { max_iterations: 3 }));
        assert_eq!(provider.calls(), max);
    }

    #[tokio::test]
    async fn completion_tool_short_circuits() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            CompletionResponse::tool_calls(
                "",
                vec![
                    tool_call("c1", "echo", json!({"text": "a"})),
                    tool_call("c2", "finalize", json!({})),
                ],
            ),
            CompletionResponse::text("should never be requested"),
        ]));
        let agent = agent_with(provider.clone(), true)
            .await
            .with_completion_tool("finalize");

        let response = agent.process_message("finish").await.unwrap();
        assert_eq!(response, COMPLETION_CONFIRMATION);
        assert_eq!(provider.calls(), 1);

        let history = agent.get_conversation_history().await;
        let last = history.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, COMPLETION_CONFIRMATION);
        // Both tool results were recorded before finalizing
        assert_eq!(history.iter().filter(|m| m.role == Role::Tool).count(), 2);
    }

    #[tokio::test]
    async fn failed_completion_tool_does_not_finalize() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            CompletionResponse::tool_calls("", vec![tool_call("c1", "finalize", json!({}))]),
            CompletionResponse::text("fixed it"),
        ]));
        let agent = agent_with(provider.clone(), false)
            .await
            .with_completion_tool("finalize");

        assert_eq!(agent.process_message("finish").await.unwrap(), "fixed it");
        let history = agent.get_conversation_history().await;
        let tool_msg = history.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(!tool_msg.tool_results[0].success);
        assert!(tool_msg.content.contains("validation failed"));
    }

    #[tokio::test]
    async fn unavailable_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::tool_then_text(
            vec![tool_call("c1", "echo", json!({"text": "hidden"}))],
            "ok without echo",
        ));
        let manager = SessionManager::new();
        let session = manager
            .create_session("scripted", None, ContextMap::new(), None)
            .await
            .unwrap();
        let executor = ToolExecutor::new(registry(true)).with_allowlist(ToolAllowlist::only(["finalize"]));
        let agent = LlmAgent::new(provider.clone(), executor, session);

        assert_eq!(agent.process_message("try").await.unwrap(), "ok without echo");
        assert_eq!(provider.requests()[0].tools.len(), 1);

        let history = agent.get_conversation_history().await;
        let tool_msg = history.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(!tool_msg.tool_results[0].success);
        assert!(tool_msg.content.contains("not available"));
    }

    #[tokio::test]
    async fn tool_fault_mid_round_leaves_partial_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![CompletionResponse::tool_calls(
            "",
            vec![
                tool_call("c1", "echo", json!({"text": "first"})),
                tool_call("c2", "explode", json!({})),
                tool_call("c3", "echo", json!({"text": "never"})),
            ],
        )]));
        let agent = agent_with(provider, true).await;

        let err = agent.process_message("go").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::ExecutionFailed { .. })));

        let history = agent.get_conversation_history().await;
        let calls = history.iter().find(|m| !m.tool_calls.is_empty()).unwrap();
        assert_eq!(calls.tool_calls.len(), 3);
        assert_eq!(history.iter().filter(|m| m.role == Role::Tool).count(), 1);
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::AuthenticationFailed(
            "bad key".into(),
        )));
        let agent = agent_with(provider, true).await;
        let err = agent.process_message("hello").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn history_reads_are_stable_and_clear_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::text("hi"));
        let agent = agent_with(provider, true).await;
        agent.process_message("hello").await.unwrap();

        assert_eq!(
            agent.get_conversation_history().await,
            agent.get_conversation_history().await
        );

        agent.clear_history(true).await.unwrap();
        let once = agent.get_conversation_history().await;
        agent.clear_history(true).await.unwrap();
        let twice = agent.get_conversation_history().await;
        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
        assert_eq!(once[0].role, Role::System);

        agent.clear_history(false).await.unwrap();
        assert!(agent.get_conversation_history().await.is_empty());
    }

    #[tokio::test]
    async fn max_history_limits_projection() {
        let provider = Arc::new(ScriptedProvider::text("short"));
        let agent = agent_with(provider.clone(), true).await.with_max_history(1);
        agent.process_message("only me").await.unwrap();
        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].content, "only me");
    }

    #[tokio::test]
    async fn rounds_are_persisted_through_manager() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(SessionManager::with_store(cadence_session::SessionStore::new(
            dir.path(),
        )));
        let session = manager
            .create_session("scripted", None, ContextMap::new(), None)
            .await
            .unwrap();
        let id = session.read().await.session_id.clone();
        let provider = Arc::new(ScriptedProvider::text("stored"));
        let agent = LlmAgent::new(provider, ToolExecutor::new(registry(true)), session)
            .with_session_manager(manager);
        agent.process_message("remember").await.unwrap();

        let reloaded = cadence_session::SessionStore::new(dir.path())
            .load(&id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.message_count(), 2);
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::tool_then_text(
            vec![tool_call("c1", "echo", json!({"text": "e"}))],
            "done",
        ));
        let agent = agent_with(provider, true).await.with_event_bus(bus);
        agent.process_message("go").await.unwrap();

        let mut saw_tool = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ToolExecuted { tool_name, .. } = event.as_ref() {
                saw_tool = tool_name == "echo";
            }
        }
        assert!(saw_tool);
    }
}
