//! Provider trait: the abstraction over LLM backends.
//!
//! A provider adapts one vendor wire format to [`Provider::create_completion`].
//! Retry, backoff and interaction logging are layered on as wrappers in
//! `cadence-providers`; the agent loop only ever sees this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::LlmMessage;
pub use crate::message::ToolCall;
use crate::tool::ToolDefinition;

/// A single completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered conversation history, oldest first
    pub messages: Vec<LlmMessage>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Require the model to call a tool this turn
    #[serde(default)]
    pub force_tool_call: bool,

    /// Model override; providers fall back to their configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            force_tool_call: false,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn force_tool_call(mut self, force: bool) -> Self {
        self.force_tool_call = force;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Text content (may be empty when the model only calls tools)
    #[serde(default)]
    pub content: String,

    /// Canonical tool calls, in model order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,

    /// Provider-specific metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CompletionResponse {
    /// A plain text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A response requesting tool calls.
    pub fn tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this. The agent loop calls
/// `create_completion()` without knowing which vendor sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// The model used when a request does not override it.
    fn default_model(&self) -> Option<&str> {
        None
    }

    /// Send a request and get a complete response.
    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn request_builder_defaults() {
        let req = CompletionRequest::new(vec![LlmMessage {
            role: Role::User,
            content: "hi".into(),
            tool_calls: vec![],
            tool_results: vec![],
        }]);
        assert!(!req.force_tool_call);
        assert!(req.tools.is_empty());
        assert!(req.model.is_none());
    }

    #[test]
    fn response_helpers() {
        let text = CompletionResponse::text("done");
        assert!(!text.has_tool_calls());

        let calls = CompletionResponse::tool_calls(
            "",
            vec![ToolCall::new("c1", "lookup", serde_json::Map::new())],
        )
        .with_usage(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        assert!(calls.has_tool_calls());
        assert_eq!(calls.usage.map(|u| u.total_tokens), Some(15));
    }
}
