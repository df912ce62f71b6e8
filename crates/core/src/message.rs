//! Conversation message types.
//!
//! A [`ConversationMessage`] is what a session stores. An [`LlmMessage`] is the
//! generic projection handed to providers: same role/content/tool metadata, no
//! timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::tool::ResultFormat;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (phase prompt)
    System,
    /// The user / workflow driving the phase
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model, in canonical form.
///
/// Providers normalize whatever their wire format uses into this shape via
/// [`ToolCall::from_raw`]; the agent loop never sees anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the provider's tool_call id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Named arguments
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Normalize a raw tool call object from a provider.
    ///
    /// Accepts the argument payload under either `"arguments"` or
    /// `"parameters"`, as a JSON object or a JSON-encoded string. An OpenAI
    /// style `{"function": {"name", "arguments"}}` envelope is unwrapped. A
    /// missing id gets a generated one.
    pub fn from_raw(raw: &serde_json::Value) -> Result<Self, ProviderError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ProviderError::InvalidResponse("tool call is not an object".into()))?;

        let body = obj
            .get("function")
            .and_then(|f| f.as_object())
            .unwrap_or(obj);

        let name = body
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("tool call has no name".into()))?;

        let id = obj
            .get("id")
            .and_then(|i| i.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

        let payload = body.get("arguments").or_else(|| body.get("parameters"));
        let arguments = match payload {
            None | Some(serde_json::Value::Null) => serde_json::Map::new(),
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => serde_json::Map::new(),
            Some(serde_json::Value::String(s)) => {
                match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(serde_json::Value::Object(map)) => map,
                    Ok(other) => {
                        return Err(ProviderError::InvalidResponse(format!(
                            "arguments for '{name}' decode to {other}, expected an object"
                        )));
                    }
                    Err(e) => {
                        return Err(ProviderError::InvalidResponse(format!(
                            "arguments for '{name}' are not valid JSON: {e}"
                        )));
                    }
                }
            }
            Some(other) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "arguments for '{name}' must be an object, got {other}"
                )));
            }
        };

        Ok(Self {
            id,
            name: name.to_string(),
            arguments,
        })
    }
}

/// Reference from a `tool` message back to the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRef {
    pub tool_call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub format: ResultFormat,
}

/// A single message in a conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant, in model order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// For `tool` messages: which call(s) this result answers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResultRef>,

    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message carrying the model's tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(Role::Assistant, content)
        }
    }

    /// Create a tool result message answering one call.
    pub fn tool(content: impl Into<String>, result: ToolResultRef) -> Self {
        Self {
            tool_results: vec![result],
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Project into the provider-facing shape.
    pub fn to_llm(&self) -> LlmMessage {
        LlmMessage {
            role: self.role,
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_results: self.tool_results.clone(),
        }
    }
}

/// The generic message shape consumed by providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResultRef>,
}
