//! The conversation session value type.

use cadence_core::context::{ContextMap, merge_context};
use cadence_core::message::{ConversationMessage, LlmMessage, Role, ToolResultRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordered message history plus free-form context for one conversation.
///
/// This is also the persisted shape: one file holds exactly one serialized
/// session, enough to reconstruct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,

    pub provider_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Phase / business state visible to context-aware tools
    #[serde(default)]
    pub context: ContextMap,

    /// Context keys written through `update_context`, as opposed to seeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_keys: Vec<String>,

    #[serde(default)]
    pub messages: Vec<ConversationMessage>,

    pub created_at: DateTime<Utc>,

    pub last_activity: DateTime<Utc>,
}

impl ConversationSession {
    /// Create an empty session with a freshly minted id.
    pub fn new(provider_name: impl Into<String>, model: Option<String>, context: ContextMap) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            provider_name: provider_name.into(),
            model,
            context,
            updated_keys: Vec::new(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Append a message and bump `last_activity`.
    pub fn add_message(&mut self, message: ConversationMessage) {
        self.last_activity = Utc::now();
        self.messages.push(message);
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(ConversationMessage::user(content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(ConversationMessage::assistant(content));
    }

    /// Append a `tool` message answering one call.
    pub fn add_tool_message(&mut self, content: impl Into<String>, result: ToolResultRef) {
        self.add_message(ConversationMessage::tool(content, result));
    }

    /// Shallow-merge `updates` into the session context.
    pub fn update_context(&mut self, updates: &ContextMap) {
        merge_context(&mut self.context, updates);
        for key in updates.keys() {
            if !self.updated_keys.contains(key) {
                self.updated_keys.push(key.clone());
            }
        }
        self.last_activity = Utc::now();
    }

    /// A context value written during this session, ignoring seeded values.
    pub fn updated_value(&self, key: &str) -> Option<&serde_json::Value> {
        if self.updated_keys.iter().any(|k| k == key) {
            self.context.get(key)
        } else {
            None
        }
    }

    /// Project the last `max_messages` messages (all when `None`), oldest
    /// first, into the provider-facing shape.
    pub fn get_messages_for_llm(&self, max_messages: Option<usize>) -> Vec<LlmMessage> {
        let skip = max_messages
            .map(|max| self.messages.len().saturating_sub(max))
            .unwrap_or(0);
        self.messages.iter().skip(skip).map(|m| m.to_llm()).collect()
    }

    /// Drop all messages, or all but the system-role ones.
    pub fn clear_messages(&mut self, keep_system: bool) {
        if keep_system {
            self.messages.retain(|m| m.role == Role::System);
        } else {
            self.messages.clear();
        }
        self.last_activity = Utc::now();
    }

    /// The first system message, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// The most recent assistant message that is not a tool-call request.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
