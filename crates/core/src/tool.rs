//! Tool trait: the abstraction over capabilities a model may invoke.
//!
//! Concrete tools (analytics, workout selection, report generation) live
//! outside the engine. They describe themselves with a [`ToolDefinition`] and
//! return a [`ToolExecutionResult`]; the [`ToolRegistry`] resolves names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::ContextMap;
use crate::error::ToolError;

/// Metadata key under which a tool reports context changes.
pub const CONTEXT_UPDATES_KEY: &str = "context_updates";

/// Format tag describing a tool result payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Json,
    Text,
    Markdown,
    Csv,
    Html,
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,

    /// JSON Schema type (`string`, `number`, `integer`, `boolean`, `array`, `object`)
    #[serde(rename = "type")]
    pub param_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    /// Allowed values, if restricted
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Item schema for array parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<serde_json::Value>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: String::new(),
            required: false,
            enum_values: None,
            items: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn items(mut self, items: serde_json::Value) -> Self {
        self.items = Some(items);
        self
    }

    fn to_schema(&self) -> serde_json::Value {
        let mut schema = serde_json::json!({ "type": self.param_type });
        if !self.description.is_empty() {
            schema["description"] = serde_json::json!(self.description);
        }
        if let Some(values) = &self.enum_values {
            schema["enum"] = serde_json::json!(values);
        }
        if let Some(items) = &self.items {
            schema["items"] = items.clone();
        }
        schema
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Shape of the returned data, informational
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<serde_json::Value>,
}

fn default_category() -> String {
    "general".into()
}

impl ToolDefinition {
    /// JSON Schema object for the tool's parameters.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.to_schema());
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// The outcome of running a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub success: bool,

    /// Opaque payload
    #[serde(default)]
    pub data: serde_json::Value,

    #[serde(default)]
    pub format: ResultFormat,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    /// Optional metadata; may carry `context_updates`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ContextMap>,
}

impl ToolExecutionResult {
    /// A successful JSON result.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            format: ResultFormat::Json,
            errors: Vec::new(),
            metadata: None,
        }
    }

    /// A successful plain-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            format: ResultFormat::Text,
            ..Self::ok(serde_json::Value::String(text.into()))
        }
    }

    /// A failed result.
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            format: ResultFormat::Text,
            errors,
            metadata: None,
        }
    }

    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    /// Attach `metadata.context_updates`.
    pub fn with_context_updates(mut self, updates: ContextMap) -> Self {
        self.metadata
            .get_or_insert_with(ContextMap::new)
            .insert(CONTEXT_UPDATES_KEY.into(), serde_json::Value::Object(updates));
        self
    }

    /// `metadata.context_updates`, when present and an object.
    pub fn context_updates(&self) -> Option<&ContextMap> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(CONTEXT_UPDATES_KEY))
            .and_then(|v| v.as_object())
    }

    /// Text fed back to the model as the `tool` message content.
    pub fn to_message_content(&self, tool_name: &str) -> String {
        if self.success {
            match &self.data {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            }
        } else if self.errors.is_empty() {
            format!("Error executing tool '{tool_name}': unknown error")
        } else {
            format!(
                "Error executing tool '{tool_name}': {}",
                self.errors.join("; ")
            )
        }
    }
}

/// Input handed to a tool: named parameters plus, for context-aware tools,
/// the session context.
#[derive(Debug, Clone, Default)]
pub struct ToolInput {
    pub params: ContextMap,
    pub session_context: Option<ContextMap>,
}

impl ToolInput {
    pub fn new(params: ContextMap) -> Self {
        Self {
            params,
            session_context: None,
        }
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_str())
    }

    /// A required string parameter. The executor turns the resulting
    /// `InvalidArguments` into a failed result the model can react to.
    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str_param(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("missing string parameter '{name}'")))
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    fn category(&self) -> &str {
        "general"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        Vec::new()
    }

    fn returns(&self) -> Option<serde_json::Value> {
        None
    }

    /// Opt in to receiving the session context on every call.
    fn accepts_session_context(&self) -> bool {
        false
    }

    /// Execute the tool.
    ///
    /// A tool that ran but could not do its job returns `Ok` with a failed
    /// result. `Err` is reserved for faults the caller must see.
    async fn execute(&self, input: ToolInput) -> Result<ToolExecutionResult, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            category: self.category().to_string(),
            parameters: self.parameters(),
            returns: self.returns(),
        }
    }
}

/// A registry of available tools, keyed by unique name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
