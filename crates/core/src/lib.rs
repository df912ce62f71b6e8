//! # Cadence Core
//!
//! Domain types, traits, and error definitions for the Cadence workflow engine.
//! This crate has **no framework dependencies**: it defines the conversation,
//! tool, and provider model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`message`]: conversation messages and the provider-facing projection
//! - [`context`]: the open context map shared between phases and tools
//! - [`tool`]: the tool contract, definitions, results and registry
//! - [`provider`]: the completion contract every LLM adapter implements
//! - [`event`]: broadcast domain events for optional observers

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{ContextKey, ContextMap};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationMessage, LlmMessage, Role, ToolResultRef};
pub use provider::{CompletionRequest, CompletionResponse, Provider, ToolCall, Usage};
pub use tool::{
    ResultFormat, Tool, ToolDefinition, ToolExecutionResult, ToolInput, ToolParameter,
    ToolRegistry,
};
