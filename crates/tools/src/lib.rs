//! Tool execution layer for Cadence.
//!
//! Domain tools live with the applications that need them. This crate
//! decides which of them an agent may call, moves session context in and out
//! of each call, and ships two workflow-level tools every application can use.

pub mod allowlist;
pub mod executor;
pub mod read_context;
pub mod record_result;

use cadence_core::error::ToolError;
use cadence_core::tool::ToolRegistry;

pub use allowlist::{AllowCheck, ToolAllowlist};
pub use executor::{SESSION_CONTEXT_PARAM, ToolExecutor};
pub use read_context::{READ_CONTEXT_TOOL, ReadContextTool};
pub use record_result::{RECORD_RESULT_TOOL, RecordResultTool};

/// Register the built-in workflow tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(RecordResultTool)?;
    registry.register(ReadContextTool)?;
    Ok(())
}
