//! Tool execution with allow-list enforcement and session-context plumbing.
//!
//! The executor sits between the agent loop and the [`ToolRegistry`]:
//!
//! 1. Unknown or filtered tool names come back as failed results, so the model
//!    sees the problem and can try something else.
//! 2. Context-aware tools receive the bound session's context, unless the
//!    caller passed an explicit `session_context`, which always wins.
//! 3. A successful result carrying `metadata.context_updates` is merged into
//!    the session context. Failed results never touch the context.

use cadence_core::context::ContextMap;
use cadence_core::error::ToolError;
use cadence_core::tool::{ToolDefinition, ToolExecutionResult, ToolInput, ToolRegistry};
use cadence_session::SessionHandle;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::allowlist::{AllowCheck, ToolAllowlist};

/// Parameter name reserved for an explicit session context.
pub const SESSION_CONTEXT_PARAM: &str = "session_context";

/// Resolves tool names and runs tools on behalf of one agent.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    allowlist: ToolAllowlist,
    session: Option<SessionHandle>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            allowlist: ToolAllowlist::Unrestricted,
            session: None,
        }
    }

    /// Restrict the visible and callable tools.
    pub fn with_allowlist(mut self, allowlist: ToolAllowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Bind to a session for context injection and updates.
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn allowlist(&self) -> &ToolAllowlist {
        &self.allowlist
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Definitions of the tools this executor lets the model see.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        self.registry
            .definitions()
            .into_iter()
            .filter(|d| self.allowlist.allows(&d.name))
            .collect()
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.registry.contains(name) && self.allowlist.allows(name)
    }

    /// Execute a tool by name.
    ///
    /// `params` may carry an explicit `session_context` object; it is removed
    /// from the named parameters and handed to the tool in place of the bound
    /// session's context.
    ///
    /// Returns `Err` only when the tool itself faults. Availability problems,
    /// malformed arguments and tool-reported failures are `Ok` with
    /// `success == false`, so the model sees them and can try again.
    pub async fn execute_tool(
        &self,
        name: &str,
        mut params: ContextMap,
    ) -> Result<ToolExecutionResult, ToolError> {
        if let AllowCheck::Denied { reason, .. } = self.allowlist.check(name) {
            warn!(tool = %name, "Tool call rejected by allow-list");
            return Ok(ToolExecutionResult::failure(vec![format!(
                "Tool '{name}' is not available: {reason}"
            )]));
        }

        let tool = match self.registry.get(name) {
            Ok(tool) => tool,
            Err(_) => {
                warn!(tool = %name, "Tool call for unregistered tool");
                return Ok(ToolExecutionResult::failure(vec![format!(
                    "Tool '{name}' is not available: no such tool is registered"
                )]));
            }
        };

        let explicit_context = match params.remove(SESSION_CONTEXT_PARAM) {
            Some(serde_json::Value::Object(map)) => Some(map),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => {
                warn!(tool = %name, "Rejected non-object session_context argument");
                return Ok(ToolExecutionResult::failure(vec![format!(
                    "'{SESSION_CONTEXT_PARAM}' must be an object, got {other}"
                )]));
            }
        };

        let session_context = if tool.accepts_session_context() {
            match explicit_context {
                Some(ctx) => Some(ctx),
                None => match &self.session {
                    Some(handle) => Some(handle.read().await.context.clone()),
                    None => None,
                },
            }
        } else {
            None
        };

        debug!(
            tool = %name,
            params = params.len(),
            with_context = session_context.is_some(),
            "Executing tool"
        );

        let input = ToolInput {
            params,
            session_context,
        };
        let result = match tool.execute(input).await {
            Ok(result) => result,
            // Arguments come from the model, so it gets a chance to fix them
            Err(ToolError::InvalidArguments(reason)) => {
                warn!(tool = %name, reason = %reason, "Tool rejected its arguments");
                return Ok(ToolExecutionResult::failure(vec![format!(
                    "Invalid arguments for '{name}': {reason}"
                )]));
            }
            Err(e) => return Err(e),
        };

        if result.success {
            self.apply_context_updates(name, &result).await;
        } else {
            debug!(tool = %name, errors = ?result.errors, "Tool reported failure");
        }

        Ok(result)
    }

    async fn apply_context_updates(&self, name: &str, result: &ToolExecutionResult) {
        let Some(updates) = result.context_updates() else {
            return;
        };
        let Some(handle) = &self.session else {
            debug!(tool = %name, "Context updates ignored: executor not bound to a session");
            return;
        };

        let mut session = handle.write().await;
        session.update_context(updates);
        info!(
            tool = %name,
            session_id = %session.session_id,
            keys = ?updates.keys().collect::<Vec<_>>(),
            "Session context updated"
        );
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("registry", &self.registry)
            .field("allowlist", &self.allowlist)
            .field("bound", &self.session.is_some())
            .finish()
    }
}
