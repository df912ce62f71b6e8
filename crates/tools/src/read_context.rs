//! Read context tool: lets the model look at the session context.

use async_trait::async_trait;
use cadence_core::error::ToolError;
use cadence_core::tool::{Tool, ToolExecutionResult, ToolInput, ToolParameter};

pub const READ_CONTEXT_TOOL: &str = "read_context";

pub struct ReadContextTool;

#[async_trait]
impl Tool for ReadContextTool {
    fn name(&self) -> &str {
        READ_CONTEXT_TOOL
    }

    fn description(&self) -> &str {
        "Read data produced by earlier steps. Pass a key for one value, or no key for everything."
    }

    fn category(&self) -> &str {
        "workflow"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::new("key", "string").describe("Single key to read")]
    }

    fn accepts_session_context(&self) -> bool {
        true
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolExecutionResult, ToolError> {
        let context = input.session_context.clone().unwrap_or_default();

        match input.str_param("key") {
            None => Ok(ToolExecutionResult::ok(serde_json::Value::Object(context))),
            Some(key) => match context.get(key) {
                Some(value) => Ok(ToolExecutionResult::ok(value.clone())),
                None => {
                    let mut known: Vec<&str> = context.keys().map(String::as_str).collect();
                    known.sort_unstable();
                    Ok(ToolExecutionResult::failure(vec![format!(
                        "no value for '{key}' (available: {})",
                        known.join(", ")
                    )]))
                }
            },
        }
    }
}
