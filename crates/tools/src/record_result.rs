//! Record result tool: stores a value in the session context.
//!
//! Usually designated as a phase's completion tool: the model calls it once
//! with its finished output, the value lands in the session context under
//! `key`, and the phase picks it up from there.

use async_trait::async_trait;
use cadence_core::context::ContextMap;
use cadence_core::error::ToolError;
use cadence_core::tool::{Tool, ToolExecutionResult, ToolInput, ToolParameter};

pub const RECORD_RESULT_TOOL: &str = "record_result";

pub struct RecordResultTool;

#[async_trait]
impl Tool for RecordResultTool {
    fn name(&self) -> &str {
        RECORD_RESULT_TOOL
    }

    fn description(&self) -> &str {
        "Record the final result of this step. Call once, when the work is done, with the \
         result key and its value."
    }

    fn category(&self) -> &str {
        "workflow"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::new("key", "string")
                .describe("Name under which the result is stored")
                .required(),
            ToolParameter::new("value", "object")
                .describe("The result itself")
                .required(),
        ]
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolExecutionResult, ToolError> {
        let key = match input.str_param("key") {
            Some(k) if !k.trim().is_empty() => k.trim().to_string(),
            _ => {
                return Ok(ToolExecutionResult::failure(vec![
                    "'key' must be a non-empty string".into(),
                ]));
            }
        };

        let Some(value) = input.params.get("value").cloned() else {
            return Ok(ToolExecutionResult::failure(vec![format!(
                "'value' is required to record '{key}'"
            )]));
        };

        let mut updates = ContextMap::new();
        updates.insert(key.clone(), value);
        Ok(
            ToolExecutionResult::ok(serde_json::json!({ "recorded": key }))
                .with_context_updates(updates),
        )
    }
}
