//! Scripted provider for exercising agents and workflows without a network.

use async_trait::async_trait;
use cadence_core::error::ProviderError;
use cadence_core::message::ToolCall;
use cadence_core::provider::{CompletionRequest, CompletionResponse, Provider, Usage};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Usage attached to every scripted response that doesn't carry its own.
pub const SCRIPTED_USAGE: Usage = Usage {
    prompt_tokens: 10,
    completion_tokens: 5,
    total_tokens: 15,
};

/// A provider that replays a queue of responses in order.
///
/// Every request is recorded. Once the queue is empty further calls fail
/// with [`ProviderError::NotConfigured`] instead of panicking, so a test
/// sees an over-long loop as an ordinary error.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    repeat_error: Option<ProviderError>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Script successes and failures in any order.
    pub fn with_results(results: Vec<Result<CompletionResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            repeat_error: None,
        }
    }

    /// A single plain-text answer.
    pub fn text(content: &str) -> Self {
        Self::new(vec![CompletionResponse::text(content)])
    }

    /// One round of tool calls, then a plain-text answer.
    pub fn tool_then_text(calls: Vec<ToolCall>, answer: &str) -> Self {
        Self::new(vec![
            CompletionResponse::tool_calls("", calls),
            CompletionResponse::text(answer),
        ])
    }

    /// Fails every call with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            repeat_error: Some(error),
        }
    }

    /// Append another response to the end of the script.
    pub fn push(&self, response: CompletionResponse) {
        lock(&self.responses).push_back(Ok(response));
    }

    /// Number of completion requests received so far.
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    /// Responses not yet consumed.
    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let call = {
            let mut requests = lock(&self.requests);
            requests.push(request);
            requests.len()
        };

        if let Some(error) = &self.repeat_error {
            return Err(error.clone());
        }

        match lock(&self.responses).pop_front() {
            Some(Ok(mut response)) => {
                if response.usage.is_none() {
                    response.usage = Some(SCRIPTED_USAGE);
                }
                if response.model.is_empty() {
                    response.model = "scripted-model".into();
                }
                Ok(response)
            }
            Some(Err(error)) => Err(error),
            None => Err(ProviderError::NotConfigured(format!(
                "scripted provider exhausted at call #{call}"
            ))),
        }
    }
}

/// Build a tool call with object arguments.
pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
    let arguments = match arguments {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    ToolCall::new(id, name, arguments)
}
