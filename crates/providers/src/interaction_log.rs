//! Interaction logging: a side observer around any provider.
//!
//! Every completion is reported through `tracing` and, when a log path is
//! configured, appended as one JSON line:
//!
//! ```json
//! {"timestamp":"...","provider":"openrouter","model":"...","prompt_tokens":812,
//!  "completion_tokens":96,"total_tokens":908,"cost_usd":0.0039,"latency_ms":1430,
//!  "tool_calls":1,"success":true}
//! ```
//!
//! Logging never changes the outcome of a call: write failures are reported
//! with `warn!` and dropped.

use async_trait::async_trait;
use cadence_core::error::ProviderError;
use cadence_core::provider::{CompletionRequest, CompletionResponse, Provider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::pricing::PricingTable;

/// One logged provider interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    pub latency_ms: u64,
    pub tool_calls: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A provider that records each interaction of its inner provider.
pub struct InteractionLogger<P> {
    inner: P,
    log_path: Option<PathBuf>,
    pricing: PricingTable,
    write_lock: Mutex<()>,
}

impl<P: Provider> InteractionLogger<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            log_path: None,
            pricing: PricingTable::with_defaults(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append JSON lines to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn record(
        &self,
        request: &CompletionRequest,
        result: &Result<CompletionResponse, ProviderError>,
        latency_ms: u64,
    ) -> InteractionRecord {
        let requested_model = request
            .model
            .clone()
            .or_else(|| self.inner.default_model().map(String::from))
            .unwrap_or_default();

        match result {
            Ok(response) => {
                let usage = response.usage.unwrap_or_default();
                let model = if response.model.is_empty() {
                    requested_model
                } else {
                    response.model.clone()
                };
                InteractionRecord {
                    timestamp: Utc::now(),
                    provider: self.inner.name().to_string(),
                    cost_usd: self.pricing.estimate(&model, &usage),
                    model,
                    prompt_tokens: usage.prompt_tokens,
                    completion_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                    latency_ms,
                    tool_calls: response.tool_calls.len(),
                    success: true,
                    error: None,
                }
            }
            Err(e) => InteractionRecord {
                timestamp: Utc::now(),
                provider: self.inner.name().to_string(),
                model: requested_model,
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
                cost_usd: None,
                latency_ms,
                tool_calls: 0,
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    async fn append(&self, record: &InteractionRecord) {
        let Some(path) = &self.log_path else {
            return;
        };

        let mut line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize interaction record");
                return;
            }
        };
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %path.display(), error = %e, "Failed to create interaction log directory");
                return;
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await;
        let result = match file {
            Ok(mut file) => file.write_all(line.as_bytes()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write interaction log");
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for InteractionLogger<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> Option<&str> {
        self.inner.default_model()
    }

    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        let result = self.inner.create_completion(request.clone()).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let record = self.record(&request, &result, latency_ms);
        info!(
            provider = %record.provider,
            model = %record.model,
            prompt_tokens = record.prompt_tokens,
            completion_tokens = record.completion_tokens,
            cost_usd = record.cost_usd.unwrap_or(0.0),
            latency_ms = record.latency_ms,
            tool_calls = record.tool_calls,
            success = record.success,
            "Provider interaction"
        );
        self.append(&record).await;

        result
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_agent::testing::ScriptedProvider;
    use cadence_core::provider::Usage;

    #[tokio::test]
    async fn appends_one_line_per_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("interactions.jsonl");
        let mut first = CompletionResponse::text("hi").with_usage(Usage {
            prompt_tokens: 1000,
            completion_tokens: 500,
            total_tokens: 1500,
        });
        first.model = "anthropic/claude-sonnet-4".into();
        let inner = ScriptedProvider::with_results(vec![
            Ok(first),
            Err(ProviderError::Timeout("slow".into())),
        ]);
        let provider = InteractionLogger::new(inner).with_log_file(&path);

        let request =
            CompletionRequest::new(vec![]).with_model(Some("anthropic/claude-sonnet-4".into()));
        provider.create_completion(request.clone()).await.unwrap();
        provider.create_completion(request).await.unwrap_err();

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<InteractionRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);

        assert!(records[0].success);
        assert_eq!(records[0].provider, "scripted");
        assert_eq!(records[0].total_tokens, 1500);
        assert_eq!(records[0].model, "anthropic/claude-sonnet-4");
        assert!((records[0].cost_usd.unwrap() - 0.0105).abs() < 1e-10);

        assert!(!records[1].success);
        assert_eq!(records[1].model, "anthropic/claude-sonnet-4");
        assert!(records[1].error.as_deref().unwrap().contains("slow"));
    }

    #[tokio::test]
    async fn unwritable_log_does_not_affect_result() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be
        let path = dir.path().to_path_buf();
        let provider =
            InteractionLogger::new(ScriptedProvider::text("still fine")).with_log_file(path);
        let response = provider
            .create_completion(CompletionRequest::new(vec![]))
            .await
            .unwrap();
        assert_eq!(response.content, "still fine");
    }

    #[tokio::test]
    async fn without_log_file_nothing_is_written() {
        let provider = InteractionLogger::new(ScriptedProvider::text("ok"));
        assert!(provider.log_path().is_none());
        provider
            .create_completion(CompletionRequest::new(vec![]))
            .await
            .unwrap();
        assert_eq!(provider.inner().calls(), 1);
    }
}
