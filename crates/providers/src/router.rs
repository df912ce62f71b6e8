//! Provider router: builds the configured providers and picks the default.
//!
//! Every provider is assembled as
//! `RetryProvider<InteractionLogger<OpenAiCompatProvider>>`, so each attempt
//! is logged and transient failures are retried per `[retry]`.

use cadence_config::AppConfig;
use cadence_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::interaction_log::InteractionLogger;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryPolicy, RetryProvider};

/// Named providers plus the one used by default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The default provider, if it was registered.
    pub fn default_provider(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` entry is registered, and the default provider
/// is always present even when it has no section of its own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let mut names: Vec<&String> = config.providers.keys().collect();
    if !config.providers.contains_key(&config.default_provider) {
        names.push(&config.default_provider);
    }

    for name in names {
        router.register(name.clone(), build_provider(config, name));
    }

    router
}

/// Build one fully wrapped provider.
pub fn build_provider(config: &AppConfig, name: &str) -> Arc<dyn Provider> {
    let provider_config = config.providers.get(name);
    let api_key = config.api_key_for(name).unwrap_or_default();
    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));
    let model = provider_config
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());

    debug!(provider = %name, base_url = %base_url, model = %model, "Building provider");

    let base = OpenAiCompatProvider::new(name, base_url, api_key)
        .with_default_model(model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens);

    let mut logged = InteractionLogger::new(base);
    if let Some(path) = &config.logging.interaction_log {
        logged = logged.with_log_file(path);
    }

    Arc::new(RetryProvider::new(
        logged,
        RetryPolicy::from_config(&config.retry),
    ))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
