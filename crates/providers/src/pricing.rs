//! Per-model token prices for interaction cost estimates.
//!
//! Prices are in USD per 1 million tokens.

use cadence_core::provider::Usage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_m: f64,
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    pub fn cost(&self, usage: &Usage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_per_m
            + usage.completion_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Known model prices, keyed `vendor/model`.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// A table with prices for common hosted models.
    pub fn with_defaults() -> Self {
        let mut table = Self::default();

        // ── Anthropic ──────────────────────────────────────────────
        table.set("anthropic/claude-sonnet-4", ModelPricing::new(3.0, 15.0));
        table.set("anthropic/claude-opus-4", ModelPricing::new(15.0, 75.0));
        table.set("anthropic/claude-3.5-haiku", ModelPricing::new(0.8, 4.0));

        // ── OpenAI ─────────────────────────────────────────────────
        table.set("openai/gpt-4o", ModelPricing::new(2.5, 10.0));
        table.set("openai/gpt-4o-mini", ModelPricing::new(0.15, 0.6));
        table.set("openai/o3-mini", ModelPricing::new(1.1, 4.4));

        // ── Google ─────────────────────────────────────────────────
        table.set("google/gemini-2.0-flash", ModelPricing::new(0.1, 0.4));
        table.set("google/gemini-1.5-pro", ModelPricing::new(1.25, 5.0));

        // ── Others via OpenRouter ──────────────────────────────────
        table.set("meta-llama/llama-3.1-70b", ModelPricing::new(0.52, 0.75));
        table.set("mistral/mistral-large", ModelPricing::new(2.0, 6.0));
        table.set("deepseek/deepseek-v3", ModelPricing::new(0.27, 1.1));

        table
    }

    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Find pricing for `model`.
    ///
    /// Exact match first, then by bare model name (`gpt-4o` finds
    /// `openai/gpt-4o`), then the longest known bare name that prefixes the
    /// model (`gpt-4o-mini-2024-07-18` finds `gpt-4o-mini`).
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(*p);
        }

        let bare_model = bare(model).to_lowercase();
        self.prices
            .iter()
            .filter(|(key, _)| bare_model.starts_with(&bare(key).to_lowercase()))
            .max_by_key(|(key, _)| bare(key).len())
            .map(|(_, p)| *p)
    }

    /// Estimated cost in USD, `None` for unknown models.
    pub fn estimate(&self, model: &str, usage: &Usage) -> Option<f64> {
        self.get(model).map(|p| p.cost(usage))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

fn bare(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}
