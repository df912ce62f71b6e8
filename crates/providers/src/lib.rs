//! LLM provider implementations for Cadence.
//!
//! All providers implement the `cadence_core::Provider` trait. Wrappers add
//! behaviour around any provider without it knowing:
//!
//! - [`RetryProvider`]: exponential backoff for transient failures
//! - [`InteractionLogger`]: per-call token, cost and latency records
//!
//! The router builds the configured providers with both wrappers applied.

pub mod interaction_log;
pub mod openai_compat;
pub mod pricing;
pub mod retry;
pub mod router;

pub use interaction_log::{InteractionLogger, InteractionRecord};
pub use openai_compat::OpenAiCompatProvider;
pub use pricing::{ModelPricing, PricingTable};
pub use retry::{RetryPolicy, RetryProvider};
pub use router::{ProviderRouter, build_from_config, build_provider};
