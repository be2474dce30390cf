//! LLM integration for the relay.
//!
//! The classifier talks to an `LlmProvider`; `AnthropicProvider` is the
//! production implementation, calling the Messages API over reqwest.

mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::LlmError;

/// Create the LLM provider from configuration.
pub fn create_provider(config: &RelayConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = AnthropicProvider::new(
        config.api_key.clone(),
        config.llm_base_url.clone(),
        config.model.clone(),
    )?;
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(provider))
}
