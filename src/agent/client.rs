//! Provider registry and completion factory.
//!
//! Maps provider names to concrete [`LlmProvider`] implementations and
//! assembles one provider per configured key into a [`CredentialPool`].

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::agent::completion::CompletionService;
use crate::agent::config::EngineConfig;
use crate::agent::pool::{CredentialPool, redact_key};
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::{AgentError, Error};

/// Creates an [`LlmProvider`] for one API key based on the configured
/// provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(
    config: &EngineConfig,
    api_key: &str,
) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config, api_key))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Creates the completion service for `config`.
///
/// Returns `Ok(None)` when no key is configured; the engine then runs in
/// deterministic mode.
///
/// # Errors
///
/// Returns an error for unknown provider names.
pub fn create_completion(
    config: &EngineConfig,
) -> Result<Option<Arc<dyn CompletionService>>, Error> {
    if !config.has_credentials() {
        info!("no API keys configured, running deterministic");
        return Ok(None);
    }

    let members = config
        .api_keys
        .iter()
        .map(|key| Ok((redact_key(key), create_provider(config, key)?)))
        .collect::<Result<Vec<_>, AgentError>>()?;

    let rng = config
        .rng_seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let pool = CredentialPool::new(members, config.pool, Box::new(rng))?;
    info!(
        provider = %config.provider,
        credentials = pool.len(),
        model = %config.model,
        "credential pool ready"
    );
    Ok(Some(Arc::new(pool)))
}
