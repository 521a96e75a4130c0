//! Pluggable LLM provider trait.
//!
//! One provider instance wraps one credential. Implementations translate
//! [`CompletionRequest`]/[`CompletionResponse`] into SDK calls and classify
//! every failure with a [`FailureKind`](crate::error::FailureKind) so the
//! credential pool can decide whether to cool down, disable or give up.

use async_trait::async_trait;

use super::message::{CompletionRequest, CompletionResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Provider`] with a failure classification on
    /// API, transport or parse failures.
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AgentError>;
}
