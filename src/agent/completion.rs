//! Completion capability consumed by the agents.
//!
//! The orchestrator never talks to a provider directly: it holds an
//! optional [`CompletionService`]. Production wires in the
//! [`CredentialPool`](super::pool::CredentialPool); tests and offline runs
//! use [`StubCompletion`] or no service at all.

use async_trait::async_trait;

use super::message::{CompletionRequest, CompletionResponse};
use crate::error::PoolError;

/// Executes completion requests.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Service name for logs.
    fn name(&self) -> &'static str;

    /// Executes one completion request.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when no reply could be produced.
    async fn execute(&self, request: &CompletionRequest)
    -> Result<CompletionResponse, PoolError>;
}

/// Deterministic completion service.
#[derive(Debug, Clone)]
pub struct StubCompletion {
    reply: Option<String>,
}

impl StubCompletion {
    /// Always answers with `reply`.
    #[must_use]
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    /// Always fails as an exhausted pool would.
    #[must_use]
    pub const fn exhausted() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn execute(
        &self,
        _request: &CompletionRequest,
    ) -> Result<CompletionResponse, PoolError> {
        self.reply.as_ref().map_or(
            Err(PoolError::Exhausted {
                total: 0,
                cooling: 0,
                disabled: 0,
            }),
            |reply| Ok(CompletionResponse::text(reply.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m".to_string(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_stub_replies() {
        let stub = StubCompletion::replying("fine");
        let r = stub.execute(&request()).await;
        assert_eq!(r.map(|r| r.content).ok().as_deref(), Some("fine"));
    }

    #[tokio::test]
    async fn test_stub_exhausted() {
        let r = StubCompletion::exhausted().execute(&request()).await;
        assert!(matches!(r, Err(PoolError::Exhausted { .. })));
    }
}
