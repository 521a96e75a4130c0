//! Agent trait for completion-backed agents.
//!
//! Agents that need generated text implement this trait, which gives the
//! orchestrator a uniform way to run them against any
//! [`CompletionService`]. The rule-based agents (diagnostic,
//! recommendation) are plain structs and do not implement it.

use async_trait::async_trait;

use super::completion::CompletionService;
use super::message::{CompletionRequest, TokenUsage, system_message, user_message};
use crate::error::PoolError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by completion-backed agents.
///
/// An agent has a fixed system prompt and model configuration. The
/// orchestrator calls [`Agent::execute`] with the service it holds.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] when the service cannot produce a reply.
    async fn execute(
        &self,
        service: &dyn CompletionService,
        user_msg: &str,
    ) -> Result<AgentResponse, PoolError> {
        let request = CompletionRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
        };

        let response = service.execute(&request).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}
