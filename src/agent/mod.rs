//! Triage agents and the LLM completion layer.
//!
//! One user turn flows through the orchestrator; only the explanation step
//! talks to a language model, through a pool of interchangeable
//! credentials.
//!
//! # Architecture
//!
//! ```text
//! user turn → Orchestrator
//!   ├── DiagnosticAgent (retrieval, follow-up or diagnosis)
//!   ├── RecommendationAgent (advice table + risk modifiers)
//!   └── ExplanationAgent → CompletionService
//!         └── CredentialPool → LlmProvider (one per API key)
//! ```
//!
//! With no credentials configured the orchestrator runs deterministically
//! and explanations are templated.

pub mod client;
pub mod completion;
pub mod config;
pub mod diagnostic;
pub mod explanation;
pub mod message;
pub mod orchestrator;
pub mod pool;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod recommendation;
pub mod sessions;
pub mod traits;

// Re-export key types
pub use client::{create_completion, create_provider};
pub use completion::{CompletionService, StubCompletion};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use diagnostic::{Answer, DiagnosticAgent, DiagnosticOutcome, DialogueConfig, classify_answer};
pub use explanation::{Explanation, ExplanationAgent, ExplanationSource};
pub use message::{ChatMessage, CompletionRequest, CompletionResponse, Role, TokenUsage};
pub use orchestrator::{BundleKind, Orchestrator, ResponseBundle};
pub use pool::{CredentialPool, CredentialSnapshot, CredentialStatus, PoolConfig};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use recommendation::{Recommendation, RecommendationAgent};
pub use sessions::SessionStore;
pub use traits::{Agent, AgentResponse};
