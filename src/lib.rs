//! # triage-rs
//!
//! Symptom triage dialogue engine.
//!
//! A session collects free-text symptom descriptions, asks follow-up
//! questions grounded in a symptom knowledge base, commits to a diagnosis
//! within a bounded number of follow-ups, and returns an advice tier with a
//! rationale. The rationale can be generated by an OpenAI-compatible model
//! reached through a pool of interchangeable API keys; when every key is
//! cooling down or disabled the engine degrades to templated explanations.
//!
//! ## Architecture
//!
//! - [`knowledge`]: loads and validates the knowledge file
//! - [`search`]: semantic or keyword symptom retrieval
//! - [`embedding`]: optional embedding backend
//! - [`agent`]: dialogue agents, orchestrator, credential pool, providers
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triage_rs::agent::{EngineConfig, Orchestrator};
//! use triage_rs::core::{Profile, SessionState};
//! use triage_rs::knowledge::KnowledgeBase;
//!
//! # async fn run() -> triage_rs::Result<()> {
//! let knowledge = Arc::new(KnowledgeBase::bundled()?);
//! let orchestrator = Orchestrator::new(knowledge, None, EngineConfig::default());
//! let mut state = SessionState::new(Profile::with_age(40));
//! let reply = orchestrator.step(&mut state, "I have a fever").await?;
//! assert!(!reply.text.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod search;

pub use error::{Error, Result};
