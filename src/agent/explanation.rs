//! Rationale for a committed diagnosis.
//!
//! With a completion service the explanation is generated from the
//! diagnostic trail. Without one, or when the service fails or returns
//! nothing, a templated explanation is built from the same trail.

use std::fmt::Write;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::completion::CompletionService;
use super::prompt::build_explanation_prompt;
use super::recommendation::Recommendation;
use super::traits::Agent;
use crate::core::{AdviceTier, Diagnosis};

/// Default max tokens for a generated explanation.
pub const DEFAULT_EXPLANATION_MAX_TOKENS: u32 = 400;

/// Where an explanation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationSource {
    /// Produced by the completion service.
    Generated,
    /// Built from the templated fallback.
    Templated,
}

/// An explanation for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// Explanation text.
    pub text: String,
    /// Origin of the text.
    pub source: ExplanationSource,
    /// The completion service failed and the fallback was used.
    pub degraded: bool,
}

/// Completion-backed explanation agent.
#[derive(Debug, Clone)]
pub struct ExplanationAgent<'a> {
    model: &'a str,
    system_prompt: &'a str,
    max_tokens: u32,
}

impl<'a> ExplanationAgent<'a> {
    /// Creates an explanation agent.
    #[must_use]
    pub const fn new(model: &'a str, system_prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            model,
            system_prompt,
            max_tokens,
        }
    }

    /// Explains `diagnosis` and `recommendation`.
    ///
    /// Never fails: any service error yields the templated explanation with
    /// `degraded` set.
    pub async fn explain(
        &self,
        service: Option<&dyn CompletionService>,
        diagnosis: &Diagnosis,
        recommendation: &Recommendation,
        transcript: &str,
    ) -> Explanation {
        let Some(service) = service else {
            return templated(diagnosis, recommendation, false);
        };

        let prompt = build_explanation_prompt(diagnosis, recommendation, transcript);
        match self.execute(service, &prompt).await {
            Ok(response) if !response.content.trim().is_empty() => {
                debug!(
                    agent = self.name(),
                    service = service.name(),
                    tokens = response.usage.total_tokens,
                    finish_reason = response.finish_reason.as_deref(),
                    "explanation generated"
                );
                Explanation {
                    text: response.content.trim().to_string(),
                    source: ExplanationSource::Generated,
                    degraded: false,
                }
            }
            Ok(_) => {
                warn!(agent = self.name(), "empty explanation reply, using template");
                templated(diagnosis, recommendation, false)
            }
            Err(e) => {
                warn!(agent = self.name(), error = %e, "explanation failed, using template");
                templated(diagnosis, recommendation, true)
            }
        }
    }
}

#[async_trait]
impl Agent for ExplanationAgent<'_> {
    fn name(&self) -> &'static str {
        "explanation"
    }

    fn model(&self) -> &str {
        self.model
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.3
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

const fn tier_phrase(tier: AdviceTier) -> &'static str {
    match tier {
        AdviceTier::SelfCare => "self-care at home",
        AdviceTier::Monitor => "monitoring your symptoms",
        AdviceTier::SeeDoctor => "seeing a doctor",
        AdviceTier::Emergency => "emergency care",
    }
}

fn plural(n: u32, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Builds the deterministic explanation for a diagnosis.
#[must_use]
pub fn templated(diagnosis: &Diagnosis, recommendation: &Recommendation, degraded: bool) -> Explanation {
    let questions = plural(diagnosis.follow_ups_asked, "follow-up question", "follow-up questions");
    let symptoms: Vec<String> = diagnosis.evidence.iter().map(|e| e.text.clone()).collect();

    let mut text = match &diagnosis.condition {
        Some(condition) if !symptoms.is_empty() => format!(
            "The symptoms you described ({}) are most consistent with {condition}. \
             This was reached after {questions}.",
            join_list(&symptoms)
        ),
        Some(condition) => format!(
            "Your description is most consistent with {condition}. \
             This was reached after {questions}."
        ),
        None => format!(
            "Your symptoms could not be matched to a specific condition after {questions}."
        ),
    };

    if diagnosis.forced && diagnosis.condition.is_some() {
        text.push_str(" The follow-up limit was reached before the match became confident, so treat it as tentative.");
    }

    if recommendation.escalated() {
        let factors: Vec<String> = recommendation.modifiers.iter().map(ToString::to_string).collect();
        let _ = write!(
            text,
            " This usually calls for {}, but because of {} the advice is {}.",
            tier_phrase(recommendation.base_tier),
            join_list(&factors),
            tier_phrase(recommendation.tier)
        );
    } else if diagnosis.condition.is_none() {
        let _ = write!(
            text,
            " When the cause is unclear, the safe advice is {}.",
            tier_phrase(recommendation.tier)
        );
    } else {
        let _ = write!(
            text,
            " The recommended course is {}.",
            tier_phrase(recommendation.tier)
        );
    }
    text.push_str(" This is not a medical diagnosis.");

    Explanation {
        text,
        source: ExplanationSource::Templated,
        degraded,
    }
}
