//! Per-turn orchestration of the triage agents.
//!
//! Sequences one user turn through the pipeline:
//! diagnostic step → {follow-up, or recommendation → explanation} →
//! response bundle. Assistant replies are appended to the session's turn
//! history. The orchestrator never fails because of the completion
//! service: pool errors become a degraded bundle.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::completion::CompletionService;
use super::config::EngineConfig;
use super::diagnostic::{DiagnosticAgent, DiagnosticOutcome};
use super::explanation::{Explanation, ExplanationAgent};
use super::prompt::PromptSet;
use super::recommendation::{Recommendation, RecommendationAgent};
use crate::core::{AdviceTier, ConditionId, Diagnosis, FollowUp, RiskModifier, SessionState};
use crate::error::SessionError;
use crate::knowledge::KnowledgeBase;

/// Notice attached to degraded bundles.
pub const DEGRADED_NOTICE: &str =
    "The explanation service is unavailable, so this explanation was produced by built-in rules.";

/// Kind of response bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleKind {
    /// A follow-up question.
    FollowUp,
    /// A diagnosis with advice and explanation.
    Diagnosis,
    /// A diagnosis whose explanation fell back to the template.
    Degraded,
}

impl BundleKind {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FollowUp => "follow_up",
            Self::Diagnosis => "diagnosis",
            Self::Degraded => "degraded",
        }
    }
}

/// Everything the caller needs to render one assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseBundle {
    /// Bundle kind.
    pub kind: BundleKind,
    /// Assistant reply text.
    pub text: String,
    /// Advice tier, for diagnoses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_tier: Option<AdviceTier>,
    /// Advice text, for diagnoses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
    /// Explanation, for diagnoses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
    /// Diagnosed condition. Absent when undetermined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionId>,
    /// Profile attributes that escalated the advice.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub risk_modifiers: Vec<RiskModifier>,
    /// The diagnosis was forced by the follow-up cap.
    pub forced_diagnosis: bool,
    /// Follow-ups asked so far.
    pub follow_ups_asked: u32,
    /// Follow-up cap.
    pub max_follow_ups: u32,
    /// User-facing notice, for degraded bundles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Runs sessions against a loaded knowledge base.
pub struct Orchestrator {
    knowledge: Arc<KnowledgeBase>,
    completion: Option<Arc<dyn CompletionService>>,
    config: EngineConfig,
    prompts: PromptSet,
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from [`EngineConfig::prompt_dir`], falling
    /// back to compiled-in defaults. `completion = None` runs the
    /// deterministic mode.
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        completion: Option<Arc<dyn CompletionService>>,
        config: EngineConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(knowledge, completion, config, prompts)
    }

    /// Creates an orchestrator with explicit prompts.
    pub fn with_prompts(
        knowledge: Arc<KnowledgeBase>,
        completion: Option<Arc<dyn CompletionService>>,
        config: EngineConfig,
        prompts: PromptSet,
    ) -> Self {
        info!(
            records = knowledge.index.len(),
            mode = %knowledge.index.mode(),
            completion = completion.as_ref().map_or("none", |c| c.name()),
            max_follow_ups = config.dialogue.max_follow_ups,
            "orchestrator ready"
        );
        Self {
            knowledge,
            completion,
            config,
            prompts,
        }
    }

    /// The knowledge base.
    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a completion service is configured.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.completion.is_none()
    }

    /// Handles one user turn.
    ///
    /// Once the session is diagnosed every further turn re-derives the same
    /// recommendation and explanation without re-diagnosing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Malformed`] if `state` violates the dialogue
    /// state machine.
    pub async fn step(
        &self,
        state: &mut SessionState,
        user_text: &str,
    ) -> Result<ResponseBundle, SessionError> {
        if state.is_diagnosed() {
            let diagnosis = state
                .diagnosis
                .clone()
                .ok_or_else(|| SessionError::malformed("diagnosed without a diagnosis"))?;
            debug!(session = %state.session_id, "turn after diagnosis");
            state.push_user(user_text);
            let bundle = self.conclude(state, &diagnosis).await;
            state.push_assistant(bundle.text.clone());
            return Ok(bundle);
        }

        let agent = DiagnosticAgent::new(
            &self.knowledge.index,
            &self.config.dialogue,
            &self.knowledge.generic_questions,
        );
        let bundle = match agent.step(state, user_text)? {
            DiagnosticOutcome::FollowUp(follow_up) => self.follow_up_bundle(state, follow_up),
            DiagnosticOutcome::Diagnosis(diagnosis) => self.conclude(state, &diagnosis).await,
        };
        state.push_assistant(bundle.text.clone());
        Ok(bundle)
    }

    fn follow_up_bundle(&self, state: &SessionState, follow_up: FollowUp) -> ResponseBundle {
        ResponseBundle {
            kind: BundleKind::FollowUp,
            text: follow_up.text,
            advice_tier: None,
            advice: None,
            explanation: None,
            condition: None,
            risk_modifiers: Vec::new(),
            forced_diagnosis: false,
            follow_ups_asked: state.follow_ups_asked,
            max_follow_ups: self.config.dialogue.max_follow_ups,
            notice: None,
        }
    }

    /// Builds the diagnosis bundle: recommendation, then explanation.
    async fn conclude(&self, state: &SessionState, diagnosis: &Diagnosis) -> ResponseBundle {
        let recommendation = RecommendationAgent::new(&self.knowledge.advice, &self.knowledge.risk)
            .recommend(diagnosis.condition.as_ref(), &state.profile);

        let explainer = ExplanationAgent::new(
            &self.config.model,
            &self.prompts.explanation,
            self.config.explanation_max_tokens,
        );
        let explanation = explainer
            .explain(
                self.completion.as_deref(),
                diagnosis,
                &recommendation,
                &state.transcript(),
            )
            .await;

        let (kind, notice) = if explanation.degraded {
            warn!(session = %state.session_id, "degraded diagnosis bundle");
            (BundleKind::Degraded, Some(DEGRADED_NOTICE.to_string()))
        } else {
            (BundleKind::Diagnosis, None)
        };

        info!(
            session = %state.session_id,
            kind = kind.as_str(),
            condition = diagnosis.condition.as_ref().map(ConditionId::as_str),
            tier = %recommendation.tier,
            forced = diagnosis.forced,
            "diagnosis bundle"
        );

        let Recommendation {
            tier,
            advice,
            modifiers,
            ..
        } = recommendation;
        ResponseBundle {
            kind,
            text: diagnosis_text(diagnosis, &advice),
            advice_tier: Some(tier),
            advice: Some(advice),
            explanation: Some(explanation),
            condition: diagnosis.condition.clone(),
            risk_modifiers: modifiers,
            forced_diagnosis: diagnosis.forced,
            follow_ups_asked: diagnosis.follow_ups_asked,
            max_follow_ups: self.config.dialogue.max_follow_ups,
            notice,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("index", &self.knowledge.index)
            .field(
                "completion",
                &self.completion.as_ref().map(|c| c.name()),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn diagnosis_text(diagnosis: &Diagnosis, advice: &str) -> String {
    diagnosis.condition.as_ref().map_or_else(
        || format!("I couldn't narrow your symptoms down to a specific condition. {advice}"),
        |condition| format!("Based on what you've told me, the most likely condition is {condition}. {advice}"),
    )
}
