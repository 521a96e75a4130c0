//! Per-session dialogue state.

use std::collections::BTreeSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::Profile;
use super::symptom::{ConditionId, SymptomId};

/// Session identifier.
pub type SessionId = Uuid;

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The patient.
    User,
    /// The triage assistant.
    Assistant,
}

/// One dialogue turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker.
    pub speaker: Speaker,
    /// Turn text.
    pub text: String,
}

/// Dialogue state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Gathering evidence.
    #[default]
    Collecting,
    /// A follow-up question is waiting for the user's answer.
    AwaitingAnswer,
    /// A diagnosis has been committed. Terminal.
    Diagnosed,
}

/// A follow-up question that has been sent to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Symptom the question probes. `None` for generic questions.
    pub symptom_id: Option<SymptomId>,
    /// Question text.
    pub text: String,
}

/// A retrieved symptom supporting a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Matched symptom.
    pub symptom_id: SymptomId,
    /// Symptom text.
    pub text: String,
    /// Retrieval score.
    pub score: f32,
}

/// A committed diagnosis with its evidence trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Winning condition. `None` when no evidence ever matched.
    pub condition: Option<ConditionId>,
    /// Top retrieval score at commit time.
    pub confidence: f32,
    /// Matches that voted for the diagnosis, best first.
    pub evidence: Vec<EvidenceItem>,
    /// Follow-ups asked before committing.
    pub follow_ups_asked: u32,
    /// `true` if the follow-up cap forced the commit.
    pub forced: bool,
}

/// Conversation state for one session.
///
/// Mutated only through the orchestrator and the diagnostic agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Session id.
    pub session_id: SessionId,
    /// Patient profile.
    pub profile: Profile,
    /// Dialogue so far, oldest first.
    pub turn_history: Vec<Turn>,
    /// Symptoms whose follow-up question has been answered.
    pub asked_symptom_ids: BTreeSet<SymptomId>,
    /// Symptoms the user confirmed.
    pub confirmed_symptom_ids: BTreeSet<SymptomId>,
    /// Symptoms the user denied.
    pub denied_symptom_ids: BTreeSet<SymptomId>,
    /// State machine position.
    pub current_state: DialogueState,
    /// The question awaiting an answer.
    pub pending_question: Option<FollowUp>,
    /// Follow-ups sent, generic questions included.
    pub follow_ups_asked: u32,
    /// Generic questions sent.
    pub generic_asked: u32,
    /// Leading condition so far.
    pub diagnosis_candidate: Option<ConditionId>,
    /// Top retrieval score so far.
    pub confidence: f32,
    /// Committed diagnosis.
    pub diagnosis: Option<Diagnosis>,
}

impl SessionState {
    /// Creates a fresh session in [`DialogueState::Collecting`].
    #[must_use]
    pub fn new(profile: Profile) -> Self {
        Self::with_id(Uuid::new_v4(), profile)
    }

    /// Creates a fresh session with a known id.
    #[must_use]
    pub fn with_id(session_id: SessionId, profile: Profile) -> Self {
        Self {
            session_id,
            profile,
            turn_history: Vec::new(),
            asked_symptom_ids: BTreeSet::new(),
            confirmed_symptom_ids: BTreeSet::new(),
            denied_symptom_ids: BTreeSet::new(),
            current_state: DialogueState::Collecting,
            pending_question: None,
            follow_ups_asked: 0,
            generic_asked: 0,
            diagnosis_candidate: None,
            confidence: 0.0,
            diagnosis: None,
        }
    }

    /// Appends a user turn.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turn_history.push(Turn {
            speaker: Speaker::User,
            text: text.into(),
        });
    }

    /// Appends an assistant turn.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turn_history.push(Turn {
            speaker: Speaker::Assistant,
            text: text.into(),
        });
    }

    /// Number of user turns.
    #[must_use]
    pub fn user_turn_count(&self) -> usize {
        self.turn_history
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .count()
    }

    /// Concatenated user turns, oldest first.
    #[must_use]
    pub fn user_text(&self) -> String {
        self.turn_history
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns `true` once a diagnosis is committed.
    #[must_use]
    pub fn is_diagnosed(&self) -> bool {
        self.current_state == DialogueState::Diagnosed
    }

    /// Renders the dialogue as plain text, one line per turn.
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for turn in &self.turn_history {
            let who = match turn.speaker {
                Speaker::User => "You",
                Speaker::Assistant => "Assistant",
            };
            let _ = writeln!(out, "{who}: {}", turn.text);
        }
        out
    }
}
