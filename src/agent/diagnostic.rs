//! Diagnostic dialogue state machine.
//!
//! ```text
//! COLLECTING ──follow-up──▶ AWAITING_ANSWER ──answer──▶ COLLECTING
//!      │                                                    │
//!      └──── threshold met, or follow-up cap reached ───────┴──▶ DIAGNOSED
//! ```
//!
//! Each user turn is one [`DiagnosticAgent::step`]. An answer to a pending
//! follow-up is consumed first, then the accumulated evidence is scored
//! against the index to either commit a diagnosis or ask the next question.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::core::{
    ConditionId, DialogueState, Diagnosis, EvidenceItem, FollowUp, SessionState, SymptomId,
};
use crate::error::SessionError;
use crate::search::{ScoredRecord, SymptomIndex};

/// Default follow-up cap before a diagnosis is forced.
pub const DEFAULT_MAX_FOLLOW_UPS: u32 = 3;
/// Default user turns required before an unforced diagnosis.
pub const DEFAULT_MIN_TURNS: usize = 2;
/// Default top score required to commit.
pub const DEFAULT_DIAGNOSIS_THRESHOLD: f32 = 0.75;
/// Default score at which a symptom counts as already described.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
/// Default number of top matches that vote on the condition.
pub const DEFAULT_VOTE_TOP_K: usize = 3;

/// Asked when the generic question bank is empty.
const FALLBACK_QUESTION: &str = "Can you tell me more about how you are feeling?";

static AFFIRMATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern; compilation cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)^\s*(yes|yeah|yep|yup|y|sure|correct|right|definitely|absolutely|i do|i am|i have|i think so|a little|a bit|somewhat|kind of)\b",
    )
    .expect("affirmative regex")
});

static NEGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern; compilation cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)^\s*(no|nope|nah|n|not really|not at all|i don'?t|i do not|i haven'?t|none|never|negative)\b",
    )
    .expect("negative regex")
});

/// Dialogue tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialogueConfig {
    /// Follow-ups (generic ones included) before a diagnosis is forced.
    pub max_follow_ups: u32,
    /// User turns required before committing on the threshold.
    pub min_turns: usize,
    /// Top score required to commit.
    pub diagnosis_threshold: f32,
    /// Score at which a symptom counts as described and is not asked about.
    pub match_threshold: f32,
    /// Top matches that vote on the condition.
    pub vote_top_k: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_follow_ups: DEFAULT_MAX_FOLLOW_UPS,
            min_turns: DEFAULT_MIN_TURNS,
            diagnosis_threshold: DEFAULT_DIAGNOSIS_THRESHOLD,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            vote_top_k: DEFAULT_VOTE_TOP_K,
        }
    }
}

/// How the user answered a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// "yes" and similar.
    Affirmative,
    /// "no" and similar.
    Negative,
    /// Anything else. Kept as free text only.
    Unclear,
}

/// Classifies a follow-up answer by its opening words.
#[must_use]
pub fn classify_answer(text: &str) -> Answer {
    if NEGATIVE_RE.is_match(text) {
        Answer::Negative
    } else if AFFIRMATIVE_RE.is_match(text) {
        Answer::Affirmative
    } else {
        Answer::Unclear
    }
}

/// Result of one diagnostic step.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticOutcome {
    /// Ask this question next.
    FollowUp(FollowUp),
    /// The session is diagnosed.
    Diagnosis(Diagnosis),
}

/// Conditions ranked by vote, with the matches that voted.
struct Vote<'a> {
    ranked: Vec<ConditionId>,
    voters: &'a [ScoredRecord<'a>],
}

impl Vote<'_> {
    fn winner(&self) -> Option<&ConditionId> {
        self.ranked.first()
    }

    fn evidence(&self, condition: Option<&ConditionId>) -> Vec<EvidenceItem> {
        let Some(condition) = condition else {
            return Vec::new();
        };
        self.voters
            .iter()
            .filter(|s| s.record.associated_conditions.contains(condition))
            .map(|s| EvidenceItem {
                symptom_id: s.record.id,
                text: s.record.text.clone(),
                score: s.score,
            })
            .collect()
    }
}

/// Counts condition votes over the top matches.
///
/// Ties go to the condition seen first, walking matches in rank order and
/// each record's conditions in knowledge-file order.
fn vote<'a>(voters: &'a [ScoredRecord<'a>]) -> Vote<'a> {
    let mut tally: Vec<(ConditionId, usize)> = Vec::new();
    for s in voters {
        for c in &s.record.associated_conditions {
            match tally.iter_mut().find(|(seen, _)| seen == c) {
                Some((_, n)) => *n += 1,
                None => tally.push((c.clone(), 1)),
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    tally.sort_by(|a, b| b.1.cmp(&a.1));
    Vote {
        ranked: tally.into_iter().map(|(c, _)| c).collect(),
        voters,
    }
}

/// Per-turn diagnostic decision maker. Stateless; all state lives in
/// [`SessionState`].
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticAgent<'a> {
    index: &'a SymptomIndex,
    config: &'a DialogueConfig,
    generic_questions: &'a [String],
}

impl<'a> DiagnosticAgent<'a> {
    /// Creates an agent over `index`.
    #[must_use]
    pub const fn new(
        index: &'a SymptomIndex,
        config: &'a DialogueConfig,
        generic_questions: &'a [String],
    ) -> Self {
        Self {
            index,
            config,
            generic_questions,
        }
    }

    /// Consumes one user turn and advances the state machine.
    ///
    /// The user turn is appended to the history. Lack of evidence never
    /// errors; it leads to follow-ups and eventually a forced diagnosis.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Malformed`] if the session is already
    /// diagnosed or its pending question disagrees with its state.
    pub fn step(
        &self,
        state: &mut SessionState,
        user_text: &str,
    ) -> Result<DiagnosticOutcome, SessionError> {
        match (state.current_state, state.pending_question.is_some()) {
            (DialogueState::Diagnosed, _) => {
                return Err(SessionError::malformed("session is already diagnosed"));
            }
            (DialogueState::Collecting, true) => {
                return Err(SessionError::malformed(
                    "collecting with a pending question",
                ));
            }
            (DialogueState::AwaitingAnswer, false) => {
                return Err(SessionError::malformed(
                    "awaiting an answer without a pending question",
                ));
            }
            _ => {}
        }

        state.push_user(user_text);

        if let Some(question) = state.pending_question.take() {
            Self::consume_answer(state, &question, user_text);
            state.current_state = DialogueState::Collecting;
        }

        Ok(self.collect(state))
    }

    fn consume_answer(state: &mut SessionState, question: &FollowUp, answer: &str) {
        let Some(id) = question.symptom_id else {
            return;
        };
        state.asked_symptom_ids.insert(id);
        let class = classify_answer(answer);
        match class {
            Answer::Affirmative => {
                state.confirmed_symptom_ids.insert(id);
            }
            Answer::Negative => {
                state.denied_symptom_ids.insert(id);
            }
            Answer::Unclear => {}
        }
        debug!(
            session = %state.session_id,
            symptom = id.0,
            answer = ?class,
            "follow-up answered"
        );
    }

    /// Text scored against the index: every user turn plus the text of
    /// confirmed symptoms.
    fn evidence_text(&self, state: &SessionState) -> String {
        let mut text = state.user_text();
        for id in &state.confirmed_symptom_ids {
            if let Some(record) = self.index.get(*id) {
                text.push(' ');
                text.push_str(&record.text);
            }
        }
        text
    }

    fn collect(&self, state: &mut SessionState) -> DiagnosticOutcome {
        let evidence = self.evidence_text(state);
        // Only denials are excluded; confirmed symptoms keep voting.
        let results = self
            .index
            .query(&evidence, &state.profile, &state.denied_symptom_ids);
        let top_score = results.first().map_or(0.0, |s| s.score);
        let voters = &results[..results.len().min(self.config.vote_top_k)];
        let vote = vote(voters);

        if let Some(winner) = vote.winner() {
            state.diagnosis_candidate = Some(winner.clone());
        }
        state.confidence = state.confidence.max(top_score);

        let turns = state.user_turn_count();
        if top_score >= self.config.diagnosis_threshold && turns >= self.config.min_turns {
            return self.commit(state, &vote, top_score, false);
        }
        if state.follow_ups_asked >= self.config.max_follow_ups {
            return self.commit(state, &vote, top_score, true);
        }

        let follow_up = self.next_follow_up(state, &results, &vote);
        state.follow_ups_asked += 1;
        state.pending_question = Some(follow_up.clone());
        state.current_state = DialogueState::AwaitingAnswer;
        debug!(
            session = %state.session_id,
            symptom = follow_up.symptom_id.map(|id| id.0),
            follow_ups = state.follow_ups_asked,
            top_score,
            "asking follow-up"
        );
        DiagnosticOutcome::FollowUp(follow_up)
    }

    fn commit(
        &self,
        state: &mut SessionState,
        vote: &Vote<'_>,
        top_score: f32,
        forced: bool,
    ) -> DiagnosticOutcome {
        let condition = vote
            .winner()
            .cloned()
            .or_else(|| state.diagnosis_candidate.clone());
        let diagnosis = Diagnosis {
            evidence: vote.evidence(condition.as_ref()),
            condition,
            confidence: top_score,
            follow_ups_asked: state.follow_ups_asked,
            forced,
        };
        state.current_state = DialogueState::Diagnosed;
        state.pending_question = None;
        state.diagnosis_candidate.clone_from(&diagnosis.condition);
        state.diagnosis = Some(diagnosis.clone());
        debug!(
            session = %state.session_id,
            condition = diagnosis.condition.as_ref().map(ConditionId::as_str),
            confidence = top_score,
            forced,
            threshold = self.config.diagnosis_threshold,
            "diagnosis committed"
        );
        DiagnosticOutcome::Diagnosis(diagnosis)
    }

    /// Picks the next question: the best unmet match, else a record related
    /// to the leading conditions, else a generic question.
    fn next_follow_up(
        &self,
        state: &mut SessionState,
        results: &[ScoredRecord<'_>],
        vote: &Vote<'_>,
    ) -> FollowUp {
        let mut blocked: BTreeSet<SymptomId> = state
            .asked_symptom_ids
            .union(&state.confirmed_symptom_ids)
            .chain(&state.denied_symptom_ids)
            .copied()
            .collect();
        blocked.extend(
            results
                .iter()
                .filter(|s| s.score >= self.config.match_threshold)
                .map(|s| s.record.id),
        );
        if let Some(pending) = state.pending_question.as_ref().and_then(|q| q.symptom_id) {
            blocked.insert(pending);
        }

        let candidate = results
            .iter()
            .map(|s| s.record)
            .find(|r| !blocked.contains(&r.id))
            .or_else(|| {
                self.index
                    .related(&vote.ranked, &blocked)
                    .into_iter()
                    .next()
            });

        if let Some(record) = candidate {
            return FollowUp {
                symptom_id: Some(record.id),
                text: record.question(),
            };
        }

        let text = if self.generic_questions.is_empty() {
            FALLBACK_QUESTION.to_string()
        } else {
            let i = usize::try_from(state.generic_asked).unwrap_or(0) % self.generic_questions.len();
            self.generic_questions[i].clone()
        };
        state.generic_asked += 1;
        FollowUp {
            symptom_id: None,
            text,
        }
    }
}
