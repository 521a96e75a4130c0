//! Core domain types.
//!
//! Symptom records, patient profiles, per-session dialogue state and the
//! advice model shared by the agents.

pub mod advice;
pub mod profile;
pub mod session;
pub mod symptom;

pub use advice::{AdviceEntry, AdviceTable, AdviceTier, RiskModifier, RiskPolicy};
pub use profile::{Profile, Sex};
pub use session::{
    DialogueState, Diagnosis, EvidenceItem, FollowUp, SessionId, SessionState, Speaker, Turn,
};
pub use symptom::{ConditionId, SymptomId, SymptomRecord};
