//! Advice tier lookup with profile risk escalation.

use serde::Serialize;

use crate::core::{AdviceTable, AdviceTier, ConditionId, Profile, RiskModifier, RiskPolicy};

/// Advice for one diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    /// Final tier after risk escalation.
    pub tier: AdviceTier,
    /// Tier from the table, before escalation.
    pub base_tier: AdviceTier,
    /// Advice text shown to the user.
    pub advice: String,
    /// Profile attributes that escalated the tier.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<RiskModifier>,
}

impl Recommendation {
    /// Whether a risk modifier changed the tier.
    #[must_use]
    pub fn escalated(&self) -> bool {
        self.tier != self.base_tier
    }
}

/// Maps a diagnosis and profile to an advice tier.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationAgent<'a> {
    advice: &'a AdviceTable,
    risk: &'a RiskPolicy,
}

impl<'a> RecommendationAgent<'a> {
    /// Creates an agent over a validated advice table.
    #[must_use]
    pub const fn new(advice: &'a AdviceTable, risk: &'a RiskPolicy) -> Self {
        Self { advice, risk }
    }

    /// Recommends advice for `condition`.
    ///
    /// An undetermined diagnosis, or a condition missing from the table,
    /// is [`AdviceTier::SeeDoctor`]. Any risk modifier escalates the base
    /// tier one step, never past `SeeDoctor` unless the table says
    /// `Emergency`.
    #[must_use]
    pub fn recommend(&self, condition: Option<&ConditionId>, profile: &Profile) -> Recommendation {
        let entry = condition.and_then(|c| self.advice.get(c));
        let base_tier = entry.map_or(AdviceTier::SeeDoctor, |e| e.tier);
        let modifiers = self.risk.modifiers(profile);
        let tier = if modifiers.is_empty() {
            base_tier
        } else {
            base_tier.escalate()
        };

        // Table text describes the base tier; an escalated tier gets its own.
        let advice = match entry.and_then(|e| e.advice.as_deref()) {
            Some(text) if tier == base_tier => text.to_string(),
            _ => tier.default_advice().to_string(),
        };

        Recommendation {
            tier,
            base_tier,
            advice,
            modifiers,
        }
    }
}
