//! Advice tiers, the condition-to-tier table and profile risk policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::profile::Profile;
use super::symptom::ConditionId;
use crate::error::ConfigError;

/// Default age from which a patient counts as elderly.
pub const DEFAULT_ELDERLY_AGE: u32 = 65;
/// Default age below which a patient counts as pediatric.
pub const DEFAULT_PEDIATRIC_AGE: u32 = 5;
/// Default pre-existing conditions that escalate advice.
pub const DEFAULT_HIGH_RISK_CONDITIONS: &[&str] = &[
    "diabetes",
    "asthma",
    "heart disease",
    "pregnancy",
    "immunocompromised",
];

/// Advice tier, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceTier {
    /// Rest and over-the-counter care.
    SelfCare,
    /// Watch symptoms and seek care if they worsen.
    Monitor,
    /// Book an appointment with a clinician.
    SeeDoctor,
    /// Seek emergency care now.
    Emergency,
}

impl AdviceTier {
    /// Escalates by one step. Escalation never reaches [`AdviceTier::Emergency`];
    /// that tier only comes from the advice table.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            Self::SelfCare => Self::Monitor,
            Self::Monitor | Self::SeeDoctor => Self::SeeDoctor,
            Self::Emergency => Self::Emergency,
        }
    }

    /// Parses a tier name (`self_care`, `monitor`, `see_doctor`, `emergency`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "self_care" => Some(Self::SelfCare),
            "monitor" => Some(Self::Monitor),
            "see_doctor" => Some(Self::SeeDoctor),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }

    /// Returns the snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SelfCare => "self_care",
            Self::Monitor => "monitor",
            Self::SeeDoctor => "see_doctor",
            Self::Emergency => "emergency",
        }
    }

    /// Returns the advice sentence used when the table has none.
    #[must_use]
    pub const fn default_advice(self) -> &'static str {
        match self {
            Self::SelfCare => {
                "Rest, stay hydrated and use over-the-counter remedies. Seek care if symptoms persist."
            }
            Self::Monitor => {
                "Keep an eye on your symptoms over the next few days and contact a clinician if they worsen."
            }
            Self::SeeDoctor => "Please book an appointment with a doctor to get checked.",
            Self::Emergency => "Seek emergency medical care immediately.",
        }
    }
}

impl std::fmt::Display for AdviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the advice table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceEntry {
    /// Base tier for the condition.
    pub tier: AdviceTier,
    /// Condition-specific advice text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

/// Condition-to-tier lookup table.
#[derive(Debug, Clone, Default)]
pub struct AdviceTable {
    entries: BTreeMap<ConditionId, AdviceEntry>,
}

impl AdviceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, condition: ConditionId, entry: AdviceEntry) {
        self.entries.insert(condition, entry);
    }

    /// Looks up a condition.
    #[must_use]
    pub fn get(&self, condition: &ConditionId) -> Option<&AdviceEntry> {
        self.entries.get(condition)
    }

    /// Number of mapped conditions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no condition is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that every condition in `conditions` has a tier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnmappedConditions`] listing every missing
    /// condition in sorted order.
    pub fn validate<'a, I>(&self, conditions: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a ConditionId>,
    {
        let mut missing: Vec<String> = conditions
            .into_iter()
            .filter(|c| !self.entries.contains_key(*c))
            .map(ToString::to_string)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        Err(ConfigError::UnmappedConditions {
            conditions: missing,
        })
    }
}

impl FromIterator<(ConditionId, AdviceEntry)> for AdviceTable {
    fn from_iter<T: IntoIterator<Item = (ConditionId, AdviceEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A profile attribute that escalates the advice tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskModifier {
    /// Age at or above the elderly threshold.
    Elderly {
        /// Patient age.
        age: u32,
    },
    /// Age below the pediatric threshold.
    Pediatric {
        /// Patient age.
        age: u32,
    },
    /// A high-risk pre-existing condition.
    HighRiskCondition {
        /// The condition.
        condition: ConditionId,
    },
}

impl std::fmt::Display for RiskModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elderly { age } => write!(f, "age {age}"),
            Self::Pediatric { age } => write!(f, "young age ({age})"),
            Self::HighRiskCondition { condition } => write!(f, "known {condition}"),
        }
    }
}

/// Profile-based escalation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Ages at or above this are elderly.
    pub elderly_age: u32,
    /// Ages below this are pediatric.
    pub pediatric_age: u32,
    /// Known conditions that escalate advice.
    pub high_risk_conditions: Vec<ConditionId>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            elderly_age: DEFAULT_ELDERLY_AGE,
            pediatric_age: DEFAULT_PEDIATRIC_AGE,
            high_risk_conditions: DEFAULT_HIGH_RISK_CONDITIONS
                .iter()
                .map(|c| ConditionId::new(c))
                .collect(),
        }
    }
}

impl RiskPolicy {
    /// Returns every risk modifier that applies to `profile`.
    #[must_use]
    pub fn modifiers(&self, profile: &Profile) -> Vec<RiskModifier> {
        let mut out = Vec::new();
        if let Some(age) = profile.age {
            if age >= self.elderly_age {
                out.push(RiskModifier::Elderly { age });
            } else if age < self.pediatric_age {
                out.push(RiskModifier::Pediatric { age });
            }
        }
        out.extend(
            profile
                .known_conditions
                .iter()
                .filter(|c| self.high_risk_conditions.contains(c))
                .map(|c| RiskModifier::HighRiskCondition {
                    condition: c.clone(),
                }),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(AdviceTier::SelfCare, AdviceTier::Monitor ; "self care")]
    #[test_case(AdviceTier::Monitor, AdviceTier::SeeDoctor ; "monitor")]
    #[test_case(AdviceTier::SeeDoctor, AdviceTier::SeeDoctor ; "capped")]
    #[test_case(AdviceTier::Emergency, AdviceTier::Emergency ; "emergency stays")]
    fn test_escalate(from: AdviceTier, to: AdviceTier) {
        assert_eq!(from.escalate(), to);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(AdviceTier::parse("see-doctor"), Some(AdviceTier::SeeDoctor));
        assert_eq!(AdviceTier::parse("Self Care"), Some(AdviceTier::SelfCare));
        assert_eq!(AdviceTier::parse("urgent"), None);
    }

    #[test]
    fn test_tier_serde_snake_case() {
        let json = serde_json::to_string(&AdviceTier::SeeDoctor).unwrap_or_default();
        assert_eq!(json, "\"see_doctor\"");
    }

    #[test]
    fn test_validate_lists_missing_sorted() {
        let table: AdviceTable = [(
            ConditionId::new("flu"),
            AdviceEntry {
                tier: AdviceTier::Monitor,
                advice: None,
            },
        )]
        .into_iter()
        .collect();
        let conditions = [
            ConditionId::new("gout"),
            ConditionId::new("flu"),
            ConditionId::new("angina"),
        ];
        let err = table.validate(&conditions).err();
        match err {
            Some(ConfigError::UnmappedConditions { conditions }) => {
                assert_eq!(conditions, vec!["angina".to_string(), "gout".to_string()]);
            }
            other => unreachable!("unexpected: {other:?}"),
        }
        assert!(table.validate(&conditions[1..2]).is_ok());
    }

    #[test]
    fn test_risk_modifiers() {
        let policy = RiskPolicy::default();
        assert!(policy.modifiers(&Profile::with_age(30)).is_empty());
        assert_eq!(
            policy.modifiers(&Profile::with_age(70)),
            vec![RiskModifier::Elderly { age: 70 }]
        );
        assert_eq!(
            policy.modifiers(&Profile::with_age(3)),
            vec![RiskModifier::Pediatric { age: 3 }]
        );
        let p = Profile::with_age(30).known_condition("Diabetes");
        assert_eq!(policy.modifiers(&p).len(), 1);
    }
}
