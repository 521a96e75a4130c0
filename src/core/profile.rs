//! Patient profile collected at onboarding.

use serde::{Deserialize, Serialize};

use super::symptom::ConditionId;

/// Self-reported sex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    /// Female.
    Female,
    /// Male.
    Male,
    /// Other or not disclosed.
    #[default]
    Unspecified,
}

impl Sex {
    /// Parses a sex string (case-insensitive). Unknown values map to
    /// [`Sex::Unspecified`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "female" | "f" | "woman" => Self::Female,
            "male" | "m" | "man" => Self::Male,
            _ => Self::Unspecified,
        }
    }
}

/// Patient profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Self-reported sex.
    #[serde(default)]
    pub sex: Sex,
    /// Pre-existing conditions.
    #[serde(default)]
    pub known_conditions: Vec<ConditionId>,
}

impl Profile {
    /// Creates a profile with the given age and no other details.
    #[must_use]
    pub fn with_age(age: u32) -> Self {
        Self {
            age: Some(age),
            ..Self::default()
        }
    }

    /// Adds a known condition.
    #[must_use]
    pub fn known_condition(mut self, condition: impl AsRef<str>) -> Self {
        let id = ConditionId::new(condition);
        if !id.is_empty() && !self.known_conditions.contains(&id) {
            self.known_conditions.push(id);
        }
        self
    }

    /// Returns `true` if the profile lists `condition`.
    #[must_use]
    pub fn has_condition(&self, condition: &ConditionId) -> bool {
        self.known_conditions.contains(condition)
    }
}
