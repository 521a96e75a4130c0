//! Knowledge-base record types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of a symptom record, assigned in knowledge-file order from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomId(pub u32);

impl std::fmt::Display for SymptomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a diagnosis category.
///
/// Condition names are normalized (trimmed, lowercased) on construction so
/// that knowledge rows, the advice table and profile entries join on the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ConditionId(String);

impl ConditionId {
    /// Creates a normalized condition id.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(normalize(name.as_ref()))
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the normalized name is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ConditionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConditionId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ConditionId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<ConditionId> for String {
    fn from(id: ConditionId) -> Self {
        id.0
    }
}

/// Trims and lowercases a knowledge-base string.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A symptom in the knowledge base. Immutable once the index is built.
#[derive(Debug, Clone, Serialize)]
pub struct SymptomRecord {
    /// Record id.
    pub id: SymptomId,
    /// Normalized symptom text (e.g. `"sore throat"`).
    pub text: String,
    /// Embedding of `text`. Empty when the index runs in keyword mode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Conditions this symptom points to, in knowledge-file order without
    /// duplicates.
    pub associated_conditions: Vec<ConditionId>,
    /// Lowercase tokens that count as a mention of this symptom.
    pub keywords: BTreeSet<String>,
    /// Phrasings used when asking the user about this symptom.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub follow_up_questions: Vec<String>,
}

impl SymptomRecord {
    /// Returns `true` if the record points to any of `conditions`.
    #[must_use]
    pub fn shares_condition<'a, I>(&self, conditions: I) -> bool
    where
        I: IntoIterator<Item = &'a ConditionId>,
    {
        conditions
            .into_iter()
            .any(|c| self.associated_conditions.contains(c))
    }

    /// Returns the question used to ask about this symptom.
    #[must_use]
    pub fn question(&self) -> String {
        self.follow_up_questions
            .first()
            .cloned()
            .unwrap_or_else(|| format!("Are you also experiencing {}?", self.text))
    }
}
