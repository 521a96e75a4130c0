//! Symptom retrieval over the knowledge base.
//!
//! [`SymptomIndex`] ranks symptom records against free text. With an
//! embedder it scores by cosine similarity; without one (or when the
//! embedder fails on a query) it scores by keyword overlap. Results are
//! deterministic: score descending, ties broken by ascending record id.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::{ConditionId, Profile, SymptomId, SymptomRecord};
use crate::embedding::{Embedder, cosine_similarity};

/// Default minimum score for a record to be returned.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.1;
/// Default score bonus for records pointing at a known profile condition.
pub const DEFAULT_PROFILE_BOOST: f32 = 0.05;

/// Words ignored by keyword scoring.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "am", "are", "at", "been", "but", "do", "feel", "feeling", "for", "got",
    "have", "having", "i", "im", "in", "is", "it", "its", "me", "my", "of", "on", "or", "so",
    "some", "the", "to", "very", "with", "since", "really",
];

/// Retrieval tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    /// Records must score strictly above this to be returned.
    pub min_relevance: f32,
    /// Added to a positive score when the record shares a condition with
    /// the profile's known conditions.
    pub profile_boost: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_relevance: DEFAULT_MIN_RELEVANCE,
            profile_boost: DEFAULT_PROFILE_BOOST,
        }
    }
}

/// How the index scores queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// Cosine similarity of embeddings.
    Semantic,
    /// Token overlap.
    Keyword,
}

impl ScoringMode {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
        }
    }
}

impl std::fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record with its score for one query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredRecord<'a> {
    /// The record.
    pub record: &'a SymptomRecord,
    /// Score in `[0, 1]`.
    pub score: f32,
}

/// Splits text into lowercase words, dropping stopwords.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Builds the keyword set for a record from its text and synonyms.
#[must_use]
pub fn keywords_for<S: AsRef<str>>(text: &str, synonyms: &[S]) -> BTreeSet<String> {
    let mut out: BTreeSet<String> = tokenize(text).into_iter().collect();
    for s in synonyms {
        out.extend(tokenize(s.as_ref()));
    }
    out
}

/// Immutable similarity index over symptom records.
pub struct SymptomIndex {
    records: Vec<SymptomRecord>,
    expected: Vec<usize>,
    conditions: BTreeSet<ConditionId>,
    embedder: Option<Arc<dyn Embedder>>,
    config: IndexConfig,
}

impl SymptomIndex {
    /// Builds an index. Records are sorted by id.
    ///
    /// Semantic scoring is used only when `embedder` is set; records without
    /// an embedding then score 0 semantically.
    #[must_use]
    pub fn new(
        mut records: Vec<SymptomRecord>,
        embedder: Option<Arc<dyn Embedder>>,
        config: IndexConfig,
    ) -> Self {
        records.sort_by_key(|r| r.id);
        let expected = records
            .iter()
            .map(|r| tokenize(&r.text).len().max(1))
            .collect();
        let conditions = records
            .iter()
            .flat_map(|r| r.associated_conditions.iter().cloned())
            .collect();
        Self {
            records,
            expected,
            conditions,
            embedder,
            config,
        }
    }

    /// Active scoring mode.
    #[must_use]
    pub fn mode(&self) -> ScoringMode {
        if self.embedder.is_some() {
            ScoringMode::Semantic
        } else {
            ScoringMode::Keyword
        }
    }

    /// Index configuration.
    #[must_use]
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// All records, ascending id.
    #[must_use]
    pub fn records(&self) -> &[SymptomRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the index has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every condition referenced by any record.
    #[must_use]
    pub const fn conditions(&self) -> &BTreeSet<ConditionId> {
        &self.conditions
    }

    /// Looks up a record.
    #[must_use]
    pub fn get(&self, id: SymptomId) -> Option<&SymptomRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Ranks records against `text`.
    ///
    /// Only records scoring above `min_relevance` are returned, best first.
    /// Records in `exclude` never appear. An empty result is not an error.
    #[must_use]
    pub fn query(
        &self,
        text: &str,
        profile: &Profile,
        exclude: &BTreeSet<SymptomId>,
    ) -> Vec<ScoredRecord<'_>> {
        let query_vector = self.embed_query(text);
        let query_tokens: BTreeSet<String> = if query_vector.is_none() {
            tokenize(text).into_iter().collect()
        } else {
            BTreeSet::new()
        };

        let mut scored: Vec<ScoredRecord<'_>> = self
            .records
            .par_iter()
            .zip(self.expected.par_iter())
            .filter(|(r, _)| !exclude.contains(&r.id))
            .map(|(record, &expected)| {
                let base = query_vector.as_ref().map_or_else(
                    || keyword_score(record, &query_tokens, expected),
                    |qv| cosine_similarity(qv, &record.embedding),
                );
                let score = if base > 0.0
                    && record.shares_condition(&profile.known_conditions)
                {
                    (base + self.config.profile_boost).min(1.0)
                } else {
                    base
                };
                ScoredRecord { record, score }
            })
            .filter(|s| s.score > self.config.min_relevance)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });

        let mode = if query_vector.is_some() {
            ScoringMode::Semantic
        } else {
            ScoringMode::Keyword
        };
        debug!(
            mode = %mode,
            results = scored.len(),
            excluded = exclude.len(),
            top = scored.first().map(|s| s.record.id.0),
            "symptom query"
        );
        scored
    }

    /// Records sharing any of `conditions`, ascending id, minus `exclude`.
    #[must_use]
    pub fn related(
        &self,
        conditions: &[ConditionId],
        exclude: &BTreeSet<SymptomId>,
    ) -> Vec<&SymptomRecord> {
        self.records
            .iter()
            .filter(|r| !exclude.contains(&r.id) && r.shares_condition(conditions))
            .collect()
    }

    fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    embedder = embedder.name(),
                    error = %e,
                    "query embedding failed, scoring by keywords"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for SymptomIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymptomIndex")
            .field("records", &self.records.len())
            .field("conditions", &self.conditions.len())
            .field("mode", &self.mode())
            .field("config", &self.config)
            .finish()
    }
}

#[allow(clippy::cast_precision_loss)]
fn keyword_score(record: &SymptomRecord, query: &BTreeSet<String>, expected: usize) -> f32 {
    let hits = record.keywords.iter().filter(|k| query.contains(*k)).count();
    (hits as f32 / expected as f32).min(1.0)
}
