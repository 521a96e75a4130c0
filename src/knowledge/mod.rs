//! Knowledge-base loading and validation.
//!
//! The knowledge file is JSON:
//!
//! ```json
//! {
//!   "symptoms": [
//!     {"symptom": "Sore Throat", "conditions": "strep throat, common cold",
//!      "follow_up_questions": "Does it hurt to swallow?; Are your tonsils swollen?",
//!      "keywords": ["pharyngitis"]}
//!   ],
//!   "advice": {"strep throat": {"tier": "see_doctor"}, "common cold": {"tier": "self_care"}},
//!   "risk": {"elderly_age": 65},
//!   "generic_questions": ["How long have you had these symptoms?"]
//! }
//! ```
//!
//! `conditions` may be a comma-separated string or a list; `follow_up_questions`
//! a semicolon-separated string or a list. Rows repeating an earlier
//! symptom (after trimming and lowercasing) are merged into it. Every
//! condition must have an advice tier or loading fails.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::symptom::normalize;
use crate::core::{AdviceEntry, AdviceTable, ConditionId, RiskPolicy, SymptomId, SymptomRecord};
use crate::embedding::Embedder;
use crate::error::{ConfigError, EmbeddingError, Result};
use crate::search::{IndexConfig, SymptomIndex, keywords_for};

/// The knowledge file compiled into the binary.
pub const BUNDLED_KNOWLEDGE: &str = include_str!("../../data/knowledge.json");

/// Source name used in errors for the bundled file.
const BUNDLED_SOURCE: &str = "<bundled>";

/// Questions asked when no symptom-specific follow-up is left.
pub const DEFAULT_GENERIC_QUESTIONS: &[&str] = &[
    "How long have you had these symptoms?",
    "Have your symptoms been getting better, worse, or staying the same?",
    "Is there anything else you've noticed, such as pain, fever, or changes in appetite?",
];

/// A field given either as a delimited string or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listed {
    Text(String),
    Items(Vec<String>),
}

impl Listed {
    fn split(self, separator: char) -> Vec<String> {
        let items = match self {
            Self::Text(s) => s.split(separator).map(str::to_string).collect(),
            Self::Items(v) => v,
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SymptomRow {
    symptom: String,
    conditions: Listed,
    #[serde(default)]
    follow_up_questions: Option<Listed>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    symptoms: Vec<SymptomRow>,
    #[serde(default)]
    advice: BTreeMap<String, AdviceEntry>,
    #[serde(default)]
    risk: Option<RiskPolicy>,
    #[serde(default)]
    generic_questions: Option<Vec<String>>,
}

/// Loaded, validated knowledge: the symptom index plus advice rules.
#[derive(Debug)]
pub struct KnowledgeBase {
    /// Symptom similarity index.
    pub index: SymptomIndex,
    /// Condition-to-tier table. Covers every condition in `index`.
    pub advice: AdviceTable,
    /// Profile escalation rules.
    pub risk: RiskPolicy,
    /// Fallback follow-up questions, asked in order.
    pub generic_questions: Vec<String>,
}

impl KnowledgeBase {
    /// Loads from `path`, or the bundled file when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unreadable, malformed or incomplete
    /// knowledge, and [`EmbeddingError`] if record embeddings cannot be built.
    pub fn load(
        path: Option<&Path>,
        embedder: Option<Arc<dyn Embedder>>,
        config: IndexConfig,
    ) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p, embedder, config),
            None => Self::from_json(BUNDLED_KNOWLEDGE, BUNDLED_SOURCE, embedder, config),
        }
    }

    /// Loads the bundled knowledge file in keyword mode.
    ///
    /// # Errors
    ///
    /// Fails only if the bundled file is invalid.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_KNOWLEDGE, BUNDLED_SOURCE, None, IndexConfig::default())
    }

    /// Loads a knowledge file from disk.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::load`].
    pub fn from_path(
        path: &Path,
        embedder: Option<Arc<dyn Embedder>>,
        config: IndexConfig,
    ) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json, &path.display().to_string(), embedder, config)
    }

    /// Parses and validates knowledge JSON.
    ///
    /// # Errors
    ///
    /// See [`KnowledgeBase::load`].
    pub fn from_json(
        json: &str,
        source_name: &str,
        embedder: Option<Arc<dyn Embedder>>,
        config: IndexConfig,
    ) -> Result<Self> {
        let file: KnowledgeFile =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;

        let rows = file.symptoms.len();
        let mut records = build_records(file.symptoms)?;
        if records.is_empty() {
            return Err(ConfigError::EmptyKnowledgeBase.into());
        }

        match embedder.as_deref() {
            Some(e) => attach_embeddings(&mut records, e)?,
            None => records.iter_mut().for_each(|r| r.embedding.clear()),
        }

        let advice: AdviceTable = file
            .advice
            .into_iter()
            .map(|(name, entry)| (ConditionId::new(name), entry))
            .collect();

        let index = SymptomIndex::new(records, embedder, config);
        advice.validate(index.conditions())?;

        let generic_questions = file.generic_questions.map_or_else(
            || {
                DEFAULT_GENERIC_QUESTIONS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            },
            |qs| {
                qs.into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect()
            },
        );

        info!(
            source = source_name,
            rows,
            symptoms = index.len(),
            conditions = index.conditions().len(),
            mode = %index.mode(),
            "knowledge base loaded"
        );

        Ok(Self {
            index,
            advice,
            risk: file.risk.unwrap_or_default(),
            generic_questions,
        })
    }
}

/// Normalizes rows into records, merging repeated symptoms.
fn build_records(rows: Vec<SymptomRow>) -> std::result::Result<Vec<SymptomRecord>, ConfigError> {
    let mut records: Vec<SymptomRecord> = Vec::with_capacity(rows.len());
    let mut by_text: HashMap<String, usize> = HashMap::new();

    for (i, row) in rows.into_iter().enumerate() {
        let row_number = i + 1;
        let text = normalize(&row.symptom);
        if text.is_empty() {
            return Err(ConfigError::InvalidRecord {
                row: row_number,
                reason: "empty symptom".to_string(),
            });
        }

        let conditions: Vec<ConditionId> = row
            .conditions
            .split(',')
            .iter()
            .map(ConditionId::new)
            .collect();
        if conditions.is_empty() {
            return Err(ConfigError::InvalidRecord {
                row: row_number,
                reason: format!("symptom '{text}' has no conditions"),
            });
        }
        let questions = row
            .follow_up_questions
            .map(|q| q.split(';'))
            .unwrap_or_default();
        let keywords = keywords_for(&text, &row.keywords);

        if let Some(&pos) = by_text.get(&text) {
            debug!(row = row_number, symptom = %text, "merging repeated symptom row");
            let existing = &mut records[pos];
            for c in conditions {
                if !existing.associated_conditions.contains(&c) {
                    existing.associated_conditions.push(c);
                }
            }
            for q in questions {
                if !existing.follow_up_questions.contains(&q) {
                    existing.follow_up_questions.push(q);
                }
            }
            existing.keywords.extend(keywords);
            if existing.embedding.is_empty() {
                existing.embedding = row.embedding.unwrap_or_default();
            }
            continue;
        }

        let mut associated_conditions = Vec::with_capacity(conditions.len());
        for c in conditions {
            if !associated_conditions.contains(&c) {
                associated_conditions.push(c);
            }
        }
        let mut follow_up_questions: Vec<String> = Vec::with_capacity(questions.len());
        for q in questions {
            if !follow_up_questions.contains(&q) {
                follow_up_questions.push(q);
            }
        }

        let id = SymptomId(u32::try_from(records.len() + 1).map_err(|_| {
            ConfigError::InvalidRecord {
                row: row_number,
                reason: "too many symptoms".to_string(),
            }
        })?);
        by_text.insert(text.clone(), records.len());
        records.push(SymptomRecord {
            id,
            text,
            embedding: row.embedding.unwrap_or_default(),
            associated_conditions,
            keywords,
            follow_up_questions,
        });
    }

    Ok(records)
}

/// Fills in missing embeddings and checks every vector's length.
fn attach_embeddings(
    records: &mut [SymptomRecord],
    embedder: &dyn Embedder,
) -> std::result::Result<(), EmbeddingError> {
    let expected = embedder.dimensions();
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.embedding.is_empty())
        .map(|(i, _)| i)
        .collect();

    if !missing.is_empty() {
        let texts: Vec<&str> = missing.iter().map(|&i| records[i].text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (&i, v) in missing.iter().zip(vectors) {
            records[i].embedding = v;
        }
        debug!(embedded = missing.len(), embedder = embedder.name(), "embedded symptom records");
    }

    if let Some(r) = records.iter().find(|r| r.embedding.len() != expected) {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            got: r.embedding.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AdviceTier;
    use crate::core::Profile;
    use crate::error::Error;
    use std::collections::BTreeSet;
    use std::io::Write as _;

    const SMALL: &str = r#"{
        "symptoms": [
            {"symptom": " Fever ", "conditions": "Flu, Common Cold",
             "follow_up_questions": "How high is your temperature?; Do you have chills?"},
            {"symptom": "cough", "conditions": ["flu"], "keywords": ["coughing"]},
            {"symptom": "fever", "conditions": "malaria", "follow_up_questions": "Do you have chills?"}
        ],
        "advice": {
            "flu": {"tier": "monitor"},
            "Common Cold": {"tier": "self_care", "advice": "Rest up."},
            "malaria": {"tier": "see_doctor"}
        }
    }"#;

    #[test]
    fn test_bundled_knowledge_is_valid() {
        let kb = KnowledgeBase::bundled().unwrap_or_else(|e| unreachable!("{e}"));
        assert!(kb.index.len() >= 15);
        assert!(!kb.generic_questions.is_empty());
        for record in kb.index.records() {
            assert!(!record.follow_up_questions.is_empty(), "{}", record.text);
        }
    }

    #[test]
    fn test_rows_are_normalized_and_merged() {
        let kb = KnowledgeBase::from_json(SMALL, "small", None, IndexConfig::default())
            .unwrap_or_else(|e| unreachable!("{e}"));
        assert_eq!(kb.index.len(), 2);

        let fever = kb.index.get(SymptomId(1)).unwrap_or_else(|| unreachable!());
        assert_eq!(fever.text, "fever");
        assert_eq!(
            fever.associated_conditions,
            vec![
                ConditionId::new("flu"),
                ConditionId::new("common cold"),
                ConditionId::new("malaria")
            ]
        );
        assert_eq!(fever.follow_up_questions.len(), 2);

        let cough = kb.index.get(SymptomId(2)).unwrap_or_else(|| unreachable!());
        assert!(cough.keywords.contains("coughing"));
        assert_eq!(
            kb.advice
                .get(&ConditionId::new("common cold"))
                .map(|e| e.tier),
            Some(AdviceTier::SelfCare)
        );
        assert_eq!(kb.generic_questions.len(), DEFAULT_GENERIC_QUESTIONS.len());
        assert_eq!(kb.risk, RiskPolicy::default());
    }

    #[test]
    fn test_unmapped_condition_fails_load() {
        let json = r#"{"symptoms": [{"symptom": "rash", "conditions": "measles, shingles"}],
                       "advice": {"measles": {"tier": "see_doctor"}}}"#;
        let err = KnowledgeBase::from_json(json, "t", None, IndexConfig::default()).err();
        match err {
            Some(Error::Config(ConfigError::UnmappedConditions { conditions })) => {
                assert_eq!(conditions, vec!["shingles".to_string()]);
            }
            other => unreachable!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_rows() {
        let empty = r#"{"symptoms": []}"#;
        assert!(matches!(
            KnowledgeBase::from_json(empty, "t", None, IndexConfig::default()),
            Err(Error::Config(ConfigError::EmptyKnowledgeBase))
        ));

        let blank = r#"{"symptoms": [{"symptom": "  ", "conditions": "flu"}]}"#;
        assert!(matches!(
            KnowledgeBase::from_json(blank, "t", None, IndexConfig::default()),
            Err(Error::Config(ConfigError::InvalidRecord { row: 1, .. }))
        ));

        let no_conditions = r#"{"symptoms": [{"symptom": "cough", "conditions": " , "}]}"#;
        assert!(matches!(
            KnowledgeBase::from_json(no_conditions, "t", None, IndexConfig::default()),
            Err(Error::Config(ConfigError::InvalidRecord { .. }))
        ));

        assert!(matches!(
            KnowledgeBase::from_json("not json", "t", None, IndexConfig::default()),
            Err(Error::Config(ConfigError::Parse { .. }))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap_or_else(|_| unreachable!());
        file.write_all(SMALL.as_bytes())
            .unwrap_or_else(|_| unreachable!());
        let kb = KnowledgeBase::load(Some(file.path()), None, IndexConfig::default())
            .unwrap_or_else(|e| unreachable!("{e}"));
        let results = kb
            .index
            .query("fever", &Profile::default(), &BTreeSet::new());
        assert_eq!(results.len(), 1);

        let missing = KnowledgeBase::load(
            Some(Path::new("/nonexistent/knowledge.json")),
            None,
            IndexConfig::default(),
        );
        assert!(matches!(missing, Err(Error::Config(ConfigError::Read { .. }))));
    }

    struct Constant(usize);

    impl Embedder for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn dimensions(&self) -> usize {
            self.0
        }

        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0; self.0])
        }
    }

    #[test]
    fn test_embeddings_attached_and_checked() {
        let kb = KnowledgeBase::from_json(
            SMALL,
            "small",
            Some(Arc::new(Constant(4))),
            IndexConfig::default(),
        )
        .unwrap_or_else(|e| unreachable!("{e}"));
        assert!(kb.index.records().iter().all(|r| r.embedding.len() == 4));

        let json = r#"{"symptoms": [{"symptom": "cough", "conditions": "flu", "embedding": [1.0, 0.0]}],
                       "advice": {"flu": {"tier": "monitor"}}}"#;
        let err = KnowledgeBase::from_json(json, "t", Some(Arc::new(Constant(4))), IndexConfig::default());
        assert!(matches!(
            err,
            Err(Error::Embedding(EmbeddingError::DimensionMismatch { expected: 4, got: 2 }))
        ));
    }
}
