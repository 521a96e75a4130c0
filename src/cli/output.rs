//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::{BundleKind, ResponseBundle};
use crate::search::ScoredRecord;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One compact JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format, newline terminated.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        let mut out = rendered
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string());
        out.push('\n');
        out
    }
}

/// Search hit as serialized for JSON output.
#[derive(Debug, Serialize)]
pub struct SearchHit<'a> {
    /// Symptom id.
    pub id: u32,
    /// Symptom text.
    pub symptom: &'a str,
    /// Relevance score.
    pub score: f32,
    /// Associated conditions.
    pub conditions: Vec<&'a str>,
}

impl<'a> From<&ScoredRecord<'a>> for SearchHit<'a> {
    fn from(s: &ScoredRecord<'a>) -> Self {
        Self {
            id: s.record.id.0,
            symptom: &s.record.text,
            score: s.score,
            conditions: s
                .record
                .associated_conditions
                .iter()
                .map(|c| c.as_str())
                .collect(),
        }
    }
}

/// Formats a search ranking as text.
#[must_use]
pub fn format_search_results(results: &[ScoredRecord<'_>], mode: &str) -> String {
    if results.is_empty() {
        return format!("No matching symptoms ({mode} scoring).\n");
    }
    let mut out = format!("{} match(es), {mode} scoring:\n", results.len());
    for s in results {
        let conditions: Vec<&str> = s
            .record
            .associated_conditions
            .iter()
            .map(|c| c.as_str())
            .collect();
        let _ = writeln!(
            out,
            "  #{:<3} {:.3}  {}  [{}]",
            s.record.id.0,
            s.score,
            s.record.text,
            conditions.join(", ")
        );
    }
    out
}

/// Formats one response bundle as text.
#[must_use]
pub fn format_bundle(bundle: &ResponseBundle) -> String {
    let mut out = format!("Assistant: {}\n", bundle.text);
    match bundle.kind {
        BundleKind::FollowUp => {
            let _ = writeln!(
                out,
                "  (follow-up {}/{})",
                bundle.follow_ups_asked, bundle.max_follow_ups
            );
        }
        BundleKind::Diagnosis | BundleKind::Degraded => {
            if let Some(tier) = bundle.advice_tier {
                let _ = writeln!(out, "  Advice tier: {tier}");
            }
            if !bundle.risk_modifiers.is_empty() {
                let factors: Vec<String> =
                    bundle.risk_modifiers.iter().map(ToString::to_string).collect();
                let _ = writeln!(out, "  Risk factors: {}", factors.join(", "));
            }
            if bundle.forced_diagnosis {
                let _ = writeln!(
                    out,
                    "  Follow-up limit reached ({}/{})",
                    bundle.follow_ups_asked, bundle.max_follow_ups
                );
            }
            if let Some(explanation) = &bundle.explanation {
                let _ = writeln!(out, "  Why: {}", explanation.text);
            }
            if let Some(notice) = &bundle.notice {
                let _ = writeln!(out, "  Notice: {notice}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Explanation, ExplanationSource};
    use crate::core::AdviceTier;

    fn follow_up() -> ResponseBundle {
        ResponseBundle {
            kind: BundleKind::FollowUp,
            text: "Do you have a cough?".to_string(),
            advice_tier: None,
            advice: None,
            explanation: None,
            condition: None,
            risk_modifiers: Vec::new(),
            forced_diagnosis: false,
            follow_ups_asked: 1,
            max_follow_ups: 3,
            notice: None,
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("whatever"), OutputFormat::Text);
    }

    #[test]
    fn test_ndjson_is_one_line() {
        let out = OutputFormat::Ndjson.to_json(&follow_up());
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_format_follow_up() {
        assert_eq!(
            format_bundle(&follow_up()),
            "Assistant: Do you have a cough?\n  (follow-up 1/3)\n"
        );
    }

    #[test]
    fn test_format_degraded() {
        let bundle = ResponseBundle {
            kind: BundleKind::Degraded,
            text: "Likely flu.".to_string(),
            advice_tier: Some(AdviceTier::Monitor),
            explanation: Some(Explanation {
                text: "Because fever.".to_string(),
                source: ExplanationSource::Templated,
                degraded: true,
            }),
            notice: Some("offline".to_string()),
            ..follow_up()
        };
        let text = format_bundle(&bundle);
        assert!(text.contains("Advice tier: monitor"));
        assert!(text.contains("Why: Because fever."));
        assert!(text.contains("Notice: offline"));
    }
}
