//! Automation classification and dispatch results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::video::VideoId;

/// Automations the classifier may elect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationKind {
    Calendar,
    Highlights,
}

impl AutomationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationKind::Calendar => "calendar",
            AutomationKind::Highlights => "highlights",
        }
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-automation confidence reported by the classifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceScores {
    #[serde(default)]
    pub calendar: f64,
    #[serde(default)]
    pub highlights: f64,
}

/// Classifier output. Every field is defaulted so a partially well-formed
/// LLM response still deserializes; unknown automation labels are dropped
/// during deserialization rather than failing the whole payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryAnalysis {
    #[serde(default, deserialize_with = "lenient_kinds")]
    pub triggered_automations: Vec<AutomationKind>,
    #[serde(default)]
    pub confidence_scores: ConfidenceScores,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub summary_classification: String,
}

fn lenient_kinds<'de, D>(deserializer: D) -> Result<Vec<AutomationKind>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<Value> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|v| serde_json::from_value::<AutomationKind>(v).ok())
        .collect())
}

impl SummaryAnalysis {
    pub fn triggers(&self, kind: AutomationKind) -> bool {
        self.triggered_automations.contains(&kind)
    }
}

/// Outcome of one dispatched automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AutomationOutcome {
    pub fn success(kind: AutomationKind, result: Value) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            status: "success".to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(kind: AutomationKind, error: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            status: "failed".to_string(),
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate report for one video, correlated by the linking id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationReport {
    pub video_id: VideoId,
    pub processed_at: DateTime<Utc>,
    pub analysis: SummaryAnalysis,
    pub automations_triggered: Vec<AutomationOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_fills_missing_fields_with_defaults() {
        let analysis: SummaryAnalysis =
            serde_json::from_str(r#"{"triggered_automations": ["calendar"]}"#).unwrap();
        assert!(analysis.triggers(AutomationKind::Calendar));
        assert!(!analysis.triggers(AutomationKind::Highlights));
        assert_eq!(analysis.confidence_scores.calendar, 0.0);
        assert!(analysis.reasoning.is_empty());
    }

    #[test]
    fn unknown_labels_are_dropped_not_fatal() {
        let analysis: SummaryAnalysis = serde_json::from_str(
            r#"{"triggered_automations": ["calendar", "email", "highlights"]}"#,
        )
        .unwrap();
        assert_eq!(
            analysis.triggered_automations,
            vec![AutomationKind::Calendar, AutomationKind::Highlights]
        );
    }

    #[test]
    fn outcome_serializes_type_field() {
        let outcome = AutomationOutcome::failure(AutomationKind::Highlights, "db down");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "highlights");
        assert_eq!(json["status"], "failed");
    }
}
