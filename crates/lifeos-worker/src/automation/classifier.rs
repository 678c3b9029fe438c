//! Summary classification: LLM first, keyword heuristic as fallback.

use tracing::{debug, warn};

use lifeos_ml_client::OpenAiClient;
use lifeos_models::{AutomationKind, ConfidenceScores, SummaryAnalysis};

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are an AI assistant that analyzes video summaries to determine which \
automations should be triggered. Always respond with valid JSON.";

const CALENDAR_KEYWORDS: &[&str] = &[
    "meeting",
    "appointment",
    "schedule",
    "call",
    "conference",
    "deadline",
    "due date",
    "reminder",
    "event",
    "presentation",
];

const HIGHLIGHTS_KEYWORDS: &[&str] = &[
    "important",
    "significant",
    "breakthrough",
    "achievement",
    "milestone",
    "success",
    "discovery",
    "insight",
    "memorable",
];

fn build_user_prompt(summary: &str) -> String {
    format!(
        r#"Analyze the following video summary and determine which automations should be triggered.

Video Summary: "{}"

Please respond with a JSON object containing:
- "triggered_automations": array of strings (can include "calendar", "highlights", or both, or neither)
- "confidence_scores": object with confidence scores (0.0-1.0) for each automation type
- "reasoning": brief explanation of why each automation was/wasn't triggered
- "summary_classification": general category of the content

Guidelines:
- "calendar" should be triggered for: meetings, appointments, deadlines, scheduled events, reminders
- "highlights" should be triggered for: moments you'd want to take photos/videos of - fun experiences, memorable moments, achievements, celebrations, special occasions, interesting discoveries, beautiful scenes, social gatherings, personal milestones, funny incidents, travel moments, creative work, or anything that would make a good story or memory

Think of highlights as "life moments worth capturing" - not just important business events, but also joyful, fun, interesting, or memorable personal experiences.

Respond only with valid JSON."#,
        summary
    )
}

/// Classify a summary. Any LLM failure, including malformed JSON, falls
/// back to the deterministic keyword heuristic; the pipeline never aborts
/// on a bad response.
pub async fn classify(openai: Option<&OpenAiClient>, summary: &str) -> SummaryAnalysis {
    let Some(client) = openai else {
        return keyword_fallback(summary);
    };

    match client
        .classify(CLASSIFIER_SYSTEM_PROMPT, &build_user_prompt(summary))
        .await
    {
        Ok(response) => match parse_analysis(&response) {
            Some(analysis) => analysis,
            None => {
                warn!("Classifier returned unparseable JSON, using keyword fallback");
                keyword_fallback(summary)
            }
        },
        Err(e) => {
            warn!("Classifier call failed, using keyword fallback: {}", e);
            keyword_fallback(summary)
        }
    }
}

/// Parse the classifier response, tolerating markdown code fences.
pub fn parse_analysis(response: &str) -> Option<SummaryAnalysis> {
    let text = strip_code_fences(response);
    match serde_json::from_str::<SummaryAnalysis>(text) {
        Ok(analysis) => Some(analysis),
        Err(e) => {
            debug!("Classifier JSON parse failed: {}", e);
            None
        }
    }
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Deterministic keyword heuristic used when the LLM is unavailable or
/// returns garbage.
pub fn keyword_fallback(summary: &str) -> SummaryAnalysis {
    let lower = summary.to_lowercase();
    let mut triggered = Vec::new();

    if CALENDAR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        triggered.push(AutomationKind::Calendar);
    }
    if HIGHLIGHTS_KEYWORDS.iter().any(|k| lower.contains(k)) {
        triggered.push(AutomationKind::Highlights);
    }

    SummaryAnalysis {
        triggered_automations: triggered,
        confidence_scores: ConfidenceScores::default(),
        reasoning: "Fallback analysis used due to API error".to_string(),
        summary_classification: "general".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_trigger_calendar() {
        let analysis = keyword_fallback("Discussed the project deadline with the team.");
        assert!(analysis.triggers(AutomationKind::Calendar));
        assert!(!analysis.triggers(AutomationKind::Highlights));
    }

    #[test]
    fn keywords_trigger_highlights() {
        let analysis = keyword_fallback("What an achievement, truly a memorable day!");
        assert!(analysis.triggers(AutomationKind::Highlights));
        assert!(!analysis.triggers(AutomationKind::Calendar));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let analysis = keyword_fallback("MEETING with the board about a MILESTONE.");
        assert!(analysis.triggers(AutomationKind::Calendar));
        assert!(analysis.triggers(AutomationKind::Highlights));
    }

    #[test]
    fn plain_summary_triggers_nothing() {
        let analysis = keyword_fallback("A person is washing dishes in the kitchen.");
        assert!(analysis.triggered_automations.is_empty());
    }

    #[test]
    fn parse_tolerates_markdown_fences() {
        let wrapped = "```json\n{\"triggered_automations\": [\"highlights\"]}\n```";
        let analysis = parse_analysis(wrapped).unwrap();
        assert!(analysis.triggers(AutomationKind::Highlights));
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_analysis("I think calendar should trigger").is_none());
    }

    #[tokio::test]
    async fn missing_client_uses_fallback() {
        let analysis = classify(None, "Team conference at noon.").await;
        assert!(analysis.triggers(AutomationKind::Calendar));
        assert_eq!(analysis.summary_classification, "general");
    }
}
