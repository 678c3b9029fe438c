//! Automation controller: classify, dispatch concurrently, aggregate.

use chrono::Utc;
use tracing::info;

use lifeos_models::{
    AutomationKind, AutomationOutcome, AutomationReport, SegmentMetadata, VideoId,
};

use crate::automation::calendar::CalendarExtractor;
use crate::automation::classifier;
use crate::automation::highlights::HighlightsSink;
use crate::services::Services;

/// Orchestrates the downstream automations for one summary. Runs on the
/// pool's detached task group; outcomes are logged, never propagated into
/// the worker loop.
pub struct AutomationController {
    openai: Option<lifeos_ml_client::OpenAiClient>,
    calendar: CalendarExtractor,
    highlights: HighlightsSink,
}

impl AutomationController {
    pub fn new(services: &Services) -> Self {
        Self {
            openai: services.openai.clone(),
            calendar: CalendarExtractor::new(services.openai.clone()),
            highlights: HighlightsSink::new(services.db.clone()),
        }
    }

    /// Classify the summary and dispatch the elected automations
    /// concurrently, collecting one outcome per dispatch.
    pub async fn process_summary(
        &self,
        video_id: VideoId,
        summary: &str,
        metadata: &SegmentMetadata,
    ) -> AutomationReport {
        info!(video_id = %video_id, "Processing automations");

        let analysis = classifier::classify(self.openai.as_ref(), summary).await;
        info!(
            video_id = %video_id,
            triggered = ?analysis.triggered_automations,
            "Classifier decision"
        );

        let run_calendar = analysis.triggers(AutomationKind::Calendar);
        let run_highlights = analysis.triggers(AutomationKind::Highlights);

        let (calendar_outcome, highlights_outcome) = tokio::join!(
            async {
                if !run_calendar {
                    return None;
                }
                let result = self
                    .calendar
                    .process_calendar_events(summary, video_id, metadata)
                    .await;
                Some(AutomationOutcome::success(AutomationKind::Calendar, result))
            },
            async {
                if !run_highlights {
                    return None;
                }
                let result = self.highlights.add_to_highlights(video_id, metadata).await;
                let outcome = if result["highlights_automation_triggered"] == true {
                    AutomationOutcome::success(AutomationKind::Highlights, result)
                } else {
                    let reason = result["reason"].as_str().unwrap_or("unknown").to_string();
                    AutomationOutcome {
                        kind: AutomationKind::Highlights.as_str().to_string(),
                        status: "skipped".to_string(),
                        result: Some(result),
                        error: Some(reason),
                    }
                };
                Some(outcome)
            },
        );

        let automations_triggered = [calendar_outcome, highlights_outcome]
            .into_iter()
            .flatten()
            .collect();

        AutomationReport {
            video_id,
            processed_at: Utc::now(),
            analysis,
            automations_triggered,
        }
    }
}
