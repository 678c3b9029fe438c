//! Daily insight summaries composed from stored analyses.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use lifeos_models::VideoRecord;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// The 5 most recent events with a composed summary.
pub async fn recent_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let videos = state.db.list_user_videos(current_user.id, 5, 0).await?;

    if videos.is_empty() {
        return Ok(Json(json!({
            "message": "No recent events found",
            "recent_events": [],
            "summary": "No activities recorded recently.",
        })));
    }

    let summary_parts: Vec<String> = videos
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.detailed_summary.is_empty())
        .map(|(i, v)| {
            format!(
                "{}. {}: {}...",
                i + 1,
                v.timestamp.to_rfc3339(),
                truncate(&v.detailed_summary, 100)
            )
        })
        .collect();

    let overall = format!(
        "Recent activity summary ({} events):\n{}",
        videos.len(),
        summary_parts.join("\n")
    );

    Ok(Json(json!({
        "message": format!("Found {} recent events", videos.len()),
        "recent_events": videos,
        "summary": overall,
    })))
}

/// Everything recorded today, recapped as a timeline.
pub async fn daily_recap(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let today = Utc::now().date_naive();

    let all_videos = state.db.list_user_videos(current_user.id, 1000, 0).await?;
    let mut today_videos: Vec<VideoRecord> = all_videos
        .into_iter()
        .filter(|v| video_date(v) == Some(today))
        .collect();

    if today_videos.is_empty() {
        return Ok(Json(json!({
            "date": today.to_string(),
            "message": "No events recorded today",
            "events_count": 0,
            "events": [],
            "daily_recap": format!(
                "No activities were recorded for {}. It was a quiet day!",
                today.format("%B %d, %Y")
            ),
        })));
    }

    today_videos.sort_by_key(|v| v.timestamp);

    let recap = compose_recap(&today_videos, today);

    Ok(Json(json!({
        "date": today.to_string(),
        "message": format!("Found {} events for today", today_videos.len()),
        "events_count": today_videos.len(),
        "events": today_videos,
        "daily_recap": recap,
    })))
}

fn video_date(video: &VideoRecord) -> Option<NaiveDate> {
    Some(video.timestamp.date_naive())
}

fn compose_recap(videos: &[VideoRecord], today: NaiveDate) -> String {
    let mut parts = vec![
        format!("Daily Recap for {}:", today.format("%B %d, %Y")),
        format!("Total events recorded: {}", videos.len()),
        String::new(),
        "Event Timeline:".to_string(),
    ];

    for video in videos {
        parts.push(format!(
            "{}: {}",
            format_time(video.timestamp),
            video.detailed_summary
        ));
    }

    parts.push(String::new());
    parts.push("Day Summary:".to_string());
    parts.push(format!(
        "You had {} recorded activities today. ",
        videos.len()
    ));
    parts.push(
        match videos.len() {
            n if n >= 10 => "It was quite a busy day with lots of activities!",
            n if n >= 5 => "You had a moderately active day.",
            _ => "It was a relatively quiet day.",
        }
        .to_string(),
    );

    parts.join("\n")
}

fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%I:%M %p").to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeos_models::VideoId;

    fn record(hour: u32, summary: &str) -> VideoRecord {
        let timestamp = Utc::now()
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc();
        VideoRecord {
            video_id: VideoId::new(),
            user_id: None,
            timestamp,
            datetime: timestamp,
            detailed_summary: summary.to_string(),
            s3_link: None,
            file_size: 0,
            processed_at: timestamp,
            twelvelabs_video_id: None,
            vector_status: None,
            vector_updated_at: None,
            vector_id: None,
            created_at: None,
        }
    }

    #[test]
    fn recap_grades_activity_level() {
        let today = Utc::now().date_naive();

        let quiet = compose_recap(&[record(9, "coffee")], today);
        assert!(quiet.contains("relatively quiet day"));

        let moderate: Vec<VideoRecord> = (9..14).map(|h| record(h, "work")).collect();
        assert!(compose_recap(&moderate, today).contains("moderately active day"));

        let busy: Vec<VideoRecord> = (8..18).map(|h| record(h, "work")).collect();
        assert!(compose_recap(&busy, today).contains("busy day"));
    }

    #[test]
    fn recap_contains_timeline_entries() {
        let today = Utc::now().date_naive();
        let recap = compose_recap(&[record(9, "morning standup")], today);
        assert!(recap.contains("Event Timeline:"));
        assert!(recap.contains("morning standup"));
        assert!(recap.contains("09:00 AM"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 100), "short");
    }
}
