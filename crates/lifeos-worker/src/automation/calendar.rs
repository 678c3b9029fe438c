//! Calendar extraction: LLM-structured events, timezone-aware
//! normalization, posting with a simulated fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use lifeos_ml_client::OpenAiClient;
use lifeos_models::{CalendarEventRecord, ExtractedEvent, SegmentMetadata, VideoId};

/// Default event length when the extractor gives none.
const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Hour used when a time was mentioned but not parseable.
const FALLBACK_HOUR: u32 = 10;

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract calendar events from video summaries. Respond with a JSON array \
named nothing, just the array itself. Each element has: \
{\"title\", \"date\", \"time\", \"description\", \"location\", \"duration\", \"type\"}. \
Dates may be \"today\", \"tomorrow\", \"next week\", \"next month\", a weekday \
name, or YYYY-MM-DD. Times may be \"morning\", \"afternoon\", \"evening\", \
\"night\", \"H:MM am/pm\" or \"HH:MM\". Duration is in minutes. Type is \
\"meeting\", \"event\", \"reminder\" or \"deadline\". Return [] when the \
summary contains no schedulable event. Respond only with valid JSON.";

/// External calendar provider. Object-safe so tests and future providers
/// can slot in; when absent, posting is simulated.
pub trait CalendarApi: Send + Sync {
    fn insert_event<'a>(
        &'a self,
        event: &'a CalendarEventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;
}

/// Calendar extractor and poster.
pub struct CalendarExtractor {
    openai: Option<OpenAiClient>,
    provider: Option<Arc<dyn CalendarApi>>,
    calendar_id: String,
    tz: Tz,
}

impl CalendarExtractor {
    pub fn new(openai: Option<OpenAiClient>) -> Self {
        Self {
            openai,
            provider: None,
            calendar_id: std::env::var("CALENDAR_ID").unwrap_or_else(|_| "primary".to_string()),
            tz: New_York,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CalendarApi>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Extract, normalize and post every event found in the summary.
    /// Returns the log record aggregated into the automation report.
    pub async fn process_calendar_events(
        &self,
        summary: &str,
        video_id: VideoId,
        _metadata: &SegmentMetadata,
    ) -> Value {
        let events = self.extract_events(summary).await;
        if events.is_empty() {
            return json!({
                "calendar_automation_triggered": true,
                "events_created": [],
                "processing_timestamp": Utc::now(),
            });
        }

        let now_local = Utc::now().with_timezone(&self.tz);
        let mut created = Vec::with_capacity(events.len());

        for event in events {
            let record = normalize_event(&event, video_id, now_local.date_naive(), self.tz);
            let posted = self.post_event(&record).await;
            created.push(json!({
                "id": posted,
                "title": record.title,
                "start_time": record.start_time.to_rfc3339(),
                "end_time": record.end_time.to_rfc3339(),
                "duration_minutes": record.duration_minutes,
                "type": record.event_type,
            }));
        }

        json!({
            "calendar_automation_triggered": true,
            "events_created": created,
            "processing_timestamp": Utc::now(),
        })
    }

    /// Second LLM call with the structured-extraction prompt. An empty
    /// summary short-circuits without calling the LLM at all.
    pub async fn extract_events(&self, summary: &str) -> Vec<ExtractedEvent> {
        if summary.trim().is_empty() {
            return Vec::new();
        }
        let Some(client) = &self.openai else {
            return Vec::new();
        };

        let user_prompt = format!("Extract calendar events from this summary:\n\n{}", summary);
        match client.classify(EXTRACTION_SYSTEM_PROMPT, &user_prompt).await {
            Ok(response) => parse_events(&response),
            Err(e) => {
                warn!("Event extraction failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Post to the external provider, or fabricate the deterministic
    /// simulated record when none is configured or the call fails.
    async fn post_event(&self, record: &CalendarEventRecord) -> String {
        if let Some(provider) = &self.provider {
            match provider.insert_event(record).await {
                Ok(id) => {
                    info!(
                        "Created calendar event {} on {} ({})",
                        record.title, self.calendar_id, id
                    );
                    return id;
                }
                Err(e) => {
                    warn!("Calendar provider unavailable, simulating event: {}", e);
                }
            }
        }

        let id = format!("lifeos_event_{}", Utc::now().timestamp_millis());
        info!("Simulated calendar event {} ({})", record.title, id);
        id
    }
}

fn parse_events(response: &str) -> Vec<ExtractedEvent> {
    let text = response.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    match serde_json::from_str::<Vec<ExtractedEvent>>(text) {
        Ok(events) => events,
        Err(e) => {
            debug!("Event JSON parse failed: {}", e);
            Vec::new()
        }
    }
}

/// Resolve one extracted event into a concrete local-time record.
pub fn normalize_event(
    event: &ExtractedEvent,
    video_id: VideoId,
    today: NaiveDate,
    tz: Tz,
) -> CalendarEventRecord {
    let date = parse_event_date(&event.date, today);
    let time = parse_event_time(&event.time);

    let naive = date.and_time(time);
    let start_time = tz
        .from_local_datetime(&naive)
        .single()
        .or_else(|| tz.from_local_datetime(&naive).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive));

    let duration_minutes = if event.duration > 0 {
        event.duration
    } else {
        DEFAULT_DURATION_MINUTES
    };
    let end_time = start_time + ChronoDuration::minutes(duration_minutes as i64);

    let title = if event.title.is_empty() {
        "Event from LifeOS".to_string()
    } else {
        event.title.clone()
    };
    let event_type = if event.event_type.is_empty() {
        "event".to_string()
    } else {
        event.event_type.clone()
    };

    CalendarEventRecord {
        id: format!("pending_{}", video_id),
        title,
        description: format!("{}\n\nCreated from LifeOS video analysis", event.description),
        location: event.location.clone(),
        start_time: start_time.fixed_offset(),
        end_time: end_time.fixed_offset(),
        duration_minutes,
        event_type,
        source: "LifeOS".to_string(),
        created_at: Utc::now(),
    }
}

/// Resolve a date phrase relative to `today`.
///
/// Weekdays resolve to the next occurrence strictly in the future; a date
/// matching today advances a full week. ISO dates from an earlier year are
/// re-homed to the current year.
pub fn parse_event_date(raw: &str, today: NaiveDate) -> NaiveDate {
    let lower = raw.trim().to_lowercase();

    match lower.as_str() {
        "" | "today" => return today,
        "tomorrow" => return today + ChronoDuration::days(1),
        "next week" => return today + ChronoDuration::days(7),
        "next month" => return today + ChronoDuration::days(30),
        _ => {}
    }

    if let Some(weekday) = parse_weekday(&lower) {
        return next_weekday(today, weekday);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&lower, "%Y-%m-%d") {
        if date.year() < today.year() {
            // Years in the past are assumed to be user error.
            return NaiveDate::from_ymd_opt(today.year(), date.month(), date.day())
                .unwrap_or(today);
        }
        return date;
    }

    today
}

fn parse_weekday(raw: &str) -> Option<Weekday> {
    match raw {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Next occurrence of `weekday` strictly after `today`.
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + ChronoDuration::days(ahead as i64)
}

/// Resolve a time phrase. Named times map to fixed hours; otherwise
/// `H[:MM] am/pm` and 24-hour `HH:MM` are accepted, with 10:00 as the
/// fallback when nothing parses.
pub fn parse_event_time(raw: &str) -> NaiveTime {
    let lower = raw.trim().to_lowercase();

    let named = match lower.as_str() {
        "morning" => Some(9),
        "afternoon" => Some(14),
        "evening" => Some(18),
        "night" => Some(20),
        _ => None,
    };
    if let Some(hour) = named {
        return NaiveTime::from_hms_opt(hour, 0, 0).expect("fixed hour");
    }

    if let Some(time) = parse_clock_time(&lower) {
        return time;
    }

    NaiveTime::from_hms_opt(FALLBACK_HOUR, 0, 0).expect("fallback hour")
}

fn parse_clock_time(lower: &str) -> Option<NaiveTime> {
    // 12-hour forms: "3 pm", "3pm", "3:30 pm"
    for (suffix, offset) in [("am", 0u32), ("pm", 12u32)] {
        if let Some(prefix) = lower.strip_suffix(suffix) {
            let prefix = prefix.trim();
            let (hour_str, minute_str) = match prefix.split_once(':') {
                Some((h, m)) => (h, m),
                None => (prefix, "0"),
            };
            let hour: u32 = hour_str.trim().parse().ok()?;
            let minute: u32 = minute_str.trim().parse().ok()?;
            if !(1..=12).contains(&hour) || minute > 59 {
                return None;
            }
            let hour24 = (hour % 12) + offset;
            return NaiveTime::from_hms_opt(hour24, minute, 0);
        }
    }

    // 24-hour "HH:MM"
    let (hour_str, minute_str) = lower.split_once(':')?;
    let hour: u32 = hour_str.trim().parse().ok()?;
    let minute: u32 = minute_str.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> NaiveDate {
        // 2024-01-10 was a Wednesday.
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn relative_phrases_resolve() {
        let today = wednesday();
        assert_eq!(parse_event_date("today", today), today);
        assert_eq!(
            parse_event_date("tomorrow", today),
            NaiveDate::from_ymd_opt(2024, 1, 11).unwrap()
        );
        assert_eq!(
            parse_event_date("next week", today),
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap()
        );
        assert_eq!(
            parse_event_date("next month", today),
            NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()
        );
    }

    #[test]
    fn weekday_resolves_to_next_future_occurrence() {
        let today = wednesday();
        // Monday after Wednesday 2024-01-10 is 2024-01-15.
        assert_eq!(
            parse_event_date("Monday", today),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        // Same weekday advances a full week.
        assert_eq!(
            parse_event_date("wednesday", today),
            NaiveDate::from_ymd_opt(2024, 1, 17).unwrap()
        );
    }

    #[test]
    fn stale_iso_year_is_rehomed() {
        let today = wednesday();
        assert_eq!(
            parse_event_date("2020-03-15", today),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(
            parse_event_date("2024-06-01", today),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn named_times_map_to_fixed_hours() {
        assert_eq!(parse_event_time("morning"), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(parse_event_time("afternoon"), NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(parse_event_time("evening"), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(parse_event_time("night"), NaiveTime::from_hms_opt(20, 0, 0).unwrap());
    }

    #[test]
    fn clock_times_parse_in_both_conventions() {
        assert_eq!(parse_event_time("3 PM"), NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(parse_event_time("3:30 pm"), NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert_eq!(parse_event_time("12 am"), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(parse_event_time("09:15"), NaiveTime::from_hms_opt(9, 15, 0).unwrap());
    }

    #[test]
    fn unparseable_time_defaults_to_ten() {
        assert_eq!(parse_event_time("sometime soon"), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(parse_event_time(""), NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn team_sync_monday_scenario() {
        // "Team sync Monday at 3 PM" seen on a Wednesday.
        let event = ExtractedEvent {
            title: "Team sync".to_string(),
            date: "Monday".to_string(),
            time: "3 PM".to_string(),
            description: "Q1 plan".to_string(),
            location: String::new(),
            duration: 0,
            event_type: "meeting".to_string(),
        };

        let record = normalize_event(&event, VideoId::new(), wednesday(), New_York);

        assert_eq!(record.duration_minutes, 60);
        assert_eq!(
            record.start_time.naive_local(),
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap()
        );
        assert_eq!(
            record.end_time - record.start_time,
            ChronoDuration::minutes(60)
        );
        // January in New York is UTC-5.
        assert_eq!(record.start_time.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(record.event_type, "meeting");
    }

    #[tokio::test]
    async fn empty_summary_skips_the_llm() {
        // No client configured would panic if called; empty input must
        // short-circuit before reaching it.
        let extractor = CalendarExtractor::new(None);
        assert!(extractor.extract_events("").await.is_empty());
        assert!(extractor.extract_events("   ").await.is_empty());
    }

    #[test]
    fn parse_events_tolerates_fences_and_garbage() {
        let fenced = "```json\n[{\"title\": \"Standup\", \"date\": \"tomorrow\"}]\n```";
        let events = parse_events(fenced);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Standup");

        assert!(parse_events("no events here").is_empty());
    }
}
