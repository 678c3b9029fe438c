//! Memory creation, semantic search, chatbot, deletion.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use lifeos_ml_client::openai::VideoContext;
use lifeos_models::{MemoryPoint, VideoId};
use lifeos_vector::SearchParams;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const NO_VIDEOS_RESPONSE: &str = "I couldn't find any relevant videos to answer your question.";
const NO_SUMMARIES_RESPONSE: &str =
    "I found some relevant videos but couldn't access their detailed summaries.";
const NO_ANSWER_RESPONSE: &str =
    "I found some relevant videos but couldn't generate a proper response.";

#[derive(Debug, Deserialize)]
pub struct MemoryCreateRequest {
    /// Video file path or URL to embed.
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MemorySearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: u64,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

fn default_search_limit() -> u64 {
    10
}

#[derive(Debug, Serialize)]
pub struct MemorySearchResponse {
    pub results: Vec<Value>,
    pub total_found: usize,
    pub query: String,
    pub search_time_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    pub user_input: String,
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ChatbotResponse {
    pub original_input: String,
    pub refined_query: String,
    pub video_found: bool,
    pub ai_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Deserialize)]
pub struct MemoryDeleteRequest {
    pub memory_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MemoryDeleteResponse {
    pub deleted_count: u32,
    pub failed_count: u32,
    pub errors: Vec<String>,
}

/// Create a memory by embedding a video and upserting its point.
pub async fn create_memory(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<MemoryCreateRequest>,
) -> ApiResult<Json<Value>> {
    let task_id = if request.content.starts_with("http://") || request.content.starts_with("https://")
    {
        state
            .twelvelabs
            .create_embed_task_from_url(&request.content)
            .await?
    } else {
        state
            .twelvelabs
            .create_embed_task(std::path::Path::new(&request.content))
            .await?
    };

    state.twelvelabs.wait_for_embedding(&task_id).await?;
    let embedding = state.twelvelabs.retrieve_embedding(&task_id).await?;

    let memory = MemoryPoint::new(VideoId::new(), current_user.id, Utc::now(), embedding);
    state.vector.upsert_memory(&memory).await?;

    Ok(Json(json!({
        "id": memory.id,
        "content": request.content,
        "content_type": "video",
        "timestamp": memory.timestamp,
    })))
}

/// Text to embedding to filtered vector search, enriched per hit from the
/// relational store.
pub async fn search_memories(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<MemorySearchRequest>,
) -> ApiResult<Json<MemorySearchResponse>> {
    let started = Instant::now();

    let query_vector = state.twelvelabs.text_embedding(&request.query).await?;

    let hits = state
        .vector
        .search_memories(
            query_vector,
            &SearchParams {
                user_id: current_user.id,
                limit: request.limit,
                date_from: request.date_from,
                date_to: request.date_to,
                score_threshold: request.score_threshold,
            },
        )
        .await?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in &hits {
        let enriched = match state.db.get_video(hit.video_id, None).await? {
            Some(video) => json!({
                "id": hit.id,
                "video_id": hit.video_id,
                "timestamp": hit.timestamp.to_rfc3339(),
                "score": hit.score,
                "s3_url": video.s3_link,
                "detailed_summary": video.detailed_summary,
                "file_size": video.file_size,
                "processed_at": video.processed_at,
                "user_id": video.user_id,
            }),
            None => json!({
                "id": hit.id,
                "video_id": hit.video_id,
                "timestamp": hit.timestamp.to_rfc3339(),
                "score": hit.score,
                "s3_url": null,
                "detailed_summary": "Data not found",
                "file_size": null,
                "processed_at": null,
                "user_id": null,
            }),
        };
        results.push(enriched);
    }

    Ok(Json(MemorySearchResponse {
        total_found: results.len(),
        results,
        query: request.query,
        search_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    }))
}

/// Query rewrite, top-10 retrieval, grounded answer synthesis.
pub async fn chatbot_query(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChatbotRequest>,
) -> ApiResult<Json<ChatbotResponse>> {
    let started = Instant::now();

    // Step 1: rewrite; the raw input is the fallback.
    let refined_query = match &state.openai {
        Some(openai) => openai
            .refine_query(&request.user_input)
            .await
            .unwrap_or_else(|| request.user_input.clone()),
        None => request.user_input.clone(),
    };

    // Step 2: embed the refined query and pull the top matches.
    let query_vector = state.twelvelabs.text_embedding(&refined_query).await?;
    let hits = state
        .vector
        .search_memories(
            query_vector,
            &SearchParams {
                user_id: current_user.id,
                limit: 10,
                date_from: None,
                date_to: None,
                score_threshold: request.confidence_threshold,
            },
        )
        .await?;

    if hits.is_empty() {
        return Ok(Json(ChatbotResponse {
            original_input: request.user_input,
            refined_query,
            video_found: false,
            ai_response: NO_VIDEOS_RESPONSE.to_string(),
            video_id: None,
            timestamp: None,
            summary: None,
            confidence_score: None,
            processing_time_ms: elapsed_ms(started),
        }));
    }

    // Step 3: assemble contexts from the rows that still exist.
    let best = &hits[0];
    let mut contexts = Vec::with_capacity(hits.len());
    for hit in &hits {
        if let Some(video) = state.db.get_video(hit.video_id, None).await? {
            contexts.push(VideoContext {
                timestamp: hit.timestamp.to_rfc3339(),
                summary: video.detailed_summary,
                confidence_score: hit.score,
            });
        }
    }

    if contexts.is_empty() {
        return Ok(Json(ChatbotResponse {
            original_input: request.user_input,
            refined_query,
            video_found: true,
            ai_response: NO_SUMMARIES_RESPONSE.to_string(),
            video_id: Some(best.video_id),
            timestamp: Some(best.timestamp.to_rfc3339()),
            summary: Some("Video found but detailed summary not available".to_string()),
            confidence_score: Some(best.score),
            processing_time_ms: elapsed_ms(started),
        }));
    }

    // Step 4: answer the original question from the contexts alone.
    let ai_response = match &state.openai {
        Some(openai) => openai
            .contextual_answer(&request.user_input, &contexts)
            .await
            .unwrap_or_else(|_| NO_ANSWER_RESPONSE.to_string()),
        None => NO_ANSWER_RESPONSE.to_string(),
    };

    Ok(Json(ChatbotResponse {
        original_input: request.user_input,
        refined_query,
        video_found: true,
        ai_response,
        video_id: Some(best.video_id),
        timestamp: Some(best.timestamp.to_rfc3339()),
        summary: contexts.first().map(|c| c.summary.clone()),
        confidence_score: Some(best.score),
        processing_time_ms: elapsed_ms(started),
    }))
}

pub async fn delete_memories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(request): Json<MemoryDeleteRequest>,
) -> ApiResult<Json<MemoryDeleteResponse>> {
    if request.memory_ids.is_empty() {
        return Err(ApiError::bad_request("memory_ids must not be empty"));
    }

    let (deleted_count, failed_count, errors) =
        state.vector.delete_memories(&request.memory_ids).await;

    Ok(Json(MemoryDeleteResponse {
        deleted_count,
        failed_count,
        errors,
    }))
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
