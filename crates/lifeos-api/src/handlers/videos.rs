//! Video listing, lookup and deletion.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use lifeos_models::{VideoId, VideoRecord};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Playback links stay valid for one hour.
const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

/// Rewrite the stored link into a presigned one for playback.
async fn presign_link(state: &AppState, record: &mut VideoRecord) {
    if let Some(link) = &record.s3_link {
        record.s3_link = Some(state.storage.presign_url(link, PRESIGN_TTL).await);
    }
}

pub async fn list_videos(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<VideoRecord>>> {
    let limit = query.limit.clamp(1, 100);
    let mut videos = state
        .db
        .list_user_videos(current_user.id, limit, query.offset)
        .await?;

    for video in &mut videos {
        presign_link(&state, video).await;
    }

    Ok(Json(videos))
}

pub async fn get_video(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<VideoRecord>> {
    let mut video = state
        .db
        .get_video(VideoId::from(video_id), Some(current_user.id))
        .await?
        .ok_or_else(not_found)?;

    presign_link(&state, &mut video).await;
    Ok(Json(video))
}

pub async fn delete_video(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state
        .db
        .delete_video(VideoId::from(video_id), current_user.id)
        .await
        .map_err(|e| match e {
            lifeos_db::DbError::NotFound(_) => not_found(),
            other => other.into(),
        })?;

    Ok(Json(json!({"message": "Video deleted successfully"})))
}

/// One message for both missing and not-owned rows.
fn not_found() -> ApiError {
    ApiError::not_found("Video not found or you don't have permission to access it")
}
