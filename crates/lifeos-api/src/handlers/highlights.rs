//! Highlights listing with full video enrichment.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::state::AppState;

const PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// Every highlight joined with its video row, newest first. Highlights
/// whose video has since been deleted are skipped.
pub async fn list_highlights(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> ApiResult<Json<Value>> {
    let rows = state.db.list_highlights(current_user.id).await?;

    let mut highlights = Vec::with_capacity(rows.len());
    for row in rows {
        let video = match state.db.get_video(row.video_id, None).await {
            Ok(Some(mut video)) => {
                if let Some(link) = &video.s3_link {
                    video.s3_link = Some(state.storage.presign_url(link, PRESIGN_TTL).await);
                }
                video
            }
            Ok(None) => {
                warn!(video_id = %row.video_id, "Highlighted video no longer exists");
                continue;
            }
            Err(e) => {
                warn!(video_id = %row.video_id, "Video fetch failed: {}", e);
                continue;
            }
        };

        highlights.push(json!({
            "highlight_id": row.highlight_id,
            "created_at": row.created_at,
            "videos": video,
        }));
    }

    Ok(Json(json!({
        "total": highlights.len(),
        "highlights": highlights,
    })))
}
