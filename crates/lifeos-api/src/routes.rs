//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::auth::{login, me, register};
use crate::handlers::health::{health, ready};
use crate::handlers::highlights::list_highlights;
use crate::handlers::insights::{daily_recap, recent_events};
use crate::handlers::memory::{chatbot_query, create_memory, delete_memories, search_memories};
use crate::handlers::videos::{delete_video, get_video, list_videos};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me));

    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/:video_id", get(get_video).delete(delete_video));

    let memory_routes = Router::new()
        .route("/memory/create", post(create_memory))
        .route("/memory/search", post(search_memories))
        .route("/memory/chatbot", post(chatbot_query))
        .route("/memory/delete", delete(delete_memories));

    let insight_routes = Router::new()
        .route("/highlights/list", get(list_highlights))
        .route("/insights/recent", get(recent_events))
        .route("/insights/summary", get(daily_recap));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(video_routes)
        .merge(memory_routes)
        .merge(insight_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
