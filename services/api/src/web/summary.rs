//! services/api/src/web/summary.rs
//!
//! Session summaries and metrics. A summary is generated at most once per
//! session; the metrics endpoint recomputes on every call.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use lumen_core::domain::{SessionMetrics, SessionSummary};
use lumen_core::metrics::{calculate_session_metrics, local_now};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub overall_sentiment: String,
    pub risk_level: String,
    pub key_topics: Vec<String>,
    pub suggestions: Vec<String>,
    pub progress_observations: Vec<String>,
    pub message_count: i32,
    pub duration_minutes: f64,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<SessionSummary> for SummaryResponse {
    fn from(summary: SessionSummary) -> Self {
        Self {
            id: summary.id,
            session_id: summary.session_id,
            overall_sentiment: summary.overall_sentiment,
            risk_level: summary.risk_level,
            key_topics: summary.key_topics,
            suggestions: summary.suggestions,
            progress_observations: summary.progress_observations,
            message_count: summary.message_count,
            duration_minutes: summary.duration_minutes,
            summary_text: summary.summary_text,
            created_at: summary.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SentimentDistributionResponse {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Serialize, ToSchema)]
pub struct MetricsResponse {
    pub message_count: usize,
    pub duration_minutes: f64,
    pub overall_sentiment: String,
    pub risk_level: String,
    pub sentiment_distribution: SentimentDistributionResponse,
}

impl From<SessionMetrics> for MetricsResponse {
    fn from(metrics: SessionMetrics) -> Self {
        Self {
            message_count: metrics.message_count,
            duration_minutes: metrics.duration_minutes,
            overall_sentiment: metrics.overall_sentiment,
            risk_level: metrics.risk_level,
            sentiment_distribution: SentimentDistributionResponse {
                positive: metrics.sentiment_distribution.positive,
                negative: metrics.sentiment_distribution.negative,
                neutral: metrics.sentiment_distribution.neutral,
            },
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/summary/sessions/{session_id}/summary - Fetch an existing summary
#[utoipa::path(
    get,
    path = "/api/summary/sessions/{session_id}/summary",
    params(("session_id" = Uuid, Path, description = "The summarized session")),
    responses(
        (status = 200, description = "The stored summary", body = SummaryResponse),
        (status = 404, description = "Session or summary not found")
    )
)]
pub async fn get_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .get_session(session_id, user_id)
        .await
        .map_err(crate::web::error_response)?;

    let summary = state
        .db
        .get_summary(session_id)
        .await
        .map_err(crate::web::error_response)?
        .ok_or((StatusCode::NOT_FOUND, "Summary not found".to_string()))?;

    Ok(Json(SummaryResponse::from(summary)))
}

/// POST /api/summary/sessions/{session_id}/summary - Generate the one-time summary
#[utoipa::path(
    post,
    path = "/api/summary/sessions/{session_id}/summary",
    params(("session_id" = Uuid, Path, description = "The session to summarize")),
    responses(
        (status = 201, description = "Summary generated and stored", body = SummaryResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Summary already exists for this session"),
        (status = 500, description = "Summary generation failed")
    )
)]
pub async fn create_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .db
        .get_session(session_id, user_id)
        .await
        .map_err(crate::web::error_response)?;

    if state
        .db
        .get_summary(session_id)
        .await
        .map_err(crate::web::error_response)?
        .is_some()
    {
        return Err((
            StatusCode::CONFLICT,
            "Summary already exists for this session".to_string(),
        ));
    }

    let messages = state
        .db
        .get_messages(session_id)
        .await
        .map_err(crate::web::error_response)?;

    let metrics = calculate_session_metrics(&session, &messages, local_now())
        .map_err(crate::web::error_response)?;

    // Unlike chat replies, a failed generation here surfaces to the caller.
    let content = state
        .summary_adapter
        .generate_summary(&messages, &metrics)
        .await
        .map_err(crate::web::error_response)?;

    let summary = state
        .db
        .create_summary(session_id, &metrics, &content)
        .await
        .map_err(crate::web::error_response)?;

    Ok((StatusCode::CREATED, Json(SummaryResponse::from(summary))))
}

/// GET /api/summary/sessions/{session_id}/metrics - Recompute session metrics
#[utoipa::path(
    get,
    path = "/api/summary/sessions/{session_id}/metrics",
    params(("session_id" = Uuid, Path, description = "The session to measure")),
    responses(
        (status = 200, description = "Derived session metrics", body = MetricsResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn session_metrics_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .db
        .get_session(session_id, user_id)
        .await
        .map_err(crate::web::error_response)?;

    let messages = state
        .db
        .get_messages(session_id)
        .await
        .map_err(crate::web::error_response)?;

    let metrics = calculate_session_metrics(&session, &messages, local_now())
        .map_err(crate::web::error_response)?;

    Ok(Json(MetricsResponse::from(metrics)))
}
