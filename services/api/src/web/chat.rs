//! services/api/src/web/chat.rs
//!
//! The chat surface: message send, history, and the explicit session
//! lifecycle (start / end / active / list). Starting a session is the only
//! way into the state machine; sending a message without an active session
//! is a conflict rather than an implicit start.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use lumen_core::domain::{ChatMessage, ChatSession};
use lumen_core::metrics::{local_now, local_offset};
use lumen_core::ports::PortError;
use lumen_core::risk::{contains_risk_factors, ESCALATED_RISK_LEVEL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

/// Returned in place of the assistant's reply when the LLM call fails.
const FALLBACK_REPLY: &str = "I apologize, but I'm having trouble processing your message \
right now. Could you please try again?";

/// How many recent messages are replayed as context for the next reply.
const CONTEXT_MESSAGES: i64 = 5;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
    pub is_user: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub content: String,
    pub is_user: bool,
    pub sentiment: Option<String>,
    /// Message timestamp rendered in the fixed UTC-3 offset.
    pub timestamp: String,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            session_id: message.session_id,
            content: message.content,
            is_user: message.is_user,
            sentiment: message.sentiment,
            timestamp: message
                .created_at
                .with_timezone(&local_offset())
                .to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub is_active: bool,
    pub risk_level: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ChatSession> for SessionResponse {
    fn from(session: ChatSession) -> Self {
        Self {
            id: session.id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            is_active: session.is_active,
            risk_level: session.risk_level,
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistorySessionResponse {
    pub id: Uuid,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub sentiment_score: Option<String>,
    pub risk_level: Option<String>,
    pub messages: Vec<MessageResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatHistoryResponse {
    pub sessions: Vec<HistorySessionResponse>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub sort_order: Option<String>,
}

/// A missing active session is the caller's problem (409); any other lookup
/// failure keeps its real status instead of masquerading as one.
fn no_active_session_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (
            StatusCode::CONFLICT,
            "No active session. Start a session before sending messages.".to_string(),
        ),
        other => crate::web::error_response(other),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/chat/message - Send a message in the caller's active session
#[utoipa::path(
    post,
    path = "/api/chat/message",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "The assistant's reply (or the stored message for non-user turns)", body = MessageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "No active session")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // An active session is required; there is no implicit session creation
    // here, otherwise messages could bypass the credit check entirely.
    let session = state
        .db
        .get_active_session(user_id)
        .await
        .map_err(no_active_session_response)?;

    // Best-effort sentiment tag; an untagged message is fine.
    let analysis = if req.is_user {
        match state.chat_adapter.analyze_sentiment(&req.content).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Sentiment analysis failed, storing untagged message: {e}");
                None
            }
        }
    } else {
        None
    };

    let sentiment = analysis.as_ref().map(|a| a.sentiment.as_str());
    let stored = state
        .db
        .save_message(session.id, &req.content, req.is_user, sentiment)
        .await
        .map_err(crate::web::error_response)?;

    // Crisis keywords or a high-risk analysis escalate the session.
    if req.is_user {
        let analyzed_high = analysis
            .as_ref()
            .is_some_and(|a| a.risk_level == ESCALATED_RISK_LEVEL);
        if analyzed_high || contains_risk_factors(&req.content) {
            state
                .db
                .escalate_risk_level(session.id, ESCALATED_RISK_LEVEL)
                .await
                .map_err(crate::web::error_response)?;
        }
    }

    if !req.is_user {
        return Ok(Json(MessageResponse::from(stored)));
    }

    // Reply with short context; a failed LLM call degrades to an apology.
    let context = state
        .db
        .recent_messages(session.id, CONTEXT_MESSAGES)
        .await
        .map_err(crate::web::error_response)?;

    let reply = match state
        .chat_adapter
        .generate_reply(&req.content, &context)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Chat completion failed, sending fallback reply: {e}");
            FALLBACK_REPLY.to_string()
        }
    };

    let ai_message = state
        .db
        .save_message(session.id, &reply, false, None)
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(MessageResponse::from(ai_message)))
}

/// GET /api/chat/history - All of the caller's sessions with their messages
#[utoipa::path(
    get,
    path = "/api/chat/history",
    params(("sort_order" = Option<String>, Query, description = "asc or desc (default desc)")),
    responses(
        (status = 200, description = "Sessions with nested messages", body = ChatHistoryResponse),
        (status = 400, description = "Invalid sort order"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn chat_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let newest_first = match query.sort_order.as_deref() {
        None | Some("desc") => true,
        Some("asc") => false,
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Invalid sort_order '{}', expected asc or desc", other),
            ))
        }
    };

    let sessions = state
        .db
        .list_sessions(user_id, newest_first)
        .await
        .map_err(crate::web::error_response)?;

    let mut history = Vec::with_capacity(sessions.len());
    for session in sessions {
        let messages = state
            .db
            .get_messages(session.id)
            .await
            .map_err(crate::web::error_response)?;

        history.push(HistorySessionResponse {
            id: session.id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            sentiment_score: session.sentiment_score,
            risk_level: session.risk_level,
            messages: messages.into_iter().map(MessageResponse::from).collect(),
        });
    }

    Ok(Json(ChatHistoryResponse { sessions: history }))
}

/// GET /api/chat/sessions - The caller's sessions, newest first
#[utoipa::path(
    get,
    path = "/api/chat/sessions",
    responses(
        (status = 200, description = "All sessions of the caller", body = [SessionResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sessions = state
        .db
        .list_sessions(user_id, true)
        .await
        .map_err(crate::web::error_response)?;

    let response: Vec<SessionResponse> = sessions.into_iter().map(SessionResponse::from).collect();
    Ok(Json(response))
}

/// POST /api/chat/session/start - Start a new session, consuming one credit
#[utoipa::path(
    post,
    path = "/api/chat/session/start",
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 403, description = "No session credits left"),
        (status = 409, description = "An active session already exists")
    )
)]
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let started_at = local_now().to_rfc3339();
    let session = state
        .db
        .start_session(user_id, &started_at)
        .await
        .map_err(crate::web::error_response)?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// POST /api/chat/session/{session_id}/end - End the caller's active session
#[utoipa::path(
    post,
    path = "/api/chat/session/{session_id}/end",
    params(("session_id" = Uuid, Path, description = "The session to end")),
    responses(
        (status = 200, description = "Session ended", body = SessionResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already ended")
    )
)]
pub async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ended_at = local_now().to_rfc3339();
    let session = state
        .db
        .end_session(session_id, user_id, &ended_at)
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(SessionResponse::from(session)))
}

/// GET /api/chat/session/active - The caller's currently active session
#[utoipa::path(
    get,
    path = "/api/chat/session/active",
    responses(
        (status = 200, description = "The active session", body = SessionResponse),
        (status = 404, description = "No active session")
    )
)]
pub async fn active_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .db
        .get_active_session(user_id)
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(SessionResponse::from(session)))
}

/// GET /api/chat/session/{session_id}/messages - Messages of one session
#[utoipa::path(
    get,
    path = "/api/chat/session/{session_id}/messages",
    params(("session_id" = Uuid, Path, description = "The session to read")),
    responses(
        (status = 200, description = "Messages in chronological order", body = [MessageResponse]),
        (status = 404, description = "Session not found")
    )
)]
pub async fn session_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Ownership check before exposing any messages.
    state
        .db
        .get_session(session_id, user_id)
        .await
        .map_err(crate::web::error_response)?;

    let messages = state
        .db
        .get_messages(session_id)
        .await
        .map_err(crate::web::error_response)?;

    let response: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_active_session_is_a_conflict() {
        let (status, body) =
            no_active_session_response(PortError::NotFound("No active session found".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body,
            "No active session. Start a session before sending messages."
        );
    }

    #[test]
    fn session_lookup_outage_is_not_reported_as_a_conflict() {
        let (status, body) = no_active_session_response(PortError::Unexpected(
            "connection pool timed out".to_string(),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("connection pool timed out"));
    }
}
