//! services/api/src/web/mod.rs
//!
//! The axum web layer: one module per endpoint group, the shared state, the
//! auth middleware and the OpenAPI master definition.

pub mod auth;
pub mod bundles;
pub mod chat;
pub mod middleware;
pub mod payment;
pub mod state;
pub mod summary;
pub mod users;

pub use middleware::require_auth;

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use lumen_core::ports::PortError;
use serde_json::json;
use tracing::error;
use utoipa::OpenApi;

/// GET /health - Liveness probe.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Maps a `PortError` onto the HTTP error tuple the handlers return.
///
/// Server-side failures are logged here so the handlers don't have to.
pub(crate) fn error_response(e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Upstream(_) | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {:?}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        users::list_users_handler,
        users::session_balance_handler,
        users::get_user_handler,
        chat::send_message_handler,
        chat::chat_history_handler,
        chat::list_sessions_handler,
        chat::start_session_handler,
        chat::end_session_handler,
        chat::active_session_handler,
        chat::session_messages_handler,
        summary::get_summary_handler,
        summary::create_summary_handler,
        summary::session_metrics_handler,
        bundles::list_bundles_handler,
        bundles::create_bundle_handler,
        payment::create_checkout_handler,
        payment::webhook_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            users::UserResponse,
            users::SessionBalanceResponse,
            chat::SendMessageRequest,
            chat::MessageResponse,
            chat::SessionResponse,
            chat::HistorySessionResponse,
            chat::ChatHistoryResponse,
            summary::SummaryResponse,
            summary::MetricsResponse,
            summary::SentimentDistributionResponse,
            bundles::BundleResponse,
            bundles::CreateBundleRequest,
            payment::CreateCheckoutRequest,
            payment::CheckoutResponse,
            payment::WebhookResponse,
        )
    ),
    tags(
        (name = "Lumen API", description = "Mental-health support chat backend: accounts, sessions, summaries and bundle purchases.")
    )
)]
pub struct ApiDoc;
