//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::auth::{decode_session_cookie, session_cookie_value};
use crate::web::state::AppState;

/// Middleware that validates the signed auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid, tampered or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the signed cookie value
    let signed_value =
        session_cookie_value(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Verify the HMAC before touching the database
    let auth_session_id = decode_session_cookie(&state.config.secret_key, signed_value)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Validate the auth session in the database, get user_id
    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            warn!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // 4. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
