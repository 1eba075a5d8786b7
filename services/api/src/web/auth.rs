//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout, plus the
//! HMAC signing of the session cookie value.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SESSION_TTL_DAYS: i64 = 30;

//=========================================================================================
// Cookie signing
//=========================================================================================

fn hmac_tag(secret: &str, session_id: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("any key length is valid");
    mac.update(session_id.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Produces the signed cookie value: `{session_id}.{base64 hmac}`.
pub(crate) fn encode_session_cookie(secret: &str, session_id: &str) -> String {
    format!("{}.{}", session_id, hmac_tag(secret, session_id))
}

/// Verifies a signed cookie value and returns the embedded session id.
pub(crate) fn decode_session_cookie<'a>(secret: &str, value: &'a str) -> Option<&'a str> {
    let (session_id, tag) = value.rsplit_once('.')?;
    let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("any key length is valid");
    mac.update(session_id.as_bytes());
    mac.verify_slice(&tag).ok()?;
    Some(session_id)
}

/// Pulls the raw `session=` cookie value out of the request headers.
pub(crate) fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        let c = c.trim();
        c.strip_prefix("session=")
    })
}

fn set_cookie_header(signed_value: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        signed_value,
        Duration::days(SESSION_TTL_DAYS).num_seconds()
    )
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })?
        .to_string();

    // 2. Create user in database (409 on duplicate email)
    let user = state
        .db
        .create_user(&req.email, &req.name, &password_hash)
        .await
        .map_err(crate::web::error_response)?;

    // 3. Create the auth session and hand back the signed cookie
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user.id, expires_at)
        .await
        .map_err(crate::web::error_response)?;

    let cookie = set_cookie_header(&encode_session_cookie(
        &state.config.secret_key,
        &auth_session_id,
    ));

    let response = AuthResponse {
        user_id: user.id,
        email: user.email,
        name: user.name,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /api/auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get user by email; an unknown address reads as bad credentials
    let user_creds = state.db.get_user_by_email(&req.email).await.map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        )
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ));
    }

    // 3. Record the login and create the auth session
    state
        .db
        .record_login(user_creds.id)
        .await
        .map_err(crate::web::error_response)?;

    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);

    state
        .db
        .create_auth_session(&auth_session_id, user_creds.id, expires_at)
        .await
        .map_err(crate::web::error_response)?;

    let cookie = set_cookie_header(&encode_session_cookie(
        &state.config.secret_key,
        &auth_session_id,
    ));

    let response = AuthResponse {
        user_id: user_creds.id,
        email: user_creds.email,
        name: user_creds.name,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /api/auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let signed_value = session_cookie_value(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    let auth_session_id = decode_session_cookie(&state.config.secret_key, signed_value)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(crate::web::error_response)?;

    // Clear cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_cookie_round_trips() {
        let cookie = encode_session_cookie("secret", "abc-123");
        assert_eq!(decode_session_cookie("secret", &cookie), Some("abc-123"));
    }

    #[test]
    fn tampered_session_id_is_rejected() {
        let cookie = encode_session_cookie("secret", "abc-123");
        let (_, tag) = cookie.rsplit_once('.').unwrap();
        let forged = format!("other-session.{tag}");
        assert_eq!(decode_session_cookie("secret", &forged), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let cookie = encode_session_cookie("secret", "abc-123");
        assert_eq!(decode_session_cookie("another-secret", &cookie), None);
    }

    #[test]
    fn malformed_cookie_values_are_rejected() {
        assert_eq!(decode_session_cookie("secret", "no-separator"), None);
        assert_eq!(decode_session_cookie("secret", "id.not!base64"), None);
        assert_eq!(decode_session_cookie("secret", ""), None);
    }
}
