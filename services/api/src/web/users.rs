//! services/api/src/web/users.rs
//!
//! Read endpoints for user accounts and the caller's session-credit balance.
//! Registration lives on `/api/auth/signup`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use lumen_core::domain::User;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// The caller's session-credit balance.
#[derive(Serialize, ToSchema)]
pub struct SessionBalanceResponse {
    pub available_sessions: i32,
    pub used_sessions: i32,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/users - List all users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All registered users", body = [UserResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = state
        .db
        .list_users()
        .await
        .map_err(crate::web::error_response)?;

    let response: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(response))
}

/// GET /api/users/sessions - The caller's available and used session credits
#[utoipa::path(
    get,
    path = "/api/users/sessions",
    responses(
        (status = 200, description = "Session credit balance", body = SessionBalanceResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn session_balance_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(SessionBalanceResponse {
        available_sessions: user.available_sessions,
        used_sessions: user.used_sessions,
    }))
}

/// GET /api/users/{user_id} - Fetch a single user
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id" = Uuid, Path, description = "The user's unique id")),
    responses(
        (status = 200, description = "The requested user", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(UserResponse::from(user)))
}
