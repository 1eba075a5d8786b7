//! services/api/src/web/bundles.rs
//!
//! Purchasable session bundles.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use lumen_core::domain::SessionBundle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BundleResponse {
    pub id: Uuid,
    pub quantity: i32,
    pub price: f64,
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<SessionBundle> for BundleResponse {
    fn from(bundle: SessionBundle) -> Self {
        Self {
            id: bundle.id,
            quantity: bundle.quantity,
            price: bundle.price,
            description: bundle.description,
            is_active: bundle.is_active,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateBundleRequest {
    pub quantity: i32,
    pub price: f64,
    pub description: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/bundles - List all purchasable bundles
#[utoipa::path(
    get,
    path = "/api/bundles",
    responses(
        (status = 200, description = "Active bundles", body = [BundleResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_bundles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bundles = state
        .db
        .list_active_bundles()
        .await
        .map_err(crate::web::error_response)?;

    let response: Vec<BundleResponse> = bundles.into_iter().map(BundleResponse::from).collect();
    Ok(Json(response))
}

/// POST /api/bundles - Create a new bundle
// TODO: restrict bundle creation to admins once a role model exists.
#[utoipa::path(
    post,
    path = "/api/bundles",
    request_body = CreateBundleRequest,
    responses(
        (status = 201, description = "Bundle created", body = BundleResponse),
        (status = 400, description = "Invalid bundle"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_bundle_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBundleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.quantity <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Bundle quantity must be positive".to_string(),
        ));
    }
    if req.price < 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Bundle price cannot be negative".to_string(),
        ));
    }

    let bundle = state
        .db
        .create_bundle(req.quantity, req.price, req.description.as_deref(), req.is_active)
        .await
        .map_err(crate::web::error_response)?;

    Ok((StatusCode::CREATED, Json(BundleResponse::from(bundle))))
}
