//! services/api/src/web/payment.rs
//!
//! Checkout creation and the payment-gateway webhook. The webhook never
//! trusts the status embedded in the notification body; it re-fetches the
//! payment from the gateway and only credits sessions on a confirmed
//! "approved" status.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use lumen_core::domain::CheckoutRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    pub bundle_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub id: String,
    pub init_point: String,
}

#[derive(Serialize, ToSchema)]
pub struct WebhookResponse {
    pub status: String,
}

impl WebhookResponse {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// The two notification shapes the gateway sends: `{topic}` bodies for
/// legacy topics and `{type, action, data: {id}}` for payment events.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    pub data: Option<WebhookData>,
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookData {
    /// The gateway sends this as either a string or a number.
    pub id: Option<Value>,
}

/// What a webhook body asks us to do.
#[derive(Debug, PartialEq, Eq)]
enum WebhookDisposition {
    /// Acknowledged without action.
    Acknowledge,
    /// A `topic` we don't recognize: reject the notification.
    InvalidTopic,
    /// A created payment: re-fetch it by id and maybe credit sessions.
    FetchPayment(String),
}

fn classify_webhook(payload: &WebhookPayload) -> WebhookDisposition {
    if let Some(topic) = &payload.topic {
        return if topic == "merchant_order" {
            WebhookDisposition::Acknowledge
        } else {
            WebhookDisposition::InvalidTopic
        };
    }

    let is_created_payment = payload.kind.as_deref() == Some("payment")
        && payload.action.as_deref() == Some("payment.created");
    if !is_created_payment {
        return WebhookDisposition::Acknowledge;
    }

    let payment_id = payload.data.as_ref().and_then(|data| {
        data.id.as_ref().map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    });

    match payment_id {
        Some(id) => WebhookDisposition::FetchPayment(id),
        None => WebhookDisposition::Acknowledge,
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/payment/create - Create a checkout preference for a bundle
#[utoipa::path(
    post,
    path = "/api/payment/create",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Checkout preference created", body = CheckoutResponse),
        (status = 400, description = "Invalid bundle ID or bundle not active"),
        (status = 500, description = "Gateway failure")
    )
)]
pub async fn create_checkout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state
        .db
        .get_user_by_id(user_id)
        .await
        .map_err(crate::web::error_response)?;

    let bundle = state
        .db
        .get_active_bundle(req.bundle_id)
        .await
        .map_err(crate::web::error_response)?;

    let preference = state
        .payment_gateway
        .create_preference(&CheckoutRequest {
            bundle,
            payer_name: user.name,
            payer_email: user.email,
            user_id,
        })
        .await
        .map_err(crate::web::error_response)?;

    Ok(Json(CheckoutResponse {
        id: preference.id,
        init_point: preference.init_point,
    }))
}

/// POST /api/payment/webhook - Gateway notification endpoint (unauthenticated)
#[utoipa::path(
    post,
    path = "/api/payment/webhook",
    responses(
        (status = 200, description = "Notification processed", body = WebhookResponse),
        (status = 400, description = "Invalid topic"),
        (status = 500, description = "Gateway lookup failed")
    )
)]
pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let payment_id = match classify_webhook(&payload) {
        WebhookDisposition::Acknowledge => {
            return Ok(Json(WebhookResponse::success()));
        }
        WebhookDisposition::InvalidTopic => {
            return Err((StatusCode::BAD_REQUEST, "Invalid topic".to_string()));
        }
        WebhookDisposition::FetchPayment(id) => id,
    };

    let payment = state
        .payment_gateway
        .get_payment(&payment_id)
        .await
        .map_err(crate::web::error_response)?;

    if payment.status == "approved" {
        let metadata = payment.metadata;
        match state
            .db
            .credit_sessions(metadata.user_id, metadata.session_quantity)
            .await
        {
            Ok(()) => info!(
                "Credited {} sessions to user {} for payment {}",
                metadata.session_quantity, metadata.user_id, payment_id
            ),
            // An unknown user still acknowledges the webhook; the gateway
            // would otherwise retry a notification we can never honor.
            Err(e) => warn!("Could not credit payment {}: {e}", payment_id),
        }
    }

    Ok(Json(WebhookResponse::success()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(body: Value) -> WebhookPayload {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn merchant_order_topic_is_acknowledged() {
        let payload = payload(json!({"topic": "merchant_order"}));
        assert_eq!(classify_webhook(&payload), WebhookDisposition::Acknowledge);
    }

    #[test]
    fn unknown_topic_is_rejected() {
        let payload = payload(json!({"topic": "chargebacks"}));
        assert_eq!(classify_webhook(&payload), WebhookDisposition::InvalidTopic);
    }

    #[test]
    fn created_payment_triggers_a_fetch() {
        let payload = payload(json!({
            "type": "payment",
            "action": "payment.created",
            "data": {"id": "12345"}
        }));
        assert_eq!(
            classify_webhook(&payload),
            WebhookDisposition::FetchPayment("12345".to_string())
        );
    }

    #[test]
    fn numeric_payment_ids_are_accepted() {
        let payload = payload(json!({
            "type": "payment",
            "action": "payment.created",
            "data": {"id": 12345}
        }));
        assert_eq!(
            classify_webhook(&payload),
            WebhookDisposition::FetchPayment("12345".to_string())
        );
    }

    #[test]
    fn other_payment_actions_are_acknowledged_without_action() {
        let payload = payload(json!({
            "type": "payment",
            "action": "payment.updated",
            "data": {"id": "12345"}
        }));
        assert_eq!(classify_webhook(&payload), WebhookDisposition::Acknowledge);
    }

    #[test]
    fn payment_event_without_an_id_is_acknowledged() {
        let payload = payload(json!({"type": "payment", "action": "payment.created"}));
        assert_eq!(classify_webhook(&payload), WebhookDisposition::Acknowledge);
    }
}
