//! services/api/src/adapters/mercadopago.rs
//!
//! This module contains the adapter for the Mercado Pago payment gateway.
//! It implements the `PaymentGateway` port from the `core` crate using plain
//! REST calls: one to create a checkout preference, one to re-fetch a payment
//! by id during webhook handling.

use async_trait::async_trait;
use lumen_core::domain::{CheckoutPreference, CheckoutRequest, PaymentInfo, PaymentMetadata};
use lumen_core::ports::{PaymentGateway, PortError, PortResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const API_BASE: &str = "https://api.mercadopago.com";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PaymentGateway` against the Mercado Pago REST API.
#[derive(Clone)]
pub struct MercadoPagoAdapter {
    http: reqwest::Client,
    access_token: String,
    frontend_url: String,
    notification_url: Option<String>,
}

impl MercadoPagoAdapter {
    /// Creates a new `MercadoPagoAdapter`.
    pub fn new(
        access_token: String,
        frontend_url: String,
        notification_url: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token,
            frontend_url,
            notification_url,
        }
    }
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Debug, Serialize)]
struct PreferencePayload {
    items: Vec<PreferenceItem>,
    payer: PreferencePayer,
    auto_return: String,
    back_urls: BackUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<String>,
    metadata: MetadataPayload,
}

#[derive(Debug, Serialize)]
struct PreferenceItem {
    id: String,
    title: String,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
    description: String,
    category_id: String,
}

#[derive(Debug, Serialize)]
struct PreferencePayer {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataPayload {
    user_id: Uuid,
    session_quantity: i32,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    status: String,
    metadata: MetadataPayload,
}

/// Builds the checkout preference body for a bundle purchase.
fn build_preference_payload(
    request: &CheckoutRequest,
    frontend_url: &str,
    notification_url: Option<&str>,
) -> PreferencePayload {
    let bundle = &request.bundle;
    let noun = if bundle.quantity == 1 {
        "sessão"
    } else {
        "sessões"
    };

    PreferencePayload {
        items: vec![PreferenceItem {
            id: bundle.id.to_string(),
            title: format!("Pacote com {} {}", bundle.quantity, noun),
            quantity: 1,
            currency_id: "BRL".to_string(),
            unit_price: bundle.price,
            description: "Sessões de terapia online".to_string(),
            category_id: "therapy_sessions".to_string(),
        }],
        payer: PreferencePayer {
            name: request.payer_name.clone(),
            email: request.payer_email.clone(),
        },
        auto_return: "all".to_string(),
        back_urls: BackUrls {
            success: format!("{}/", frontend_url),
            failure: format!("{}/buy-sessions", frontend_url),
            pending: format!("{}/payment/pending", frontend_url),
        },
        notification_url: notification_url.map(str::to_string),
        metadata: MetadataPayload {
            user_id: request.user_id,
            session_quantity: bundle.quantity,
        },
    }
}

//=========================================================================================
// `PaymentGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentGateway for MercadoPagoAdapter {
    async fn create_preference(
        &self,
        request: &CheckoutRequest,
    ) -> PortResult<CheckoutPreference> {
        let payload =
            build_preference_payload(request, &self.frontend_url, self.notification_url.as_deref());

        let response = self
            .http
            .post(format!("{API_BASE}/checkout/preferences"))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Upstream(format!(
                "Preference creation failed with status {}",
                response.status()
            )));
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Malformed preference response: {e}")))?;

        let init_point = preference.init_point.ok_or_else(|| {
            PortError::Upstream("Failed to create payment preference".to_string())
        })?;

        Ok(CheckoutPreference {
            id: preference.id,
            init_point,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> PortResult<PaymentInfo> {
        let response = self
            .http
            .get(format!("{API_BASE}/v1/payments/{payment_id}"))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| PortError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Upstream(format!(
                "Payment lookup failed with status {}",
                response.status()
            )));
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Malformed payment response: {e}")))?;

        Ok(PaymentInfo {
            status: payment.status,
            metadata: PaymentMetadata {
                user_id: payment.metadata.user_id,
                session_quantity: payment.metadata.session_quantity,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::domain::SessionBundle;

    fn request(quantity: i32) -> CheckoutRequest {
        CheckoutRequest {
            bundle: SessionBundle {
                id: Uuid::new_v4(),
                quantity,
                price: 199.9,
                description: None,
                is_active: true,
            },
            payer_name: "Ana".to_string(),
            payer_email: "ana@example.com".to_string(),
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn payload_carries_price_payer_and_metadata() {
        let request = request(5);
        let payload = build_preference_payload(&request, "https://lumen.app", None);

        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].unit_price, 199.9);
        assert_eq!(payload.items[0].currency_id, "BRL");
        assert_eq!(payload.payer.email, "ana@example.com");
        assert_eq!(payload.metadata.user_id, request.user_id);
        assert_eq!(payload.metadata.session_quantity, 5);
        assert_eq!(payload.back_urls.failure, "https://lumen.app/buy-sessions");
    }

    #[test]
    fn single_session_title_is_singular() {
        let payload = build_preference_payload(&request(1), "https://lumen.app", None);
        assert_eq!(payload.items[0].title, "Pacote com 1 sessão");

        let payload = build_preference_payload(&request(10), "https://lumen.app", None);
        assert_eq!(payload.items[0].title, "Pacote com 10 sessões");
    }

    #[test]
    fn notification_url_is_omitted_when_unset() {
        let payload = build_preference_payload(&request(3), "https://lumen.app", None);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("notification_url").is_none());

        let payload = build_preference_payload(
            &request(3),
            "https://lumen.app",
            Some("https://api.lumen.app/api/payment/webhook"),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json["notification_url"],
            "https://api.lumen.app/api/payment/webhook"
        );
    }
}
