//! # Mercado Pago Point
//!
//! Point integration API for card terminals, `/v1/payments` for PIX.
//!
//! ## Headers
//! ```text
//! Authorization:     Bearer {api_key}
//! X-Idempotency-Key: {pinpad_id}-{unix_seconds}
//! ```

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::factory::ProviderSettings;
use crate::provider::{
    error_from_response, id_string, json_body, str_field, CancelOutcome, Device, PaymentIntent, PaymentProvider,
    PaymentRequest, PaymentStatus, PixCharge,
};
use comandas_core::types::PaymentType;
use comandas_core::{Money, Pinpad};

const NAME: &str = "Mercado Pago";

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago client for one pinpad.
#[derive(Clone)]
pub struct MercadoPagoClient {
    http: Client,
    base_url: String,
    access_token: String,
    pinpad_id: String,
    payer_email: String,
}

impl MercadoPagoClient {
    /// Builds a client from the pinpad's api_key, api_url and timeout.
    ///
    /// ## Arguments
    /// * `pinpad` - Terminal configuration
    /// * `settings` - Fallback base URL and the PIX payer email
    pub fn new(pinpad: &Pinpad, settings: &ProviderSettings) -> ProviderResult<Self> {
        let access_token = pinpad
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingCredential("api_key"))?
            .to_string();

        let base_url = pinpad
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(settings.mercado_pago_base_url.as_str())
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder().timeout(settings.timeout_for(pinpad)).build()?;

        Ok(MercadoPagoClient {
            http,
            base_url,
            access_token,
            pinpad_id: pinpad.id.clone(),
            payer_email: settings.mercado_pago_payer_email.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", format!("{}-{}", self.pinpad_id, Utc::now().timestamp()))
    }

    async fn send(&self, request: RequestBuilder) -> ProviderResult<Value> {
        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(NAME, response, "message").await);
        }
        json_body(NAME, response).await
    }
}

#[async_trait]
impl PaymentProvider for MercadoPagoClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn devices(&self) -> ProviderResult<Vec<Device>> {
        let body = self
            .send(self.http.get(self.url("/point/integration-api/devices")))
            .await?;

        let devices: Vec<Device> = match body.get("devices") {
            Some(list) => serde_json::from_value(list.clone()).map_err(|e| ProviderError::InvalidResponse {
                provider: NAME,
                message: e.to_string(),
            })?,
            None => Vec::new(),
        };

        info!(pinpad_id = %self.pinpad_id, count = devices.len(), "Mercado Pago devices listed");
        Ok(devices)
    }

    async fn create_payment(&self, request: &PaymentRequest) -> ProviderResult<PaymentIntent> {
        let kind = match request.payment_type {
            PaymentType::Debit => "debit_card",
            PaymentType::Credit | PaymentType::Pix => "credit_card",
        };
        let reference = format!("cp-cafe-{}", Utc::now().timestamp());

        let payload = json!({
            "amount": request.amount.cents(),
            "description": request.description,
            "payment": {
                "installments": 1,
                "type": kind,
                "installments_cost": "seller",
            },
            "additional_info": {
                "external_reference": reference,
                "print_on_terminal": true,
            },
        });

        debug!(device = %request.device_id, amount = %request.amount, kind, "Creating payment intent");

        let path = format!("/point/integration-api/devices/{}/payment-intents", request.device_id);
        let body = self.send(self.http.post(self.url(&path)).json(&payload)).await?;

        let payment_intent_id = id_string(body.get("id")).ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            message: "payment intent without id".to_string(),
        })?;

        info!(intent = %payment_intent_id, "Payment intent sent to terminal");
        Ok(PaymentIntent {
            payment_intent_id,
            state: str_field(&body, "state").unwrap_or_default(),
            reference: Some(reference),
        })
    }

    async fn payment_status(&self, payment_intent_id: &str) -> ProviderResult<PaymentStatus> {
        let path = format!("/point/integration-api/payment-intents/{}", payment_intent_id);
        let body = self.send(self.http.get(self.url(&path))).await?;

        Ok(PaymentStatus {
            payment_intent_id: payment_intent_id.to_string(),
            state: str_field(&body, "state").unwrap_or_default(),
            payment_id: id_string(body.get("payment").and_then(|p| p.get("id"))),
            amount: body.get("amount").and_then(Value::as_i64).map(Money::from_cents),
            ..Default::default()
        })
    }

    async fn create_pix(&self, amount: Money, description: &str) -> ProviderResult<PixCharge> {
        let payload = json!({
            "transaction_amount": amount.to_reais_f64(),
            "description": description,
            "payment_method_id": "pix",
            "payer": { "email": self.payer_email },
        });

        let body = self.send(self.http.post(self.url("/v1/payments")).json(&payload)).await?;

        let payment_id = id_string(body.get("id")).ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            message: "payment without id".to_string(),
        })?;
        let transaction = body
            .get("point_of_interaction")
            .and_then(|p| p.get("transaction_data"))
            .cloned()
            .unwrap_or(Value::Null);

        info!(payment_id = %payment_id, amount = %amount, "PIX charge created");
        Ok(PixCharge {
            payment_id,
            status: str_field(&body, "status"),
            qr_code: str_field(&transaction, "qr_code"),
            qr_code_image: str_field(&transaction, "qr_code_base64"),
            expires_at: str_field(&body, "date_of_expiration"),
            amount,
        })
    }

    async fn cancel(
        &self,
        payment_intent_id: &str,
        device_id: Option<&str>,
        _amount: Option<Money>,
    ) -> ProviderResult<CancelOutcome> {
        let device_id = device_id
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest("device_id is required".to_string()))?;

        let path = format!(
            "/point/integration-api/devices/{}/payment-intents/{}",
            device_id, payment_intent_id
        );
        let response = self.authorized(self.http.delete(self.url(&path))).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(NAME, response, "message").await);
        }

        info!(intent = %payment_intent_id, "Payment intent cancelled");
        Ok(CancelOutcome {
            payment_intent_id: payment_intent_id.to_string(),
            refund_id: None,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
