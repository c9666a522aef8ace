//! # Payment Provider Trait
//!
//! What every terminal integration offers, in provider-neutral types.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apps/api handler                                                       │
//! │       │  registry.provider_for(&pinpad)                                │
//! │       ▼                                                                 │
//! │  Arc<dyn PaymentProvider>                                              │
//! │       ├── MercadoPagoClient   Point integration API + /v1/payments     │
//! │       └── RedeClient          e.Rede v2 + OAuth2 client credentials    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProviderError, ProviderResult};
use comandas_core::types::PaymentType;
use comandas_core::Money;

// =============================================================================
// Shared Types
// =============================================================================

/// A terminal reported by (or synthesized for) a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Provider-specific fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A card charge sent to a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub device_id: String,
    pub amount: Money,
    pub description: String,
    /// Credit or debit. PIX goes through [`PaymentProvider::create_pix`].
    pub payment_type: PaymentType,
}

/// A charge accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
    pub state: String,
    pub reference: Option<String>,
}

/// Current state of a charge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PaymentStatus {
    pub payment_intent_id: String,
    pub state: String,
    pub payment_id: Option<String>,
    pub amount: Option<Money>,
    pub return_code: Option<String>,
    pub return_message: Option<String>,
    pub authorization_code: Option<String>,
    pub nsu: Option<String>,
}

/// A PIX charge and its QR code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PixCharge {
    pub payment_id: String,
    pub status: Option<String>,
    pub qr_code: Option<String>,
    /// Base64 PNG.
    pub qr_code_image: Option<String>,
    pub expires_at: Option<String>,
    pub amount: Money,
}

/// Result of cancelling or refunding a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub payment_intent_id: String,
    pub refund_id: Option<String>,
}

// =============================================================================
// Trait
// =============================================================================

/// A payment provider bound to one pinpad's credentials.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Display name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Terminals available for charges.
    async fn devices(&self) -> ProviderResult<Vec<Device>>;

    /// Sends a card charge to a terminal.
    async fn create_payment(&self, request: &PaymentRequest) -> ProviderResult<PaymentIntent>;

    /// Looks up a charge.
    async fn payment_status(&self, payment_intent_id: &str) -> ProviderResult<PaymentStatus>;

    /// Creates a PIX charge.
    async fn create_pix(&self, amount: Money, description: &str) -> ProviderResult<PixCharge>;

    /// Cancels a pending charge or refunds a captured one.
    async fn cancel(
        &self,
        payment_intent_id: &str,
        device_id: Option<&str>,
        amount: Option<Money>,
    ) -> ProviderResult<CancelOutcome>;
}

// =============================================================================
// Helpers
// =============================================================================

/// Renders a JSON id that may be a number or a string.
pub(crate) fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a string field, ignoring other JSON types.
pub(crate) fn str_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Turns a non-2xx response into `ProviderError::Api`, preferring the
/// provider's own message field.
pub(crate) async fn error_from_response(provider: &'static str, response: Response, message_key: &str) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| str_field(&json, message_key))
        .unwrap_or_else(|| if body.is_empty() { "Unknown error".to_string() } else { body });

    ProviderError::Api {
        provider,
        status,
        message,
    }
}

/// Parses a 2xx body as JSON.
pub(crate) async fn json_body(provider: &'static str, response: Response) -> ProviderResult<Value> {
    response.json::<Value>().await.map_err(|e| ProviderError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_string_accepts_numbers_and_strings() {
        assert_eq!(id_string(Some(&json!(123456))), Some("123456".to_string()));
        assert_eq!(id_string(Some(&json!("abc"))), Some("abc".to_string()));
        assert_eq!(id_string(Some(&json!(""))), None);
        assert_eq!(id_string(None), None);
    }

    #[test]
    fn test_device_keeps_extra_fields() {
        let device: Device = serde_json::from_value(json!({
            "id": "PAX_A910__SMARTPOS123",
            "operating_mode": "PDV",
        }))
        .unwrap();
        assert_eq!(device.id, "PAX_A910__SMARTPOS123");
        assert_eq!(device.extra["operating_mode"], "PDV");
        assert!(device.name.is_none());
    }
}
