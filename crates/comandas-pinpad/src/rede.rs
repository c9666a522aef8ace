//! # Rede Itaú (e.Rede)
//!
//! e.Rede v2 transactions behind OAuth2 client credentials.
//!
//! ## Token Flow
//! ```text
//! access_token()
//!   ├── read lock: cached and not within 120s of expiry ──► reuse
//!   └── write lock: check again, else
//!         POST {auth_url}  Basic api_key:api_secret
//!                          grant_type=client_credentials
//!         cache until now + expires_in (1440s when absent)
//! ```
//!
//! Rede has no device listing; the pinpad itself is reported as the single
//! device.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{Local, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    error_from_response, id_string, json_body, str_field, CancelOutcome, Device, PaymentIntent, PaymentProvider,
    PaymentRequest, PaymentStatus, PixCharge,
};
use comandas_core::types::{PaymentType, PinpadStatus};
use comandas_core::{Money, Pinpad};

const NAME: &str = "Rede Itaú";

/// Refresh this long before the token expires.
const REFRESH_MARGIN_SECS: u64 = 120;

/// Token lifetime when the response omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 1440;

/// How long a PIX QR code stays payable.
const PIX_EXPIRATION_MINUTES: i64 = 15;

pub const SANDBOX_AUTH_URL: &str = "https://rl7-sandbox-api.useredecloud.com.br/oauth2/token";
pub const SANDBOX_BASE_URL: &str = "https://sandbox-erede.useredecloud.com.br/v2";
pub const PRODUCTION_AUTH_URL: &str = "https://api.userede.com.br/redelabs/oauth2/token";
pub const PRODUCTION_BASE_URL: &str = "https://api.userede.com.br/erede/v2";

/// Where the client sends token and transaction requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeEndpoints {
    pub auth_url: String,
    pub base_url: String,
}

impl RedeEndpoints {
    pub fn sandbox() -> Self {
        RedeEndpoints {
            auth_url: SANDBOX_AUTH_URL.to_string(),
            base_url: SANDBOX_BASE_URL.to_string(),
        }
    }

    pub fn production() -> Self {
        RedeEndpoints {
            auth_url: PRODUCTION_AUTH_URL.to_string(),
            base_url: PRODUCTION_BASE_URL.to_string(),
        }
    }

    /// Sandbox or production, with the pinpad's api_url replacing the base.
    pub fn for_pinpad(pinpad: &Pinpad, sandbox: bool) -> Self {
        let mut endpoints = if sandbox { Self::sandbox() } else { Self::production() };
        if let Some(url) = pinpad.api_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            endpoints.base_url = url.trim_end_matches('/').to_string();
        }
        endpoints
    }
}

#[derive(Debug, Clone)]
struct TokenInfo {
    access_token: String,
    expires_at: Instant,
}

impl TokenInfo {
    fn needs_refresh(&self) -> bool {
        Instant::now() + Duration::from_secs(REFRESH_MARGIN_SECS) >= self.expires_at
    }

    fn remaining_secs(&self) -> u64 {
        self.expires_at.saturating_duration_since(Instant::now()).as_secs()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Rede client for one pinpad. Holds its own token cache.
pub struct RedeClient {
    http: Client,
    endpoints: RedeEndpoints,
    client_id: String,
    client_secret: Option<String>,
    device: Device,
    token: RwLock<Option<TokenInfo>>,
}

impl RedeClient {
    /// Builds a client against explicit endpoints.
    ///
    /// ## Arguments
    /// * `pinpad` - api_key is the OAuth client id, api_secret the secret
    /// * `endpoints` - Token and transaction URLs
    /// * `timeout` - Per-request HTTP timeout
    pub fn with_endpoints(pinpad: &Pinpad, endpoints: RedeEndpoints, timeout: Duration) -> ProviderResult<Self> {
        let client_id = pinpad
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingCredential("api_key"))?
            .to_string();

        let http = Client::builder().timeout(timeout).build()?;

        Ok(RedeClient {
            http,
            endpoints,
            client_id,
            client_secret: pinpad.api_secret.clone().filter(|s| !s.trim().is_empty()),
            device: device_for(pinpad),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.base_url, path)
    }

    /// Returns a valid bearer token, fetching one when the cache is stale.
    async fn access_token(&self) -> ProviderResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.needs_refresh() {
                    debug!(remaining_secs = token.remaining_secs(), "Using cached Rede token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;

        if let Some(token) = guard.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch_token().await?;
        info!(expires_in_secs = token.remaining_secs(), "Authenticated with Rede");
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> ProviderResult<TokenInfo> {
        let secret = self
            .client_secret
            .as_deref()
            .ok_or(ProviderError::MissingCredential("api_secret"))?;

        let response = self
            .http
            .post(&self.endpoints.auth_url)
            .basic_auth(&self.client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth {
                provider: NAME,
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| ProviderError::Auth {
            provider: NAME,
            message: e.to_string(),
        })?;

        Ok(TokenInfo {
            access_token: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
        })
    }

    /// POSTs to `path` and returns the body when the status is `expected`.
    async fn post(&self, path: &str, payload: &Value, expected: Option<StatusCode>) -> ProviderResult<Value> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;

        let ok = match expected {
            Some(status) => response.status() == status,
            None => response.status().is_success(),
        };
        if !ok {
            return Err(error_from_response(NAME, response, "returnMessage").await);
        }
        json_body(NAME, response).await
    }
}

/// The pinpad reported as a Rede device.
fn device_for(pinpad: &Pinpad) -> Device {
    let status = if pinpad.status == PinpadStatus::Ativo { "AVAILABLE" } else { "UNAVAILABLE" };

    let mut extra = serde_json::Map::new();
    extra.insert("provider".to_string(), json!("REDE Itaú"));
    extra.insert("supports_credit".to_string(), json!(pinpad.supports_credit));
    extra.insert("supports_debit".to_string(), json!(pinpad.supports_debit));
    extra.insert("supports_contactless".to_string(), json!(pinpad.supports_contactless));
    extra.insert("supports_pix".to_string(), json!(pinpad.supports_pix));
    extra.insert("merchant_id".to_string(), json!(pinpad.merchant_id));

    Device {
        id: pinpad.synthetic_device_id(),
        name: Some(pinpad.name.clone()),
        status: Some(status.to_string()),
        extra,
    }
}

/// Rede return code to payment state.
fn state_for(return_code: Option<&str>) -> &'static str {
    match return_code {
        Some("00") => "approved",
        Some("51") | Some("11") => "cancelled",
        _ => "pending",
    }
}

#[async_trait]
impl PaymentProvider for RedeClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn devices(&self) -> ProviderResult<Vec<Device>> {
        Ok(vec![self.device.clone()])
    }

    async fn create_payment(&self, request: &PaymentRequest) -> ProviderResult<PaymentIntent> {
        let kind = match request.payment_type {
            PaymentType::Debit => "debit",
            PaymentType::Credit | PaymentType::Pix => "credit",
        };
        let reference = format!("cp-cafe-{}", Utc::now().timestamp());

        let payload = json!({
            "capture": true,
            "kind": kind,
            "reference": reference,
            "amount": request.amount.cents(),
        });

        debug!(device = %request.device_id, amount = %request.amount, kind, "Creating Rede transaction");
        let body = self.post("/transactions", &payload, Some(StatusCode::CREATED)).await?;

        let tid = id_string(body.get("tid")).ok_or_else(|| ProviderError::InvalidResponse {
            provider: NAME,
            message: "transaction without tid".to_string(),
        })?;
        let return_code = str_field(&body, "returnCode");
        let state = if return_code.as_deref() == Some("00") { "approved" } else { "pending" };

        info!(tid = %tid, state, "Rede transaction created");
        Ok(PaymentIntent {
            payment_intent_id: tid,
            state: state.to_string(),
            reference: str_field(&body, "reference").or(Some(reference)),
        })
    }

    async fn payment_status(&self, payment_intent_id: &str) -> ProviderResult<PaymentStatus> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.url(&format!("/transactions/{}", payment_intent_id)))
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(NAME, response, "returnMessage").await);
        }
        let body = json_body(NAME, response).await?;

        let return_code = str_field(&body, "returnCode");
        Ok(PaymentStatus {
            payment_intent_id: payment_intent_id.to_string(),
            state: state_for(return_code.as_deref()).to_string(),
            payment_id: Some(payment_intent_id.to_string()),
            amount: body.get("amount").and_then(Value::as_i64).map(Money::from_cents),
            return_message: str_field(&body, "returnMessage"),
            return_code,
            authorization_code: str_field(&body, "authorizationCode"),
            nsu: id_string(body.get("nsu")),
        })
    }

    async fn create_pix(&self, amount: Money, _description: &str) -> ProviderResult<PixCharge> {
        let expiration = (Local::now() + chrono::Duration::minutes(PIX_EXPIRATION_MINUTES))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();

        let payload = json!({
            "kind": "pix",
            "reference": format!("cp-cafe-pix-{}", Utc::now().timestamp()),
            "amount": amount.cents(),
            "qrCode": { "dateTimeExpiration": expiration },
        });

        let body = self.post("/transactions", &payload, Some(StatusCode::CREATED)).await?;

        let qr = body.get("qrCodeResponse").cloned().unwrap_or(Value::Null);
        let payment_id = id_string(body.get("tid")).unwrap_or_default();

        info!(tid = %payment_id, amount = %amount, "Rede PIX charge created");
        Ok(PixCharge {
            payment_id,
            status: Some(state_for(str_field(&body, "returnCode").as_deref()).to_string()),
            qr_code: str_field(&qr, "qrCodeData"),
            qr_code_image: str_field(&qr, "qrCodeImage"),
            expires_at: str_field(&qr, "dateTimeExpiration").or(Some(expiration)),
            amount,
        })
    }

    async fn cancel(
        &self,
        payment_intent_id: &str,
        _device_id: Option<&str>,
        amount: Option<Money>,
    ) -> ProviderResult<CancelOutcome> {
        let payload = match amount {
            Some(amount) => json!({ "amount": amount.cents() }),
            None => json!({}),
        };

        let path = format!("/transactions/{}/refunds", payment_intent_id);
        let body = self.post(&path, &payload, None).await?;

        let refund_id = id_string(body.get("refundId"));
        info!(tid = %payment_intent_id, refund_id = ?refund_id, "Rede refund requested");
        Ok(CancelOutcome {
            payment_intent_id: payment_intent_id.to_string(),
            refund_id,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pinpad;
    use comandas_core::types::PinpadProvider;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RedeClient {
        let endpoints = RedeEndpoints {
            auth_url: format!("{}/oauth2/token", server.uri()),
            base_url: format!("{}/v2", server.uri()),
        };
        RedeClient::with_endpoints(&pinpad(PinpadProvider::Rede), endpoints, Duration::from_secs(5)).unwrap()
    }

    async fn mount_token(server: &MockServer, calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "rede-token",
                "expires_in": 1440,
            })))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_endpoints_for_pinpad() {
        let mut pad = pinpad(PinpadProvider::Rede);
        assert_eq!(RedeEndpoints::for_pinpad(&pad, true), RedeEndpoints::sandbox());
        assert_eq!(RedeEndpoints::for_pinpad(&pad, false), RedeEndpoints::production());

        pad.api_url = Some("https://rede.example/v2/".to_string());
        let endpoints = RedeEndpoints::for_pinpad(&pad, true);
        assert_eq!(endpoints.base_url, "https://rede.example/v2");
        assert_eq!(endpoints.auth_url, SANDBOX_AUTH_URL);
    }

    #[test]
    fn test_return_code_states() {
        assert_eq!(state_for(Some("00")), "approved");
        assert_eq!(state_for(Some("51")), "cancelled");
        assert_eq!(state_for(Some("11")), "cancelled");
        assert_eq!(state_for(Some("174")), "pending");
        assert_eq!(state_for(None), "pending");
    }

    #[test]
    fn test_token_refresh_margin() {
        let fresh = TokenInfo {
            access_token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(!fresh.needs_refresh());

        let stale = TokenInfo {
            access_token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        assert!(stale.needs_refresh());
    }

    #[tokio::test]
    async fn test_devices_synthesized_from_pinpad() {
        let mut pad = pinpad(PinpadProvider::Rede);
        pad.terminal_id = None;
        pad.status = PinpadStatus::Manutencao;
        let client = RedeClient::with_endpoints(&pad, RedeEndpoints::sandbox(), Duration::from_secs(5)).unwrap();

        let devices = client.devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, format!("rede-{}", pad.id));
        assert_eq!(devices[0].status.as_deref(), Some("UNAVAILABLE"));
        assert_eq!(devices[0].extra["provider"], "REDE Itaú");
    }

    #[tokio::test]
    async fn test_token_cached_across_calls() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v2/transactions/T1"))
            .and(header("authorization", "Bearer rede-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "returnCode": "00",
                "returnMessage": "Success.",
                "amount": 2500,
                "authorizationCode": "123456",
                "nsu": "987",
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        let status = client.payment_status("T1").await.unwrap();
        assert_eq!(status.state, "approved");
        assert_eq!(status.amount, Some(Money::from_cents(2_500)));
        assert_eq!(status.authorization_code.as_deref(), Some("123456"));
        assert_eq!(status.nsu.as_deref(), Some("987"));

        client.payment_status("T1").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_transaction() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/transactions"))
            .and(body_partial_json(json!({ "capture": true, "kind": "credit", "amount": 1800 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "tid": "10012305041234567890",
                "reference": "cp-cafe-1",
                "returnCode": "00",
            })))
            .mount(&server)
            .await;

        let intent = client(&server)
            .create_payment(&PaymentRequest {
                device_id: "T-01".to_string(),
                amount: Money::from_cents(1_800),
                description: "Venda".to_string(),
                payment_type: PaymentType::Credit,
            })
            .await
            .unwrap();
        assert_eq!(intent.payment_intent_id, "10012305041234567890");
        assert_eq!(intent.state, "approved");
    }

    #[tokio::test]
    async fn test_declined_transaction_is_api_error() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "returnCode": "37",
                "returnMessage": "Amount: Invalid parameter format.",
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_payment(&PaymentRequest {
                device_id: "T-01".to_string(),
                amount: Money::from_cents(100),
                description: "Venda".to_string(),
                payment_type: PaymentType::Debit,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Api { status: 400, ref message, .. } if message == "Amount: Invalid parameter format."
        ));
    }

    #[tokio::test]
    async fn test_pix_charge() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/transactions"))
            .and(body_partial_json(json!({ "kind": "pix", "amount": 990 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "tid": "PIX1",
                "returnCode": "00",
                "qrCodeResponse": {
                    "qrCodeData": "00020101021226...",
                    "qrCodeImage": "iVBORw0KGgo",
                    "dateTimeExpiration": "2026-10-14T12:15:00",
                },
            })))
            .mount(&server)
            .await;

        let pix = client(&server).create_pix(Money::from_cents(990), "Venda PIX").await.unwrap();
        assert_eq!(pix.payment_id, "PIX1");
        assert_eq!(pix.qr_code.as_deref(), Some("00020101021226..."));
        assert_eq!(pix.expires_at.as_deref(), Some("2026-10-14T12:15:00"));
    }

    #[tokio::test]
    async fn test_partial_refund() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/transactions/T9/refunds"))
            .and(body_partial_json(json!({ "amount": 500 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refundId": "R-55" })))
            .mount(&server)
            .await;

        let outcome = client(&server)
            .cancel("T9", None, Some(Money::from_cents(500)))
            .await
            .unwrap();
        assert_eq!(outcome.refund_id.as_deref(), Some("R-55"));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_at_token_time() {
        let server = MockServer::start().await;
        let mut pad = pinpad(PinpadProvider::Rede);
        pad.api_secret = None;
        let client = RedeClient::with_endpoints(
            &pad,
            RedeEndpoints {
                auth_url: format!("{}/oauth2/token", server.uri()),
                base_url: server.uri(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(client.devices().await.is_ok());
        assert!(matches!(
            client.payment_status("T1").await,
            Err(ProviderError::MissingCredential("api_secret"))
        ));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let err = client(&server).payment_status("T1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
    }
}
