//! # Provider Factory
//!
//! Maps a pinpad's provider to a client, and keeps built clients around so
//! the Rede OAuth token survives between requests.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┐
//! │ provider (lowercase) │ client               │
//! ├──────────────────────┼──────────────────────┤
//! │ "" / mercadopago /   │ MercadoPagoClient    │
//! │ mercado_pago         │                      │
//! │ rede                 │ RedeClient           │
//! │ anything else        │ Unsupported          │
//! └──────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::mercado_pago::{self, MercadoPagoClient};
use crate::provider::PaymentProvider;
use crate::rede::{RedeClient, RedeEndpoints};
use comandas_core::Pinpad;

/// Provider configuration that does not live on the pinpad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Used when the pinpad has no api_url.
    pub mercado_pago_base_url: String,
    /// Payer email on Mercado Pago PIX charges.
    pub mercado_pago_payer_email: String,
    /// Rede sandbox or production endpoints.
    pub rede_sandbox: bool,
    /// Fallback HTTP timeout when a pinpad's own timeout is not positive.
    pub default_timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            mercado_pago_base_url: mercado_pago::DEFAULT_BASE_URL.to_string(),
            mercado_pago_payer_email: "cliente@comandas.local".to_string(),
            rede_sandbox: true,
            default_timeout_seconds: 30,
        }
    }
}

impl ProviderSettings {
    /// HTTP timeout for one pinpad.
    pub fn timeout_for(&self, pinpad: &Pinpad) -> Duration {
        if pinpad.timeout_seconds > 0 {
            Duration::from_secs(pinpad.timeout_seconds as u64)
        } else {
            Duration::from_secs(self.default_timeout_seconds.max(1))
        }
    }
}

/// Provider families with a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    MercadoPago,
    Rede,
}

impl ProviderKind {
    /// Resolves a provider string, case-insensitively.
    pub fn resolve(provider: &str) -> ProviderResult<Self> {
        match provider.trim().to_lowercase().as_str() {
            "" | "mercadopago" | "mercado_pago" => Ok(ProviderKind::MercadoPago),
            "rede" => Ok(ProviderKind::Rede),
            other => Err(ProviderError::Unsupported(other.to_string())),
        }
    }

    /// Resolves a pinpad's provider.
    pub fn of(pinpad: &Pinpad) -> ProviderResult<Self> {
        Self::resolve(pinpad.provider.as_str())
    }
}

/// Builds a client for a pinpad.
///
/// ## Returns
/// * `Unsupported` for providers without a client
/// * `MissingCredential("api_key")` when the pinpad has no api_key
pub fn create_provider(pinpad: &Pinpad, settings: &ProviderSettings) -> ProviderResult<Arc<dyn PaymentProvider>> {
    match ProviderKind::of(pinpad)? {
        ProviderKind::MercadoPago => Ok(Arc::new(MercadoPagoClient::new(pinpad, settings)?)),
        ProviderKind::Rede => {
            let endpoints = RedeEndpoints::for_pinpad(pinpad, settings.rede_sandbox);
            Ok(Arc::new(RedeClient::with_endpoints(pinpad, endpoints, settings.timeout_for(pinpad))?))
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

struct CachedProvider {
    updated_at: DateTime<Utc>,
    provider: Arc<dyn PaymentProvider>,
}

/// Clients keyed by pinpad id.
///
/// An entry is rebuilt when the pinpad's `updated_at` changes, so edited
/// credentials take effect on the next call.
pub struct ProviderRegistry {
    settings: ProviderSettings,
    clients: RwLock<HashMap<String, CachedProvider>>,
}

impl ProviderRegistry {
    pub fn new(settings: ProviderSettings) -> Self {
        ProviderRegistry {
            settings,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Returns the client for a pinpad, building it when needed.
    pub async fn provider_for(&self, pinpad: &Pinpad) -> ProviderResult<Arc<dyn PaymentProvider>> {
        {
            let clients = self.clients.read().await;
            if let Some(cached) = clients.get(&pinpad.id) {
                if cached.updated_at == pinpad.updated_at {
                    return Ok(cached.provider.clone());
                }
            }
        }

        let mut clients = self.clients.write().await;

        if let Some(cached) = clients.get(&pinpad.id) {
            if cached.updated_at == pinpad.updated_at {
                return Ok(cached.provider.clone());
            }
        }

        let provider = create_provider(pinpad, &self.settings)?;
        debug!(pinpad_id = %pinpad.id, provider = provider.name(), "Provider client built");
        clients.insert(
            pinpad.id.clone(),
            CachedProvider {
                updated_at: pinpad.updated_at,
                provider: provider.clone(),
            },
        );
        Ok(provider)
    }

    /// Drops a pinpad's client.
    pub async fn evict(&self, pinpad_id: &str) {
        self.clients.write().await.remove(pinpad_id);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
