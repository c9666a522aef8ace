//! # comandas-pinpad
//!
//! Payment provider clients for card terminals and PIX.
//!
//! ## Module Structure
//! ```text
//! comandas_pinpad
//! ├── error         ProviderError
//! ├── provider      PaymentProvider trait + shared request/response types
//! ├── factory       ProviderKind, create_provider, ProviderRegistry
//! ├── mercado_pago  Mercado Pago Point client
//! └── rede          Rede Itaú client with OAuth token cache
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let registry = ProviderRegistry::new(ProviderSettings::default());
//! let provider = registry.provider_for(&pinpad).await?;
//! let devices = provider.devices().await?;
//! ```

pub mod error;
pub mod factory;
pub mod mercado_pago;
pub mod provider;
pub mod rede;

pub use error::{ProviderError, ProviderResult};
pub use factory::{create_provider, ProviderKind, ProviderRegistry, ProviderSettings};
pub use mercado_pago::MercadoPagoClient;
pub use provider::{
    CancelOutcome, Device, PaymentIntent, PaymentProvider, PaymentRequest, PaymentStatus, PixCharge,
};
pub use rede::{RedeClient, RedeEndpoints};

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use comandas_core::types::{PinpadProvider, PinpadStatus};
    use comandas_core::Pinpad;

    /// An active pinpad with test credentials.
    pub fn pinpad(provider: PinpadProvider) -> Pinpad {
        let now = Utc::now();
        Pinpad {
            id: "8e1f2c4a-5b6d-4e7f-9a0b-1c2d3e4f5a6b".to_string(),
            name: "Balcão".to_string(),
            description: None,
            provider,
            status: PinpadStatus::Ativo,
            api_url: None,
            api_key: Some("TEST-TOKEN".to_string()),
            api_secret: Some("TEST-SECRET".to_string()),
            merchant_id: Some("MERCHANT-1".to_string()),
            terminal_id: Some("T-01".to_string()),
            pix_key: None,
            webhook_url: None,
            supports_credit: true,
            supports_debit: true,
            supports_contactless: false,
            supports_pix: true,
            credit_fee_bps: 299,
            debit_fee_bps: 149,
            pix_fee_bps: 99,
            credit_fixed_fee_cents: 0,
            debit_fixed_fee_cents: 0,
            timeout_seconds: 30,
            max_amount_cents: None,
            is_default: true,
            is_active: true,
            last_test_at: None,
            last_test_success: false,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }
}
