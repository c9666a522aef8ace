//! # Pinpads
//!
//! Card terminal configuration, fee math and fleet statistics.
//!
//! ## Fees
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  credit fee = amount × credit% + credit_fixed                          │
//! │  debit fee  = amount × debit%  + debit_fixed                           │
//! │  pix fee    = amount × pix%                                            │
//! │  net        = amount − fee                                             │
//! │                                                                         │
//! │  Percentages are basis points; the product rounds half-up to the       │
//! │  centavo before the fixed part is added.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentType, PinpadProvider, PinpadStatus, Rate};
use crate::validation::{validate_amount_cents, validate_price_cents};

/// Default provider request timeout.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 60;

/// Accepted timeout range.
pub const TIMEOUT_RANGE: std::ops::RangeInclusive<i64> = 5..=300;

// =============================================================================
// Pinpad
// =============================================================================

/// A card terminal and its provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Pinpad {
    pub id: String,
    pub name: String,
    pub description: Option<String>,

    pub provider: PinpadProvider,
    pub status: PinpadStatus,

    pub api_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub api_secret: Option<String>,
    pub merchant_id: Option<String>,
    pub terminal_id: Option<String>,
    pub pix_key: Option<String>,
    pub webhook_url: Option<String>,

    pub supports_credit: bool,
    pub supports_debit: bool,
    pub supports_contactless: bool,
    pub supports_pix: bool,

    pub credit_fee_bps: i64,
    pub debit_fee_bps: i64,
    pub pix_fee_bps: i64,
    pub credit_fixed_fee_cents: i64,
    pub debit_fixed_fee_cents: i64,

    pub timeout_seconds: i64,
    pub max_amount_cents: Option<i64>,

    pub is_default: bool,
    pub is_active: bool,
    #[ts(as = "Option<String>")]
    pub last_test_at: Option<DateTime<Utc>>,
    pub last_test_success: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

fn rate(bps: i64) -> Rate {
    Rate::from_bps(bps.clamp(0, Rate::FULL.bps() as i64) as u32)
}

impl Pinpad {
    /// Fee charged by the provider for `amount`.
    pub fn fee_for(&self, amount: Money, payment_type: PaymentType) -> Money {
        match payment_type {
            PaymentType::Credit => {
                amount.apply_rate(rate(self.credit_fee_bps)) + Money::from_cents(self.credit_fixed_fee_cents)
            }
            PaymentType::Debit => {
                amount.apply_rate(rate(self.debit_fee_bps)) + Money::from_cents(self.debit_fixed_fee_cents)
            }
            PaymentType::Pix => amount.apply_rate(rate(self.pix_fee_bps)),
        }
    }

    /// What the café keeps after the fee.
    pub fn net_amount(&self, amount: Money, payment_type: PaymentType) -> Money {
        amount - self.fee_for(amount, payment_type)
    }

    /// Fee and net for one amount.
    pub fn fee_preview(&self, amount: Money, payment_type: PaymentType) -> FeePreview {
        let fee = self.fee_for(amount, payment_type);
        FeePreview {
            amount,
            payment_type,
            fee,
            net_amount: amount - fee,
        }
    }

    /// Checks a payment amount against the terminal.
    ///
    /// ## Errors
    /// - `MustBePositive` for zero or negative amounts
    /// - `OutOfRange` above `MAX_AMOUNT_CENTS`
    /// - `AmountExceedsLimit` above `max_amount`
    pub fn ensure_amount_allowed(&self, amount: Money) -> CoreResult<()> {
        validate_price_cents("amount", amount.cents())?;
        if let Some(max) = self.max_amount_cents.map(Money::from_cents) {
            if amount > max {
                return Err(CoreError::AmountExceedsLimit {
                    amount: amount.to_string(),
                    max: max.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Device id used when the provider has no device listing.
    pub fn synthetic_device_id(&self) -> String {
        match self.terminal_id.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(terminal) => terminal.to_string(),
            None => format!("rede-{}", self.id),
        }
    }
}

/// Result of a fee preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeePreview {
    pub amount: Money,
    pub payment_type: PaymentType,
    pub fee: Money,
    pub net_amount: Money,
}

// =============================================================================
// Pinpad Draft
// =============================================================================

/// Editable fields of a pinpad, as submitted on create and update.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PinpadDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: PinpadProvider,
    #[serde(default)]
    pub status: PinpadStatus,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub terminal_id: Option<String>,
    #[serde(default)]
    pub pix_key: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_true")]
    pub supports_credit: bool,
    #[serde(default = "default_true")]
    pub supports_debit: bool,
    #[serde(default)]
    pub supports_contactless: bool,
    #[serde(default)]
    pub supports_pix: bool,
    #[serde(default)]
    pub credit_fee_bps: i64,
    #[serde(default)]
    pub debit_fee_bps: i64,
    #[serde(default)]
    pub pix_fee_bps: i64,
    #[serde(default)]
    pub credit_fixed_fee_cents: i64,
    #[serde(default)]
    pub debit_fixed_fee_cents: i64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub max_amount_cents: Option<i64>,
    #[serde(default)]
    pub is_default: bool,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl PinpadDraft {
    /// Validates every field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::validation::validate_name("name", &self.name, 100)?;

        if !(self.supports_credit || self.supports_debit || self.supports_pix) {
            return Err(ValidationError::Rule(
                "A pinpad must support credit, debit or PIX".to_string(),
            ));
        }

        for (field, bps) in [
            ("credit_fee", self.credit_fee_bps),
            ("debit_fee", self.debit_fee_bps),
            ("pix_fee", self.pix_fee_bps),
        ] {
            if !(0..=Rate::FULL.bps() as i64).contains(&bps) {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    min: 0,
                    max: Rate::FULL.bps() as i64,
                });
            }
        }

        for (field, cents) in [
            ("credit_fixed_fee", self.credit_fixed_fee_cents),
            ("debit_fixed_fee", self.debit_fixed_fee_cents),
        ] {
            validate_amount_cents(field, cents)?;
        }

        if !TIMEOUT_RANGE.contains(&self.timeout_seconds) {
            return Err(ValidationError::OutOfRange {
                field: "timeout_seconds".to_string(),
                min: *TIMEOUT_RANGE.start(),
                max: *TIMEOUT_RANGE.end(),
            });
        }

        if let Some(max) = self.max_amount_cents {
            validate_price_cents("max_amount", max)?;
        }
        Ok(())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Count per provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProviderCount {
    pub provider: PinpadProvider,
    pub label: String,
    pub count: i64,
    pub active: i64,
}

/// Count per status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCount {
    pub status: PinpadStatus,
    pub count: i64,
}

/// Feature support counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FeatureCounts {
    pub credit: i64,
    pub debit: i64,
    pub contactless: i64,
}

/// Fleet overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PinpadStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub has_default: bool,
    pub by_provider: Vec<ProviderCount>,
    pub by_status: Vec<StatusCount>,
    pub features: FeatureCounts,
}

impl PinpadStats {
    /// Aggregates the whole fleet.
    ///
    /// `by_provider` is sorted by count descending and omits providers
    /// without pinpads; `by_status` lists every status.
    pub fn compute(pinpads: &[Pinpad]) -> Self {
        let total = pinpads.len() as i64;
        let active = pinpads.iter().filter(|p| p.is_active).count() as i64;

        let mut by_provider: Vec<ProviderCount> = PinpadProvider::ALL
            .iter()
            .map(|provider| {
                let of_provider = pinpads.iter().filter(|p| p.provider == *provider);
                ProviderCount {
                    provider: *provider,
                    label: provider.label().to_string(),
                    count: of_provider.clone().count() as i64,
                    active: of_provider.filter(|p| p.is_active).count() as i64,
                }
            })
            .filter(|c| c.count > 0)
            .collect();
        by_provider.sort_by(|a, b| b.count.cmp(&a.count));

        let by_status = PinpadStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: *status,
                count: pinpads.iter().filter(|p| p.status == *status).count() as i64,
            })
            .collect();

        let features = FeatureCounts {
            credit: pinpads.iter().filter(|p| p.supports_credit).count() as i64,
            debit: pinpads.iter().filter(|p| p.supports_debit).count() as i64,
            contactless: pinpads.iter().filter(|p| p.supports_contactless).count() as i64,
        };

        PinpadStats {
            total,
            active,
            inactive: total - active,
            has_default: pinpads.iter().any(|p| p.is_default),
            by_provider,
            by_status,
            features,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pinpad(provider: PinpadProvider, is_active: bool) -> Pinpad {
        let now = Utc::now();
        Pinpad {
            id: "p1".to_string(),
            name: "Caixa 1".to_string(),
            description: None,
            provider,
            status: PinpadStatus::Ativo,
            api_url: None,
            api_key: None,
            api_secret: None,
            merchant_id: None,
            terminal_id: None,
            pix_key: None,
            webhook_url: None,
            supports_credit: true,
            supports_debit: true,
            supports_contactless: false,
            supports_pix: false,
            credit_fee_bps: 299,
            debit_fee_bps: 149,
            pix_fee_bps: 99,
            credit_fixed_fee_cents: 10,
            debit_fixed_fee_cents: 0,
            timeout_seconds: 60,
            max_amount_cents: Some(100_000),
            is_default: false,
            is_active,
            last_test_at: None,
            last_test_success: false,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    #[test]
    fn test_fee_math() {
        let p = pinpad(PinpadProvider::Stone, true);
        let amount = Money::from_cents(10_000);

        assert_eq!(p.fee_for(amount, PaymentType::Credit).cents(), 309);
        assert_eq!(p.fee_for(amount, PaymentType::Debit).cents(), 149);
        assert_eq!(p.fee_for(amount, PaymentType::Pix).cents(), 99);
        assert_eq!(p.net_amount(amount, PaymentType::Credit).cents(), 9_691);
    }

    #[test]
    fn test_fee_rounds_half_up() {
        let mut p = pinpad(PinpadProvider::Stone, true);
        p.debit_fee_bps = 150;
        // 1,50% of R$ 0,99 = 1,485 centavos → 1
        assert_eq!(p.fee_for(Money::from_cents(99), PaymentType::Debit).cents(), 1);
        // 1,50% of R$ 1,00 = 1,5 centavos → 2
        assert_eq!(p.fee_for(Money::from_cents(100), PaymentType::Debit).cents(), 2);
    }

    #[test]
    fn test_amount_limits() {
        let mut p = pinpad(PinpadProvider::Rede, true);
        assert!(p.ensure_amount_allowed(Money::from_cents(100_000)).is_ok());
        assert!(matches!(
            p.ensure_amount_allowed(Money::from_cents(100_001)),
            Err(CoreError::AmountExceedsLimit { .. })
        ));
        assert!(p.ensure_amount_allowed(Money::zero()).is_err());

        p.max_amount_cents = None;
        assert!(matches!(
            p.ensure_amount_allowed(Money::from_cents(i64::MAX)),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_synthetic_device_id() {
        let mut p = pinpad(PinpadProvider::Rede, true);
        assert_eq!(p.synthetic_device_id(), "rede-p1");
        p.terminal_id = Some("T-42".to_string());
        assert_eq!(p.synthetic_device_id(), "T-42");
    }

    #[test]
    fn test_stats() {
        let mut default = pinpad(PinpadProvider::Stone, true);
        default.is_default = true;
        let fleet = vec![
            default,
            pinpad(PinpadProvider::Stone, false),
            pinpad(PinpadProvider::Rede, true),
        ];
        let stats = PinpadStats::compute(&fleet);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.inactive, 1);
        assert!(stats.has_default);
        assert_eq!(stats.by_provider[0].provider, PinpadProvider::Stone);
        assert_eq!(stats.by_provider[0].count, 2);
        assert_eq!(stats.by_provider[0].active, 1);
        assert_eq!(stats.by_status.len(), PinpadStatus::ALL.len());
        assert_eq!(stats.features.credit, 3);
    }

    fn draft() -> PinpadDraft {
        serde_json::from_value(serde_json::json!({ "name": "Caixa 1" })).unwrap()
    }

    #[test]
    fn test_draft_defaults_and_rules() {
        let d = draft();
        assert_eq!(d.provider, PinpadProvider::MercadoPago);
        assert_eq!(d.timeout_seconds, 60);
        assert!(d.validate().is_ok());

        let mut none = draft();
        none.supports_credit = false;
        none.supports_debit = false;
        assert!(none.validate().is_err());

        let mut slow = draft();
        slow.timeout_seconds = 301;
        assert!(slow.validate().is_err());

        let mut fee = draft();
        fee.pix_fee_bps = 10_001;
        assert!(fee.validate().is_err());

        let mut fixed = draft();
        fixed.credit_fixed_fee_cents = i64::MAX;
        assert!(matches!(fixed.validate(), Err(ValidationError::OutOfRange { .. })));

        let mut limit = draft();
        limit.max_amount_cents = Some(crate::validation::MAX_AMOUNT_CENTS + 1);
        assert!(limit.validate().is_err());
    }
}
