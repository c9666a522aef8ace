//! # Cash Drawer
//!
//! Sangrias (cash withdrawals) and the cash available in the till.
//!
//! ```text
//! available = valor_inicial + today's aprovado dinheiro checkouts − today's sangrias
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::account::full_name_or_username;
use crate::money::Money;

/// A cash withdrawal from the till.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sangria {
    pub id: String,
    /// Amount withdrawn, at least R$ 0,01.
    pub valor_cents: i64,
    pub observacao: Option<String>,
    /// User who took the cash.
    pub usuario_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sangria {
    #[inline]
    pub fn valor(&self) -> Money {
        Money::from_cents(self.valor_cents)
    }

    /// Feed code: `SGR-` and the first 8 characters of the id, uppercased.
    pub fn short_code(&self) -> String {
        short_code(&self.id)
    }
}

/// `SGR-1A2B3C4D` from a UUID string.
pub fn short_code(id: &str) -> String {
    let short: String = id.chars().take(8).collect();
    format!("SGR-{}", short.to_uppercase())
}

/// A sangria joined with its user's names.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SangriaRecord {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub sangria: Sangria,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl SangriaRecord {
    /// Full name, or the username when the user has none.
    pub fn user_display_name(&self) -> String {
        full_name_or_username(&self.first_name, &self.last_name, &self.username)
    }
}

/// Cash currently in the drawer.
pub fn available_cash(initial: Money, cash_sales: Money, withdrawals: Money) -> Money {
    initial + cash_sales - withdrawals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code() {
        assert_eq!(short_code("1a2b3c4d-0000-4000-8000-000000000000"), "SGR-1A2B3C4D");
        assert_eq!(short_code("abc"), "SGR-ABC");
    }

    #[test]
    fn test_available_cash() {
        let available = available_cash(
            Money::from_cents(5_000),
            Money::from_cents(12_000),
            Money::from_cents(3_000),
        );
        assert_eq!(available.cents(), 14_000);
    }

    #[test]
    fn test_display_name() {
        let record = SangriaRecord {
            sangria: Sangria {
                id: "s1".to_string(),
                valor_cents: 100,
                observacao: None,
                usuario_id: "u1".to_string(),
                created_at: Utc::now(),
            },
            username: "caixa1".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        assert_eq!(record.user_display_name(), "caixa1");
    }
}
