//! # Domain Types
//!
//! Shared enums and small value types used throughout Comandas.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Shared Types                                   │
//! │                                                                         │
//! │  OrderStatus      aguardando → preparando → pronta → entregue          │
//! │                        └──────────┴───────────┴──► cancelada           │
//! │                                                                         │
//! │  PaymentMethod    dinheiro | cartao_debito | cartao_credito | pix |    │
//! │                   voucher                                              │
//! │  CheckoutStatus   pendente | aprovado | cancelado | estornado          │
//! │  ProductCategory  bebidas | salgados | doces | lanches | outros        │
//! │  PinpadProvider   stone | cielo | rede | ... | mercado_pago | outros   │
//! │  PinpadStatus     ativo | inativo | manutencao | teste                 │
//! │  PaymentType      credit | debit | pix  (what a terminal charges)      │
//! │  Rate             basis points (100 = 1%)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every enum stores as its lowercase wire name (TEXT column) and parses
//! back through `FromStr`, so the same strings travel from SQLite to JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Builds the `NotAllowed` error for an unknown enum string.
fn not_allowed(field: &str, allowed: &[&str]) -> ValidationError {
    ValidationError::NotAllowed {
        field: field.to_string(),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

/// Implements `as_str`, `Display` and `FromStr` from one variant table.
macro_rules! wire_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Wire name stored in the database and sent over JSON.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($wire => Ok($ty::$variant),)+
                    _ => Err(not_allowed($field, &[$($wire),+])),
                }
            }
        }
    };
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// ## Example
/// ```rust
/// use comandas_core::types::Rate;
///
/// let rate = Rate::from_bps(299); // 2.99%
/// assert_eq!(rate.to_string(), "2.99%");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100%.
    pub const FULL: Rate = Rate(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of a comanda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the kitchen.
    #[default]
    Aguardando,
    /// Being prepared.
    Preparando,
    /// Ready for pickup.
    Pronta,
    /// Delivered (and paid, when finalized through checkout).
    Entregue,
    /// Cancelled.
    Cancelada,
}

wire_enum!(OrderStatus, "status", {
    Aguardando => "aguardando",
    Preparando => "preparando",
    Pronta => "pronta",
    Entregue => "entregue",
    Cancelada => "cancelada",
});

impl OrderStatus {
    /// Statuses that count as an open comanda.
    pub const OPEN: &'static [OrderStatus] = &[
        OrderStatus::Aguardando,
        OrderStatus::Preparando,
        OrderStatus::Pronta,
    ];

    /// Returns true while the order is still being worked on.
    pub const fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Aguardando | OrderStatus::Preparando | OrderStatus::Pronta
        )
    }

    /// Human-readable label.
    pub const fn label(&self) -> &'static str {
        match self {
            OrderStatus::Aguardando => "Aguardando",
            OrderStatus::Preparando => "Preparando",
            OrderStatus::Pronta => "Pronta",
            OrderStatus::Entregue => "Entregue",
            OrderStatus::Cancelada => "Cancelada",
        }
    }

    /// Sort key for the checkout screen: ready orders first.
    ///
    /// ```text
    /// pronta = 1, preparando = 2, aguardando = 3, others = 4
    /// ```
    pub const fn checkout_priority(&self) -> u8 {
        match self {
            OrderStatus::Pronta => 1,
            OrderStatus::Preparando => 2,
            OrderStatus::Aguardando => 3,
            OrderStatus::Entregue | OrderStatus::Cancelada => 4,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a checkout was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Dinheiro,
    /// Debit card on a pinpad.
    CartaoDebito,
    /// Credit card on a pinpad.
    CartaoCredito,
    /// PIX instant transfer.
    Pix,
    /// Meal voucher.
    Voucher,
}

wire_enum!(PaymentMethod, "payment_method", {
    Dinheiro => "dinheiro",
    CartaoDebito => "cartao_debito",
    CartaoCredito => "cartao_credito",
    Pix => "pix",
    Voucher => "voucher",
});

impl PaymentMethod {
    /// Human-readable label.
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Dinheiro => "Dinheiro",
            PaymentMethod::CartaoDebito => "Cartão de Débito",
            PaymentMethod::CartaoCredito => "Cartão de Crédito",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Voucher => "Voucher",
        }
    }
}

// =============================================================================
// Checkout Status
// =============================================================================

/// Status of a checkout (payment record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Pendente,
    Aprovado,
    Cancelado,
    Estornado,
}

wire_enum!(CheckoutStatus, "status", {
    Pendente => "pendente",
    Aprovado => "aprovado",
    Cancelado => "cancelado",
    Estornado => "estornado",
});

// =============================================================================
// Product Category
// =============================================================================

/// Menu category of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Bebidas,
    Salgados,
    Doces,
    Lanches,
    #[default]
    Outros,
}

wire_enum!(ProductCategory, "category", {
    Bebidas => "bebidas",
    Salgados => "salgados",
    Doces => "doces",
    Lanches => "lanches",
    Outros => "outros",
});

// =============================================================================
// Pinpad Provider
// =============================================================================

/// Acquirer / terminal vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PinpadProvider {
    Stone,
    Cielo,
    Rede,
    Pagseguro,
    #[default]
    MercadoPago,
    Getnet,
    Safrapay,
    Bin,
    Outros,
}

wire_enum!(PinpadProvider, "provider", {
    Stone => "stone",
    Cielo => "cielo",
    Rede => "rede",
    Pagseguro => "pagseguro",
    MercadoPago => "mercado_pago",
    Getnet => "getnet",
    Safrapay => "safrapay",
    Bin => "bin",
    Outros => "outros",
});

impl PinpadProvider {
    /// Human-readable provider name.
    pub const fn label(&self) -> &'static str {
        match self {
            PinpadProvider::Stone => "Stone",
            PinpadProvider::Cielo => "Cielo",
            PinpadProvider::Rede => "Rede",
            PinpadProvider::Pagseguro => "PagSeguro",
            PinpadProvider::MercadoPago => "Mercado Pago",
            PinpadProvider::Getnet => "Getnet",
            PinpadProvider::Safrapay => "SafraPay",
            PinpadProvider::Bin => "Bin",
            PinpadProvider::Outros => "Outros",
        }
    }
}

// =============================================================================
// Pinpad Status
// =============================================================================

/// Operational status of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PinpadStatus {
    #[default]
    Ativo,
    Inativo,
    Manutencao,
    Teste,
}

wire_enum!(PinpadStatus, "status", {
    Ativo => "ativo",
    Inativo => "inativo",
    Manutencao => "manutencao",
    Teste => "teste",
});

// =============================================================================
// Payment Type
// =============================================================================

/// What a terminal is asked to charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Credit,
    Debit,
    Pix,
}

wire_enum!(PaymentType, "payment_type", {
    Credit => "credit",
    Debit => "debit",
    Pix => "pix",
});

// =============================================================================
// Unit Tests
// =============================================================================
