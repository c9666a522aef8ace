//! # Catalog
//!
//! Products, combos and the combo pricing breakdown.
//!
//! ## Combo Pricing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Line        product.price   qty   original     combo_price            │
//! │  Café        R$ 6,00         1     R$ 6,00      R$ 5,00                │
//! │  Pão de queijo R$ 4,50       2     R$ 9,00      R$ 7,50                │
//! │  ─────────────────────────────────────────────────────────────────      │
//! │  original_price = R$ 15,00     total_price = R$ 12,50                  │
//! │  discount = R$ 2,50            discount_percentage = 16.67%            │
//! │                                                                         │
//! │  combo_price is the price charged for the WHOLE line, and may not      │
//! │  exceed product.price × qty × 2.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::ProductCategory;
use crate::validation::validate_price_cents;

// =============================================================================
// Product
// =============================================================================

/// A product on the café's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, at most 100 characters.
    pub name: String,

    pub description: Option<String>,

    pub category: ProductCategory,

    /// Price in centavos, at least 1.
    pub price_cents: i64,

    /// Listed on the public menu.
    pub show_in_menu: bool,

    /// Soft delete flag.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Product {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Combo
// =============================================================================

/// A bundle of products sold together.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Combo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub show_in_menu: bool,
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// One stored line of a combo.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ComboItem {
    pub id: String,
    pub combo_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Price charged for the whole line.
    pub combo_price_cents: i64,
}

/// A combo line joined with its product snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ComboLine {
    pub id: String,
    pub combo_id: String,
    pub product_id: String,
    pub product_name: String,
    pub product_category: ProductCategory,
    pub product_price_cents: i64,
    pub quantity: i64,
    pub combo_price_cents: i64,
}

impl ComboLine {
    /// What the line would cost at regular prices.
    pub fn original_price(&self) -> Money {
        Money::from_cents(self.product_price_cents).multiply_quantity(self.quantity)
    }

    /// What the combo charges for this line.
    pub fn combo_price(&self) -> Money {
        Money::from_cents(self.combo_price_cents)
    }
}

// =============================================================================
// Combo Pricing
// =============================================================================

/// Pricing breakdown of a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComboPricing {
    pub total_price: Money,
    pub original_price: Money,
    pub discount: Money,
    /// Discount over the original price in basis points (1667 = 16.67%).
    /// Negative when the combo costs more than its parts.
    pub discount_bps: i64,
}

impl ComboPricing {
    /// Computes the breakdown from the joined lines.
    ///
    /// ## Example
    /// ```rust
    /// use comandas_core::catalog::{ComboLine, ComboPricing};
    /// use comandas_core::types::ProductCategory;
    ///
    /// let line = ComboLine {
    ///     id: "i1".into(),
    ///     combo_id: "c1".into(),
    ///     product_id: "p1".into(),
    ///     product_name: "Café".into(),
    ///     product_category: ProductCategory::Bebidas,
    ///     product_price_cents: 1_000,
    ///     quantity: 1,
    ///     combo_price_cents: 800,
    /// };
    /// let pricing = ComboPricing::compute(&[line]);
    /// assert_eq!(pricing.discount.cents(), 200);
    /// assert_eq!(pricing.discount_bps, 2_000);
    /// ```
    pub fn compute(lines: &[ComboLine]) -> Self {
        let total_price: Money = lines.iter().map(ComboLine::combo_price).sum();
        let original_price: Money = lines.iter().map(ComboLine::original_price).sum();
        let discount = original_price - total_price;

        let discount_bps = if original_price.is_zero() {
            0
        } else {
            let num = discount.cents() as i128 * 10_000;
            let den = original_price.cents() as i128;
            let half = den / 2;
            let rounded = if num >= 0 { (num + half) / den } else { (num - half) / den };
            rounded as i64
        };

        ComboPricing {
            total_price,
            original_price,
            discount,
            discount_bps,
        }
    }

    /// The discount percentage as shown on the menu ("16.67").
    pub fn discount_percentage(&self) -> String {
        let sign = if self.discount_bps < 0 { "-" } else { "" };
        let abs = self.discount_bps.abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// A combo with its lines and pricing, as shown on detail pages and the menu.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComboDetail {
    #[serde(flatten)]
    pub combo: Combo,
    pub items: Vec<ComboLine>,
    pub pricing: ComboPricing,
}

impl ComboDetail {
    pub fn new(combo: Combo, items: Vec<ComboLine>) -> Self {
        let pricing = ComboPricing::compute(&items);
        ComboDetail {
            combo,
            items,
            pricing,
        }
    }
}

// =============================================================================
// Combo Item Input
// =============================================================================

/// A line as submitted when creating or editing a combo.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComboItemInput {
    pub product_id: String,
    pub quantity: i64,
    pub combo_price_cents: i64,
}

/// Checks a combo's lines before they are written.
///
/// ## Rules
/// - At least one line
/// - No product appears twice
/// - quantity >= 1
/// - combo_price >= R$ 0,01
///
/// The price cap needs the product price, see [`validate_combo_price_cap`].
pub fn validate_combo_items(items: &[ComboItemInput]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::Rule(
            "A combo needs at least one item".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.product_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "product".to_string(),
                value: item.product_id.clone(),
            });
        }
        if item.quantity < 1 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }
        validate_price_cents("combo_price", item.combo_price_cents)?;
    }
    Ok(())
}

/// A line's combo price may be at most twice its regular price.
pub fn validate_combo_price_cap(
    product_name: &str,
    product_price: Money,
    quantity: i64,
    combo_price: Money,
) -> Result<(), ValidationError> {
    let cap = product_price.multiply_quantity(quantity).multiply_quantity(2);
    if combo_price > cap {
        return Err(ValidationError::Rule(format!(
            "Combo price for '{}' ({}) exceeds twice its regular price ({})",
            product_name, combo_price, cap
        )));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, price: i64, qty: i64, combo_price: i64) -> ComboLine {
        ComboLine {
            id: format!("item-{}", product),
            combo_id: "combo-1".to_string(),
            product_id: product.to_string(),
            product_name: product.to_string(),
            product_category: ProductCategory::Outros,
            product_price_cents: price,
            quantity: qty,
            combo_price_cents: combo_price,
        }
    }

    #[test]
    fn test_pricing_breakdown() {
        let lines = [line("cafe", 600, 1, 500), line("pao", 450, 2, 750)];
        let pricing = ComboPricing::compute(&lines);

        assert_eq!(pricing.original_price.cents(), 1_500);
        assert_eq!(pricing.total_price.cents(), 1_250);
        assert_eq!(pricing.discount.cents(), 250);
        assert_eq!(pricing.discount_bps, 1_667);
        assert_eq!(pricing.discount_percentage(), "16.67");
    }

    #[test]
    fn test_pricing_zero_original_has_no_percentage() {
        let pricing = ComboPricing::compute(&[]);
        assert_eq!(pricing.discount_bps, 0);
        assert!(pricing.total_price.is_zero());
    }

    #[test]
    fn test_pricing_markup_is_negative_discount() {
        let pricing = ComboPricing::compute(&[line("cafe", 1_000, 1, 1_200)]);
        assert_eq!(pricing.discount.cents(), -200);
        assert_eq!(pricing.discount_bps, -2_000);
        assert_eq!(pricing.discount_percentage(), "-20.00");
    }

    #[test]
    fn test_combo_items_rules() {
        assert!(validate_combo_items(&[]).is_err());

        let dup = vec![
            ComboItemInput { product_id: "a".into(), quantity: 1, combo_price_cents: 100 },
            ComboItemInput { product_id: "a".into(), quantity: 2, combo_price_cents: 100 },
        ];
        assert!(matches!(
            validate_combo_items(&dup),
            Err(ValidationError::Duplicate { .. })
        ));

        let zero_qty = vec![ComboItemInput { product_id: "a".into(), quantity: 0, combo_price_cents: 100 }];
        assert!(validate_combo_items(&zero_qty).is_err());

        let ok = vec![ComboItemInput { product_id: "a".into(), quantity: 1, combo_price_cents: 1 }];
        assert!(validate_combo_items(&ok).is_ok());
    }

    #[test]
    fn test_price_cap_is_twice_the_line() {
        let price = Money::from_cents(500);
        assert!(validate_combo_price_cap("Café", price, 2, Money::from_cents(2_000)).is_ok());
        assert!(validate_combo_price_cap("Café", price, 2, Money::from_cents(2_001)).is_err());
    }
}
