//! # Accounts
//!
//! Users and the closed permission catalog.
//!
//! ## Permission Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  user_permissions(user_id, codename)                                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  PermissionSet { superuser, granted }                                  │
//! │        │                                                                │
//! │        ├── superuser = true  → has(anything) == true                   │
//! │        └── superuser = false → has(p) == granted.contains(p)           │
//! │                                                                         │
//! │  The permission form is a {codename: bool} map. Applying it REPLACES   │
//! │  the grant set with the checked codenames.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// User
// =============================================================================

/// A back-office account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Login name, unique.
    pub username: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,

    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,

    #[ts(as = "String")]
    pub date_joined: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,

    /// Bumped on logout and password change; tokens carry the version
    /// they were issued under.
    #[serde(skip)]
    #[ts(skip)]
    pub token_version: i64,
}

impl User {
    /// "First Last", or the username when both names are blank.
    pub fn full_name_or_username(&self) -> String {
        full_name_or_username(&self.first_name, &self.last_name, &self.username)
    }
}

/// Display name used on receipts and in the financial feed.
pub fn full_name_or_username(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{} {}", first_name.trim(), last_name.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

// =============================================================================
// Permission
// =============================================================================

/// Every permission the service checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Permission {
    #[serde(rename = "orders.view_order")]
    ViewOrder,
    #[serde(rename = "orders.add_order")]
    AddOrder,
    #[serde(rename = "orders.change_order")]
    ChangeOrder,
    #[serde(rename = "orders.delete_order")]
    DeleteOrder,

    #[serde(rename = "products.view_product")]
    ViewProduct,
    #[serde(rename = "products.add_product")]
    AddProduct,
    #[serde(rename = "products.change_product")]
    ChangeProduct,
    #[serde(rename = "products.delete_product")]
    DeleteProduct,

    #[serde(rename = "products.view_combo")]
    ViewCombo,
    #[serde(rename = "products.add_combo")]
    AddCombo,
    #[serde(rename = "products.change_combo")]
    ChangeCombo,
    #[serde(rename = "products.delete_combo")]
    DeleteCombo,

    #[serde(rename = "checkouts.view_checkout")]
    ViewCheckout,
    #[serde(rename = "checkouts.add_checkout")]
    AddCheckout,
    #[serde(rename = "checkouts.change_checkout")]
    ChangeCheckout,

    #[serde(rename = "financials.can_view_sangria")]
    ViewSangria,
    #[serde(rename = "financials.can_add_sangria")]
    AddSangria,

    #[serde(rename = "pinpads.view_pinpad")]
    ViewPinpad,
    #[serde(rename = "pinpads.add_pinpad")]
    AddPinpad,
    #[serde(rename = "pinpads.change_pinpad")]
    ChangePinpad,
    #[serde(rename = "pinpads.delete_pinpad")]
    DeletePinpad,

    #[serde(rename = "accounts.manage_users")]
    ManageUsers,
}

impl Permission {
    /// The full catalog, in display order.
    pub const ALL: &'static [Permission] = &[
        Permission::ViewOrder,
        Permission::AddOrder,
        Permission::ChangeOrder,
        Permission::DeleteOrder,
        Permission::ViewProduct,
        Permission::AddProduct,
        Permission::ChangeProduct,
        Permission::DeleteProduct,
        Permission::ViewCombo,
        Permission::AddCombo,
        Permission::ChangeCombo,
        Permission::DeleteCombo,
        Permission::ViewCheckout,
        Permission::AddCheckout,
        Permission::ChangeCheckout,
        Permission::ViewSangria,
        Permission::AddSangria,
        Permission::ViewPinpad,
        Permission::AddPinpad,
        Permission::ChangePinpad,
        Permission::DeletePinpad,
        Permission::ManageUsers,
    ];

    /// `app.codename` string stored in `user_permissions`.
    pub const fn codename(&self) -> &'static str {
        match self {
            Permission::ViewOrder => "orders.view_order",
            Permission::AddOrder => "orders.add_order",
            Permission::ChangeOrder => "orders.change_order",
            Permission::DeleteOrder => "orders.delete_order",
            Permission::ViewProduct => "products.view_product",
            Permission::AddProduct => "products.add_product",
            Permission::ChangeProduct => "products.change_product",
            Permission::DeleteProduct => "products.delete_product",
            Permission::ViewCombo => "products.view_combo",
            Permission::AddCombo => "products.add_combo",
            Permission::ChangeCombo => "products.change_combo",
            Permission::DeleteCombo => "products.delete_combo",
            Permission::ViewCheckout => "checkouts.view_checkout",
            Permission::AddCheckout => "checkouts.add_checkout",
            Permission::ChangeCheckout => "checkouts.change_checkout",
            Permission::ViewSangria => "financials.can_view_sangria",
            Permission::AddSangria => "financials.can_add_sangria",
            Permission::ViewPinpad => "pinpads.view_pinpad",
            Permission::AddPinpad => "pinpads.add_pinpad",
            Permission::ChangePinpad => "pinpads.change_pinpad",
            Permission::DeletePinpad => "pinpads.delete_pinpad",
            Permission::ManageUsers => "accounts.manage_users",
        }
    }

    /// Checkbox label.
    pub const fn label(&self) -> &'static str {
        match self {
            Permission::ViewOrder => "Ver comandas",
            Permission::AddOrder => "Criar comandas",
            Permission::ChangeOrder => "Alterar comandas",
            Permission::DeleteOrder => "Excluir comandas",
            Permission::ViewProduct => "Ver produtos",
            Permission::AddProduct => "Criar produtos",
            Permission::ChangeProduct => "Alterar produtos",
            Permission::DeleteProduct => "Excluir produtos",
            Permission::ViewCombo => "Ver combos",
            Permission::AddCombo => "Criar combos",
            Permission::ChangeCombo => "Alterar combos",
            Permission::DeleteCombo => "Excluir combos",
            Permission::ViewCheckout => "Ver caixa",
            Permission::AddCheckout => "Finalizar pagamentos",
            Permission::ChangeCheckout => "Cancelar e estornar pagamentos",
            Permission::ViewSangria => "Ver sangrias",
            Permission::AddSangria => "Registrar sangrias",
            Permission::ViewPinpad => "Ver pinpads",
            Permission::AddPinpad => "Criar pinpads",
            Permission::ChangePinpad => "Alterar pinpads",
            Permission::DeletePinpad => "Excluir pinpads",
            Permission::ManageUsers => "Gerenciar usuários",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codename())
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.codename() == s)
            .ok_or_else(|| ValidationError::invalid_format("permissions", format!("unknown permission '{}'", s)))
    }
}

/// One row of the permission catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PermissionInfo {
    pub codename: String,
    pub label: String,
}

/// The catalog used to build the checkbox form.
pub fn permission_catalog() -> Vec<PermissionInfo> {
    Permission::ALL
        .iter()
        .map(|p| PermissionInfo {
            codename: p.codename().to_string(),
            label: p.label().to_string(),
        })
        .collect()
}

// =============================================================================
// Permission Set
// =============================================================================

/// The effective permissions of an authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub superuser: bool,
    pub granted: BTreeSet<Permission>,
}

impl PermissionSet {
    /// Builds a set from stored codenames, skipping any the catalog no
    /// longer knows.
    pub fn from_codenames<I, S>(superuser: bool, codenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let granted = codenames
            .into_iter()
            .filter_map(|c| c.as_ref().parse().ok())
            .collect();
        PermissionSet { superuser, granted }
    }

    /// Superusers hold everything implicitly.
    pub fn has(&self, permission: Permission) -> bool {
        self.superuser || self.granted.contains(&permission)
    }

    /// Effective codenames, sorted. A superuser lists the whole catalog.
    pub fn codenames(&self) -> Vec<String> {
        if self.superuser {
            return Permission::ALL.iter().map(|p| p.codename().to_string()).collect();
        }
        self.granted.iter().map(|p| p.codename().to_string()).collect()
    }
}

/// Applies a `{codename: checked}` form.
///
/// ## Returns
/// The checked permissions, which replace the user's grants.
///
/// ## Errors
/// `InvalidFormat` for a key that isn't a known codename.
pub fn parse_permission_form(form: &BTreeMap<String, bool>) -> Result<BTreeSet<Permission>, ValidationError> {
    let mut granted = BTreeSet::new();
    for (key, checked) in form {
        let permission: Permission = key.parse()?;
        if *checked {
            granted.insert(permission);
        }
    }
    Ok(granted)
}

// =============================================================================
// Unit Tests
// =============================================================================
