//! # Validation Module
//!
//! Input validation shared by the API handlers and repositories.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Validation Happens                             │
//! │                                                                         │
//! │  JSON body ──► serde (shape) ──► validation.rs (values) ──► DB         │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                                  ValidationError → 400                  │
//! │                                                                         │
//! │  Cross-row rules (unique names, products in combos, one checkout per   │
//! │  order) need the database and are enforced in comandas-db.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comandas_core::validation::{validate_order_name, parse_brl_amount};
//!
//! assert!(validate_order_name("12").is_ok());
//! assert_eq!(parse_brl_amount("valor", "R$ 20,50").unwrap().cents(), 2_050);
//! ```

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Username limit.
pub const MAX_USERNAME: usize = 150;

/// Minimum password length.
pub const MIN_PASSWORD: usize = 8;

/// Largest amount accepted anywhere: R$ 99.999.999,99.
pub const MAX_AMOUNT_CENTS: i64 = 9_999_999_999;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required, length-limited name.
///
/// ## Returns
/// The trimmed value.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Trims optional free text; blank becomes `None`.
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validates an order name (table or customer tag).
///
/// ## Rules
/// - Must not be empty
/// - Digits only
///
/// ## Example
/// ```rust
/// use comandas_core::validation::validate_order_name;
///
/// assert!(validate_order_name("07").is_ok());
/// assert!(validate_order_name("mesa 7").is_err());
/// ```
pub fn validate_order_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if !name.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format("name", "must contain only digits"));
    }

    Ok(name.to_string())
}

/// Validates a scanned order code: exactly four ASCII digits.
///
/// ## Returns
/// The trimmed code.
pub fn validate_order_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Rule(
            "Código deve ter exatamente 4 dígitos.".to_string(),
        ));
    }
    Ok(code.to_string())
}

/// Validates a login name.
///
/// ## Rules
/// - Must not be empty, at most 150 characters
/// - Letters, digits and `@ . + - _`
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::required("username"));
    }

    if username.chars().count() > MAX_USERNAME {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::invalid_format(
            "username",
            "must contain only letters, numbers, and @/./+/-/_",
        ));
    }

    Ok(username.to_string())
}

/// Validates a new password and its confirmation.
pub fn validate_new_password(password1: &str, password2: &str) -> ValidationResult<()> {
    if password1.chars().count() < MIN_PASSWORD {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD,
        });
    }

    if password1 != password2 {
        return Err(ValidationError::Mismatch {
            field: "password2".to_string(),
        });
    }

    Ok(())
}

/// Validates an optional e-mail. Blank is fine.
pub fn validate_email(email: Option<&str>) -> ValidationResult<String> {
    let email = email.map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Ok(String::new());
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_string()),
        _ => Err(ValidationError::invalid_format("email", "must be a valid e-mail address")),
    }
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all/default results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents.
///
/// ## Rules
/// - At least R$ 0,01
/// - At most [`MAX_AMOUNT_CENTS`]
///
/// ## Example
/// ```rust
/// use comandas_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("price", 1099).is_ok());
/// assert!(validate_price_cents("price", 0).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 1 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    validate_amount_cents(field, cents)
}

/// Validates a non-negative amount in cents (discounts, fees, limits).
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Parses a user-typed BRL amount that must be greater than zero.
///
/// ## Errors
/// ```text
/// ""          → "Valor é obrigatório"
/// "abc"       → "Valor inválido"
/// "0,00"      → "Valor deve ser maior que zero"
/// ```
pub fn parse_brl_amount(field: &str, input: &str) -> ValidationResult<Money> {
    let cleaned = input.replace("R$", "");
    if cleaned.trim().is_empty() {
        return Err(ValidationError::Rule(format!("{} é obrigatório", capitalize(field))));
    }

    let amount = Money::parse_brl(&cleaned)
        .ok_or_else(|| ValidationError::Rule(format!("{} inválido", capitalize(field))))?;

    if !amount.is_positive() {
        return Err(ValidationError::Rule(format!(
            "{} deve ser maior que zero",
            capitalize(field)
        )));
    }
    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::Rule(format!(
            "{} deve ser no máximo {}",
            capitalize(field),
            Money::from_cents(MAX_AMOUNT_CENTS)
        )));
    }

    Ok(amount)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use comandas_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Café  ", 100).unwrap(), "Café");
        assert!(validate_name("name", "   ", 100).is_err());
        assert!(validate_name("name", &"é".repeat(101), 100).is_err());
        assert!(validate_name("name", &"é".repeat(100), 100).is_ok());
    }

    #[test]
    fn test_validate_order_name() {
        assert!(validate_order_name("12").is_ok());
        assert!(validate_order_name("").is_err());
        assert!(validate_order_name("12a").is_err());
        assert!(validate_order_name("-1").is_err());
    }

    #[test]
    fn test_validate_order_code() {
        assert_eq!(validate_order_code(" 1234 ").unwrap(), "1234");
        assert!(validate_order_code("123").is_err());
        assert!(validate_order_code("12345").is_err());
        assert_eq!(
            validate_order_code("12a4").unwrap_err().to_string(),
            "Código deve ter exatamente 4 dígitos."
        );
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana.souza+caixa@cafe").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ana souza").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password("segredo123", "segredo123").is_ok());
        assert!(matches!(
            validate_new_password("curta", "curta"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(matches!(
            validate_new_password("segredo123", "segredo124"),
            Err(ValidationError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(None).unwrap(), "");
        assert!(validate_email(Some("ana@cafe.com")).is_ok());
        assert!(validate_email(Some("ana")).is_err());
    }

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(parse_brl_amount("valor", "R$ 1.234,56").unwrap().cents(), 123_456);
        assert_eq!(parse_brl_amount("valor", "50").unwrap().cents(), 5_000);

        assert_eq!(
            parse_brl_amount("valor", "  ").unwrap_err().to_string(),
            "Valor é obrigatório"
        );
        assert_eq!(
            parse_brl_amount("valor", "R$ ").unwrap_err().to_string(),
            "Valor é obrigatório"
        );
        assert_eq!(
            parse_brl_amount("valor", "dez").unwrap_err().to_string(),
            "Valor inválido"
        );
        assert_eq!(
            parse_brl_amount("valor", "0,00").unwrap_err().to_string(),
            "Valor deve ser maior que zero"
        );
        assert_eq!(
            parse_brl_amount("valor", "100.000.000,00").unwrap_err().to_string(),
            "Valor deve ser no máximo R$ 99.999.999,99"
        );
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents("price", 1).is_ok());
        assert!(validate_price_cents("price", 0).is_err());
        assert!(validate_price_cents("price", -100).is_err());
        assert!(validate_price_cents("price", MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents("price", MAX_AMOUNT_CENTS + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents("desconto", 0).is_ok());
        assert!(validate_amount_cents("desconto", -1).is_err());
        assert!(validate_amount_cents("taxa_servico", i64::MAX).is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some("  ")), None);
        assert_eq!(normalize_optional(Some(" mesa ")), Some("mesa".to_string()));
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
