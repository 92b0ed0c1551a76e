//! # Validation Module
//!
//! Input validation for ledger commands.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (outside this workspace)                          │
//! │  ├── Authentication, tenant resolution                                 │
//! │  └── JSON deserialization                                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Currency codes normalized to upper case                           │
//! │  ├── Amount strings parsed to fixed-point                              │
//! │  └── Notes / descriptions trimmed and bounded                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on status / movement_type                       │
//! │  ├── Partial UNIQUE index: one open session per register               │
//! │  └── Triggers: movements are append-only                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cambio_core::validation::{validate_currency_code, validate_nonzero};
//! use cambio_core::Money;
//!
//! assert_eq!(validate_currency_code(" usd ").unwrap(), "USD");
//! assert!(validate_nonzero("amount", Money::zero()).is_err());
//! ```

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH, MAX_NOTES_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Currency Validators
// =============================================================================

/// Validates and normalizes an ISO-4217-style currency code.
///
/// ## Rules
/// - Exactly three ASCII letters after trimming
/// - Returned in upper case, so `"cdf"` and `"CDF"` address the same balance
///
/// ## Example
/// ```rust
/// use cambio_core::validation::validate_currency_code;
///
/// assert_eq!(validate_currency_code("cdf").unwrap(), "CDF");
/// assert!(validate_currency_code("US").is_err());
/// assert!(validate_currency_code("U$D").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: format!("'{}' is not a three-letter currency code", code),
        });
    }

    Ok(code.to_ascii_uppercase())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates free-text notes on open/close.
///
/// Blank notes collapse to `None`.
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    optional_text("notes", notes, MAX_NOTES_LENGTH)
}

/// Validates a movement description. Blank collapses to `None`.
pub fn validate_description(description: Option<&str>) -> ValidationResult<Option<String>> {
    optional_text("description", description, MAX_DESCRIPTION_LENGTH)
}

/// Validates a register name.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_NAME_LENGTH`] characters
pub fn validate_register_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

fn optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(Some(value.to_string()))
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Rejects zero amounts.
///
/// A movement of zero would create an audit row that changes nothing.
pub fn validate_nonzero(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_zero() {
        return Err(ValidationError::MustNotBeZero {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a physically counted amount (opening float or closing count).
///
/// ## Rules
/// - Must be non-negative; a drawer cannot hold negative cash
/// - Zero is allowed (empty drawer)
pub fn validate_count(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Normalizes the currency keys of a counted-cash map.
///
/// ## Rules
/// - Every key must be a valid currency code (normalized to upper case)
/// - Every value must pass [`validate_count`]
/// - Two keys that normalize to the same code are rejected
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Close Session                                                          │
/// │                                                                         │
/// │  Cashier counts drawer: { "usd": 120.00, "CDF": 280000 }               │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  normalize_amount_map ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── bad code?      → InvalidFormat                               │
/// │       ├── negative count → MustNotBeNegative                           │
/// │       ├── "usd" + "USD"  → Mismatch                                    │
/// │       │                                                                 │
/// │       └── OK → { "CDF": 280000.00, "USD": 120.00 }                     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn normalize_amount_map(
    field: &str,
    amounts: &BTreeMap<String, Money>,
) -> ValidationResult<BTreeMap<String, Money>> {
    let mut normalized = BTreeMap::new();

    for (code, amount) in amounts {
        let currency = validate_currency_code(code)?;
        validate_count(field, *amount)?;

        if normalized.insert(currency.clone(), *amount).is_some() {
            return Err(ValidationError::Mismatch {
                field: field.to_string(),
                reason: format!("currency {} appears more than once", currency),
            });
        }
    }

    Ok(normalized)
}

/// Parses a map of decimal strings keyed by currency, as submitted by the
/// counting screens, into normalized fixed-point amounts.
///
/// ## Example
/// ```rust
/// use std::collections::BTreeMap;
/// use cambio_core::validation::parse_amount_map;
///
/// let raw = BTreeMap::from([("usd".to_string(), "120.5".to_string())]);
/// let parsed = parse_amount_map("closing_amounts", &raw).unwrap();
/// assert_eq!(parsed["USD"].cents(), 12050);
/// ```
pub fn parse_amount_map(
    field: &str,
    raw: &BTreeMap<String, String>,
) -> ValidationResult<BTreeMap<String, Money>> {
    let parsed = raw
        .iter()
        .map(|(code, value)| Ok((code.clone(), Money::parse(value)?)))
        .collect::<ValidationResult<BTreeMap<_, _>>>()?;

    normalize_amount_map(field, &parsed)
}

// =============================================================================
// Metadata Validators
// =============================================================================

/// Movement metadata must be a JSON object (or absent).
pub fn validate_metadata(metadata: Option<&serde_json::Value>) -> ValidationResult<String> {
    match metadata {
        None | Some(serde_json::Value::Null) => Ok("{}".to_string()),
        Some(value @ serde_json::Value::Object(_)) => Ok(value.to_string()),
        Some(_) => Err(ValidationError::InvalidFormat {
            field: "metadata".to_string(),
            reason: "must be a JSON object".to_string(),
        }),
    }
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use cambio_core::validation::validate_uuid;
///
/// assert!(validate_uuid("session_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("session_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
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
    fn test_validate_currency_code() {
        assert_eq!(validate_currency_code("USD").unwrap(), "USD");
        assert_eq!(validate_currency_code(" cdf ").unwrap(), "CDF");

        assert!(matches!(
            validate_currency_code(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_currency_code("USDT").is_err());
        assert!(validate_currency_code("12A").is_err());
        assert!(validate_currency_code("ÉUR").is_err());
    }

    #[test]
    fn test_validate_notes() {
        assert_eq!(validate_notes(None).unwrap(), None);
        assert_eq!(validate_notes(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_notes(Some(" Float from safe ")).unwrap().as_deref(),
            Some("Float from safe")
        );
        assert!(validate_notes(Some(&"x".repeat(MAX_NOTES_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_validate_register_name() {
        assert_eq!(validate_register_name(" Counter 1 ").unwrap(), "Counter 1");
        assert!(validate_register_name("").is_err());
        assert!(validate_register_name(&"R".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_nonzero("amount", Money::from_cents(-1)).is_ok());
        assert!(validate_nonzero("amount", Money::zero()).is_err());

        assert!(validate_count("opening_amounts", Money::zero()).is_ok());
        assert!(matches!(
            validate_count("opening_amounts", Money::from_cents(-100)),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
    }

    #[test]
    fn test_normalize_amount_map_rejects_duplicate_codes() {
        let amounts = BTreeMap::from([
            ("USD".to_string(), Money::from_major(10)),
            ("usd".to_string(), Money::from_major(20)),
        ]);
        assert!(matches!(
            normalize_amount_map("closing_amounts", &amounts),
            Err(ValidationError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_parse_amount_map() {
        let raw = BTreeMap::from([
            ("cdf".to_string(), "280000".to_string()),
            ("USD".to_string(), "100.00".to_string()),
        ]);
        let parsed = parse_amount_map("opening_amounts", &raw).unwrap();
        assert_eq!(parsed["CDF"], Money::from_major(280_000));
        assert_eq!(parsed["USD"], Money::from_major(100));

        let bad = BTreeMap::from([("USD".to_string(), "12.345".to_string())]);
        assert!(parse_amount_map("opening_amounts", &bad).is_err());

        let negative = BTreeMap::from([("USD".to_string(), "-1".to_string())]);
        assert!(parse_amount_map("opening_amounts", &negative).is_err());
    }

    #[test]
    fn test_validate_metadata() {
        assert_eq!(validate_metadata(None).unwrap(), "{}");
        let stored = validate_metadata(Some(&serde_json::json!({ "handled_by": "Amani" }))).unwrap();
        assert_eq!(stored, r#"{"handled_by":"Amani"}"#);
        assert!(validate_metadata(Some(&serde_json::json!([1, 2]))).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}
