//! # Reconciliation
//!
//! Compares counted cash against the theoretical balance at session close.
//!
//! ## Close Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Per-Currency Reconciliation                         │
//! │                                                                         │
//! │  Balance Store ──► theoretical (read inside the close transaction)     │
//! │  Cashier count ──► real                                                │
//! │                                                                         │
//! │  difference = real − theoretical     (persisted, signed)               │
//! │                                                                         │
//! │  classify(difference)                (presentation only)               │
//! │     |d| < tolerance  → Balanced                                        │
//! │     d > 0            → Surplus   (more cash than expected)             │
//! │     d < 0            → Shortage  (cash missing)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the signed difference is stored. Status is derived on read, so a
//! change of tolerance re-labels historical closes without a migration.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SessionAmount;
use crate::DEFAULT_BALANCE_TOLERANCE_CENTS;

// =============================================================================
// Policy
// =============================================================================

/// How far a count may drift from theory and still read as balanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPolicy {
    tolerance: Money,
}

impl ReconciliationPolicy {
    /// Creates a policy. Tolerance must not be negative.
    pub fn new(tolerance: Money) -> Result<Self, ValidationError> {
        if tolerance.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "tolerance".to_string(),
            });
        }
        Ok(ReconciliationPolicy { tolerance })
    }

    #[inline]
    pub fn tolerance(&self) -> Money {
        self.tolerance
    }

    /// Classifies a signed difference.
    ///
    /// An exact match is always balanced, even with a zero tolerance.
    /// Otherwise `|difference|` must stay strictly below the tolerance.
    /// Amounts are fixed-point minor units and never carry rounding error,
    /// so the default one-cent tolerance balances exact counts only. Widen
    /// it with `CAMBIO_BALANCE_TOLERANCE` to accept small counting slack.
    pub fn classify(&self, difference: Money) -> CashCountStatus {
        if difference.is_zero() || difference.abs() < self.tolerance {
            CashCountStatus::Balanced
        } else if difference.is_positive() {
            CashCountStatus::Surplus
        } else {
            CashCountStatus::Shortage
        }
    }
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        ReconciliationPolicy {
            tolerance: Money::from_cents(DEFAULT_BALANCE_TOLERANCE_CENTS),
        }
    }
}

/// Outcome of comparing one counted currency with its theoretical balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CashCountStatus {
    Balanced,
    Surplus,
    Shortage,
}

/// `real − theoretical`, refusing to overflow.
pub fn compute_difference(real: Money, theoretical: Money) -> Result<Money, ValidationError> {
    real.checked_sub(theoretical)
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "difference".to_string(),
            reason: "amount is too large".to_string(),
        })
}

// =============================================================================
// Report
// =============================================================================

/// One reconciled currency of a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationLine {
    pub currency: String,
    pub opening: Money,
    pub theoretical: Money,
    pub real: Money,
    pub difference: Money,
    pub status: CashCountStatus,
}

/// Per-currency summary of a session close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconciliationReport {
    pub session_id: String,
    pub lines: Vec<ReconciliationLine>,
    /// Currencies opened with a float but never counted at close.
    pub uncounted: Vec<String>,
}

impl ReconciliationReport {
    /// Builds the report from a session's amount rows.
    ///
    /// Rows without a close snapshot land in `uncounted`. Lines are sorted
    /// by currency code.
    pub fn from_amounts(
        session_id: impl Into<String>,
        amounts: &[SessionAmount],
        policy: &ReconciliationPolicy,
    ) -> Self {
        let mut lines = Vec::new();
        let mut uncounted = Vec::new();

        for amount in amounts {
            match (amount.theoretical(), amount.real(), amount.difference()) {
                (Some(theoretical), Some(real), Some(difference)) => {
                    lines.push(ReconciliationLine {
                        currency: amount.currency.clone(),
                        opening: amount.opening(),
                        theoretical,
                        real,
                        difference,
                        status: policy.classify(difference),
                    });
                }
                _ => uncounted.push(amount.currency.clone()),
            }
        }

        lines.sort_by(|a, b| a.currency.cmp(&b.currency));
        uncounted.sort();

        ReconciliationReport {
            session_id: session_id.into(),
            lines,
            uncounted,
        }
    }

    /// True when any currency is off or was never counted.
    pub fn requires_attention(&self) -> bool {
        !self.uncounted.is_empty()
            || self
                .lines
                .iter()
                .any(|line| line.status != CashCountStatus::Balanced)
    }

    pub fn line(&self, currency: &str) -> Option<&ReconciliationLine> {
        self.lines.iter().find(|line| line.currency == currency)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn amount(currency: &str, opening: i64, closing: Option<(i64, i64)>) -> SessionAmount {
        let now = Utc::now();
        SessionAmount {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "tenant-a".to_string(),
            session_id: "s-1".to_string(),
            currency: currency.to_string(),
            opening_cents: opening,
            theoretical_cents: closing.map(|(t, _)| t),
            real_cents: closing.map(|(_, r)| r),
            difference_cents: closing.map(|(t, r)| r - t),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_default_policy_only_balances_exact_match() {
        let policy = ReconciliationPolicy::default();
        assert_eq!(policy.classify(Money::zero()), CashCountStatus::Balanced);
        assert_eq!(policy.classify(Money::from_cents(1)), CashCountStatus::Surplus);
        assert_eq!(policy.classify(Money::from_cents(-1)), CashCountStatus::Shortage);
    }

    #[test]
    fn test_wider_tolerance() {
        let policy = ReconciliationPolicy::new(Money::from_cents(50)).unwrap();
        assert_eq!(policy.classify(Money::from_cents(-49)), CashCountStatus::Balanced);
        assert_eq!(policy.classify(Money::from_cents(-50)), CashCountStatus::Shortage);

        let exact = ReconciliationPolicy::new(Money::zero()).unwrap();
        assert_eq!(exact.classify(Money::zero()), CashCountStatus::Balanced);

        assert!(ReconciliationPolicy::new(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_compute_difference() {
        let diff = compute_difference(Money::from_major(115), Money::from_major(120)).unwrap();
        assert_eq!(diff, Money::from_major(-5));
        assert!(compute_difference(Money::from_cents(i64::MIN), Money::from_cents(1)).is_err());
    }

    #[test]
    fn test_report_from_amounts() {
        let amounts = vec![
            amount("USD", 10_000, Some((12_000, 11_500))),
            amount("CDF", 0, Some((28_000_000, 28_000_000))),
            amount("EUR", 5_000, None),
        ];

        let report =
            ReconciliationReport::from_amounts("s-1", &amounts, &ReconciliationPolicy::default());

        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].currency, "CDF");
        assert_eq!(report.lines[0].status, CashCountStatus::Balanced);

        let usd = report.line("USD").unwrap();
        assert_eq!(usd.difference, Money::from_major(-5));
        assert_eq!(usd.status, CashCountStatus::Shortage);

        assert_eq!(report.uncounted, vec!["EUR".to_string()]);
        assert!(report.requires_attention());
    }

    #[test]
    fn test_balanced_report_needs_no_attention() {
        let amounts = vec![amount("USD", 10_000, Some((12_000, 12_000)))];
        let report =
            ReconciliationReport::from_amounts("s-1", &amounts, &ReconciliationPolicy::default());
        assert!(!report.requires_attention());
    }
}
