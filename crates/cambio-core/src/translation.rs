//! # Transaction Translation
//!
//! Derives the signed cash movements implied by a completed business
//! transaction. Pure planning only: finding the session and writing the
//! movements happens in `cambio-db`'s observer.
//!
//! ## Mapping
//! ```text
//! ┌──────────────┬──────────────────────────────────┬──────────────────────┐
//! │ Operation    │ Movement(s)                      │ Type                 │
//! ├──────────────┼──────────────────────────────────┼──────────────────────┤
//! │ deposit      │ + amount_from  in currency_from  │ deposit              │
//! │ withdrawal   │ − amount_to    in currency_to    │ withdrawal           │
//! │ exchange     │ + amount_from  in currency_from  │ exchange_in          │
//! │              │ − amount_to    in currency_to    │ exchange_out         │
//! └──────────────┴──────────────────────────────────┴──────────────────────┘
//! ```
//!
//! A withdrawal debits the destination leg: the till hands the client
//! `amount_to` of `currency_to`.

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{BusinessTransaction, MovementType, OperationType};
use crate::validation::validate_currency_code;

/// One movement to be written for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub movement_type: MovementType,
    /// Normalized currency code.
    pub currency: String,
    /// Signed amount.
    pub amount: Money,
    pub description: String,
}

/// Plans the movements for `transaction`, in recording order.
///
/// ## Example
/// ```rust
/// use cambio_core::translation::plan_movements;
/// use cambio_core::{BusinessTransaction, Money, MovementType, OperationType};
///
/// let tx = BusinessTransaction {
///     id: "tx-1".into(),
///     operation_type: OperationType::Exchange,
///     currency_from: "USD".into(),
///     amount_from: Money::from_major(100),
///     currency_to: "CDF".into(),
///     amount_to: Money::from_major(280_000),
///     ticket_number: "T-0042".into(),
///     shop_id: None,
///     register_id: None,
///     work_shift_id: None,
///     performed_by: "cashier-1".into(),
/// };
///
/// let drafts = plan_movements(&tx).unwrap();
/// assert_eq!(drafts.len(), 2);
/// assert_eq!(drafts[0].movement_type, MovementType::ExchangeIn);
/// assert_eq!(drafts[1].amount, Money::from_major(-280_000));
/// ```
pub fn plan_movements(transaction: &BusinessTransaction) -> CoreResult<Vec<MovementDraft>> {
    let ticket = &transaction.ticket_number;

    let drafts = match transaction.operation_type {
        OperationType::Deposit => vec![inbound(
            MovementType::Deposit,
            &transaction.currency_from,
            transaction.amount_from,
            format!("Deposit, ticket {}", ticket),
        )?],
        OperationType::Withdrawal => vec![outbound(
            MovementType::Withdrawal,
            &transaction.currency_to,
            transaction.amount_to,
            format!("Withdrawal, ticket {}", ticket),
        )?],
        OperationType::Exchange => vec![
            inbound(
                MovementType::ExchangeIn,
                &transaction.currency_from,
                transaction.amount_from,
                format!("Exchange received, ticket {}", ticket),
            )?,
            outbound(
                MovementType::ExchangeOut,
                &transaction.currency_to,
                transaction.amount_to,
                format!("Exchange paid out, ticket {}", ticket),
            )?,
        ],
    };

    Ok(drafts)
}

fn inbound(
    movement_type: MovementType,
    currency: &str,
    amount: Money,
    description: String,
) -> CoreResult<MovementDraft> {
    let amount = positive_leg(amount)?;
    Ok(MovementDraft {
        movement_type,
        currency: validate_currency_code(currency)?,
        amount,
        description,
    })
}

fn outbound(
    movement_type: MovementType,
    currency: &str,
    amount: Money,
    description: String,
) -> CoreResult<MovementDraft> {
    let amount = positive_leg(amount)?;
    Ok(MovementDraft {
        movement_type,
        currency: validate_currency_code(currency)?,
        amount: -amount,
        description,
    })
}

fn positive_leg(amount: Money) -> Result<Money, ValidationError> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn transaction(op: OperationType) -> BusinessTransaction {
        BusinessTransaction {
            id: "tx-1".to_string(),
            operation_type: op,
            currency_from: "usd".to_string(),
            amount_from: Money::from_major(100),
            currency_to: "CDF".to_string(),
            amount_to: Money::from_major(280_000),
            ticket_number: "T-0042".to_string(),
            shop_id: None,
            register_id: None,
            work_shift_id: None,
            performed_by: "cashier-1".to_string(),
        }
    }

    #[test]
    fn test_deposit_credits_source_leg() {
        let drafts = plan_movements(&transaction(OperationType::Deposit)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].movement_type, MovementType::Deposit);
        assert_eq!(drafts[0].currency, "USD");
        assert_eq!(drafts[0].amount, Money::from_major(100));
        assert!(drafts[0].description.contains("T-0042"));
    }

    #[test]
    fn test_withdrawal_debits_destination_leg() {
        let drafts = plan_movements(&transaction(OperationType::Withdrawal)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].movement_type, MovementType::Withdrawal);
        assert_eq!(drafts[0].currency, "CDF");
        assert_eq!(drafts[0].amount, Money::from_major(-280_000));
    }

    #[test]
    fn test_exchange_splits_into_two_legs() {
        let drafts = plan_movements(&transaction(OperationType::Exchange)).unwrap();
        assert_eq!(
            drafts
                .iter()
                .map(|d| (d.movement_type, d.currency.as_str(), d.amount.cents()))
                .collect::<Vec<_>>(),
            vec![
                (MovementType::ExchangeIn, "USD", 10_000),
                (MovementType::ExchangeOut, "CDF", -28_000_000),
            ]
        );
    }

    #[test]
    fn test_rejects_non_positive_legs() {
        let mut tx = transaction(OperationType::Exchange);
        tx.amount_to = Money::zero();
        assert!(matches!(
            plan_movements(&tx),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        let mut tx = transaction(OperationType::Deposit);
        tx.amount_from = Money::from_cents(-100);
        assert!(plan_movements(&tx).is_err());
    }

    #[test]
    fn test_rejects_malformed_currency() {
        let mut tx = transaction(OperationType::Deposit);
        tx.currency_from = "DOLLARS".to_string();
        assert!(plan_movements(&tx).is_err());
    }
}
