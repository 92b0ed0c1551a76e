//! # Domain Types
//!
//! Core ledger types used throughout the workspace.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Entities                                 │
//! │                                                                         │
//! │  Register (root)                                                        │
//! │    ▲            ▲                                                       │
//! │    │ register_id│ register_id                                           │
//! │  CashSession   RegisterBalance (register, currency)                     │
//! │    ▲      ▲                                                             │
//! │    │      │ session_id                                                  │
//! │    │    SessionAmount (session, currency)                               │
//! │    │ session_id                                                         │
//! │  CashMovement (leaf, immutable) ──► ActivityEntry (audit feed)          │
//! │                                                                         │
//! │  Every arrow is a one-directional lookup key, never an owning pointer.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Tag
//! Every entity carries `tenant_id`, stamped from the acting
//! [`TenantContext`] at creation and used to filter every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tenant Context
// =============================================================================

/// The acting operator and the tenant they belong to.
///
/// Passed explicitly to every ledger call; the engine never consults ambient
/// authentication state. The caller (HTTP layer) is responsible for having
/// authenticated `user_id` and resolved its tenant root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
}

impl TenantContext {
    /// Creates a context, rejecting blank identifiers.
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let tenant_id = tenant_id.into().trim().to_string();
        let user_id = user_id.into().trim().to_string();

        if tenant_id.is_empty() {
            return Err(ValidationError::Required {
                field: "tenant_id".to_string(),
            });
        }
        if user_id.is_empty() {
            return Err(ValidationError::Required {
                field: "user_id".to_string(),
            });
        }

        Ok(TenantContext { tenant_id, user_id })
    }

    /// Same tenant, different acting user.
    pub fn as_user(&self, user_id: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: self.tenant_id.clone(),
            user_id: user_id.into(),
        }
    }
}

// =============================================================================
// Register
// =============================================================================

/// A named cash drawer belonging to one shop.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Register {
    pub id: String,
    pub tenant_id: String,
    /// Owning shop (catalog managed outside the ledger).
    pub shop_id: String,
    /// Physical counter the drawer is bound to, if any.
    pub counter_id: Option<String>,
    pub name: String,
    /// Soft-delete flag; inactive registers cannot be opened.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle of a cash session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Open
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// One cashier's occupancy of a register, from open to close.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub tenant_id: String,
    pub register_id: String,
    /// Operator who opened the session.
    pub opened_by: String,
    /// Operator who closed it.
    pub closed_by: Option<String>,
    /// Broader daily work shift this session belongs to.
    pub work_shift_id: Option<String>,
    pub status: SessionStatus,
    pub opening_notes: Option<String>,
    pub closing_notes: Option<String>,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashSession {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

// =============================================================================
// Session Amount
// =============================================================================

/// Per-currency opening/closing snapshot of a session.
///
/// Uses the snapshot pattern: theoretical and real amounts are frozen at
/// close and never recomputed, even though the register balance keeps
/// moving in later sessions.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SessionAmount {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    pub currency: String,
    /// Cash counted at open (0 when the currency first appeared at close).
    pub opening_cents: i64,
    /// Balance Store value at close.
    pub theoretical_cents: Option<i64>,
    /// Cash counted at close.
    pub real_cents: Option<i64>,
    /// `real − theoretical`.
    pub difference_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl SessionAmount {
    #[inline]
    pub fn opening(&self) -> Money {
        Money::from_cents(self.opening_cents)
    }

    #[inline]
    pub fn theoretical(&self) -> Option<Money> {
        self.theoretical_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn real(&self) -> Option<Money> {
        self.real_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn difference(&self) -> Option<Money> {
        self.difference_cents.map(Money::from_cents)
    }

    /// True once the close snapshot has been written.
    #[inline]
    pub fn is_reconciled(&self) -> bool {
        self.real_cents.is_some()
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// Label attached to a cash movement.
///
/// The label is descriptive; the sign of the amount alone decides whether
/// cash entered or left the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Deposit,
    Withdrawal,
    ExchangeIn,
    ExchangeOut,
    AdjustmentIn,
    AdjustmentOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Deposit => "deposit",
            MovementType::Withdrawal => "withdrawal",
            MovementType::ExchangeIn => "exchange_in",
            MovementType::ExchangeOut => "exchange_out",
            MovementType::AdjustmentIn => "adjustment_in",
            MovementType::AdjustmentOut => "adjustment_out",
        }
    }

    /// Adjustment label matching the direction of `amount`.
    pub fn adjustment_for(amount: Money) -> Self {
        if amount.is_negative() {
            MovementType::AdjustmentOut
        } else {
            MovementType::AdjustmentIn
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Movement
// =============================================================================

/// An immutable, signed ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub tenant_id: String,
    pub session_id: String,
    /// Denormalized from the session so balance audits need no join.
    pub register_id: String,
    /// Operator who performed the movement.
    pub user_id: String,
    /// Originating business transaction, if any.
    pub transaction_id: Option<String>,
    pub movement_type: MovementType,
    pub currency: String,
    /// Signed: positive adds cash to the drawer, negative removes it.
    pub amount_cents: i64,
    pub description: Option<String>,
    /// Free-form JSON object (who physically handled the cash, ticket, ...).
    pub metadata: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Parses the metadata column; malformed JSON reads as `null`.
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.metadata).unwrap_or(serde_json::Value::Null)
    }
}

// =============================================================================
// Register Balance
// =============================================================================

/// Live theoretical cash for one (register, currency) pair.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RegisterBalance {
    pub id: String,
    pub tenant_id: String,
    pub register_id: String,
    pub currency: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl RegisterBalance {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Activity Entry
// =============================================================================

/// One row of the operational activity feed.
///
/// Written in the same database transaction as the movement it describes,
/// so the feed can never show a movement that was rolled back.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ActivityEntry {
    pub id: String,
    pub tenant_id: String,
    /// Performer.
    pub user_id: String,
    /// Kind of subject, e.g. `"cash_movement"`.
    pub subject_type: String,
    pub subject_id: String,
    pub description: String,
    pub amount_cents: i64,
    pub currency: String,
    /// JSON object with structured details.
    pub properties: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Nested Session Shape
// =============================================================================

/// A session with its associations, as serialized to the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionDetail {
    pub session: CashSession,
    pub register: Register,
    pub amounts: Vec<SessionAmount>,
    pub movements: Vec<CashMovement>,
}

// =============================================================================
// Commands
// =============================================================================

/// Input of register creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRegister {
    pub shop_id: String,
    pub counter_id: Option<String>,
    pub name: String,
}

/// Input of `open`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenSession {
    pub register_id: String,
    /// Counted float per currency.
    pub opening_amounts: BTreeMap<String, Money>,
    pub notes: Option<String>,
    pub work_shift_id: Option<String>,
}

/// Input of `close`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseSession {
    /// Counted cash per currency.
    pub closing_amounts: BTreeMap<String, Money>,
    pub notes: Option<String>,
}

/// Input of `record_movement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub session_id: String,
    pub movement_type: MovementType,
    /// Signed amount.
    pub amount: Money,
    pub currency: String,
    pub description: Option<String>,
    pub transaction_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewMovement {
    /// Minimal movement; optional fields start empty.
    pub fn new(
        session_id: impl Into<String>,
        movement_type: MovementType,
        amount: Money,
        currency: impl Into<String>,
    ) -> Self {
        NewMovement {
            session_id: session_id.into(),
            movement_type,
            amount,
            currency: currency.into(),
            description: None,
            transaction_id: None,
            metadata: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// =============================================================================
// Business Transactions (external event source)
// =============================================================================

/// Kind of completed teller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Client hands cash to the till.
    Deposit,
    /// Till hands cash to the client.
    Withdrawal,
    /// Client hands one currency, receives another.
    Exchange,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "deposit",
            OperationType::Withdrawal => "withdrawal",
            OperationType::Exchange => "exchange",
        }
    }
}

/// A completed deposit/withdrawal/exchange, as delivered by the business
/// ledger once it is durably stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BusinessTransaction {
    pub id: String,
    pub operation_type: OperationType,
    pub currency_from: String,
    pub amount_from: Money,
    pub currency_to: String,
    pub amount_to: Money,
    pub ticket_number: String,
    pub shop_id: Option<String>,
    pub register_id: Option<String>,
    pub work_shift_id: Option<String>,
    /// Operator who served the client.
    pub performed_by: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_context_rejects_blank_ids() {
        assert!(TenantContext::new("tenant-a", "cashier-1").is_ok());
        assert!(matches!(
            TenantContext::new("  ", "cashier-1"),
            Err(ValidationError::Required { .. })
        ));
        assert!(TenantContext::new("tenant-a", "").is_err());

        let ctx = TenantContext::new("tenant-a", "cashier-1").unwrap();
        let manager = ctx.as_user("manager-7");
        assert_eq!(manager.tenant_id, "tenant-a");
        assert_eq!(manager.user_id, "manager-7");
    }

    #[test]
    fn test_session_status_default_and_display() {
        assert_eq!(SessionStatus::default(), SessionStatus::Open);
        assert_eq!(SessionStatus::Closed.to_string(), "closed");
    }

    #[test]
    fn test_movement_type_serde_names() {
        let json = serde_json::to_string(&MovementType::ExchangeOut).unwrap();
        assert_eq!(json, "\"exchange_out\"");
        assert_eq!(MovementType::AdjustmentIn.as_str(), "adjustment_in");
    }

    #[test]
    fn test_adjustment_direction() {
        assert_eq!(
            MovementType::adjustment_for(Money::from_cents(-1)),
            MovementType::AdjustmentOut
        );
        assert_eq!(
            MovementType::adjustment_for(Money::from_cents(250)),
            MovementType::AdjustmentIn
        );
    }

    #[test]
    fn test_new_movement_builder() {
        let movement = NewMovement::new("s-1", MovementType::Deposit, Money::from_major(50), "USD")
            .description("Float top-up")
            .transaction("tx-9")
            .metadata(serde_json::json!({ "handled_by": "Amani" }));

        assert_eq!(movement.amount.cents(), 5000);
        assert_eq!(movement.transaction_id.as_deref(), Some("tx-9"));
        assert_eq!(movement.metadata.unwrap()["handled_by"], "Amani");
    }

    #[test]
    fn test_operation_type_deserializes_from_snake_case() {
        let op: OperationType = serde_json::from_str("\"withdrawal\"").unwrap();
        assert_eq!(op, OperationType::Withdrawal);
        assert!(serde_json::from_str::<OperationType>("\"refund\"").is_err());
    }
}
