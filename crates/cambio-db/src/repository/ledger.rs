//! # Ledger Repository
//!
//! Append-only cash movements and the per-register balances they drive.
//!
//! ## Record Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     record_movement (one transaction)                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  UPDATE cash_sessions SET updated_at = ?                               │
//! │   WHERE id = ? AND tenant_id = ? AND status = 'open'                   │
//! │   RETURNING register_id                                                │
//! │    │   no row → closed? MovementOnClosedSession : NotFound             │
//! │    ▼                                                                    │
//! │  INSERT INTO cash_movements                                            │
//! │    ▼                                                                    │
//! │  INSERT INTO register_balances ... ON CONFLICT DO NOTHING   (at 0)     │
//! │  UPDATE register_balances SET amount_cents = amount_cents + ?          │
//! │    ▼                                                                    │
//! │  INSERT INTO activity_log                                              │
//! │    ▼                                                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first statement is a write, so SQLite hands out its single write
//! lock before anything is read. Concurrent recorders on the same register
//! queue on the busy timeout and each increment lands on the committed
//! value of the one before it.

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{activity, register, session};
use cambio_core::validation::{
    validate_currency_code, validate_description, validate_metadata, validate_nonzero,
    validate_uuid,
};
use cambio_core::{
    CashMovement, CoreError, Money, MovementType, NewMovement, RegisterBalance, TenantContext,
    ValidationError,
};

pub(crate) const MOVEMENT_COLUMNS: &str = "id, tenant_id, session_id, register_id, user_id, \
     transaction_id, movement_type, currency, amount_cents, description, metadata, created_at";

const BALANCE_COLUMNS: &str =
    "id, tenant_id, register_id, currency, amount_cents, created_at, updated_at";

// =============================================================================
// Balance Audit
// =============================================================================

/// Stored balance next to the sum of the movements that should produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceAudit {
    pub register_id: String,
    pub currency: String,
    pub stored: Money,
    pub recomputed: Money,
}

impl BalanceAudit {
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.stored == self.recomputed
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cash movements and register balances.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records one signed movement against an open session.
    ///
    /// ## Errors
    /// - `Validation`: zero amount, bad currency, metadata not an object
    /// - `NotFound`: unknown session or another tenant's
    /// - `InvalidState`: the session is closed
    pub async fn record_movement(
        &self,
        ctx: &TenantContext,
        input: NewMovement,
    ) -> DbResult<CashMovement> {
        validate_uuid("session_id", &input.session_id)?;
        validate_nonzero("amount", input.amount)?;
        let currency = validate_currency_code(&input.currency)?;
        let description = validate_description(input.description.as_deref())?;
        let metadata = validate_metadata(input.metadata.as_ref())?;

        debug!(
            session_id = %input.session_id,
            movement_type = %input.movement_type,
            amount = %input.amount,
            currency = %currency,
            "Recording movement"
        );

        let mut tx = self.pool.begin().await?;

        let session_id = input.session_id.clone();
        let register_id = session::lock_open_session(&mut tx, &ctx.tenant_id, &input.session_id, || {
            CoreError::MovementOnClosedSession { session_id }
        })
        .await?;

        let movement = CashMovement {
            description,
            transaction_id: input.transaction_id,
            metadata,
            ..draft_movement(
                ctx,
                &input.session_id,
                &register_id,
                input.movement_type,
                &currency,
                input.amount,
            )
        };

        append_movement(&mut tx, &movement).await?;
        tx.commit().await?;

        info!(
            id = %movement.id,
            register_id = %movement.register_id,
            amount = %movement.amount(),
            currency = %movement.currency,
            "Movement recorded"
        );

        Ok(movement)
    }

    /// Records the exact offset of an earlier movement.
    ///
    /// The offset lands on `session_id`, which must be open and belong to
    /// the same register as the original. A movement can be reversed once.
    pub async fn reverse_movement(
        &self,
        ctx: &TenantContext,
        movement_id: &str,
        session_id: &str,
        reason: Option<&str>,
    ) -> DbResult<CashMovement> {
        validate_uuid("movement_id", movement_id)?;
        validate_uuid("session_id", session_id)?;
        let reason = validate_description(reason)?;

        debug!(movement_id = %movement_id, session_id = %session_id, "Reversing movement");

        let mut tx = self.pool.begin().await?;

        let closed_id = session_id.to_string();
        let register_id = session::lock_open_session(&mut tx, &ctx.tenant_id, session_id, || {
            CoreError::MovementOnClosedSession {
                session_id: closed_id,
            }
        })
        .await?;

        let original = fetch_movement(&mut tx, &ctx.tenant_id, movement_id)
            .await?
            .ok_or_else(|| DbError::not_found("Movement", movement_id))?;

        if original.register_id != register_id {
            return Err(ValidationError::Mismatch {
                field: "session_id".to_string(),
                reason: "a movement can only be reversed on its own register".to_string(),
            }
            .into());
        }

        let already: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cash_movements
            WHERE tenant_id = ?1 AND json_extract(metadata, '$.reverses') = ?2
            "#,
        )
        .bind(&ctx.tenant_id)
        .bind(movement_id)
        .fetch_one(&mut *tx)
        .await?;

        if already > 0 {
            return Err(ValidationError::Mismatch {
                field: "movement_id".to_string(),
                reason: "movement has already been reversed".to_string(),
            }
            .into());
        }

        let offset = -original.amount();
        let movement = CashMovement {
            description: Some(
                reason.unwrap_or_else(|| format!("Reversal of movement {}", original.id)),
            ),
            transaction_id: original.transaction_id.clone(),
            metadata: serde_json::json!({ "reverses": original.id }).to_string(),
            ..draft_movement(
                ctx,
                session_id,
                &register_id,
                MovementType::adjustment_for(offset),
                &original.currency,
                offset,
            )
        };

        append_movement(&mut tx, &movement).await?;
        tx.commit().await?;

        info!(id = %movement.id, reverses = %original.id, "Movement reversed");
        Ok(movement)
    }

    /// Gets a movement by ID.
    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> DbResult<Option<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        fetch_movement(&mut conn, &ctx.tenant_id, id).await
    }

    /// Movements of a session, in recording order.
    pub async fn movements_for_session(
        &self,
        ctx: &TenantContext,
        session_id: &str,
    ) -> DbResult<Vec<CashMovement>> {
        let mut conn = self.pool.acquire().await?;
        session_movements(&mut conn, &ctx.tenant_id, session_id).await
    }

    /// Movements produced by one business transaction.
    pub async fn movements_for_transaction(
        &self,
        ctx: &TenantContext,
        transaction_id: &str,
    ) -> DbResult<Vec<CashMovement>> {
        let movements = sqlx::query_as::<_, CashMovement>(&format!(
            r#"
            SELECT {} FROM cash_movements
            WHERE tenant_id = ?1 AND transaction_id = ?2
            ORDER BY created_at, rowid
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// All currency balances of a register.
    pub async fn balances(
        &self,
        ctx: &TenantContext,
        register_id: &str,
    ) -> DbResult<Vec<RegisterBalance>> {
        let mut conn = self.pool.acquire().await?;
        register::ensure_register(&mut conn, &ctx.tenant_id, register_id).await?;

        let balances = sqlx::query_as::<_, RegisterBalance>(&format!(
            r#"
            SELECT {} FROM register_balances
            WHERE tenant_id = ?1 AND register_id = ?2
            ORDER BY currency
            "#,
            BALANCE_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(register_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(balances)
    }

    /// Theoretical cash of one currency in a register; zero when the
    /// currency has never moved.
    pub async fn reconcile(
        &self,
        ctx: &TenantContext,
        register_id: &str,
        currency: &str,
    ) -> DbResult<Money> {
        let currency = validate_currency_code(currency)?;

        let mut conn = self.pool.acquire().await?;
        register::ensure_register(&mut conn, &ctx.tenant_id, register_id).await?;

        read_balance(&mut conn, &ctx.tenant_id, register_id, &currency).await
    }

    /// Recomputes a balance from its movements.
    pub async fn audit_balance(
        &self,
        ctx: &TenantContext,
        register_id: &str,
        currency: &str,
    ) -> DbResult<BalanceAudit> {
        let currency = validate_currency_code(currency)?;

        // One read transaction, so both sums see the same snapshot.
        let mut tx = self.pool.begin().await?;
        register::ensure_register(&mut tx, &ctx.tenant_id, register_id).await?;

        let stored = read_balance(&mut tx, &ctx.tenant_id, register_id, &currency).await?;

        let recomputed: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0) FROM cash_movements
            WHERE tenant_id = ?1 AND register_id = ?2 AND currency = ?3
            "#,
        )
        .bind(&ctx.tenant_id)
        .bind(register_id)
        .bind(&currency)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let audit = BalanceAudit {
            register_id: register_id.to_string(),
            currency,
            stored,
            recomputed: Money::from_cents(recomputed),
        };

        if !audit.is_consistent() {
            warn!(
                register_id = %audit.register_id,
                currency = %audit.currency,
                stored = %audit.stored,
                recomputed = %audit.recomputed,
                "Balance does not match movement history"
            );
        }

        Ok(audit)
    }
}

// =============================================================================
// In-Transaction Helpers
// =============================================================================

/// A movement with fresh id and timestamp and empty optional fields.
pub(crate) fn draft_movement(
    ctx: &TenantContext,
    session_id: &str,
    register_id: &str,
    movement_type: MovementType,
    currency: &str,
    amount: Money,
) -> CashMovement {
    CashMovement {
        id: Uuid::new_v4().to_string(),
        tenant_id: ctx.tenant_id.clone(),
        session_id: session_id.to_string(),
        register_id: register_id.to_string(),
        user_id: ctx.user_id.clone(),
        transaction_id: None,
        movement_type,
        currency: currency.to_string(),
        amount_cents: amount.cents(),
        description: None,
        metadata: "{}".to_string(),
        created_at: Utc::now(),
    }
}

/// Inserts `movement`, applies it to the balance and appends its activity
/// entry. The caller must already hold the session lock.
pub(crate) async fn append_movement(
    conn: &mut SqliteConnection,
    movement: &CashMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_movements (
            id, tenant_id, session_id, register_id, user_id, transaction_id,
            movement_type, currency, amount_cents, description, metadata, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.tenant_id)
    .bind(&movement.session_id)
    .bind(&movement.register_id)
    .bind(&movement.user_id)
    .bind(&movement.transaction_id)
    .bind(movement.movement_type)
    .bind(&movement.currency)
    .bind(movement.amount_cents)
    .bind(&movement.description)
    .bind(&movement.metadata)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    apply_to_balance(
        conn,
        &movement.tenant_id,
        &movement.register_id,
        &movement.currency,
        movement.amount(),
    )
    .await?;

    activity::append_for_movement(conn, movement).await?;

    Ok(())
}

/// Relative increment; the balance is never read back and rewritten.
///
/// SQLite turns an overflowing integer sum into REAL, so the increment is
/// checked first. The session lock held by the caller keeps the balance
/// from moving between the check and the UPDATE.
async fn apply_to_balance(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    register_id: &str,
    currency: &str,
    amount: Money,
) -> DbResult<()> {
    let current = read_balance(conn, tenant_id, register_id, currency).await?;
    if current.checked_add(amount).is_none() {
        return Err(ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("{} balance of the register would overflow", currency),
        }
        .into());
    }

    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO register_balances (
            id, tenant_id, register_id, currency, amount_cents, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
        ON CONFLICT (register_id, currency) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_id)
    .bind(register_id)
    .bind(currency)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE register_balances SET
            amount_cents = amount_cents + ?1,
            updated_at = ?2
        WHERE register_id = ?3 AND currency = ?4
        "#,
    )
    .bind(amount.cents())
    .bind(now)
    .bind(register_id)
    .bind(currency)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Current balance, zero when no row exists yet.
pub(crate) async fn read_balance(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    register_id: &str,
    currency: &str,
) -> DbResult<Money> {
    let cents: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT amount_cents FROM register_balances
        WHERE tenant_id = ?1 AND register_id = ?2 AND currency = ?3
        "#,
    )
    .bind(tenant_id)
    .bind(register_id)
    .bind(currency)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Money::from_cents(cents.unwrap_or(0)))
}

pub(crate) async fn session_movements(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    session_id: &str,
) -> DbResult<Vec<CashMovement>> {
    let movements = sqlx::query_as::<_, CashMovement>(&format!(
        r#"
        SELECT {} FROM cash_movements
        WHERE tenant_id = ?1 AND session_id = ?2
        ORDER BY created_at, rowid
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(tenant_id)
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(movements)
}

async fn fetch_movement(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<Option<CashMovement>> {
    let movement = sqlx::query_as::<_, CashMovement>(&format!(
        "SELECT {} FROM cash_movements WHERE id = ?1 AND tenant_id = ?2",
        MOVEMENT_COLUMNS
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(movement)
}
