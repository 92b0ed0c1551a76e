//! # Transaction Observer
//!
//! Turns completed business transactions into cash movements.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Business ledger: transaction durably stored                │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │  plan_movements(tx)              (cambio-core, pure)                   │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │  legs stored for this id?        yes → Recorded (stored movements)     │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │  resolve open session            (tenant, register filter if given)    │
//! │     a. same work shift                                                  │
//! │     b. performer's most recently opened session                         │
//! │     c. none → warn, Untracked (the transaction itself stands)           │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │  ONE database transaction: guard session, append every leg             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replaying the same transaction is harmless: legs already recorded for
//! its id are returned instead of being written again, even once their
//! session has closed.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::ledger::{self, MOVEMENT_COLUMNS};
use crate::repository::session::{self, SESSION_COLUMNS};
use cambio_core::translation::plan_movements;
use cambio_core::{BusinessTransaction, CashMovement, CashSession, CoreError, TenantContext};

/// What happened to a transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TranslationOutcome {
    /// Movements written (or found from an earlier delivery).
    Recorded {
        session_id: String,
        movements: Vec<CashMovement>,
    },
    /// No open session could take the cash.
    Untracked { transaction_id: String },
}

impl TranslationOutcome {
    pub fn movements(&self) -> &[CashMovement] {
        match self {
            TranslationOutcome::Recorded { movements, .. } => movements,
            TranslationOutcome::Untracked { .. } => &[],
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, TranslationOutcome::Recorded { .. })
    }
}

/// Adapter from the business ledger's completion events to the cash ledger.
#[derive(Debug, Clone)]
pub struct TransactionObserver {
    pool: SqlitePool,
}

impl TransactionObserver {
    /// Creates a new TransactionObserver.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionObserver { pool }
    }

    /// Handles one completed transaction.
    ///
    /// `ctx` supplies the tenant; movements are attributed to the
    /// transaction's performer.
    ///
    /// ## Errors
    /// Validation errors from planning and storage failures propagate.
    /// Not finding an open session is not an error.
    pub async fn on_transaction_completed(
        &self,
        ctx: &TenantContext,
        transaction: &BusinessTransaction,
    ) -> DbResult<TranslationOutcome> {
        let drafts = plan_movements(transaction)?;
        let performer = ctx.as_user(&transaction.performed_by);

        debug!(
            transaction_id = %transaction.id,
            operation = transaction.operation_type.as_str(),
            legs = drafts.len(),
            "Translating business transaction"
        );

        // A redelivery is answered from storage, even after its session closed.
        let recorded = {
            let mut conn = self.pool.acquire().await?;
            recorded_movements(&mut conn, &ctx.tenant_id, &transaction.id).await?
        };
        if let Some(outcome) = already_recorded(&transaction.id, recorded) {
            return Ok(outcome);
        }

        let Some(target) = self.resolve_session(&performer, transaction).await? else {
            warn!(
                transaction_id = %transaction.id,
                performed_by = %transaction.performed_by,
                register_id = ?transaction.register_id,
                work_shift_id = ?transaction.work_shift_id,
                "No open cash session for transaction; cash movement not tracked"
            );
            return Ok(TranslationOutcome::Untracked {
                transaction_id: transaction.id.clone(),
            });
        };

        let mut tx = self.pool.begin().await?;

        let guarded = session::lock_open_session(&mut tx, &ctx.tenant_id, &target.id, || {
            CoreError::MovementOnClosedSession {
                session_id: target.id.clone(),
            }
        })
        .await;

        let register_id = match guarded {
            Ok(register_id) => register_id,
            // Closed between resolution and guard.
            Err(DbError::Domain(CoreError::MovementOnClosedSession { .. })) => {
                warn!(
                    transaction_id = %transaction.id,
                    session_id = %target.id,
                    "Resolved session closed before recording; cash movement not tracked"
                );
                return Ok(TranslationOutcome::Untracked {
                    transaction_id: transaction.id.clone(),
                });
            }
            Err(err) => return Err(err),
        };

        // A concurrent delivery may have committed since the first check.
        let existing = recorded_movements(&mut tx, &ctx.tenant_id, &transaction.id).await?;
        if let Some(outcome) = already_recorded(&transaction.id, existing) {
            return Ok(outcome);
        }

        let metadata = serde_json::json!({
            "ticket_number": transaction.ticket_number,
            "operation_type": transaction.operation_type,
            "handled_by": transaction.performed_by,
            "shop_id": transaction.shop_id,
        })
        .to_string();

        let mut movements = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let movement = CashMovement {
                description: Some(draft.description),
                transaction_id: Some(transaction.id.clone()),
                metadata: metadata.clone(),
                ..ledger::draft_movement(
                    &performer,
                    &target.id,
                    &register_id,
                    draft.movement_type,
                    &draft.currency,
                    draft.amount,
                )
            };
            ledger::append_movement(&mut tx, &movement).await?;
            movements.push(movement);
        }

        tx.commit().await?;

        info!(
            transaction_id = %transaction.id,
            session_id = %target.id,
            legs = movements.len(),
            "Transaction recorded in cash ledger"
        );

        Ok(TranslationOutcome::Recorded {
            session_id: target.id,
            movements,
        })
    }

    /// Picks the open session that should carry the transaction's cash.
    async fn resolve_session(
        &self,
        performer: &TenantContext,
        transaction: &BusinessTransaction,
    ) -> DbResult<Option<CashSession>> {
        if let Some(work_shift_id) = transaction.work_shift_id.as_deref() {
            let by_shift = sqlx::query_as::<_, CashSession>(&format!(
                r#"
                SELECT {} FROM cash_sessions
                WHERE tenant_id = ?1 AND status = 'open' AND work_shift_id = ?2
                  AND (?3 IS NULL OR register_id = ?3)
                ORDER BY opened_at DESC, rowid DESC
                LIMIT 1
                "#,
                SESSION_COLUMNS
            ))
            .bind(&performer.tenant_id)
            .bind(work_shift_id)
            .bind(&transaction.register_id)
            .fetch_optional(&self.pool)
            .await?;

            if by_shift.is_some() {
                return Ok(by_shift);
            }
        }

        let by_performer = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {} FROM cash_sessions
            WHERE tenant_id = ?1 AND status = 'open' AND opened_by = ?2
              AND (?3 IS NULL OR register_id = ?3)
            ORDER BY opened_at DESC, rowid DESC
            LIMIT 1
            "#,
            SESSION_COLUMNS
        ))
        .bind(&performer.tenant_id)
        .bind(&performer.user_id)
        .bind(&transaction.register_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(by_performer)
    }
}

/// Movements already stored for a business transaction, in recording order.
async fn recorded_movements(
    conn: &mut SqliteConnection,
    tenant_id: &str,
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
    .bind(tenant_id)
    .bind(transaction_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(movements)
}

fn already_recorded(
    transaction_id: &str,
    movements: Vec<CashMovement>,
) -> Option<TranslationOutcome> {
    let session_id = movements.first()?.session_id.clone();
    debug!(transaction_id = %transaction_id, "Transaction already recorded");
    Some(TranslationOutcome::Recorded {
        session_id,
        movements,
    })
}
