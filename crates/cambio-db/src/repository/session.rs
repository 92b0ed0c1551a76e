//! # Session Repository
//!
//! Cash session lifecycle: open with a counted float, close with a count.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Lifecycle                                 │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── open() → CashSession { status: Open }                          │
//! │     └── one SessionAmount per counted currency (opening only)          │
//! │     └── adjustment movement where the count differs from the balance   │
//! │                                                                         │
//! │  2. TRADE                                                              │
//! │     └── ledger().record_movement() / observer()                        │
//! │                                                                         │
//! │  3. CLOSE                                                              │
//! │     └── close() → CashSession { status: Closed }                       │
//! │     └── theoretical = balance, real = count, difference = real − theo  │
//! │                                                                         │
//! │  Closed is terminal: triggers reject reopening and later amount edits. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::ledger;
use cambio_core::reconciliation::compute_difference;
use cambio_core::validation::{normalize_amount_map, validate_notes, validate_uuid};
use cambio_core::{
    CashCountStatus, CashMovement, CashSession, CloseSession, CoreError, MovementType,
    OpenSession, ReconciliationPolicy, ReconciliationReport, Register, SessionAmount,
    SessionDetail, SessionStatus, TenantContext,
};

pub(crate) const SESSION_COLUMNS: &str = "id, tenant_id, register_id, opened_by, closed_by, \
     work_shift_id, status, opening_notes, closing_notes, opened_at, closed_at, updated_at";

const AMOUNT_COLUMNS: &str = "id, tenant_id, session_id, currency, opening_cents, \
     theoretical_cents, real_cents, difference_cents, created_at, updated_at";

/// Repository for cash session operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
    policy: ReconciliationPolicy,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool, policy: ReconciliationPolicy) -> Self {
        SessionRepository { pool, policy }
    }

    /// Opens a session on a register.
    ///
    /// ## What This Does
    /// 1. Inserts the session only if the register is active and in the
    ///    caller's tenant (one `INSERT ... SELECT`)
    /// 2. Lets the partial unique index reject a second open session
    /// 3. Writes the opening amount per counted currency
    /// 4. Aligns the balance with the count through an adjustment movement
    ///
    /// ## Errors
    /// - `Conflict` (`RegisterBusy`): a session is already open on the register
    /// - `NotFound`: unknown, inactive, or foreign register
    /// - `Validation`: negative or malformed amounts
    pub async fn open(&self, ctx: &TenantContext, input: OpenSession) -> DbResult<CashSession> {
        validate_uuid("register_id", &input.register_id)?;
        let opening = normalize_amount_map("opening_amounts", &input.opening_amounts)?;
        let notes = validate_notes(input.notes.as_deref())?;
        let work_shift_id = input
            .work_shift_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let now = Utc::now();
        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            register_id: input.register_id.clone(),
            opened_by: ctx.user_id.clone(),
            closed_by: None,
            work_shift_id,
            status: SessionStatus::Open,
            opening_notes: notes,
            closing_notes: None,
            opened_at: now,
            closed_at: None,
            updated_at: now,
        };

        debug!(
            register_id = %session.register_id,
            currencies = opening.len(),
            "Opening session"
        );

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, tenant_id, register_id, opened_by, work_shift_id,
                status, opening_notes, opened_at, updated_at
            )
            SELECT ?1, ?2, r.id, ?3, ?4, 'open', ?5, ?6, ?6
            FROM registers r
            WHERE r.id = ?7 AND r.tenant_id = ?2 AND r.is_active = 1
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(&session.opened_by)
        .bind(&session.work_shift_id)
        .bind(&session.opening_notes)
        .bind(session.opened_at)
        .bind(&session.register_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { .. } => DbError::Domain(CoreError::RegisterBusy {
                register_id: session.register_id.clone(),
            }),
            other => other,
        })?;

        if inserted.rows_affected() == 0 {
            return Err(DbError::not_found("Register", &session.register_id));
        }

        for (currency, counted) in &opening {
            sqlx::query(
                r#"
                INSERT INTO cash_session_amounts (
                    id, tenant_id, session_id, currency, opening_cents, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&session.tenant_id)
            .bind(&session.id)
            .bind(currency)
            .bind(counted.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let current =
                ledger::read_balance(&mut tx, &session.tenant_id, &session.register_id, currency)
                    .await?;
            let gap = compute_difference(*counted, current)?;

            if !gap.is_zero() {
                let adjustment = CashMovement {
                    description: Some("Opening float alignment".to_string()),
                    metadata: serde_json::json!({
                        "reason": "opening_float_alignment",
                        "previous_balance": current.to_string(),
                        "counted": counted.to_string(),
                    })
                    .to_string(),
                    ..ledger::draft_movement(
                        ctx,
                        &session.id,
                        &session.register_id,
                        MovementType::adjustment_for(gap),
                        currency,
                        gap,
                    )
                };
                ledger::append_movement(&mut tx, &adjustment).await?;

                info!(
                    register_id = %session.register_id,
                    currency = %currency,
                    previous = %current,
                    counted = %counted,
                    "Opening float differs from balance, adjustment recorded"
                );
            }
        }

        tx.commit().await?;

        info!(
            id = %session.id,
            register_id = %session.register_id,
            opened_by = %session.opened_by,
            "Session opened"
        );

        Ok(session)
    }

    /// Closes a session with the counted cash.
    ///
    /// For every counted currency the theoretical balance is read inside the
    /// same transaction and frozen next to the count and the difference.
    ///
    /// ## Errors
    /// - `InvalidState` (`SessionAlreadyClosed`)
    /// - `NotFound`: unknown session or another tenant's
    /// - `Validation`: negative or malformed amounts
    pub async fn close(
        &self,
        ctx: &TenantContext,
        session_id: &str,
        input: CloseSession,
    ) -> DbResult<CashSession> {
        validate_uuid("session_id", session_id)?;
        let closing = normalize_amount_map("closing_amounts", &input.closing_amounts)?;
        let notes = validate_notes(input.notes.as_deref())?;

        debug!(session_id = %session_id, currencies = closing.len(), "Closing session");

        let mut tx = self.pool.begin().await?;

        let closed_id = session_id.to_string();
        let register_id = lock_open_session(&mut tx, &ctx.tenant_id, session_id, || {
            CoreError::SessionAlreadyClosed {
                session_id: closed_id,
            }
        })
        .await?;

        let now = Utc::now();

        for (currency, real) in &closing {
            let theoretical =
                ledger::read_balance(&mut tx, &ctx.tenant_id, &register_id, currency).await?;
            let difference = compute_difference(*real, theoretical)?;

            sqlx::query(
                r#"
                INSERT INTO cash_session_amounts (
                    id, tenant_id, session_id, currency, opening_cents,
                    theoretical_cents, real_cents, difference_cents, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT (session_id, currency) DO UPDATE SET
                    theoretical_cents = excluded.theoretical_cents,
                    real_cents = excluded.real_cents,
                    difference_cents = excluded.difference_cents,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&ctx.tenant_id)
            .bind(session_id)
            .bind(currency)
            .bind(theoretical.cents())
            .bind(real.cents())
            .bind(difference.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let status = self.policy.classify(difference);
            if status != CashCountStatus::Balanced {
                warn!(
                    session_id = %session_id,
                    register_id = %register_id,
                    currency = %currency,
                    theoretical = %theoretical,
                    real = %real,
                    difference = %difference,
                    status = ?status,
                    "Cash count does not match theoretical balance"
                );
            }
        }

        sqlx::query(
            r#"
            UPDATE cash_sessions SET
                status = 'closed',
                closed_at = ?1,
                closed_by = ?2,
                closing_notes = ?3,
                updated_at = ?1
            WHERE id = ?4 AND tenant_id = ?5 AND status = 'open'
            "#,
        )
        .bind(now)
        .bind(&ctx.user_id)
        .bind(&notes)
        .bind(session_id)
        .bind(&ctx.tenant_id)
        .execute(&mut *tx)
        .await?;

        let session = fetch_session(&mut tx, &ctx.tenant_id, session_id)
            .await?
            .ok_or_else(|| DbError::not_found("Session", session_id))?;

        tx.commit().await?;

        info!(
            id = %session.id,
            register_id = %session.register_id,
            closed_by = %ctx.user_id,
            "Session closed"
        );

        Ok(session)
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        fetch_session(&mut conn, &ctx.tenant_id, id).await
    }

    /// Session with its register, amounts and movements.
    pub async fn detail(&self, ctx: &TenantContext, id: &str) -> DbResult<SessionDetail> {
        let mut conn = self.pool.acquire().await?;

        let session = fetch_session(&mut conn, &ctx.tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Session", id))?;

        let register = sqlx::query_as::<_, Register>(
            r#"
            SELECT id, tenant_id, shop_id, counter_id, name, is_active, created_at, updated_at
            FROM registers
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(&session.register_id)
        .bind(&ctx.tenant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Register", &session.register_id))?;

        let amounts = fetch_amounts(&mut conn, &ctx.tenant_id, id).await?;
        let movements = ledger::session_movements(&mut conn, &ctx.tenant_id, id).await?;

        Ok(SessionDetail {
            session,
            register,
            amounts,
            movements,
        })
    }

    /// The open session of a register, if any.
    pub async fn open_for_register(
        &self,
        ctx: &TenantContext,
        register_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {} FROM cash_sessions
            WHERE tenant_id = ?1 AND register_id = ?2 AND status = 'open'
            "#,
            SESSION_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(register_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Sessions of a register, most recently opened first.
    pub async fn list_for_register(
        &self,
        ctx: &TenantContext,
        register_id: &str,
        limit: u32,
    ) -> DbResult<Vec<CashSession>> {
        let sessions = sqlx::query_as::<_, CashSession>(&format!(
            r#"
            SELECT {} FROM cash_sessions
            WHERE tenant_id = ?1 AND register_id = ?2
            ORDER BY opened_at DESC, rowid DESC
            LIMIT ?3
            "#,
            SESSION_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(register_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Opening and closing amounts of a session, by currency.
    pub async fn amounts(
        &self,
        ctx: &TenantContext,
        session_id: &str,
    ) -> DbResult<Vec<SessionAmount>> {
        let mut conn = self.pool.acquire().await?;
        fetch_amounts(&mut conn, &ctx.tenant_id, session_id).await
    }

    /// Per-currency reconciliation summary of a session.
    pub async fn report(
        &self,
        ctx: &TenantContext,
        session_id: &str,
    ) -> DbResult<ReconciliationReport> {
        let mut conn = self.pool.acquire().await?;

        fetch_session(&mut conn, &ctx.tenant_id, session_id)
            .await?
            .ok_or_else(|| DbError::not_found("Session", session_id))?;

        let amounts = fetch_amounts(&mut conn, &ctx.tenant_id, session_id).await?;

        Ok(ReconciliationReport::from_amounts(
            session_id,
            &amounts,
            &self.policy,
        ))
    }
}

// =============================================================================
// In-Transaction Helpers
// =============================================================================

/// Touches an open session and returns its register.
///
/// Must be the first statement of a writing transaction: the conditional
/// UPDATE takes the write lock, so the session cannot be closed until the
/// caller commits. When no open row matches, `closed` builds the error for
/// an existing closed session; an absent session is NotFound.
pub(crate) async fn lock_open_session<F>(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    session_id: &str,
    closed: F,
) -> DbResult<String>
where
    F: FnOnce() -> CoreError,
{
    let register_id: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE cash_sessions SET updated_at = ?1
        WHERE id = ?2 AND tenant_id = ?3 AND status = 'open'
        RETURNING register_id
        "#,
    )
    .bind(Utc::now())
    .bind(session_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(register_id) = register_id {
        return Ok(register_id);
    }

    let status: Option<SessionStatus> =
        sqlx::query_scalar("SELECT status FROM cash_sessions WHERE id = ?1 AND tenant_id = ?2")
            .bind(session_id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

    match status {
        Some(_) => Err(closed().into()),
        None => Err(DbError::not_found("Session", session_id)),
    }
}

pub(crate) async fn fetch_session(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<Option<CashSession>> {
    let session = sqlx::query_as::<_, CashSession>(&format!(
        "SELECT {} FROM cash_sessions WHERE id = ?1 AND tenant_id = ?2",
        SESSION_COLUMNS
    ))
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(session)
}

async fn fetch_amounts(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    session_id: &str,
) -> DbResult<Vec<SessionAmount>> {
    let amounts = sqlx::query_as::<_, SessionAmount>(&format!(
        r#"
        SELECT {} FROM cash_session_amounts
        WHERE tenant_id = ?1 AND session_id = ?2
        ORDER BY currency
        "#,
        AMOUNT_COLUMNS
    ))
    .bind(tenant_id)
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(amounts)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use cambio_core::{ErrorKind, Money, NewRegister};
    use std::collections::BTreeMap;

    fn ctx() -> TenantContext {
        TenantContext::new("tenant-a", "cashier-1").unwrap()
    }

    async fn setup() -> (Database, Register) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let register = db
            .registers()
            .create(
                &ctx(),
                NewRegister {
                    shop_id: "shop-1".to_string(),
                    counter_id: None,
                    name: "Till 1".to_string(),
                },
            )
            .await
            .unwrap();
        (db, register)
    }

    fn opening(register_id: &str, pairs: &[(&str, i64)]) -> OpenSession {
        OpenSession {
            register_id: register_id.to_string(),
            opening_amounts: pairs
                .iter()
                .map(|(c, major)| (c.to_string(), Money::from_major(*major)))
                .collect(),
            notes: Some("Float from safe".to_string()),
            work_shift_id: None,
        }
    }

    #[tokio::test]
    async fn test_open_writes_opening_amounts() {
        let (db, register) = setup().await;

        let session = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[("usd", 100), ("CDF", 0)]))
            .await
            .unwrap();

        assert!(session.is_open());
        assert_eq!(session.opened_by, "cashier-1");
        assert_eq!(session.opening_notes.as_deref(), Some("Float from safe"));

        let amounts = db.sessions().amounts(&ctx(), &session.id).await.unwrap();
        assert_eq!(amounts.len(), 2);
        assert_eq!(amounts[0].currency, "CDF");
        assert_eq!(amounts[1].currency, "USD");
        assert_eq!(amounts[1].opening_cents, 10_000);
        assert!(amounts.iter().all(|a| a.theoretical_cents.is_none()));
    }

    #[tokio::test]
    async fn test_second_open_conflicts() {
        let (db, register) = setup().await;
        db.sessions()
            .open(&ctx(), opening(&register.id, &[]))
            .await
            .unwrap();

        let err = db
            .sessions()
            .open(&ctx().as_user("cashier-2"), opening(&register.id, &[]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("already has an open session"));
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_inactive_or_foreign_register() {
        let (db, register) = setup().await;

        let unknown = Uuid::new_v4().to_string();
        let err = db.sessions().open(&ctx(), opening(&unknown, &[])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let foreign = TenantContext::new("tenant-b", "cashier-9").unwrap();
        let err = db
            .sessions()
            .open(&foreign, opening(&register.id, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        db.registers().deactivate(&ctx(), &register.id).await.unwrap();
        let err = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_rejects_negative_float() {
        let (db, register) = setup().await;
        let mut input = opening(&register.id, &[]);
        input.opening_amounts = BTreeMap::from([("USD".to_string(), Money::from_cents(-1))]);

        let err = db.sessions().open(&ctx(), input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(db
            .sessions()
            .open_for_register(&ctx(), &register.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_close_twice_is_invalid_state() {
        let (db, register) = setup().await;
        let session = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[("USD", 100)]))
            .await
            .unwrap();

        let count = CloseSession {
            closing_amounts: BTreeMap::from([("USD".to_string(), Money::from_major(100))]),
            notes: None,
        };
        let closed = db
            .sessions()
            .close(&ctx(), &session.id, count.clone())
            .await
            .unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.closed_by.as_deref(), Some("cashier-1"));
        assert!(closed.closed_at.is_some());

        let err = db
            .sessions()
            .close(&ctx(), &session.id, count)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::SessionAlreadyClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_accepts_currency_without_opening_row() {
        let (db, register) = setup().await;
        let session = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[("USD", 10)]))
            .await
            .unwrap();

        db.sessions()
            .close(
                &ctx(),
                &session.id,
                CloseSession {
                    closing_amounts: BTreeMap::from([("EUR".to_string(), Money::from_major(5))]),
                    notes: Some("Found a note in the drawer".to_string()),
                },
            )
            .await
            .unwrap();

        let report = db.sessions().report(&ctx(), &session.id).await.unwrap();
        let eur = report.line("EUR").unwrap();
        assert_eq!(eur.opening, Money::zero());
        assert_eq!(eur.theoretical, Money::zero());
        assert_eq!(eur.difference, Money::from_major(5));
        assert_eq!(eur.status, CashCountStatus::Surplus);
        assert_eq!(report.uncounted, vec!["USD".to_string()]);
    }

    #[tokio::test]
    async fn test_detail_nests_register_amounts_and_movements() {
        let (db, register) = setup().await;
        let session = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[("USD", 25)]))
            .await
            .unwrap();

        let detail = db.sessions().detail(&ctx(), &session.id).await.unwrap();
        assert_eq!(detail.register.id, register.id);
        assert_eq!(detail.amounts.len(), 1);
        // Fresh register: the float is brought in by one alignment movement.
        assert_eq!(detail.movements.len(), 1);
        assert_eq!(detail.movements[0].movement_type, MovementType::AdjustmentIn);

        let foreign = TenantContext::new("tenant-b", "cashier-9").unwrap();
        let err = db.sessions().detail(&foreign, &session.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_for_register_newest_first() {
        let (db, register) = setup().await;
        let empty = CloseSession::default();

        let first = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[]))
            .await
            .unwrap();
        db.sessions().close(&ctx(), &first.id, empty.clone()).await.unwrap();

        let second = db
            .sessions()
            .open(&ctx(), opening(&register.id, &[]))
            .await
            .unwrap();

        let listed = db
            .sessions()
            .list_for_register(&ctx(), &register.id, 10)
            .await
            .unwrap();
        assert_eq!(
            listed.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );

        let open = db
            .sessions()
            .open_for_register(&ctx(), &register.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.id, second.id);
    }
}
