//! # Activity Repository
//!
//! The operational audit feed.
//!
//! ## Same-Transaction Append
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION (record path)                      │
//! │                                                                         │
//! │  1. UPDATE cash_sessions ... WHERE status = 'open'   (guard + lock)    │
//! │  2. INSERT INTO cash_movements ...                                     │
//! │  3. UPDATE register_balances SET amount_cents = amount_cents + ?       │
//! │  4. INSERT INTO activity_log ...                     ← THIS MODULE     │
//! │                                                                         │
//! │  COMMIT ← the feed never shows a movement that was rolled back         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use cambio_core::{ActivityEntry, CashMovement, TenantContext};

/// Subject type written for movement entries.
pub const SUBJECT_CASH_MOVEMENT: &str = "cash_movement";

const ACTIVITY_COLUMNS: &str = "id, tenant_id, user_id, subject_type, subject_id, description, \
     amount_cents, currency, properties, created_at";

/// Repository for reading the activity feed.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    /// Creates a new ActivityRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    /// Entries about one subject, oldest first.
    pub async fn for_subject(
        &self,
        ctx: &TenantContext,
        subject_type: &str,
        subject_id: &str,
    ) -> DbResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(&format!(
            r#"
            SELECT {} FROM activity_log
            WHERE tenant_id = ?1 AND subject_type = ?2 AND subject_id = ?3
            ORDER BY created_at, rowid
            "#,
            ACTIVITY_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(subject_type)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Most recent entries of the tenant, newest first.
    pub async fn recent(&self, ctx: &TenantContext, limit: u32) -> DbResult<Vec<ActivityEntry>> {
        let entries = sqlx::query_as::<_, ActivityEntry>(&format!(
            r#"
            SELECT {} FROM activity_log
            WHERE tenant_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
            ACTIVITY_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Appends the feed entry describing `movement`.
pub(crate) async fn append_for_movement(
    conn: &mut SqliteConnection,
    movement: &CashMovement,
) -> DbResult<ActivityEntry> {
    let properties = serde_json::json!({
        "session_id": movement.session_id,
        "register_id": movement.register_id,
        "movement_type": movement.movement_type,
        "transaction_id": movement.transaction_id,
    });

    let entry = ActivityEntry {
        id: Uuid::new_v4().to_string(),
        tenant_id: movement.tenant_id.clone(),
        user_id: movement.user_id.clone(),
        subject_type: SUBJECT_CASH_MOVEMENT.to_string(),
        subject_id: movement.id.clone(),
        description: format!(
            "{} of {}",
            movement.movement_type,
            movement.amount().format_with(&movement.currency)
        ),
        amount_cents: movement.amount_cents,
        currency: movement.currency.clone(),
        properties: properties.to_string(),
        created_at: Utc::now(),
    };

    debug!(subject_id = %entry.subject_id, "Appending activity entry");

    sqlx::query(
        r#"
        INSERT INTO activity_log (
            id, tenant_id, user_id, subject_type, subject_id,
            description, amount_cents, currency, properties, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.tenant_id)
    .bind(&entry.user_id)
    .bind(&entry.subject_type)
    .bind(&entry.subject_id)
    .bind(&entry.description)
    .bind(entry.amount_cents)
    .bind(&entry.currency)
    .bind(&entry.properties)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}
