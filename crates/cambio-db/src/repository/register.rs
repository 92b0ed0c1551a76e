//! # Register Repository
//!
//! Cash drawers. Registers are soft-deleted through `is_active`; a trigger
//! rejects physical deletes so historical sessions keep their parent.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use cambio_core::validation::validate_register_name;
use cambio_core::{CoreError, NewRegister, Register, TenantContext, ValidationError};

const REGISTER_COLUMNS: &str =
    "id, tenant_id, shop_id, counter_id, name, is_active, created_at, updated_at";

/// Repository for register database operations.
#[derive(Debug, Clone)]
pub struct RegisterRepository {
    pool: SqlitePool,
}

impl RegisterRepository {
    /// Creates a new RegisterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RegisterRepository { pool }
    }

    /// Creates an active register in the caller's tenant.
    pub async fn create(&self, ctx: &TenantContext, input: NewRegister) -> DbResult<Register> {
        let name = validate_register_name(&input.name)?;
        let shop_id = input.shop_id.trim().to_string();
        if shop_id.is_empty() {
            return Err(ValidationError::Required {
                field: "shop_id".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let register = Register {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            shop_id,
            counter_id: input
                .counter_id
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %register.id, shop_id = %register.shop_id, "Creating register");

        sqlx::query(
            r#"
            INSERT INTO registers (
                id, tenant_id, shop_id, counter_id, name, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&register.id)
        .bind(&register.tenant_id)
        .bind(&register.shop_id)
        .bind(&register.counter_id)
        .bind(&register.name)
        .bind(register.is_active)
        .bind(register.created_at)
        .bind(register.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %register.id, name = %register.name, "Register created");
        Ok(register)
    }

    /// Gets a register by ID, active or not.
    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> DbResult<Option<Register>> {
        let register = sqlx::query_as::<_, Register>(&format!(
            "SELECT {} FROM registers WHERE id = ?1 AND tenant_id = ?2",
            REGISTER_COLUMNS
        ))
        .bind(id)
        .bind(&ctx.tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(register)
    }

    /// Active registers of a shop, by name.
    pub async fn list_for_shop(&self, ctx: &TenantContext, shop_id: &str) -> DbResult<Vec<Register>> {
        let registers = sqlx::query_as::<_, Register>(&format!(
            r#"
            SELECT {} FROM registers
            WHERE tenant_id = ?1 AND shop_id = ?2 AND is_active = 1
            ORDER BY name
            "#,
            REGISTER_COLUMNS
        ))
        .bind(&ctx.tenant_id)
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(registers)
    }

    /// Soft-deletes a register.
    ///
    /// Refused while a session is open on it; the check and the flag flip
    /// are one statement, so a concurrent open cannot slip in between.
    pub async fn deactivate(&self, ctx: &TenantContext, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE registers SET
                is_active = 0,
                updated_at = ?1
            WHERE id = ?2 AND tenant_id = ?3 AND is_active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM cash_sessions s
                  WHERE s.register_id = registers.id AND s.status = 'open'
              )
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(&ctx.tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let busy: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT 1 FROM cash_sessions s
                JOIN registers r ON r.id = s.register_id
                WHERE r.id = ?1 AND r.tenant_id = ?2 AND r.is_active = 1 AND s.status = 'open'
                "#,
            )
            .bind(id)
            .bind(&ctx.tenant_id)
            .fetch_optional(&self.pool)
            .await?;

            return Err(match busy {
                Some(_) => CoreError::RegisterHasOpenSession {
                    register_id: id.to_string(),
                }
                .into(),
                None => DbError::not_found("Register", id),
            });
        }

        info!(id = %id, "Register deactivated");
        Ok(())
    }
}

/// Fails with NotFound unless the register exists in the tenant.
pub(crate) async fn ensure_register(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    register_id: &str,
) -> DbResult<()> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM registers WHERE id = ?1 AND tenant_id = ?2")
            .bind(register_id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

    found
        .map(|_| ())
        .ok_or_else(|| DbError::not_found("Register", register_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn ctx() -> TenantContext {
        TenantContext::new("tenant-a", "manager-1").unwrap()
    }

    fn new_register(name: &str) -> NewRegister {
        NewRegister {
            shop_id: "shop-1".to_string(),
            counter_id: Some(" counter-2 ".to_string()),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.registers();

        let register = repo.create(&ctx(), new_register("Till 1")).await.unwrap();
        assert!(register.is_active);
        assert_eq!(register.counter_id.as_deref(), Some("counter-2"));

        let loaded = repo.get_by_id(&ctx(), &register.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Till 1");

        let other_tenant = TenantContext::new("tenant-b", "manager-9").unwrap();
        assert!(repo.get_by_id(&other_tenant, &register.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = new_register("  ");
        assert!(db.registers().create(&ctx(), input.clone()).await.is_err());

        input.name = "Till 1".to_string();
        input.shop_id = String::new();
        assert!(db.registers().create(&ctx(), input).await.is_err());
    }

    #[tokio::test]
    async fn test_deactivate_hides_register_from_shop_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.registers();

        let a = repo.create(&ctx(), new_register("Till A")).await.unwrap();
        repo.create(&ctx(), new_register("Till B")).await.unwrap();

        repo.deactivate(&ctx(), &a.id).await.unwrap();

        let listed = repo.list_for_shop(&ctx(), "shop-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Till B");

        let err = repo.deactivate(&ctx(), &a.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
