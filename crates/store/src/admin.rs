use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simtrade_core::account::entity::{Admin, AdminRole};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::AdminStore;
use sqlx::SqlitePool;

use crate::db::{db_err, parse_enum};

#[derive(sqlx::FromRow)]
struct AdminRow {
    id: String,
    username: String,
    password_hash: String,
    role: String,
    is_active: bool,
    force_password_change: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for Admin {
    type Error = StoreError;

    fn try_from(r: AdminRow) -> Result<Self, Self::Error> {
        Ok(Admin {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            role: parse_enum(&r.role)?,
            is_active: r.is_active,
            force_password_change: r.force_password_change,
            last_login_at: r.last_login_at,
            created_at: r.created_at,
        })
    }
}

const ADMIN_SELECT: &str = "SELECT id, username, password_hash, role, is_active, force_password_change, last_login_at, created_at FROM admins";

/// AdminStore 的 SQLite 实现。
///
/// # Invariants
/// * 删除管理员时其刷新令牌随外键级联删除。
pub struct SqliteAdminStore {
    pool: SqlitePool,
}

impl SqliteAdminStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminStore for SqliteAdminStore {
    async fn create_admin(&self, admin: &Admin) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO admins (id, username, password_hash, role, is_active, force_password_change, last_login_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&admin.id)
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .bind(admin.is_active)
        .bind(admin.force_password_change)
        .bind(admin.last_login_at)
        .bind(admin.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_admin(&self, id: &str) -> Result<Option<Admin>, StoreError> {
        sqlx::query_as::<_, AdminRow>(&format!("{} WHERE id = ?", ADMIN_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Admin::try_from)
            .transpose()
    }

    async fn get_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StoreError> {
        sqlx::query_as::<_, AdminRow>(&format!("{} WHERE username = ?", ADMIN_SELECT))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Admin::try_from)
            .transpose()
    }

    async fn update_admin(&self, admin: &Admin) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE admins SET username = ?, password_hash = ?, role = ?, is_active = ?, force_password_change = ?, last_login_at = ? WHERE id = ?",
        )
        .bind(&admin.username)
        .bind(&admin.password_hash)
        .bind(admin.role.as_str())
        .bind(admin.is_active)
        .bind(admin.force_password_change)
        .bind(admin.last_login_at)
        .bind(&admin.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("admin {}", admin.id)));
        }
        Ok(())
    }

    async fn delete_admin(&self, id: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM admins WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("admin {}", id)));
        }
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Admin>, StoreError> {
        sqlx::query_as::<_, AdminRow>(&format!("{} ORDER BY created_at ASC, rowid ASC", ADMIN_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Admin::try_from)
            .collect()
    }

    async fn count_active_super_admins(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins WHERE role = ? AND is_active = 1")
            .bind(AdminRole::SuperAdmin.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
