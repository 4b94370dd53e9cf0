use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::{SettingStore, TokenStore};
use simtrade_core::system::entity::{IpWhitelistEntry, RefreshToken, Setting};
use sqlx::SqlitePool;
use std::net::IpAddr;

use crate::db::db_err;

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
    description: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for Setting {
    fn from(r: SettingRow) -> Self {
        Setting {
            key: r.key,
            value: r.value,
            description: r.description,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WhitelistRow {
    id: String,
    ip_address: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WhitelistRow> for IpWhitelistEntry {
    type Error = StoreError;

    fn try_from(r: WhitelistRow) -> Result<Self, Self::Error> {
        let ip_address = r
            .ip_address
            .parse::<IpAddr>()
            .map_err(|e| StoreError::Corrupted(format!("ip '{}': {}", r.ip_address, e)))?;
        Ok(IpWhitelistEntry {
            id: r.id,
            ip_address,
            description: r.description,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: String,
    admin_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(r: RefreshTokenRow) -> Self {
        RefreshToken {
            id: r.id,
            admin_id: r.admin_id,
            token_hash: r.token_hash,
            expires_at: r.expires_at,
            revoked_at: r.revoked_at,
            created_at: r.created_at,
        }
    }
}

/// 系统设置与 IP 白名单的 SQLite 实现。
pub struct SqliteSettingStore {
    pool: SqlitePool,
}

impl SqliteSettingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingStore for SqliteSettingStore {
    async fn list_settings(&self) -> Result<Vec<Setting>, StoreError> {
        let rows = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, description, updated_at FROM settings ORDER BY key ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Setting::from).collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, StoreError> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT key, value, description, updated_at FROM settings WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Setting::from))
    }

    /// # Logic
    /// 描述为空时保留原有描述。
    async fn put_setting(&self, setting: &Setting) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO settings (key, value, description, updated_at) VALUES (?, ?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 description = COALESCE(excluded.description, settings.description),
                 updated_at = excluded.updated_at"#,
        )
        .bind(&setting.key)
        .bind(&setting.value)
        .bind(&setting.description)
        .bind(setting.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        tracing::info!("Setting '{}' updated", setting.key);
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("setting {}", key)));
        }
        Ok(())
    }

    async fn list_whitelist(&self) -> Result<Vec<IpWhitelistEntry>, StoreError> {
        sqlx::query_as::<_, WhitelistRow>(
            "SELECT id, ip_address, description, created_at FROM ip_whitelist ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(IpWhitelistEntry::try_from)
        .collect()
    }

    async fn add_whitelist(&self, entry: &IpWhitelistEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ip_whitelist (id, ip_address, description, created_at) VALUES (?, ?, ?, ?)")
            .bind(&entry.id)
            .bind(entry.ip_address.to_string())
            .bind(&entry.description)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_whitelist(&self, id: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM ip_whitelist WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("whitelist entry {}", id)));
        }
        Ok(())
    }

    async fn is_whitelisted(&self, ip: IpAddr) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ip_whitelist WHERE ip_address = ?")
            .bind(ip.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }
}

/// # Summary
/// 刷新令牌的 SQLite 实现。
///
/// # Invariants
/// * 只保存令牌摘要，明文令牌从不落库。
/// * 吊销通过 `revoked_at IS NULL` 条件更新，保证同一令牌只能被成功吊销一次。
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn save_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, admin_id, token_hash, expires_at, revoked_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&token.id)
        .bind(&token.admin_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, admin_id, token_hash, expires_at, revoked_at, created_at FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(RefreshToken::from))
    }

    async fn revoke_refresh_token(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() == 1)
    }

    async fn revoke_all_for_admin(&self, admin_id: &str, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let res = sqlx::query("UPDATE refresh_tokens SET revoked_at = ? WHERE admin_id = ? AND revoked_at IS NULL")
            .bind(at)
            .bind(admin_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() > 0 {
            tracing::debug!("Purged {} expired refresh tokens", res.rows_affected());
        }
        Ok(res.rows_affected())
    }
}
