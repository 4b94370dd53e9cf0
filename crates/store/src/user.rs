use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use simtrade_core::account::entity::{BalanceEntry, User};
use simtrade_core::common::{Page, PageRequest, new_id};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::{UserFilter, UserStore};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::db::{db_err, parse_dec, parse_enum};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    username: String,
    password_hash: String,
    balance: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: r.id,
            email: r.email,
            username: r.username,
            password_hash: r.password_hash,
            balance: parse_dec(&r.balance)?,
            status: parse_enum(&r.status)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: String,
    user_id: String,
    delta: String,
    balance_after: String,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for BalanceEntry {
    type Error = StoreError;

    fn try_from(r: LedgerRow) -> Result<Self, Self::Error> {
        Ok(BalanceEntry {
            id: r.id,
            user_id: r.user_id,
            delta: parse_dec(&r.delta)?,
            balance_after: parse_dec(&r.balance_after)?,
            reason: r.reason,
            created_at: r.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, balance, status, created_at, updated_at";

/// # Summary
/// 在已开启的事务连接上调整余额并追加流水。
///
/// # Logic
/// 1. 先以一次写操作拿到写锁，用户不存在返回 `NotFound`。
/// 2. 读取当前余额，新余额为负则返回 `InsufficientBalance`，由调用方回滚事务。
/// 3. 写回余额，插入流水。
///
/// 写锁须先于读取取得，否则 WAL 模式下并发事务会直接返回 `SQLITE_BUSY`。
pub(crate) async fn apply_balance_delta(
    conn: &mut SqliteConnection,
    user_id: &str,
    delta: Decimal,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<BalanceEntry, StoreError> {
    let touched = sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    if touched.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("user {}", user_id)));
    }

    let raw: String = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    let current = parse_dec(&raw)?;

    let next = current + delta;
    if next < Decimal::ZERO {
        return Err(StoreError::InsufficientBalance {
            required: -delta,
            actual: current,
        });
    }

    sqlx::query("UPDATE users SET balance = ? WHERE id = ?")
        .bind(next.to_string())
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

    let entry = BalanceEntry {
        id: new_id(),
        user_id: user_id.to_string(),
        delta,
        balance_after: next,
        reason: reason.to_string(),
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO balance_ledger (id, user_id, delta, balance_after, reason, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(entry.delta.to_string())
    .bind(entry.balance_after.to_string())
    .bind(&entry.reason)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(entry)
}

fn push_user_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(q) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        let like = format!("%{}%", q.trim());
        qb.push(" AND (username LIKE ").push_bind(like.clone());
        qb.push(" OR email LIKE ").push_bind(like).push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

/// UserStore 的 SQLite 实现。
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    /// # Logic
    /// 余额字段原样写入；非零初始余额额外记一笔 `Opening balance` 流水。
    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, balance, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.balance.to_string())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if !user.balance.is_zero() {
            sqlx::query(
                "INSERT INTO balance_ledger (id, user_id, delta, balance_after, reason, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&user.id)
            .bind(user.balance.to_string())
            .bind(user.balance.to_string())
            .bind("Opening balance")
            .bind(user.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE users SET email = ?, username = ?, password_hash = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.updated_at)
        .bind(&user.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    /// # Logic
    /// 同一事务内先删资金流水再删用户。有订单时外键失败，流水随事务回滚。
    async fn delete_user(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM balance_ledger WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", id)));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, StoreError> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        push_user_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        push_user_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = qb
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    async fn adjust_balance(&self, user_id: &str, delta: Decimal, reason: &str) -> Result<BalanceEntry, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let entry = apply_balance_delta(&mut *tx, user_id, delta, reason, Utc::now()).await?;
        tx.commit().await.map_err(db_err)?;
        tracing::info!("Balance of user {} adjusted by {} ({})", user_id, delta, reason);
        Ok(entry)
    }

    async fn list_ledger(&self, user_id: &str, page: PageRequest) -> Result<Page<BalanceEntry>, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM balance_ledger WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let items = sqlx::query_as::<_, LedgerRow>(
            "SELECT id, user_id, delta, balance_after, reason, created_at FROM balance_ledger WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(BalanceEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
    }
}
