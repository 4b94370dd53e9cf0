use rust_decimal::Decimal;
use simtrade_core::store::error::StoreError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 默认系统数据库文件名
const DEFAULT_SYSTEM_DB: &str = "app.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    balance TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS balance_ledger (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    delta TEXT NOT NULL,
    balance_after TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at DATETIME NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ledger_user ON balance_ledger(user_id);

CREATE TABLE IF NOT EXISTS admins (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    force_password_change INTEGER NOT NULL,
    last_login_at DATETIME,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS market_sessions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL,
    status TEXT NOT NULL,
    opens_at DATETIME NOT NULL,
    closes_at DATETIME NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS sub_markets (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES market_sessions(id),
    name TEXT NOT NULL,
    return_rate TEXT NOT NULL,
    cycle_seconds INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at DATETIME NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sub_markets_session ON sub_markets(session_id);

CREATE TABLE IF NOT EXISTS sub_market_cycles (
    id TEXT PRIMARY KEY,
    sub_market_id TEXT NOT NULL REFERENCES sub_markets(id),
    sequence INTEGER NOT NULL,
    start_price TEXT NOT NULL,
    end_price TEXT,
    starts_at DATETIME NOT NULL,
    ends_at DATETIME NOT NULL,
    status TEXT NOT NULL,
    settled_at DATETIME,
    UNIQUE (sub_market_id, sequence)
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    cycle_id TEXT REFERENCES sub_market_cycles(id),
    symbol TEXT NOT NULL,
    direction TEXT NOT NULL,
    amount TEXT NOT NULL,
    entry_price TEXT NOT NULL,
    exit_price TEXT,
    return_rate TEXT NOT NULL,
    status TEXT NOT NULL,
    payout TEXT,
    profit TEXT,
    created_at DATETIME NOT NULL,
    settled_at DATETIME
);
CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
CREATE INDEX IF NOT EXISTS idx_transactions_cycle ON transactions(cycle_id, status);

CREATE TABLE IF NOT EXISTS testimonials (
    id TEXT PRIMARY KEY,
    author_name TEXT NOT NULL,
    author_title TEXT,
    content TEXT NOT NULL,
    avatar_url TEXT,
    rating INTEGER NOT NULL,
    is_published INTEGER NOT NULL,
    sort_order INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS carousel_items (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    subtitle TEXT,
    image_url TEXT NOT NULL,
    link_url TEXT,
    sort_order INTEGER NOT NULL,
    is_active INTEGER NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS leaderboard_entries (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    avatar_url TEXT,
    profit TEXT NOT NULL,
    win_rate TEXT NOT NULL,
    rank INTEGER NOT NULL,
    period TEXT NOT NULL,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    description TEXT,
    updated_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS ip_whitelist (
    id TEXT PRIMARY KEY,
    ip_address TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS refresh_tokens (
    id TEXT PRIMARY KEY,
    admin_id TEXT NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    expires_at DATETIME NOT NULL,
    revoked_at DATETIME,
    created_at DATETIME NOT NULL
);
"#;

/// # Summary
/// 系统数据库句柄，持有共享的 `SqlitePool`。
///
/// # Invariants
/// * 表结构在 `open` 时幂等创建。
/// * 外键约束始终开启。
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// # Summary
    /// 打开 (或创建) 数据目录下的系统数据库并初始化表结构。
    ///
    /// # Logic
    /// 1. 确保数据目录存在。
    /// 2. 以 WAL 模式、开启外键约束的方式连接 `app.db`。
    /// 3. 执行 DDL。
    ///
    /// # Arguments
    /// * `data_dir` - 数据根目录
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = data_dir.as_ref();
        std::fs::create_dir_all(root).map_err(|e| StoreError::InitError(e.to_string()))?;

        let options = SqliteConnectOptions::new()
            .filename(root.join(DEFAULT_SYSTEM_DB))
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::InitError(e.to_string()))?;

        tracing::info!("System database ready at {}", root.join(DEFAULT_SYSTEM_DB).display());
        Ok(Self { pool })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

/// 将 sqlx 错误映射为存储层错误，约束冲突单独归类
pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && (db.is_unique_violation() || db.is_foreign_key_violation())
    {
        return StoreError::Conflict(db.message().to_string());
    }
    StoreError::Database(e.to_string())
}

pub(crate) fn parse_dec(raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Corrupted(format!("decimal '{}': {}", raw, e)))
}

pub(crate) fn parse_opt_dec(raw: Option<String>) -> Result<Option<Decimal>, StoreError> {
    raw.as_deref().map(parse_dec).transpose()
}

pub(crate) fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    raw.parse::<T>().map_err(StoreError::Corrupted)
}
