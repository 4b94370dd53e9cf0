use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simtrade_core::account::entity::BalanceEntry;
use simtrade_core::common::{Page, PageRequest};
use simtrade_core::market::entity::CycleStatus;
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::TransactionStore;
use simtrade_core::trade::entity::{Transaction, TransactionFilter, TransactionStatus};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::{db_err, parse_dec, parse_enum, parse_opt_dec};
use crate::user::apply_balance_delta;

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    user_id: String,
    cycle_id: Option<String>,
    symbol: String,
    direction: String,
    amount: String,
    entry_price: String,
    exit_price: Option<String>,
    return_rate: String,
    status: String,
    payout: Option<String>,
    profit: Option<String>,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: r.id,
            user_id: r.user_id,
            cycle_id: r.cycle_id,
            symbol: r.symbol,
            direction: parse_enum(&r.direction)?,
            amount: parse_dec(&r.amount)?,
            entry_price: parse_dec(&r.entry_price)?,
            exit_price: parse_opt_dec(r.exit_price)?,
            return_rate: parse_dec(&r.return_rate)?,
            status: parse_enum(&r.status)?,
            payout: parse_opt_dec(r.payout)?,
            profit: parse_opt_dec(r.profit)?,
            created_at: r.created_at,
            settled_at: r.settled_at,
        })
    }
}

const TX_COLUMNS: &str = "id, user_id, cycle_id, symbol, direction, amount, entry_price, exit_price, return_rate, status, payout, profit, created_at, settled_at";

fn push_tx_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(cycle_id) = &filter.cycle_id {
        qb.push(" AND cycle_id = ").push_bind(cycle_id.clone());
    }
    if let Some(symbol) = &filter.symbol {
        qb.push(" AND symbol = ").push_bind(symbol.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

/// # Summary
/// TransactionStore 的 SQLite 实现。
///
/// # Invariants
/// * 订单写入与余额变动位于同一数据库事务，任一失败整体回滚。
pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn place_transaction(&self, t: &Transaction) -> Result<BalanceEntry, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 首条写语句即取得写锁，周期状态的判断与插入不可分割
        let inserted = sqlx::query(&format!(
            "INSERT INTO transactions ({}) SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ? \
             WHERE ? IS NULL OR EXISTS (SELECT 1 FROM sub_market_cycles WHERE id = ? AND status = ?)",
            TX_COLUMNS
        ))
        .bind(&t.id)
        .bind(&t.user_id)
        .bind(&t.cycle_id)
        .bind(&t.symbol)
        .bind(t.direction.as_str())
        .bind(t.amount.to_string())
        .bind(t.entry_price.to_string())
        .bind(t.exit_price.map(|v| v.to_string()))
        .bind(t.return_rate.to_string())
        .bind(t.status.as_str())
        .bind(t.payout.map(|v| v.to_string()))
        .bind(t.profit.map(|v| v.to_string()))
        .bind(t.created_at)
        .bind(t.settled_at)
        .bind(&t.cycle_id)
        .bind(&t.cycle_id)
        .bind(CycleStatus::Open.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "cycle {} is not accepting transactions",
                t.cycle_id.as_deref().unwrap_or_default()
            )));
        }

        let entry = apply_balance_delta(
            &mut *tx,
            &t.user_id,
            -t.amount,
            &format!("Stake for transaction {}", t.id),
            t.created_at,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(entry)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        sqlx::query_as::<_, TransactionRow>(&format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, StoreError> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions");
        push_tx_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM transactions", TX_COLUMNS));
        push_tx_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = qb
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Transaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    async fn list_pending_by_cycle(&self, cycle_id: &str) -> Result<Vec<Transaction>, StoreError> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE cycle_id = ? AND status = ? ORDER BY created_at ASC, rowid ASC",
            TX_COLUMNS
        ))
        .bind(cycle_id)
        .bind(TransactionStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
    }

    /// # Logic
    /// 1. 条件更新 `status = 'Pending'` 的行，影响 0 行说明已被其他请求结算或撤销。
    /// 2. 有返还金额时在同一事务内入账。
    async fn finalize_transaction(&self, t: &Transaction) -> Result<(), StoreError> {
        if !t.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "transaction {} must be finalized with a terminal status",
                t.id
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            "UPDATE transactions SET status = ?, exit_price = ?, payout = ?, profit = ?, settled_at = ? WHERE id = ? AND status = ?",
        )
        .bind(t.status.as_str())
        .bind(t.exit_price.map(|v| v.to_string()))
        .bind(t.payout.map(|v| v.to_string()))
        .bind(t.profit.map(|v| v.to_string()))
        .bind(t.settled_at)
        .bind(&t.id)
        .bind(TransactionStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("transaction {} is no longer pending", t.id)));
        }

        if let Some(payout) = t.payout.filter(|p| !p.is_zero()) {
            let reason = match t.status {
                TransactionStatus::Cancelled => format!("Refund for cancelled transaction {}", t.id),
                TransactionStatus::Draw => format!("Draw refund for transaction {}", t.id),
                _ => format!("Payout for transaction {}", t.id),
            };
            apply_balance_delta(&mut *tx, &t.user_id, payout, &reason, t.settled_at.unwrap_or_else(Utc::now))
                .await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
