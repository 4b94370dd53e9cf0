use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simtrade_core::common::{Page, PageRequest};
use simtrade_core::market::entity::{CycleStatus, MarketSession, SubMarket, SubMarketCycle};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::MarketStore;
use sqlx::SqlitePool;

use crate::db::{db_err, parse_dec, parse_enum, parse_opt_dec};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    name: String,
    symbol: String,
    status: String,
    opens_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for MarketSession {
    type Error = StoreError;

    fn try_from(r: SessionRow) -> Result<Self, Self::Error> {
        Ok(MarketSession {
            id: r.id,
            name: r.name,
            symbol: r.symbol,
            status: parse_enum(&r.status)?,
            opens_at: r.opens_at,
            closes_at: r.closes_at,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubMarketRow {
    id: String,
    session_id: String,
    name: String,
    return_rate: String,
    cycle_seconds: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubMarketRow> for SubMarket {
    type Error = StoreError;

    fn try_from(r: SubMarketRow) -> Result<Self, Self::Error> {
        Ok(SubMarket {
            id: r.id,
            session_id: r.session_id,
            name: r.name,
            return_rate: parse_dec(&r.return_rate)?,
            cycle_seconds: r.cycle_seconds,
            status: parse_enum(&r.status)?,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CycleRow {
    id: String,
    sub_market_id: String,
    sequence: i64,
    start_price: String,
    end_price: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: String,
    settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<CycleRow> for SubMarketCycle {
    type Error = StoreError;

    fn try_from(r: CycleRow) -> Result<Self, Self::Error> {
        Ok(SubMarketCycle {
            id: r.id,
            sub_market_id: r.sub_market_id,
            sequence: r.sequence,
            start_price: parse_dec(&r.start_price)?,
            end_price: parse_opt_dec(r.end_price)?,
            starts_at: r.starts_at,
            ends_at: r.ends_at,
            status: parse_enum(&r.status)?,
            settled_at: r.settled_at,
        })
    }
}

const SESSION_SELECT: &str = "SELECT id, name, symbol, status, opens_at, closes_at, created_at FROM market_sessions";
const SUB_MARKET_SELECT: &str = "SELECT id, session_id, name, return_rate, cycle_seconds, status, created_at FROM sub_markets";
const CYCLE_SELECT: &str = "SELECT id, sub_market_id, sequence, start_price, end_price, starts_at, ends_at, status, settled_at FROM sub_market_cycles";

/// # Summary
/// MarketStore 的 SQLite 实现，覆盖场次、子市场与周期三张表。
///
/// # Invariants
/// * 周期的 `(sub_market_id, sequence)` 唯一，并发开启同一序号的周期会得到 `Conflict`。
pub struct SqliteMarketStore {
    pool: SqlitePool,
}

impl SqliteMarketStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketStore for SqliteMarketStore {
    async fn create_session(&self, s: &MarketSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO market_sessions (id, name, symbol, status, opens_at, closes_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&s.id)
        .bind(&s.name)
        .bind(&s.symbol)
        .bind(s.status.as_str())
        .bind(s.opens_at)
        .bind(s.closes_at)
        .bind(s.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<MarketSession>, StoreError> {
        sqlx::query_as::<_, SessionRow>(&format!("{} WHERE id = ?", SESSION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(MarketSession::try_from)
            .transpose()
    }

    async fn update_session(&self, s: &MarketSession) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE market_sessions SET name = ?, symbol = ?, status = ?, opens_at = ?, closes_at = ? WHERE id = ?",
        )
        .bind(&s.name)
        .bind(&s.symbol)
        .bind(s.status.as_str())
        .bind(s.opens_at)
        .bind(s.closes_at)
        .bind(&s.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("market session {}", s.id)));
        }
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM market_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("market session {}", id)));
        }
        Ok(())
    }

    async fn list_sessions(&self, page: PageRequest) -> Result<Page<MarketSession>, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let items = sqlx::query_as::<_, SessionRow>(&format!(
            "{} ORDER BY opens_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SESSION_SELECT
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(MarketSession::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), page))
    }

    async fn create_sub_market(&self, m: &SubMarket) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sub_markets (id, session_id, name, return_rate, cycle_seconds, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&m.id)
        .bind(&m.session_id)
        .bind(&m.name)
        .bind(m.return_rate.to_string())
        .bind(m.cycle_seconds)
        .bind(m.status.as_str())
        .bind(m.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_sub_market(&self, id: &str) -> Result<Option<SubMarket>, StoreError> {
        sqlx::query_as::<_, SubMarketRow>(&format!("{} WHERE id = ?", SUB_MARKET_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(SubMarket::try_from)
            .transpose()
    }

    async fn update_sub_market(&self, m: &SubMarket) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE sub_markets SET name = ?, return_rate = ?, cycle_seconds = ?, status = ? WHERE id = ?")
            .bind(&m.name)
            .bind(m.return_rate.to_string())
            .bind(m.cycle_seconds)
            .bind(m.status.as_str())
            .bind(&m.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("sub market {}", m.id)));
        }
        Ok(())
    }

    async fn list_sub_markets(&self, session_id: &str) -> Result<Vec<SubMarket>, StoreError> {
        sqlx::query_as::<_, SubMarketRow>(&format!(
            "{} WHERE session_id = ? ORDER BY created_at ASC, rowid ASC",
            SUB_MARKET_SELECT
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(SubMarket::try_from)
        .collect()
    }

    async fn create_cycle(&self, c: &SubMarketCycle) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sub_market_cycles (id, sub_market_id, sequence, start_price, end_price, starts_at, ends_at, status, settled_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&c.id)
        .bind(&c.sub_market_id)
        .bind(c.sequence)
        .bind(c.start_price.to_string())
        .bind(c.end_price.map(|v| v.to_string()))
        .bind(c.starts_at)
        .bind(c.ends_at)
        .bind(c.status.as_str())
        .bind(c.settled_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_cycle(&self, id: &str) -> Result<Option<SubMarketCycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!("{} WHERE id = ?", CYCLE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(SubMarketCycle::try_from)
            .transpose()
    }

    async fn update_cycle(&self, c: &SubMarketCycle, expected: CycleStatus) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE sub_market_cycles SET end_price = ?, ends_at = ?, status = ?, settled_at = ? WHERE id = ? AND status = ?",
        )
        .bind(c.end_price.map(|v| v.to_string()))
        .bind(c.ends_at)
        .bind(c.status.as_str())
        .bind(c.settled_at)
        .bind(&c.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return match self.get_cycle(&c.id).await? {
                Some(current) => Err(StoreError::Conflict(format!(
                    "cycle {} is {}, expected {}",
                    c.id, current.status, expected
                ))),
                None => Err(StoreError::NotFound(format!("cycle {}", c.id))),
            };
        }
        Ok(())
    }

    async fn list_cycles(&self, sub_market_id: &str) -> Result<Vec<SubMarketCycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!("{} WHERE sub_market_id = ? ORDER BY sequence DESC", CYCLE_SELECT))
            .bind(sub_market_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(SubMarketCycle::try_from)
            .collect()
    }

    async fn latest_cycle(&self, sub_market_id: &str) -> Result<Option<SubMarketCycle>, StoreError> {
        sqlx::query_as::<_, CycleRow>(&format!(
            "{} WHERE sub_market_id = ? ORDER BY sequence DESC LIMIT 1",
            CYCLE_SELECT
        ))
        .bind(sub_market_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(SubMarketCycle::try_from)
        .transpose()
    }

    async fn count_unsettled_cycles(&self, session_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sub_market_cycles c JOIN sub_markets m ON c.sub_market_id = m.id WHERE m.session_id = ? AND c.status != ?",
        )
        .bind(session_id)
        .bind(CycleStatus::Settled.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
