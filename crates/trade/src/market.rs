use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use simtrade_core::common::time::TimeProvider;
use simtrade_core::common::{Page, PageRequest, new_id};
use simtrade_core::market::entity::{
    CycleStatus, MarketSession, SessionStatus, SubMarket, SubMarketCycle, SubMarketStatus,
};
use simtrade_core::market::error::MarketError;
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::MarketStore;
use simtrade_core::trade::error::TradeError;
use simtrade_core::trade::settlement::validate_return_rate;
use std::sync::Arc;

use crate::quote::{QuoteBoard, normalize_symbol};
use crate::service::{SettlementSummary, TransactionService};

/// 周期时长下限 (秒)
pub const MIN_CYCLE_SECONDS: i64 = 10;
/// 周期时长上限 (秒)
pub const MAX_CYCLE_SECONDS: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub symbol: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubMarket {
    pub name: String,
    pub return_rate: Decimal,
    pub cycle_seconds: i64,
}

/// 子市场可修改字段，`None` 表示保持不变
#[derive(Debug, Clone, Default)]
pub struct SubMarketUpdate {
    pub name: Option<String>,
    pub return_rate: Option<Decimal>,
    pub cycle_seconds: Option<i64>,
}

/// 周期结算结果
#[derive(Debug, Clone)]
pub struct CycleSettlement {
    pub cycle: SubMarketCycle,
    pub summary: SettlementSummary,
}

/// # Summary
/// 场次、子市场与周期的生命周期管理。
///
/// # Invariants
/// * 状态迁移全部经由实体上的状态机校验。
/// * 同一子市场同一时刻至多一个未结算周期。
/// * 场次存在未结算周期时不能关闭。
pub struct MarketService {
    markets: Arc<dyn MarketStore>,
    transactions: Arc<TransactionService>,
    quotes: Arc<QuoteBoard>,
    clock: Arc<dyn TimeProvider>,
}

impl MarketService {
    pub fn new(
        markets: Arc<dyn MarketStore>,
        transactions: Arc<TransactionService>,
        quotes: Arc<QuoteBoard>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            markets,
            transactions,
            quotes,
            clock,
        }
    }

    // --- 场次 ---

    pub async fn create_session(&self, req: NewSession) -> Result<MarketSession, MarketError> {
        let name = req.name.trim().to_string();
        let symbol = normalize_symbol(&req.symbol);
        if name.is_empty() || symbol.is_empty() {
            return Err(MarketError::InvalidInput("name and symbol are required".into()));
        }
        if req.closes_at <= req.opens_at {
            return Err(MarketError::InvalidInput("closes_at must be after opens_at".into()));
        }

        let session = MarketSession {
            id: new_id(),
            name,
            symbol,
            status: SessionStatus::Scheduled,
            opens_at: req.opens_at,
            closes_at: req.closes_at,
            created_at: self.clock.now(),
        };
        self.markets.create_session(&session).await?;
        tracing::info!("Market session {} ({}) scheduled", session.id, session.symbol);
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<MarketSession, MarketError> {
        self.markets
            .get_session(id)
            .await?
            .ok_or_else(|| MarketError::SessionNotFound(id.to_string()))
    }

    pub async fn list_sessions(&self, page: PageRequest) -> Result<Page<MarketSession>, MarketError> {
        Ok(self.markets.list_sessions(page).await?)
    }

    pub async fn open_session(&self, id: &str) -> Result<MarketSession, MarketError> {
        let mut session = self.get_session(id).await?;
        session.status = session.status.transition(SessionStatus::Open)?;
        self.markets.update_session(&session).await?;
        tracing::info!("Market session {} opened", session.id);
        Ok(session)
    }

    /// # Logic
    /// 先校验状态迁移，再确认所有子市场的周期均已结算。
    pub async fn close_session(&self, id: &str) -> Result<MarketSession, MarketError> {
        let mut session = self.get_session(id).await?;
        let next = session.status.transition(SessionStatus::Closed)?;

        let unsettled = self.markets.count_unsettled_cycles(&session.id).await?;
        if unsettled > 0 {
            return Err(MarketError::Rejected(format!(
                "session {} still has {} unsettled cycle(s)",
                session.id, unsettled
            )));
        }

        session.status = next;
        self.markets.update_session(&session).await?;
        tracing::info!("Market session {} closed", session.id);
        Ok(session)
    }

    /// 只能删除尚未开始且没有子市场的场次
    pub async fn delete_session(&self, id: &str) -> Result<(), MarketError> {
        let session = self.get_session(id).await?;
        if session.status != SessionStatus::Scheduled {
            return Err(MarketError::Rejected(format!("session {} is {}", session.id, session.status)));
        }
        if !self.markets.list_sub_markets(&session.id).await?.is_empty() {
            return Err(MarketError::Rejected(format!("session {} still has sub markets", session.id)));
        }
        self.markets.delete_session(&session.id).await?;
        tracing::info!("Market session {} deleted", session.id);
        Ok(())
    }

    // --- 子市场 ---

    pub async fn create_sub_market(&self, session_id: &str, req: NewSubMarket) -> Result<SubMarket, MarketError> {
        let session = self.get_session(session_id).await?;
        if session.status == SessionStatus::Closed {
            return Err(MarketError::Rejected(format!("session {} is closed", session.id)));
        }
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(MarketError::InvalidInput("name is required".into()));
        }
        check_return_rate(req.return_rate)?;
        check_cycle_seconds(req.cycle_seconds)?;

        let sub = SubMarket {
            id: new_id(),
            session_id: session.id,
            name,
            return_rate: req.return_rate,
            cycle_seconds: req.cycle_seconds,
            status: SubMarketStatus::Active,
            created_at: self.clock.now(),
        };
        self.markets.create_sub_market(&sub).await?;
        tracing::info!("Sub market {} created in session {}", sub.id, sub.session_id);
        Ok(sub)
    }

    pub async fn get_sub_market(&self, id: &str) -> Result<SubMarket, MarketError> {
        self.markets
            .get_sub_market(id)
            .await?
            .ok_or_else(|| MarketError::SubMarketNotFound(id.to_string()))
    }

    pub async fn list_sub_markets(&self, session_id: &str) -> Result<Vec<SubMarket>, MarketError> {
        let session = self.get_session(session_id).await?;
        Ok(self.markets.list_sub_markets(&session.id).await?)
    }

    /// 修改收益率或周期长度，只影响之后开启的周期与新订单
    pub async fn update_sub_market(&self, id: &str, update: SubMarketUpdate) -> Result<SubMarket, MarketError> {
        let mut sub = self.get_sub_market(id).await?;
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(MarketError::InvalidInput("name must not be empty".into()));
            }
            sub.name = name;
        }
        if let Some(rate) = update.return_rate {
            sub.return_rate = check_return_rate(rate)?;
        }
        if let Some(secs) = update.cycle_seconds {
            sub.cycle_seconds = check_cycle_seconds(secs)?;
        }
        self.markets.update_sub_market(&sub).await?;
        Ok(sub)
    }

    pub async fn suspend_sub_market(&self, id: &str) -> Result<SubMarket, MarketError> {
        self.set_sub_market_status(id, SubMarketStatus::Suspended).await
    }

    pub async fn activate_sub_market(&self, id: &str) -> Result<SubMarket, MarketError> {
        self.set_sub_market_status(id, SubMarketStatus::Active).await
    }

    async fn set_sub_market_status(&self, id: &str, next: SubMarketStatus) -> Result<SubMarket, MarketError> {
        let mut sub = self.get_sub_market(id).await?;
        sub.status = sub.status.transition(next)?;
        self.markets.update_sub_market(&sub).await?;
        tracing::info!("Sub market {} is now {}", sub.id, sub.status);
        Ok(sub)
    }

    // --- 周期 ---

    /// # Summary
    /// 开启子市场的下一个周期。
    ///
    /// # Logic
    /// 1. 子市场须为 `Active`，所属场次须为 `Open`。
    /// 2. 上一周期须已结算；序号为上一周期加一。
    /// 3. 起始价取显式价格，否则取行情看板最新价。
    /// 4. 结束时间为当前时间加周期时长。
    pub async fn start_cycle(
        &self,
        sub_market_id: &str,
        start_price: Option<Decimal>,
    ) -> Result<SubMarketCycle, MarketError> {
        let sub = self.get_sub_market(sub_market_id).await?;
        if sub.status != SubMarketStatus::Active {
            return Err(MarketError::Rejected(format!("sub market {} is {}", sub.id, sub.status)));
        }
        let session = self.get_session(&sub.session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(MarketError::Rejected(format!("session {} is {}", session.id, session.status)));
        }

        let latest = self.markets.latest_cycle(&sub.id).await?;
        if let Some(prev) = &latest
            && prev.status != CycleStatus::Settled
        {
            return Err(MarketError::Rejected(format!(
                "cycle #{} of sub market {} is still {}",
                prev.sequence, sub.id, prev.status
            )));
        }

        let price = match start_price {
            Some(p) => p,
            None => self
                .quotes
                .latest_price(&session.symbol)
                .await
                .map_err(|e| MarketError::PriceUnavailable(format!("{}: {}", session.symbol, e)))?
                .ok_or_else(|| MarketError::PriceUnavailable(session.symbol.clone()))?,
        };
        if price <= Decimal::ZERO {
            return Err(MarketError::InvalidInput(format!("start price must be positive: {}", price)));
        }

        let now = self.clock.now();
        let cycle = SubMarketCycle {
            id: new_id(),
            sub_market_id: sub.id.clone(),
            sequence: latest.map_or(1, |c| c.sequence + 1),
            start_price: price,
            end_price: None,
            starts_at: now,
            ends_at: now + Duration::seconds(sub.cycle_seconds),
            status: CycleStatus::Open,
            settled_at: None,
        };
        self.markets.create_cycle(&cycle).await.map_err(from_store)?;
        tracing::info!("Cycle #{} of sub market {} started at {}", cycle.sequence, sub.id, price);
        Ok(cycle)
    }

    pub async fn get_cycle(&self, id: &str) -> Result<SubMarketCycle, MarketError> {
        self.markets
            .get_cycle(id)
            .await?
            .ok_or_else(|| MarketError::CycleNotFound(id.to_string()))
    }

    pub async fn list_cycles(&self, sub_market_id: &str) -> Result<Vec<SubMarketCycle>, MarketError> {
        let sub = self.get_sub_market(sub_market_id).await?;
        Ok(self.markets.list_cycles(&sub.id).await?)
    }

    /// 停止接收新订单
    pub async fn lock_cycle(&self, id: &str) -> Result<SubMarketCycle, MarketError> {
        let mut cycle = self.get_cycle(id).await?;
        let seen = cycle.status;
        cycle.status = seen.transition(CycleStatus::Locked)?;
        self.markets.update_cycle(&cycle, seen).await.map_err(from_store)?;
        tracing::info!("Cycle {} locked", cycle.id);
        Ok(cycle)
    }

    /// # Summary
    /// 以结束价结算周期及其下全部 `Pending` 订单。
    ///
    /// # Logic
    /// 1. 校验 `Settled` 迁移合法。
    /// 2. `Open` 周期先落为 `Locked`，阻止结算过程中的新订单。
    /// 3. 逐笔结算订单。中途失败时周期保持 `Locked`，重试只会处理剩余订单。
    /// 4. 写入结束价并标记为 `Settled`。
    pub async fn settle_cycle(&self, id: &str, end_price: Decimal) -> Result<CycleSettlement, MarketError> {
        if end_price <= Decimal::ZERO {
            return Err(MarketError::InvalidInput(format!("end price must be positive: {}", end_price)));
        }
        let mut cycle = self.get_cycle(id).await?;
        let settled = cycle.status.transition(CycleStatus::Settled)?;

        if cycle.status == CycleStatus::Open {
            cycle.status = CycleStatus::Locked;
            self.markets
                .update_cycle(&cycle, CycleStatus::Open)
                .await
                .map_err(from_store)?;
        }

        let summary = self
            .transactions
            .settle_cycle(&cycle.id, end_price)
            .await
            .map_err(from_trade)?;

        cycle.status = settled;
        cycle.end_price = Some(end_price);
        cycle.settled_at = Some(self.clock.now());
        self.markets
            .update_cycle(&cycle, CycleStatus::Locked)
            .await
            .map_err(from_store)?;

        tracing::info!(
            "Cycle {} settled at {}: {} transaction(s), payout {}",
            cycle.id,
            end_price,
            summary.settled,
            summary.total_payout
        );
        Ok(CycleSettlement { cycle, summary })
    }
}

fn check_return_rate(rate: Decimal) -> Result<Decimal, MarketError> {
    validate_return_rate(rate).map_err(|e| MarketError::InvalidInput(e.to_string()))
}

/// 唯一约束冲突或周期状态已被并发请求改变时视为业务拒绝
fn from_store(e: StoreError) -> MarketError {
    match e {
        StoreError::Conflict(msg) => MarketError::Rejected(msg),
        other => MarketError::Store(other),
    }
}

fn check_cycle_seconds(secs: i64) -> Result<i64, MarketError> {
    if !(MIN_CYCLE_SECONDS..=MAX_CYCLE_SECONDS).contains(&secs) {
        return Err(MarketError::InvalidInput(format!(
            "cycle_seconds must be within [{}, {}]: {}",
            MIN_CYCLE_SECONDS, MAX_CYCLE_SECONDS, secs
        )));
    }
    Ok(secs)
}

fn from_trade(e: TradeError) -> MarketError {
    match e {
        TradeError::Market(m) => m,
        TradeError::Store(s) => MarketError::Store(s),
        other => MarketError::Rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_input_bounds() {
        assert!(check_return_rate(dec!(0)).is_ok());
        assert!(check_return_rate(dec!(10)).is_ok());
        assert!(check_return_rate(dec!(10.01)).is_err());
        assert!(check_return_rate(dec!(-0.1)).is_err());
        assert!(check_cycle_seconds(9).is_err());
        assert!(check_cycle_seconds(60).is_ok());
        assert!(check_cycle_seconds(86_401).is_err());
    }
}
