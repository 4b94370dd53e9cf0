use rust_decimal::Decimal;
use simtrade_core::account::entity::UserStatus;
use simtrade_core::common::time::TimeProvider;
use simtrade_core::common::{Page, PageRequest, new_id};
use simtrade_core::market::entity::SubMarketStatus;
use simtrade_core::market::error::MarketError;
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::{MarketStore, TransactionStore, UserStore};
use simtrade_core::trade::entity::{NewTransaction, Transaction, TransactionFilter, TransactionStatus};
use simtrade_core::trade::error::TradeError;
use simtrade_core::trade::settlement::{self, validate_return_rate};
use std::sync::Arc;

use crate::quote::{QuoteBoard, normalize_symbol};

/// # Summary
/// 一次批量结算 (例如周期结算) 的汇总结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    pub settled: u64,
    pub won: u64,
    pub lost: u64,
    pub draw: u64,
    /// 返还给用户的金额合计
    pub total_payout: Decimal,
}

/// # Summary
/// 模拟订单的生命周期服务：下单、结算、撤单与查询。
///
/// # Invariants
/// * 只有 `Pending` 订单可以结算或撤销，终态订单不可再变。
/// * 资金变动全部委托给 `TransactionStore`，与订单状态在同一数据库事务中落库。
pub struct TransactionService {
    users: Arc<dyn UserStore>,
    transactions: Arc<dyn TransactionStore>,
    markets: Arc<dyn MarketStore>,
    quotes: Arc<QuoteBoard>,
    clock: Arc<dyn TimeProvider>,
}

impl TransactionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        transactions: Arc<dyn TransactionStore>,
        markets: Arc<dyn MarketStore>,
        quotes: Arc<QuoteBoard>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            users,
            transactions,
            markets,
            quotes,
            clock,
        }
    }

    /// # Summary
    /// 创建一笔 `Pending` 订单并冻结 (扣除) 本金。
    ///
    /// # Logic
    /// 1. 校验金额与用户状态。
    /// 2. 挂周期的订单：周期须为 `Open`，子市场须为 `Active`；标的取场次标的。
    /// 3. 开仓价依次取：显式价格、周期起始价、行情看板最新价。
    /// 4. 收益率依次取：显式收益率、子市场收益率。
    /// 5. 扣款与写入订单在同一事务中完成。
    pub async fn place(&self, req: NewTransaction) -> Result<Transaction, TradeError> {
        if req.amount <= Decimal::ZERO {
            return Err(TradeError::InvalidInput(format!("amount must be positive: {}", req.amount)));
        }

        let user = self
            .users
            .get_user(&req.user_id)
            .await?
            .ok_or_else(|| TradeError::UserNotFound(req.user_id.clone()))?;
        if user.status != UserStatus::Active {
            return Err(TradeError::UserNotActive(format!("{} is {}", user.id, user.status)));
        }

        let (symbol, default_price, default_rate) = match &req.cycle_id {
            Some(cycle_id) => {
                let cycle = self
                    .markets
                    .get_cycle(cycle_id)
                    .await?
                    .ok_or_else(|| MarketError::CycleNotFound(cycle_id.clone()))?;
                if !cycle.status.accepts_orders() {
                    return Err(MarketError::Rejected(format!("cycle {} is {}", cycle.id, cycle.status)).into());
                }
                let sub = self
                    .markets
                    .get_sub_market(&cycle.sub_market_id)
                    .await?
                    .ok_or_else(|| MarketError::SubMarketNotFound(cycle.sub_market_id.clone()))?;
                if sub.status != SubMarketStatus::Active {
                    return Err(MarketError::Rejected(format!("sub market {} is {}", sub.id, sub.status)).into());
                }
                let session = self
                    .markets
                    .get_session(&sub.session_id)
                    .await?
                    .ok_or_else(|| MarketError::SessionNotFound(sub.session_id.clone()))?;

                if let Some(requested) = req.symbol.as_deref()
                    && normalize_symbol(requested) != session.symbol
                {
                    return Err(TradeError::InvalidInput(format!(
                        "symbol {} does not match cycle symbol {}",
                        requested, session.symbol
                    )));
                }
                (session.symbol, Some(cycle.start_price), Some(sub.return_rate))
            }
            None => {
                let symbol = req
                    .symbol
                    .as_deref()
                    .map(normalize_symbol)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| TradeError::InvalidInput("symbol is required without a cycle".into()))?;
                (symbol, None, None)
            }
        };

        let entry_price = match req.entry_price.or(default_price) {
            Some(p) => p,
            None => self
                .quotes
                .latest_price(&symbol)
                .await
                .map_err(|e| TradeError::PriceUnavailable(format!("{}: {}", symbol, e)))?
                .ok_or_else(|| TradeError::PriceUnavailable(symbol.clone()))?,
        };
        if entry_price <= Decimal::ZERO {
            return Err(TradeError::InvalidInput(format!("entry price must be positive: {}", entry_price)));
        }

        let return_rate = req
            .return_rate
            .or(default_rate)
            .ok_or_else(|| TradeError::InvalidInput("return_rate is required without a cycle".into()))?;
        validate_return_rate(return_rate)?;

        let tx = Transaction {
            id: new_id(),
            user_id: user.id,
            cycle_id: req.cycle_id,
            symbol,
            direction: req.direction,
            amount: req.amount,
            entry_price,
            exit_price: None,
            return_rate,
            status: TransactionStatus::Pending,
            payout: None,
            profit: None,
            created_at: self.clock.now(),
            settled_at: None,
        };

        self.transactions.place_transaction(&tx).await.map_err(map_store)?;
        tracing::info!(
            "Transaction {} placed: user={} {} {} amount={} entry={}",
            tx.id,
            tx.user_id,
            tx.symbol,
            tx.direction,
            tx.amount,
            tx.entry_price
        );
        Ok(tx)
    }

    /// # Summary
    /// 以给定结算价结算一笔 `Pending` 订单，返还金额入账。
    pub async fn settle(&self, id: &str, exit_price: Decimal) -> Result<Transaction, TradeError> {
        let tx = self.get(id).await?;
        self.settle_pending(tx, exit_price).await
    }

    async fn settle_pending(&self, mut tx: Transaction, exit_price: Decimal) -> Result<Transaction, TradeError> {
        if tx.status != TransactionStatus::Pending {
            return Err(TradeError::InvalidStatus(format!("transaction {} is {}", tx.id, tx.status)));
        }

        let outcome = settlement::settle(tx.direction, tx.amount, tx.entry_price, exit_price, tx.return_rate)?;
        tx.status = outcome.status;
        tx.exit_price = Some(exit_price);
        tx.payout = Some(outcome.payout);
        tx.profit = Some(outcome.profit);
        tx.settled_at = Some(self.clock.now());

        self.transactions.finalize_transaction(&tx).await.map_err(map_store)?;
        tracing::info!(
            "Transaction {} settled as {} (exit={}, payout={})",
            tx.id,
            tx.status,
            exit_price,
            outcome.payout
        );
        Ok(tx)
    }

    /// # Summary
    /// 撤销一笔 `Pending` 订单并全额退还本金。
    pub async fn cancel(&self, id: &str) -> Result<Transaction, TradeError> {
        let mut tx = self.get(id).await?;
        if tx.status != TransactionStatus::Pending {
            return Err(TradeError::InvalidStatus(format!("transaction {} is {}", tx.id, tx.status)));
        }

        tx.status = TransactionStatus::Cancelled;
        tx.payout = Some(tx.amount);
        tx.profit = Some(Decimal::ZERO);
        tx.settled_at = Some(self.clock.now());

        self.transactions.finalize_transaction(&tx).await.map_err(map_store)?;
        tracing::info!("Transaction {} cancelled, {} refunded", tx.id, tx.amount);
        Ok(tx)
    }

    /// # Summary
    /// 以统一结算价结算某周期下全部 `Pending` 订单。
    ///
    /// # Logic
    /// 并发撤单导致的状态冲突会被跳过，其余错误立即返回。
    pub async fn settle_cycle(&self, cycle_id: &str, exit_price: Decimal) -> Result<SettlementSummary, TradeError> {
        let pending = self.transactions.list_pending_by_cycle(cycle_id).await?;
        let mut summary = SettlementSummary::default();

        for tx in pending {
            let id = tx.id.clone();
            let settled = match self.settle_pending(tx, exit_price).await {
                Ok(t) => t,
                Err(TradeError::InvalidStatus(reason)) => {
                    tracing::warn!("Skipping transaction {} during cycle settlement: {}", id, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };

            summary.settled += 1;
            match settled.status {
                TransactionStatus::Won => summary.won += 1,
                TransactionStatus::Lost => summary.lost += 1,
                TransactionStatus::Draw => summary.draw += 1,
                _ => {}
            }
            summary.total_payout += settled.payout.unwrap_or_default();
        }

        Ok(summary)
    }

    pub async fn get(&self, id: &str) -> Result<Transaction, TradeError> {
        self.transactions
            .get_transaction(id)
            .await?
            .ok_or_else(|| TradeError::TransactionNotFound(id.to_string()))
    }

    pub async fn list(&self, filter: &TransactionFilter, page: PageRequest) -> Result<Page<Transaction>, TradeError> {
        Ok(self.transactions.list_transactions(filter, page).await?)
    }

    pub async fn list_for_user(&self, user_id: &str, page: PageRequest) -> Result<Page<Transaction>, TradeError> {
        if self.users.get_user(user_id).await?.is_none() {
            return Err(TradeError::UserNotFound(user_id.to_string()));
        }
        let filter = TransactionFilter {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };
        self.list(&filter, page).await
    }
}

/// 将存储层的业务性错误还原为交易错误
fn map_store(e: StoreError) -> TradeError {
    match e {
        StoreError::InsufficientBalance { required, actual } => TradeError::InsufficientBalance { required, actual },
        StoreError::Conflict(msg) => TradeError::InvalidStatus(msg),
        StoreError::NotFound(msg) => TradeError::UserNotFound(msg),
        other => TradeError::Store(other),
    }
}
