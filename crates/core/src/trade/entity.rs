use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 模拟订单的预测方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Direction {
    /// 看涨：结算价高于开仓价获胜
    Up,
    /// 看跌：结算价低于开仓价获胜
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Up" => Ok(Direction::Up),
            "Down" => Ok(Direction::Down),
            _ => Err(format!("Unknown Direction: {}", s)),
        }
    }
}

/// # Summary
/// 模拟订单的生命周期状态。
///
/// # Invariants
/// - 只有 `Pending` 可以迁移，其余状态均为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionStatus {
    /// 已下单，等待结算
    Pending,
    /// 结算获胜
    Won,
    /// 结算亏损
    Lost,
    /// 平局，退还本金
    Draw,
    /// 已撤销，退还本金
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Won => "Won",
            TransactionStatus::Lost => "Lost",
            TransactionStatus::Draw => "Draw",
            TransactionStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(TransactionStatus::Pending),
            "Won" => Ok(TransactionStatus::Won),
            "Lost" => Ok(TransactionStatus::Lost),
            "Draw" => Ok(TransactionStatus::Draw),
            "Cancelled" => Ok(TransactionStatus::Cancelled),
            _ => Err(format!("Unknown TransactionStatus: {}", s)),
        }
    }
}

/// # Summary
/// 模拟订单 (Transaction) 聚合。
///
/// # Invariants
/// - `amount` 与 `entry_price` 严格为正。
/// - `return_rate` 位于 `[0, 10]`。
/// - `exit_price`、`payout`、`profit`、`settled_at` 只在结算或撤销后出现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    /// 关联的子市场周期 (自由单为空)
    pub cycle_id: Option<String>,
    pub symbol: String,
    pub direction: Direction,
    /// 下注本金
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    /// 获胜收益率 (0.85 表示赢得本金的 85%)
    pub return_rate: Decimal,
    pub status: TransactionStatus,
    /// 结算返还给用户的总金额 (含本金)
    pub payout: Option<Decimal>,
    /// 净盈亏
    pub profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// # Summary
/// 下单意图。价格与收益率可缺省，由 `TransactionService` 按周期或行情补全。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub cycle_id: Option<String>,
    pub symbol: Option<String>,
    pub direction: Direction,
    pub amount: Decimal,
    pub entry_price: Option<Decimal>,
    pub return_rate: Option<Decimal>,
}

/// # Summary
/// 订单列表过滤条件，各字段为空表示不过滤。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub user_id: Option<String>,
    pub cycle_id: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<TransactionStatus>,
}
