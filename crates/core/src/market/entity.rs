use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::MarketError;

/// # Summary
/// 交易场次状态。
///
/// # Invariants
/// - 只允许 `Scheduled -> Open -> Closed`，`Closed` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SessionStatus {
    Scheduled,
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "Scheduled",
            SessionStatus::Open => "Open",
            SessionStatus::Closed => "Closed",
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::Open) | (SessionStatus::Open, SessionStatus::Closed)
        )
    }

    /// 校验并返回目标状态
    pub fn transition(self, next: SessionStatus) -> Result<SessionStatus, MarketError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MarketError::InvalidTransition {
                entity: "MarketSession",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(SessionStatus::Scheduled),
            "Open" => Ok(SessionStatus::Open),
            "Closed" => Ok(SessionStatus::Closed),
            _ => Err(format!("Unknown SessionStatus: {}", s)),
        }
    }
}

/// # Summary
/// 子市场状态，两态之间可以自由切换。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SubMarketStatus {
    Active,
    Suspended,
}

impl SubMarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubMarketStatus::Active => "Active",
            SubMarketStatus::Suspended => "Suspended",
        }
    }

    pub fn transition(self, next: SubMarketStatus) -> Result<SubMarketStatus, MarketError> {
        if self == next {
            return Err(MarketError::InvalidTransition {
                entity: "SubMarket",
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }
}

impl std::fmt::Display for SubMarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubMarketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(SubMarketStatus::Active),
            "Suspended" => Ok(SubMarketStatus::Suspended),
            _ => Err(format!("Unknown SubMarketStatus: {}", s)),
        }
    }
}

/// # Summary
/// 子市场周期状态。
///
/// # Invariants
/// - `Open -> Locked -> Settled`，或直接 `Open -> Settled`。
/// - `Settled` 为终态。
/// - 只有 `Open` 周期接受新订单。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CycleStatus {
    Open,
    Locked,
    Settled,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Open => "Open",
            CycleStatus::Locked => "Locked",
            CycleStatus::Settled => "Settled",
        }
    }

    pub fn can_transition_to(&self, next: CycleStatus) -> bool {
        matches!(
            (self, next),
            (CycleStatus::Open, CycleStatus::Locked)
                | (CycleStatus::Open, CycleStatus::Settled)
                | (CycleStatus::Locked, CycleStatus::Settled)
        )
    }

    pub fn transition(self, next: CycleStatus) -> Result<CycleStatus, MarketError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MarketError::InvalidTransition {
                entity: "SubMarketCycle",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn accepts_orders(&self) -> bool {
        *self == CycleStatus::Open
    }
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(CycleStatus::Open),
            "Locked" => Ok(CycleStatus::Locked),
            "Settled" => Ok(CycleStatus::Settled),
            _ => Err(format!("Unknown CycleStatus: {}", s)),
        }
    }
}

/// # Summary
/// 交易场次，一个场次绑定一个交易标的。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSession {
    pub id: String,
    pub name: String,
    /// 交易标的，例如 `BTCUSDT`
    pub symbol: String,
    pub status: SessionStatus,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 场次下的子市场，定义收益率与周期长度。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMarket {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub return_rate: Decimal,
    /// 每个周期的时长 (秒)
    pub cycle_seconds: i64,
    pub status: SubMarketStatus,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 子市场的一个结算周期。
///
/// # Invariants
/// - 同一子市场内 `sequence` 单调递增。
/// - `end_price` 与 `settled_at` 只在 `Settled` 状态下存在。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubMarketCycle {
    pub id: String,
    pub sub_market_id: String,
    pub sequence: i64,
    pub start_price: Decimal,
    pub end_price: Option<Decimal>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub settled_at: Option<DateTime<Utc>>,
}

/// # Summary
/// 行情看板条目，仅存在于缓存中。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTicker {
    pub symbol: String,
    pub price: Decimal,
    /// 24 小时涨跌幅 (百分比)
    pub change_24h: Decimal,
    pub volume_24h: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_transitions() {
        assert_eq!(SessionStatus::Scheduled.transition(SessionStatus::Open).unwrap(), SessionStatus::Open);
        assert_eq!(SessionStatus::Open.transition(SessionStatus::Closed).unwrap(), SessionStatus::Closed);
        assert!(SessionStatus::Scheduled.transition(SessionStatus::Closed).is_err());
        assert!(SessionStatus::Closed.transition(SessionStatus::Open).is_err());
        assert!(SessionStatus::Open.transition(SessionStatus::Open).is_err());
    }

    #[test]
    fn test_cycle_transitions() {
        assert!(CycleStatus::Open.can_transition_to(CycleStatus::Locked));
        assert!(CycleStatus::Open.can_transition_to(CycleStatus::Settled));
        assert!(CycleStatus::Locked.can_transition_to(CycleStatus::Settled));
        assert!(!CycleStatus::Locked.can_transition_to(CycleStatus::Open));
        assert!(!CycleStatus::Settled.can_transition_to(CycleStatus::Locked));
        assert!(CycleStatus::Open.accepts_orders());
        assert!(!CycleStatus::Locked.accepts_orders());

        match CycleStatus::Settled.transition(CycleStatus::Settled) {
            Err(MarketError::InvalidTransition { entity, .. }) => assert_eq!(entity, "SubMarketCycle"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sub_market_toggle() {
        assert_eq!(
            SubMarketStatus::Active.transition(SubMarketStatus::Suspended).unwrap(),
            SubMarketStatus::Suspended
        );
        assert!(SubMarketStatus::Active.transition(SubMarketStatus::Active).is_err());
    }
}
