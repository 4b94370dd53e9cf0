//! # 结算算法
//!
//! 根据开仓价、结算价与方向判定输赢，并计算返还金额与净盈亏。
//! 本模块是纯函数，不涉及任何 I/O，资金的实际划转由存储层在同一个数据库事务中完成。

use rust_decimal::{Decimal, RoundingStrategy};

use super::entity::{Direction, TransactionStatus};
use super::error::TradeError;

/// 金额计算保留的小数位数
pub const AMOUNT_SCALE: u32 = 8;

/// 收益率上限
pub const MAX_RETURN_RATE: Decimal = Decimal::TEN;

/// # Summary
/// 单笔订单的结算结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOutcome {
    /// 终态，只可能是 `Won` / `Lost` / `Draw`
    pub status: TransactionStatus,
    /// 返还给用户的总金额 (含本金)
    pub payout: Decimal,
    /// 净盈亏
    pub profit: Decimal,
}

/// # Summary
/// 校验收益率位于 `[0, 10]`。
pub fn validate_return_rate(rate: Decimal) -> Result<Decimal, TradeError> {
    if rate < Decimal::ZERO || rate > MAX_RETURN_RATE {
        return Err(TradeError::InvalidReturnRate(rate));
    }
    Ok(rate)
}

/// # Summary
/// 计算一笔订单的结算结果。
///
/// # Logic
/// 1. `Up` 在 `exit > entry` 时获胜，`Down` 在 `exit < entry` 时获胜，价格相等为平局。
/// 2. 获胜：返还 `amount * (1 + return_rate)`，净盈亏 `amount * return_rate`。
/// 3. 亏损：返还 0，净盈亏 `-amount`。
/// 4. 平局：原额返还本金，净盈亏 0。
///
/// # Arguments
/// * `direction` - 预测方向
/// * `amount` - 下注本金，必须为正
/// * `entry_price` / `exit_price` - 开仓价与结算价，必须为正
/// * `return_rate` - 获胜收益率，`[0, 10]`
pub fn settle(
    direction: Direction,
    amount: Decimal,
    entry_price: Decimal,
    exit_price: Decimal,
    return_rate: Decimal,
) -> Result<SettlementOutcome, TradeError> {
    if amount <= Decimal::ZERO {
        return Err(TradeError::InvalidInput(format!("amount must be positive: {}", amount)));
    }
    if entry_price <= Decimal::ZERO || exit_price <= Decimal::ZERO {
        return Err(TradeError::InvalidInput(format!(
            "prices must be positive: entry={}, exit={}",
            entry_price, exit_price
        )));
    }
    validate_return_rate(return_rate)?;

    let status = match exit_price.cmp(&entry_price) {
        std::cmp::Ordering::Equal => TransactionStatus::Draw,
        std::cmp::Ordering::Greater if direction == Direction::Up => TransactionStatus::Won,
        std::cmp::Ordering::Less if direction == Direction::Down => TransactionStatus::Won,
        _ => TransactionStatus::Lost,
    };

    let (payout, profit) = match status {
        TransactionStatus::Won => {
            let gain = round_amount(amount * return_rate);
            (amount + gain, gain)
        }
        TransactionStatus::Draw => (amount, Decimal::ZERO),
        _ => (Decimal::ZERO, -amount),
    };

    Ok(SettlementOutcome {
        status,
        payout: round_amount(payout),
        profit: round_amount(profit),
    })
}

fn round_amount(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_up_wins_when_price_rises() {
        let out = settle(Direction::Up, dec!(100), dec!(50000), dec!(50100), dec!(0.85)).unwrap();
        assert_eq!(out.status, TransactionStatus::Won);
        assert_eq!(out.payout, dec!(185));
        assert_eq!(out.profit, dec!(85));
    }

    #[test]
    fn test_up_loses_when_price_falls() {
        let out = settle(Direction::Up, dec!(100), dec!(50000), dec!(49999.5), dec!(0.85)).unwrap();
        assert_eq!(out.status, TransactionStatus::Lost);
        assert_eq!(out.payout, dec!(0));
        assert_eq!(out.profit, dec!(-100));
    }

    #[test]
    fn test_down_wins_when_price_falls() {
        let out = settle(Direction::Down, dec!(40), dec!(2.5), dec!(2.4), dec!(1.5)).unwrap();
        assert_eq!(out.status, TransactionStatus::Won);
        assert_eq!(out.payout, dec!(100));
        assert_eq!(out.profit, dec!(60));
    }

    #[test]
    fn test_equal_price_is_draw() {
        let out = settle(Direction::Down, dec!(12.5), dec!(3000), dec!(3000), dec!(9)).unwrap();
        assert_eq!(out.status, TransactionStatus::Draw);
        assert_eq!(out.payout, dec!(12.5));
        assert_eq!(out.profit, dec!(0));
    }

    #[test]
    fn test_zero_return_rate_wins_nothing_extra() {
        let out = settle(Direction::Up, dec!(10), dec!(1), dec!(2), dec!(0)).unwrap();
        assert_eq!(out.status, TransactionStatus::Won);
        assert_eq!(out.payout, dec!(10));
        assert_eq!(out.profit, dec!(0));
    }

    #[test]
    fn test_payout_rounded_to_eight_places() {
        let out = settle(Direction::Up, dec!(0.333333333), dec!(1), dec!(2), dec!(0.5)).unwrap();
        assert_eq!(out.profit, dec!(0.16666667));
    }

    #[test]
    fn test_return_rate_bounds() {
        assert!(validate_return_rate(dec!(0)).is_ok());
        assert!(validate_return_rate(dec!(10)).is_ok());
        assert!(matches!(
            validate_return_rate(dec!(10.01)),
            Err(TradeError::InvalidReturnRate(_))
        ));
        assert!(validate_return_rate(dec!(-0.1)).is_err());
        assert!(settle(Direction::Up, dec!(1), dec!(1), dec!(2), dec!(11)).is_err());
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(settle(Direction::Up, dec!(0), dec!(1), dec!(2), dec!(1)).is_err());
        assert!(settle(Direction::Up, dec!(1), dec!(0), dec!(2), dec!(1)).is_err());
        assert!(settle(Direction::Up, dec!(1), dec!(1), dec!(-2), dec!(1)).is_err());
    }
}
