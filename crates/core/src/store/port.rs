use super::error::StoreError;
use crate::account::entity::{Admin, BalanceEntry, User, UserStatus};
use crate::common::{Page, PageRequest};
use crate::content::entity::{CarouselItem, LeaderboardEntry, LeaderboardPeriod, Testimonial};
use crate::market::entity::{CycleStatus, MarketSession, SubMarket, SubMarketCycle};
use crate::system::entity::{IpWhitelistEntry, RefreshToken, Setting};
use crate::trade::entity::{Transaction, TransactionFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::net::IpAddr;

/// # Summary
/// 用户列表过滤条件。
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// 模糊匹配 `username` 或 `email`
    pub query: Option<String>,
    pub status: Option<UserStatus>,
}

/// # Summary
/// 平台用户存储接口。
///
/// # Invariants
/// - 余额只能通过 `adjust_balance` 或交易端口修改，`update_user` 不触碰余额。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// # Summary
    /// 新建用户。
    ///
    /// # Logic
    /// 插入 `users` 表，若初始余额非零则同时写入一条开户流水。
    ///
    /// # Returns
    /// `email` 或 `username` 重复时返回 `StoreError::Conflict`。
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// 根据 ID 获取用户
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// # Summary
    /// 更新用户资料与状态 (不含余额)。
    ///
    /// # Returns
    /// 用户不存在返回 `StoreError::NotFound`。
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// # Summary
    /// 删除用户，连同其资金流水 (如后台调账记录)。
    ///
    /// # Returns
    /// 仍有关联订单时外键约束失败，返回 `StoreError::Conflict`，流水保持不变。
    async fn delete_user(&self, id: &str) -> Result<(), StoreError>;

    /// 分页查询用户，按创建时间倒序
    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, StoreError>;

    /// # Summary
    /// 原子地调整用户余额并记录流水。
    ///
    /// # Logic
    /// 1. 在同一数据库事务内读取余额。
    /// 2. 校验 `balance + delta >= 0`。
    /// 3. 写回余额并追加 `balance_ledger` 记录。
    ///
    /// # Arguments
    /// * `user_id`: 用户 ID。
    /// * `delta`: 变动金额，可为负。
    /// * `reason`: 流水备注。
    ///
    /// # Returns
    /// 新写入的流水；余额不足返回 `StoreError::InsufficientBalance`。
    async fn adjust_balance(
        &self,
        user_id: &str,
        delta: Decimal,
        reason: &str,
    ) -> Result<BalanceEntry, StoreError>;

    /// 分页查询用户资金流水，按时间倒序
    async fn list_ledger(&self, user_id: &str, page: PageRequest) -> Result<Page<BalanceEntry>, StoreError>;
}

/// # Summary
/// 后台管理员账号存储接口。
#[async_trait]
pub trait AdminStore: Send + Sync {
    /// 新建管理员，`username` 重复返回 `StoreError::Conflict`
    async fn create_admin(&self, admin: &Admin) -> Result<(), StoreError>;
    async fn get_admin(&self, id: &str) -> Result<Option<Admin>, StoreError>;
    async fn get_admin_by_username(&self, username: &str) -> Result<Option<Admin>, StoreError>;
    /// 整体覆盖写入管理员记录
    async fn update_admin(&self, admin: &Admin) -> Result<(), StoreError>;
    async fn delete_admin(&self, id: &str) -> Result<(), StoreError>;
    async fn list_admins(&self) -> Result<Vec<Admin>, StoreError>;
    /// 统计处于启用状态的超级管理员数量
    async fn count_active_super_admins(&self) -> Result<u64, StoreError>;
}

/// # Summary
/// 模拟订单存储接口。
///
/// # Invariants
/// - 扣款与落单、结算与返款必须分别处于同一个数据库事务中。
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// # Summary
    /// 扣除本金并写入一笔 `Pending` 订单。
    ///
    /// # Logic
    /// 1. 开启事务，插入订单。挂在周期上的订单仅当该周期仍为 `Open` 时写入。
    /// 2. 读取用户余额，不足则回滚并返回 `StoreError::InsufficientBalance`。
    /// 3. 扣减余额、写入流水后提交。
    ///
    /// # Returns
    /// 本次扣款产生的流水记录。周期不存在或已停止接单时返回 `StoreError::Conflict`。
    async fn place_transaction(&self, tx: &Transaction) -> Result<BalanceEntry, StoreError>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    /// 分页查询订单，按创建时间倒序
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, StoreError>;

    /// 查询某周期下所有 `Pending` 订单
    async fn list_pending_by_cycle(&self, cycle_id: &str) -> Result<Vec<Transaction>, StoreError>;

    /// # Summary
    /// 将 `Pending` 订单写为终态并返款。
    ///
    /// # Logic
    /// 1. 以 `status = 'Pending'` 为条件更新订单，影响行数为 0 视为并发冲突。
    /// 2. `payout > 0` 时在同一事务内给用户入账并记流水。
    ///
    /// # Arguments
    /// * `tx`: 已经填好终态、`payout`、`profit`、`settled_at` 的订单。
    ///
    /// # Returns
    /// 订单已不是 `Pending` 时返回 `StoreError::Conflict`。
    async fn finalize_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;
}

/// # Summary
/// 场次 / 子市场 / 周期存储接口。
#[async_trait]
pub trait MarketStore: Send + Sync {
    // --- 场次 ---
    async fn create_session(&self, session: &MarketSession) -> Result<(), StoreError>;
    async fn get_session(&self, id: &str) -> Result<Option<MarketSession>, StoreError>;
    async fn update_session(&self, session: &MarketSession) -> Result<(), StoreError>;
    /// 仍有子市场时外键约束失败，返回 `StoreError::Conflict`
    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;
    async fn list_sessions(&self, page: PageRequest) -> Result<Page<MarketSession>, StoreError>;

    // --- 子市场 ---
    async fn create_sub_market(&self, sub_market: &SubMarket) -> Result<(), StoreError>;
    async fn get_sub_market(&self, id: &str) -> Result<Option<SubMarket>, StoreError>;
    async fn update_sub_market(&self, sub_market: &SubMarket) -> Result<(), StoreError>;
    async fn list_sub_markets(&self, session_id: &str) -> Result<Vec<SubMarket>, StoreError>;

    // --- 周期 ---
    async fn create_cycle(&self, cycle: &SubMarketCycle) -> Result<(), StoreError>;
    async fn get_cycle(&self, id: &str) -> Result<Option<SubMarketCycle>, StoreError>;
    /// # Summary
    /// 以比较并交换的方式更新周期。
    ///
    /// # Arguments
    /// * `cycle`: 新的周期状态。
    /// * `expected`: 读取时看到的状态，库中状态不同则放弃写入。
    ///
    /// # Returns
    /// 状态已被其他请求改变时返回 `StoreError::Conflict`。
    async fn update_cycle(&self, cycle: &SubMarketCycle, expected: CycleStatus) -> Result<(), StoreError>;
    /// 按 `sequence` 倒序
    async fn list_cycles(&self, sub_market_id: &str) -> Result<Vec<SubMarketCycle>, StoreError>;
    /// 子市场最近一个周期 (sequence 最大)
    async fn latest_cycle(&self, sub_market_id: &str) -> Result<Option<SubMarketCycle>, StoreError>;
    /// 统计场次下尚未结算的周期数量
    async fn count_unsettled_cycles(&self, session_id: &str) -> Result<u64, StoreError>;
}

/// # Summary
/// CMS 内容存储接口。
#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- 评价 ---
    async fn save_testimonial(&self, item: &Testimonial) -> Result<(), StoreError>;
    async fn get_testimonial(&self, id: &str) -> Result<Option<Testimonial>, StoreError>;
    async fn delete_testimonial(&self, id: &str) -> Result<(), StoreError>;
    /// 按 `sort_order` 升序；`published_only` 为真时只返回已发布条目
    async fn list_testimonials(&self, published_only: bool) -> Result<Vec<Testimonial>, StoreError>;

    // --- 轮播 ---
    async fn save_carousel(&self, item: &CarouselItem) -> Result<(), StoreError>;
    async fn get_carousel(&self, id: &str) -> Result<Option<CarouselItem>, StoreError>;
    async fn delete_carousel(&self, id: &str) -> Result<(), StoreError>;
    async fn list_carousels(&self, active_only: bool) -> Result<Vec<CarouselItem>, StoreError>;

    // --- 排行榜 ---
    async fn save_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<(), StoreError>;
    async fn get_leaderboard_entry(&self, id: &str) -> Result<Option<LeaderboardEntry>, StoreError>;
    async fn delete_leaderboard_entry(&self, id: &str) -> Result<(), StoreError>;
    /// 按 `rank` 升序
    async fn list_leaderboard(&self, period: Option<LeaderboardPeriod>) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// # Summary
/// 系统设置与 IP 白名单存储接口。
#[async_trait]
pub trait SettingStore: Send + Sync {
    async fn list_settings(&self) -> Result<Vec<Setting>, StoreError>;
    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, StoreError>;
    /// Upsert
    async fn put_setting(&self, setting: &Setting) -> Result<(), StoreError>;
    async fn delete_setting(&self, key: &str) -> Result<(), StoreError>;

    async fn list_whitelist(&self) -> Result<Vec<IpWhitelistEntry>, StoreError>;
    /// 同一 IP 重复添加返回 `StoreError::Conflict`
    async fn add_whitelist(&self, entry: &IpWhitelistEntry) -> Result<(), StoreError>;
    async fn delete_whitelist(&self, id: &str) -> Result<(), StoreError>;
    async fn is_whitelisted(&self, ip: IpAddr) -> Result<bool, StoreError>;
}

/// # Summary
/// 刷新令牌存储接口。
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;
    async fn find_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>, StoreError>;

    /// # Summary
    /// 吊销单个令牌。
    ///
    /// # Returns
    /// 令牌此前未被吊销返回 `true`。并发刷新时只有一个调用方能拿到 `true`。
    async fn revoke_refresh_token(&self, id: &str, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// 吊销某管理员名下所有有效令牌，返回吊销数量
    async fn revoke_all_for_admin(&self, admin_id: &str, at: DateTime<Utc>) -> Result<u64, StoreError>;

    /// 删除已过期的令牌，返回删除数量
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
