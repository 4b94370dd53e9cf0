//! # DTO (Data Transfer Object) 层
//!
//! 将内部领域模型转化为面向前端 JSON 输出的轻量结构体。
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。
//! 请求体的字段级约束集中在各自的 `Validate` 实现中，处理器在调用业务层前先行校验。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use simtrade_core::account::entity::{Admin, AdminRole, BalanceEntry, User, UserStatus};
use simtrade_core::common::{Page, PageRequest};
use simtrade_core::content::entity::{CarouselItem, LeaderboardEntry, LeaderboardPeriod, Testimonial};
use simtrade_core::market::entity::{
    CycleStatus, MarketSession, MarketTicker, SessionStatus, SubMarket, SubMarketCycle, SubMarketStatus,
};
use simtrade_core::system::entity::{IpWhitelistEntry, Setting};
use simtrade_core::trade::entity::{Direction, Transaction, TransactionStatus};
use simtrade_core::trade::settlement;
use simtrade_trade::market::{CycleSettlement, MAX_CYCLE_SECONDS, MIN_CYCLE_SECONDS};
use simtrade_trade::quote::normalize_symbol;
use std::net::IpAddr;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;

// ============================================================
//  通用响应 DTO
// ============================================================

/// 统一 API 响应包装器
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T: Serialize + ToSchema> {
    /// 是否成功
    pub success: bool,
    /// 数据载荷 (成功时)
    pub data: Option<T>,
    /// 错误信息 (失败时)
    pub error: Option<String>,
}

impl<T: Serialize + ToSchema> ApiResponse<T> {
    /// 构建成功响应
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// 构建失败响应 (不含泛型载荷)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 固定为 false
    pub success: bool,
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    /// 从错误信息构建
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageResponse<T: Serialize + ToSchema> {
    pub items: Vec<T>,
    /// 满足过滤条件的记录总数
    #[schema(example = 42)]
    pub total: u64,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub page_size: u32,
}

impl<T, U> From<Page<T>> for PageResponse<U>
where
    U: Serialize + ToSchema + From<T>,
{
    fn from(page: Page<T>) -> Self {
        let page = page.map(U::from);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
        }
    }
}

/// 通用分页查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 页码，从 1 开始
    pub page: Option<u32>,
    /// 每页条数，最大 100
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> PageRequest {
        let default = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(default.page),
            self.page_size.unwrap_or(default.page_size),
        )
    }
}

// ============================================================
//  请求体校验
// ============================================================

/// 请求体字段级校验
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// 用户名: 3~32 位字母、数字或下划线
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::BadRequest(format!(
            "username must be 3-32 characters of [A-Za-z0-9_]: {}",
            username
        )));
    }
    Ok(())
}

/// 邮箱: 含 `@`，且域名部分含 `.`
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::BadRequest(format!("invalid email: {}", email)));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters".into()));
    }
    Ok(())
}

fn validate_positive(field: &str, value: Decimal) -> Result<(), ApiError> {
    if value <= Decimal::ZERO {
        return Err(ApiError::BadRequest(format!("{} must be positive: {}", field, value)));
    }
    Ok(())
}

fn validate_return_rate(value: Decimal) -> Result<(), ApiError> {
    settlement::validate_return_rate(value)
        .map(|_| ())
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn validate_cycle_seconds(value: i64) -> Result<(), ApiError> {
    if !(MIN_CYCLE_SECONDS..=MAX_CYCLE_SECONDS).contains(&value) {
        return Err(ApiError::BadRequest(format!(
            "cycle_seconds must be between {} and {}: {}",
            MIN_CYCLE_SECONDS, MAX_CYCLE_SECONDS, value
        )));
    }
    Ok(())
}

fn validate_not_blank(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============================================================
//  鉴权 DTO
// ============================================================

/// 登录请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// 管理员用户名
    #[schema(example = "admin")]
    pub username: String,
    /// 密码
    #[schema(example = "password123")]
    pub password: String,
}

/// 登录 / 刷新成功返回的令牌对
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// JWT Access Token
    #[schema(example = "eyJhbGciOiJIUzI1NiIs...")]
    pub access_token: String,
    /// 不透明的刷新令牌，只能使用一次
    pub refresh_token: String,
    /// Access Token 有效期 (秒)
    #[schema(example = 900)]
    pub expires_in: u64,
    #[schema(example = "Bearer")]
    pub token_type: String,
}

/// 刷新 / 注销请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// 修改密码请求体
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// 原密码
    #[schema(example = "oldpassword123")]
    pub old_password: String,
    /// 新密码
    #[schema(example = "newSecurePwd!")]
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_password(&self.new_password)?;
        if self.new_password == self.old_password {
            return Err(ApiError::BadRequest("new password must differ from the old one".into()));
        }
        Ok(())
    }
}

/// JWT Claims 内容 (内部使用，不暴露到 Swagger)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 管理员 ID
    pub sub: String,
    /// 签发时的角色
    pub role: AdminRole,
    /// 签发时间 (Unix 时间戳)
    pub iat: u64,
    /// 过期时间 (Unix 时间戳)
    pub exp: u64,
}

// ============================================================
//  后台管理员 DTO
// ============================================================

/// 管理员信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminResponse {
    pub id: String,
    #[schema(example = "operator_01")]
    pub username: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub force_password_change: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AdminResponse {
    fn from(a: Admin) -> Self {
        Self {
            id: a.id,
            username: a.username,
            role: a.role,
            is_active: a.is_active,
            force_password_change: a.force_password_change,
            last_login_at: a.last_login_at,
            created_at: a.created_at,
        }
    }
}

/// 新建后台管理员 (仅超级管理员)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAdminRequest {
    #[schema(example = "operator_01")]
    pub username: String,
    /// 初始密码，首次登录后必须修改
    pub password: String,
    pub role: AdminRole,
}

impl Validate for CreateAdminRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_username(&self.username)?;
        validate_password(&self.password)
    }
}

/// 修改管理员角色或启用状态
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAdminRequest {
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
}

/// 重置管理员密码
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_password(&self.new_password)
    }
}

// ============================================================
//  平台用户 DTO
// ============================================================

/// 平台用户信息
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    #[schema(example = "trader@example.com")]
    pub email: String,
    #[schema(example = "trader_01")]
    pub username: String,
    /// 模拟资金余额
    #[schema(example = "10000.00")]
    pub balance: Decimal,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            balance: u.balance,
            status: u.status,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// 新建平台用户
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "trader@example.com")]
    pub email: String,
    #[schema(example = "trader_01")]
    pub username: String,
    pub password: String,
    /// 初始模拟资金，缺省取系统设置 `signup_bonus`
    pub initial_balance: Option<Decimal>,
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        if let Some(balance) = self.initial_balance
            && balance < Decimal::ZERO
        {
            return Err(ApiError::BadRequest(format!("initial_balance must not be negative: {}", balance)));
        }
        Ok(())
    }
}

/// 修改平台用户资料，字段为空表示不修改
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub status: Option<UserStatus>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(())
    }
}

/// 用户列表查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// 模糊匹配用户名或邮箱
    pub q: Option<String>,
    pub status: Option<UserStatus>,
}

/// 管理员调整用户余额
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceAdjustRequest {
    /// 变动金额，可为负
    #[schema(example = "500.00")]
    pub delta: Decimal,
    #[schema(example = "活动奖励")]
    pub reason: String,
}

impl Validate for BalanceAdjustRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.delta.is_zero() {
            return Err(ApiError::BadRequest("delta must not be zero".into()));
        }
        validate_not_blank("reason", &self.reason)
    }
}

/// 资金流水
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceEntryResponse {
    pub id: String,
    pub user_id: String,
    pub delta: Decimal,
    pub balance_after: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<BalanceEntry> for BalanceEntryResponse {
    fn from(e: BalanceEntry) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            delta: e.delta,
            balance_after: e.balance_after,
            reason: e.reason,
            created_at: e.created_at,
        }
    }
}

// ============================================================
//  模拟订单 DTO
// ============================================================

/// 模拟订单
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub user_id: String,
    pub cycle_id: Option<String>,
    #[schema(example = "BTCUSDT")]
    pub symbol: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    #[schema(example = "0.85")]
    pub return_rate: Decimal,
    pub status: TransactionStatus,
    pub payout: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            cycle_id: t.cycle_id,
            symbol: t.symbol,
            direction: t.direction,
            amount: t.amount,
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            return_rate: t.return_rate,
            status: t.status,
            payout: t.payout,
            profit: t.profit,
            created_at: t.created_at,
            settled_at: t.settled_at,
        }
    }
}

/// 代用户下单。挂周期的订单可省略标的、价格与收益率。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaceTransactionRequest {
    pub user_id: String,
    pub cycle_id: Option<String>,
    #[schema(example = "BTCUSDT")]
    pub symbol: Option<String>,
    pub direction: Direction,
    #[schema(example = "100")]
    pub amount: Decimal,
    pub entry_price: Option<Decimal>,
    pub return_rate: Option<Decimal>,
}

impl Validate for PlaceTransactionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("user_id", &self.user_id)?;
        validate_positive("amount", self.amount)?;
        if let Some(price) = self.entry_price {
            validate_positive("entry_price", price)?;
        }
        if let Some(rate) = self.return_rate {
            validate_return_rate(rate)?;
        }
        if self.cycle_id.is_none() && self.symbol.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(ApiError::BadRequest("symbol is required when cycle_id is absent".into()));
        }
        Ok(())
    }
}

/// 结算订单，`exit_price` 只在结算时出现
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettleTransactionRequest {
    #[schema(example = "67350.5")]
    pub exit_price: Decimal,
}

impl Validate for SettleTransactionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_positive("exit_price", self.exit_price)
    }
}

/// 订单列表查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub user_id: Option<String>,
    pub cycle_id: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<TransactionStatus>,
}

// ============================================================
//  场次 / 子市场 / 周期 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: String,
    #[schema(example = "BTC 夜盘")]
    pub name: String,
    #[schema(example = "BTCUSDT")]
    pub symbol: String,
    pub status: SessionStatus,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<MarketSession> for SessionResponse {
    fn from(s: MarketSession) -> Self {
        Self {
            id: s.id,
            name: s.name,
            symbol: s.symbol,
            status: s.status,
            opens_at: s.opens_at,
            closes_at: s.closes_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub name: String,
    #[schema(example = "BTCUSDT")]
    pub symbol: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl Validate for CreateSessionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("name", &self.name)?;
        validate_not_blank("symbol", &self.symbol)?;
        if self.closes_at <= self.opens_at {
            return Err(ApiError::BadRequest("closes_at must be later than opens_at".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubMarketResponse {
    pub id: String,
    pub session_id: String,
    #[schema(example = "60 秒")]
    pub name: String,
    pub return_rate: Decimal,
    pub cycle_seconds: i64,
    pub status: SubMarketStatus,
    pub created_at: DateTime<Utc>,
}

impl From<SubMarket> for SubMarketResponse {
    fn from(s: SubMarket) -> Self {
        Self {
            id: s.id,
            session_id: s.session_id,
            name: s.name,
            return_rate: s.return_rate,
            cycle_seconds: s.cycle_seconds,
            status: s.status,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSubMarketRequest {
    pub name: String,
    #[schema(example = "0.85")]
    pub return_rate: Decimal,
    #[schema(example = 60)]
    pub cycle_seconds: i64,
}

impl Validate for CreateSubMarketRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("name", &self.name)?;
        validate_return_rate(self.return_rate)?;
        validate_cycle_seconds(self.cycle_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubMarketRequest {
    pub name: Option<String>,
    pub return_rate: Option<Decimal>,
    pub cycle_seconds: Option<i64>,
}

impl Validate for UpdateSubMarketRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            validate_not_blank("name", name)?;
        }
        if let Some(rate) = self.return_rate {
            validate_return_rate(rate)?;
        }
        if let Some(seconds) = self.cycle_seconds {
            validate_cycle_seconds(seconds)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CycleResponse {
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

impl From<SubMarketCycle> for CycleResponse {
    fn from(c: SubMarketCycle) -> Self {
        Self {
            id: c.id,
            sub_market_id: c.sub_market_id,
            sequence: c.sequence,
            start_price: c.start_price,
            end_price: c.end_price,
            starts_at: c.starts_at,
            ends_at: c.ends_at,
            status: c.status,
            settled_at: c.settled_at,
        }
    }
}

/// 开启新周期，起始价缺省取行情看板
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StartCycleRequest {
    pub start_price: Option<Decimal>,
}

impl Validate for StartCycleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        match self.start_price {
            Some(price) => validate_positive("start_price", price),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettleCycleRequest {
    pub end_price: Decimal,
}

impl Validate for SettleCycleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_positive("end_price", self.end_price)
    }
}

/// 周期结算结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CycleSettlementResponse {
    pub cycle: CycleResponse,
    /// 本次结算的订单数
    pub settled: u64,
    pub won: u64,
    pub lost: u64,
    pub draw: u64,
    pub total_payout: Decimal,
}

impl From<CycleSettlement> for CycleSettlementResponse {
    fn from(s: CycleSettlement) -> Self {
        Self {
            cycle: s.cycle.into(),
            settled: s.summary.settled,
            won: s.summary.won,
            lost: s.summary.lost,
            draw: s.summary.draw,
            total_payout: s.summary.total_payout,
        }
    }
}

// ============================================================
//  行情看板 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TickerResponse {
    #[schema(example = "BTCUSDT")]
    pub symbol: String,
    #[schema(example = "67321.4")]
    pub price: Decimal,
    /// 24 小时涨跌幅 (百分比)
    #[schema(example = "-1.25")]
    pub change_24h: Decimal,
    pub volume_24h: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl From<MarketTicker> for TickerResponse {
    fn from(t: MarketTicker) -> Self {
        Self {
            symbol: t.symbol,
            price: t.price,
            change_24h: t.change_24h,
            volume_24h: t.volume_24h,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishTickerRequest {
    pub price: Decimal,
    #[serde(default)]
    pub change_24h: Decimal,
    #[serde(default)]
    pub volume_24h: Decimal,
}

impl Validate for PublishTickerRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_positive("price", self.price)?;
        if self.volume_24h < Decimal::ZERO {
            return Err(ApiError::BadRequest("volume_24h must not be negative".into()));
        }
        Ok(())
    }
}

impl PublishTickerRequest {
    pub fn into_ticker(self, symbol: &str, now: DateTime<Utc>) -> MarketTicker {
        MarketTicker {
            symbol: normalize_symbol(symbol),
            price: self.price,
            change_24h: self.change_24h,
            volume_24h: self.volume_24h,
            updated_at: now,
        }
    }
}

// ============================================================
//  CMS 内容 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestimonialResponse {
    pub id: String,
    pub author_name: String,
    pub author_title: Option<String>,
    pub content: String,
    pub avatar_url: Option<String>,
    #[schema(example = 5)]
    pub rating: u8,
    pub is_published: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Testimonial> for TestimonialResponse {
    fn from(t: Testimonial) -> Self {
        Self {
            id: t.id,
            author_name: t.author_name,
            author_title: t.author_title,
            content: t.content,
            avatar_url: t.avatar_url,
            rating: t.rating,
            is_published: t.is_published,
            sort_order: t.sort_order,
            created_at: t.created_at,
        }
    }
}

/// 新建或整体替换评价
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestimonialRequest {
    pub author_name: String,
    pub author_title: Option<String>,
    pub content: String,
    pub avatar_url: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub sort_order: i64,
}

impl Validate for TestimonialRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("author_name", &self.author_name)?;
        validate_not_blank("content", &self.content)?;
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::BadRequest(format!("rating must be between 1 and 5: {}", self.rating)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarouselResponse {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CarouselItem> for CarouselResponse {
    fn from(c: CarouselItem) -> Self {
        Self {
            id: c.id,
            title: c.title,
            subtitle: c.subtitle,
            image_url: c.image_url,
            link_url: c.link_url,
            sort_order: c.sort_order,
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarouselRequest {
    pub title: String,
    pub subtitle: Option<String>,
    /// 通常是上传接口返回的 `/uploads/...` 地址
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub is_active: bool,
}

impl Validate for CarouselRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("title", &self.title)?;
        validate_not_blank("image_url", &self.image_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntryResponse {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub profit: Decimal,
    /// 胜率 (百分比)
    pub win_rate: Decimal,
    pub rank: i64,
    pub period: LeaderboardPeriod,
    pub created_at: DateTime<Utc>,
}

impl From<LeaderboardEntry> for LeaderboardEntryResponse {
    fn from(e: LeaderboardEntry) -> Self {
        Self {
            id: e.id,
            display_name: e.display_name,
            avatar_url: e.avatar_url,
            profit: e.profit,
            win_rate: e.win_rate,
            rank: e.rank,
            period: e.period,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntryRequest {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub profit: Decimal,
    pub win_rate: Decimal,
    pub rank: i64,
    pub period: LeaderboardPeriod,
}

impl Validate for LeaderboardEntryRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_not_blank("display_name", &self.display_name)?;
        if self.win_rate < Decimal::ZERO || self.win_rate > Decimal::ONE_HUNDRED {
            return Err(ApiError::BadRequest(format!("win_rate must be between 0 and 100: {}", self.win_rate)));
        }
        if self.rank < 1 {
            return Err(ApiError::BadRequest(format!("rank must be at least 1: {}", self.rank)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    pub period: Option<LeaderboardPeriod>,
}

// ============================================================
//  系统设置 / IP 白名单 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingResponse {
    #[schema(example = "ip_whitelist_enabled")]
    pub key: String,
    #[schema(example = "false")]
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Setting> for SettingResponse {
    fn from(s: Setting) -> Self {
        Self {
            key: s.key,
            value: s.value,
            description: s.description,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PutSettingRequest {
    pub value: String,
    /// 为空时保留原有描述
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IpWhitelistResponse {
    pub id: String,
    #[schema(example = "203.0.113.7")]
    pub ip_address: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<IpWhitelistEntry> for IpWhitelistResponse {
    fn from(e: IpWhitelistEntry) -> Self {
        Self {
            id: e.id,
            ip_address: e.ip_address.to_string(),
            description: e.description,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IpWhitelistRequest {
    #[schema(example = "203.0.113.7")]
    pub ip_address: String,
    pub description: Option<String>,
}

impl IpWhitelistRequest {
    /// 解析为 IPv4 / IPv6 地址
    pub fn parse_ip(&self) -> Result<IpAddr, ApiError> {
        self.ip_address
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| ApiError::BadRequest(format!("invalid ip address: {}", self.ip_address)))
    }
}

// ============================================================
//  文件上传 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    /// 落盘文件名 `<uuid>.<ext>`
    pub filename: String,
    /// 可直接访问的相对地址
    #[schema(example = "/uploads/1b4e28ba-2fa1-11d2-883f-0016d3cca427.png")]
    pub url: String,
    pub content_type: String,
    pub size: u64,
}
