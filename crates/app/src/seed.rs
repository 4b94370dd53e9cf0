//! # 种子数据
//!
//! 每一类数据只在目标为空 (或缺失) 时写入，重复执行不会产生重复记录。

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use simtrade_api::routes::auth::hash_password;
use simtrade_api::server::AppState;
use simtrade_core::account::entity::{AdminRole, User, UserStatus};
use simtrade_core::common::{PageRequest, new_id};
use simtrade_core::content::entity::{CarouselItem, LeaderboardEntry, LeaderboardPeriod, Testimonial};
use simtrade_core::store::error::StoreError;
use simtrade_core::system::entity::{
    SETTING_DEFAULT_RETURN_RATE, SETTING_IP_WHITELIST_ENABLED, SETTING_SIGNUP_BONUS, SETTING_SITE_NAME, Setting,
};
use simtrade_trade::market::{NewSession, NewSubMarket};

use crate::accounts;

const DEMO_USER_PASSWORD: &str = "demo12345";
const DEMO_SYMBOL: &str = "BTCUSDT";

/// 默认系统设置：(键, 值, 描述)
const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    (SETTING_IP_WHITELIST_ENABLED, "false", "Restrict /admin and /transactions to whitelisted IPs"),
    (SETTING_SITE_NAME, "SimTrade", "Display name of the platform"),
    (SETTING_DEFAULT_RETURN_RATE, "0.85", "Default return rate for new sub markets"),
    (SETTING_SIGNUP_BONUS, "10000", "Simulated funds granted to new users"),
];

/// 本次执行实际写入的记录数
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub admins: usize,
    pub settings: usize,
    pub users: usize,
    pub sessions: usize,
    pub content: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.admins + self.settings + self.users + self.sessions + self.content
    }
}

/// # Summary
/// 写入初始数据。
///
/// # Logic
/// 1. 没有任何后台账号时，按配置创建超级管理员 (需首次改密)。
/// 2. 补齐缺失的默认设置，已存在的值不覆盖。
/// 3. 演示用户按用户名去重。
/// 4. 没有任何场次时创建一个演示场次及子市场。
/// 5. 评价 / 轮播 / 排行榜各自为空时写入样例。
pub async fn run(state: &AppState) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    if state.admins.list_admins().await?.is_empty() {
        let seed = &state.config.seed;
        accounts::create_admin(
            state.admins.as_ref(),
            &seed.admin_username,
            &seed.admin_password,
            AdminRole::SuperAdmin,
        )
        .await?;
        report.admins += 1;
    }

    for (key, value, description) in DEFAULT_SETTINGS {
        if state.settings.get_setting(key).await?.is_none() {
            state
                .settings
                .put_setting(&Setting {
                    key: (*key).to_string(),
                    value: (*value).to_string(),
                    description: Some((*description).to_string()),
                    updated_at: state.clock.now(),
                })
                .await?;
            report.settings += 1;
        }
    }

    report.users = seed_users(state).await?;
    report.sessions = seed_market(state).await?;
    report.content = seed_content(state).await?;

    tracing::info!("Seed finished: {:?}", report);
    Ok(report)
}

async fn seed_users(state: &AppState) -> anyhow::Result<usize> {
    let bonus = match state.settings.get_setting(SETTING_SIGNUP_BONUS).await? {
        Some(s) => s.value.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO),
        None => Decimal::ZERO,
    };

    let mut created = 0;
    for name in ["demo_alice", "demo_bob"] {
        let now = state.clock.now();
        let user = User {
            id: new_id(),
            email: format!("{}@demo.simtrade", name),
            username: name.to_string(),
            password_hash: hash_password(DEMO_USER_PASSWORD)?,
            balance: bonus,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        match state.users.create_user(&user).await {
            Ok(()) => created += 1,
            Err(StoreError::Conflict(_)) => tracing::debug!("Demo user {} already exists", name),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(created)
}

async fn seed_market(state: &AppState) -> anyhow::Result<usize> {
    if state.markets.list_sessions(PageRequest::new(1, 1)).await?.total > 0 {
        return Ok(0);
    }

    let now = state.clock.now();
    let session = state
        .markets
        .create_session(NewSession {
            name: "Demo Session".to_string(),
            symbol: DEMO_SYMBOL.to_string(),
            opens_at: now,
            closes_at: now + Duration::days(1),
        })
        .await?;

    let rate = match state.settings.get_setting(SETTING_DEFAULT_RETURN_RATE).await? {
        Some(s) => s.value.trim().parse::<Decimal>().unwrap_or(Decimal::new(85, 2)),
        None => Decimal::new(85, 2),
    };
    for (name, seconds) in [("1 Minute", 60), ("5 Minutes", 300)] {
        state
            .markets
            .create_sub_market(
                &session.id,
                NewSubMarket {
                    name: name.to_string(),
                    return_rate: rate,
                    cycle_seconds: seconds,
                },
            )
            .await?;
    }
    Ok(1)
}

async fn seed_content(state: &AppState) -> anyhow::Result<usize> {
    let mut created = 0;
    let now = Utc::now();

    if state.content.list_testimonials(false).await?.is_empty() {
        let samples = [
            ("Lena K.", "Day trader", "The practice rounds made the real thing far less scary."),
            ("Marco P.", "Student", "Clean interface, instant settlement. Great for learning."),
        ];
        for (i, (author, title, content)) in (0_i64..).zip(samples) {
            state
                .content
                .save_testimonial(&Testimonial {
                    id: new_id(),
                    author_name: author.to_string(),
                    author_title: Some(title.to_string()),
                    content: content.to_string(),
                    avatar_url: None,
                    rating: 5,
                    is_published: true,
                    sort_order: i,
                    created_at: now,
                })
                .await?;
            created += 1;
        }
    }

    if state.content.list_carousels(false).await?.is_empty() {
        state
            .content
            .save_carousel(&CarouselItem {
                id: new_id(),
                title: "Trade without risk".to_string(),
                subtitle: Some("Every new account starts with simulated funds".to_string()),
                image_url: "/uploads/banner-welcome.png".to_string(),
                link_url: None,
                sort_order: 0,
                is_active: true,
                created_at: now,
            })
            .await?;
        created += 1;
    }

    if state.content.list_leaderboard(None).await?.is_empty() {
        let rows = [
            ("WhaleWatcher", Decimal::new(1_284_050, 2), Decimal::new(72, 2)),
            ("SatoshiFan", Decimal::new(903_275, 2), Decimal::new(65, 2)),
            ("MoonShot", Decimal::new(410_000, 2), Decimal::new(58, 2)),
        ];
        for (rank, (name, profit, win_rate)) in (1_i64..).zip(rows) {
            state
                .content
                .save_leaderboard_entry(&LeaderboardEntry {
                    id: new_id(),
                    display_name: name.to_string(),
                    avatar_url: None,
                    profit,
                    win_rate,
                    rank,
                    period: LeaderboardPeriod::Weekly,
                    created_at: now,
                })
                .await?;
            created += 1;
        }
    }

    Ok(created)
}
