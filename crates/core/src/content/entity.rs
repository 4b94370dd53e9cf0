use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 用户评价 (首页展示)。
///
/// # Invariants
/// - `rating` 位于 `1..=5`。
/// - 只有 `is_published` 的评价对外展示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: String,
    pub author_name: String,
    pub author_title: Option<String>,
    pub content: String,
    pub avatar_url: Option<String>,
    pub rating: u8,
    pub is_published: bool,
    /// 升序排列
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 首页轮播条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarouselItem {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 排行榜统计周期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LeaderboardPeriod {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardPeriod::Daily => "Daily",
            LeaderboardPeriod::Weekly => "Weekly",
            LeaderboardPeriod::Monthly => "Monthly",
            LeaderboardPeriod::AllTime => "AllTime",
        }
    }
}

impl std::fmt::Display for LeaderboardPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeaderboardPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Daily" => Ok(LeaderboardPeriod::Daily),
            "Weekly" => Ok(LeaderboardPeriod::Weekly),
            "Monthly" => Ok(LeaderboardPeriod::Monthly),
            "AllTime" => Ok(LeaderboardPeriod::AllTime),
            _ => Err(format!("Unknown LeaderboardPeriod: {}", s)),
        }
    }
}

/// # Summary
/// 排行榜条目，由运营手工维护。
///
/// # Invariants
/// - `rank >= 1`，`win_rate` 位于 `[0, 100]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub profit: Decimal,
    pub win_rate: Decimal,
    pub rank: i64,
    pub period: LeaderboardPeriod,
    pub created_at: DateTime<Utc>,
}
