use async_trait::async_trait;
use chrono::{DateTime, Utc};
use simtrade_core::content::entity::{CarouselItem, LeaderboardEntry, LeaderboardPeriod, Testimonial};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::ContentStore;
use sqlx::SqlitePool;

use crate::db::{db_err, parse_dec, parse_enum};

#[derive(sqlx::FromRow)]
struct TestimonialRow {
    id: String,
    author_name: String,
    author_title: Option<String>,
    content: String,
    avatar_url: Option<String>,
    rating: i64,
    is_published: bool,
    sort_order: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<TestimonialRow> for Testimonial {
    type Error = StoreError;

    fn try_from(r: TestimonialRow) -> Result<Self, Self::Error> {
        Ok(Testimonial {
            id: r.id,
            author_name: r.author_name,
            author_title: r.author_title,
            content: r.content,
            avatar_url: r.avatar_url,
            rating: u8::try_from(r.rating).map_err(|_| StoreError::Corrupted(format!("rating {}", r.rating)))?,
            is_published: r.is_published,
            sort_order: r.sort_order,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CarouselRow {
    id: String,
    title: String,
    subtitle: Option<String>,
    image_url: String,
    link_url: Option<String>,
    sort_order: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CarouselRow> for CarouselItem {
    fn from(r: CarouselRow) -> Self {
        CarouselItem {
            id: r.id,
            title: r.title,
            subtitle: r.subtitle,
            image_url: r.image_url,
            link_url: r.link_url,
            sort_order: r.sort_order,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LeaderboardRow {
    id: String,
    display_name: String,
    avatar_url: Option<String>,
    profit: String,
    win_rate: String,
    rank: i64,
    period: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaderboardRow> for LeaderboardEntry {
    type Error = StoreError;

    fn try_from(r: LeaderboardRow) -> Result<Self, Self::Error> {
        Ok(LeaderboardEntry {
            id: r.id,
            display_name: r.display_name,
            avatar_url: r.avatar_url,
            profit: parse_dec(&r.profit)?,
            win_rate: parse_dec(&r.win_rate)?,
            rank: r.rank,
            period: parse_enum(&r.period)?,
            created_at: r.created_at,
        })
    }
}

const TESTIMONIAL_SELECT: &str = "SELECT id, author_name, author_title, content, avatar_url, rating, is_published, sort_order, created_at FROM testimonials";
const CAROUSEL_SELECT: &str =
    "SELECT id, title, subtitle, image_url, link_url, sort_order, is_active, created_at FROM carousel_items";
const LEADERBOARD_SELECT: &str =
    "SELECT id, display_name, avatar_url, profit, win_rate, rank, period, created_at FROM leaderboard_entries";

async fn delete_by_id(pool: &SqlitePool, table: &str, label: &str, id: &str) -> Result<(), StoreError> {
    let res = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    if res.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} {}", label, id)));
    }
    Ok(())
}

/// # Summary
/// 首页内容 (评价、轮播、排行榜) 的 SQLite 实现。
///
/// `save_*` 按 id upsert，创建与编辑共用。
pub struct SqliteContentStore {
    pool: SqlitePool,
}

impl SqliteContentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn save_testimonial(&self, item: &Testimonial) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO testimonials (id, author_name, author_title, content, avatar_url, rating, is_published, sort_order, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 author_name = excluded.author_name,
                 author_title = excluded.author_title,
                 content = excluded.content,
                 avatar_url = excluded.avatar_url,
                 rating = excluded.rating,
                 is_published = excluded.is_published,
                 sort_order = excluded.sort_order"#,
        )
        .bind(&item.id)
        .bind(&item.author_name)
        .bind(&item.author_title)
        .bind(&item.content)
        .bind(&item.avatar_url)
        .bind(i64::from(item.rating))
        .bind(item.is_published)
        .bind(item.sort_order)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_testimonial(&self, id: &str) -> Result<Option<Testimonial>, StoreError> {
        sqlx::query_as::<_, TestimonialRow>(&format!("{} WHERE id = ?", TESTIMONIAL_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Testimonial::try_from)
            .transpose()
    }

    async fn delete_testimonial(&self, id: &str) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "testimonials", "testimonial", id).await
    }

    async fn list_testimonials(&self, published_only: bool) -> Result<Vec<Testimonial>, StoreError> {
        let sql = if published_only {
            format!("{} WHERE is_published = 1 ORDER BY sort_order ASC, created_at ASC", TESTIMONIAL_SELECT)
        } else {
            format!("{} ORDER BY sort_order ASC, created_at ASC", TESTIMONIAL_SELECT)
        };
        sqlx::query_as::<_, TestimonialRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Testimonial::try_from)
            .collect()
    }

    async fn save_carousel(&self, item: &CarouselItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO carousel_items (id, title, subtitle, image_url, link_url, sort_order, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 subtitle = excluded.subtitle,
                 image_url = excluded.image_url,
                 link_url = excluded.link_url,
                 sort_order = excluded.sort_order,
                 is_active = excluded.is_active"#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.subtitle)
        .bind(&item.image_url)
        .bind(&item.link_url)
        .bind(item.sort_order)
        .bind(item.is_active)
        .bind(item.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_carousel(&self, id: &str) -> Result<Option<CarouselItem>, StoreError> {
        let row = sqlx::query_as::<_, CarouselRow>(&format!("{} WHERE id = ?", CAROUSEL_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(CarouselItem::from))
    }

    async fn delete_carousel(&self, id: &str) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "carousel_items", "carousel item", id).await
    }

    async fn list_carousels(&self, active_only: bool) -> Result<Vec<CarouselItem>, StoreError> {
        let sql = if active_only {
            format!("{} WHERE is_active = 1 ORDER BY sort_order ASC, created_at ASC", CAROUSEL_SELECT)
        } else {
            format!("{} ORDER BY sort_order ASC, created_at ASC", CAROUSEL_SELECT)
        };
        let rows = sqlx::query_as::<_, CarouselRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(CarouselItem::from).collect())
    }

    async fn save_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO leaderboard_entries (id, display_name, avatar_url, profit, win_rate, rank, period, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 avatar_url = excluded.avatar_url,
                 profit = excluded.profit,
                 win_rate = excluded.win_rate,
                 rank = excluded.rank,
                 period = excluded.period"#,
        )
        .bind(&entry.id)
        .bind(&entry.display_name)
        .bind(&entry.avatar_url)
        .bind(entry.profit.to_string())
        .bind(entry.win_rate.to_string())
        .bind(entry.rank)
        .bind(entry.period.as_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_leaderboard_entry(&self, id: &str) -> Result<Option<LeaderboardEntry>, StoreError> {
        sqlx::query_as::<_, LeaderboardRow>(&format!("{} WHERE id = ?", LEADERBOARD_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(LeaderboardEntry::try_from)
            .transpose()
    }

    async fn delete_leaderboard_entry(&self, id: &str) -> Result<(), StoreError> {
        delete_by_id(&self.pool, "leaderboard_entries", "leaderboard entry", id).await
    }

    async fn list_leaderboard(&self, period: Option<LeaderboardPeriod>) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = match period {
            Some(p) => {
                sqlx::query_as::<_, LeaderboardRow>(&format!(
                    "{} WHERE period = ? ORDER BY rank ASC, created_at ASC",
                    LEADERBOARD_SELECT
                ))
                .bind(p.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, LeaderboardRow>(&format!("{} ORDER BY period ASC, rank ASC", LEADERBOARD_SELECT))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_err)?;

        rows.into_iter().map(LeaderboardEntry::try_from).collect()
    }
}
