//! # CMS 内容路由
//!
//! 评价、轮播、排行榜的后台维护接口，以及前台展示用的只读公开接口。

use axum::Json;
use axum::extract::{Path, Query, State};
use simtrade_core::common::new_id;
use simtrade_core::content::entity::{CarouselItem, LeaderboardEntry, Testimonial};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CarouselRequest, CarouselResponse, LeaderboardEntryRequest, LeaderboardEntryResponse,
    LeaderboardQuery, TestimonialRequest, TestimonialResponse, Validate,
};

fn not_found(kind: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{} {} not found", kind, id))
}

// ============================================================
//  公开接口
// ============================================================

/// 已发布的评价
#[utoipa::path(
    get,
    path = "/content/testimonials",
    tag = "公开内容 (Public)",
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<TestimonialResponse>>))
)]
pub async fn public_testimonials(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TestimonialResponse>>>, ApiError> {
    let items = state.content.list_testimonials(true).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

/// 启用中的轮播
#[utoipa::path(
    get,
    path = "/content/carousels",
    tag = "公开内容 (Public)",
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<CarouselResponse>>))
)]
pub async fn public_carousels(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CarouselResponse>>>, ApiError> {
    let items = state.content.list_carousels(true).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

/// 排行榜，可按统计周期过滤
#[utoipa::path(
    get,
    path = "/content/leaderboard",
    tag = "公开内容 (Public)",
    params(LeaderboardQuery),
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<LeaderboardEntryResponse>>))
)]
pub async fn public_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntryResponse>>>, ApiError> {
    let items = state.content.list_leaderboard(query.period).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

// ============================================================
//  评价
// ============================================================

/// 全部评价 (含未发布)
#[utoipa::path(
    get,
    path = "/admin/testimonials",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<TestimonialResponse>>))
)]
pub async fn list_testimonials(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TestimonialResponse>>>, ApiError> {
    let items = state.content.list_testimonials(false).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/admin/testimonials",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    request_body = TestimonialRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<TestimonialResponse>),
        (status = 400, description = "无效的请求参数")
    )
)]
pub async fn create_testimonial(
    State(state): State<AppState>,
    Json(req): Json<TestimonialRequest>,
) -> Result<Json<ApiResponse<TestimonialResponse>>, ApiError> {
    req.validate()?;
    let item = Testimonial {
        id: new_id(),
        author_name: req.author_name,
        author_title: req.author_title,
        content: req.content,
        avatar_url: req.avatar_url,
        rating: req.rating,
        is_published: req.is_published,
        sort_order: req.sort_order,
        created_at: state.clock.now(),
    };
    state.content.save_testimonial(&item).await?;
    Ok(Json(ApiResponse::ok(item.into())))
}

#[utoipa::path(
    get,
    path = "/admin/testimonials/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "评价 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<TestimonialResponse>),
        (status = 404, description = "评价不存在")
    )
)]
pub async fn get_testimonial(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TestimonialResponse>>, ApiError> {
    let item = state
        .content
        .get_testimonial(&id)
        .await?
        .ok_or_else(|| not_found("Testimonial", &id))?;
    Ok(Json(ApiResponse::ok(item.into())))
}

/// 整体替换评价内容
#[utoipa::path(
    put,
    path = "/admin/testimonials/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "评价 ID")),
    request_body = TestimonialRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<TestimonialResponse>),
        (status = 404, description = "评价不存在")
    )
)]
pub async fn update_testimonial(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TestimonialRequest>,
) -> Result<Json<ApiResponse<TestimonialResponse>>, ApiError> {
    req.validate()?;
    let existing = state
        .content
        .get_testimonial(&id)
        .await?
        .ok_or_else(|| not_found("Testimonial", &id))?;
    let item = Testimonial {
        id: existing.id,
        author_name: req.author_name,
        author_title: req.author_title,
        content: req.content,
        avatar_url: req.avatar_url,
        rating: req.rating,
        is_published: req.is_published,
        sort_order: req.sort_order,
        created_at: existing.created_at,
    };
    state.content.save_testimonial(&item).await?;
    Ok(Json(ApiResponse::ok(item.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/testimonials/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "评价 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "评价不存在")
    )
)]
pub async fn delete_testimonial(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.content.delete_testimonial(&id).await?;
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

// ============================================================
//  轮播
// ============================================================

/// 全部轮播 (含未启用)
#[utoipa::path(
    get,
    path = "/admin/carousels",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<CarouselResponse>>))
)]
pub async fn list_carousels(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CarouselResponse>>>, ApiError> {
    let items = state.content.list_carousels(false).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/admin/carousels",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    request_body = CarouselRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<CarouselResponse>),
        (status = 400, description = "无效的请求参数")
    )
)]
pub async fn create_carousel(
    State(state): State<AppState>,
    Json(req): Json<CarouselRequest>,
) -> Result<Json<ApiResponse<CarouselResponse>>, ApiError> {
    req.validate()?;
    let item = CarouselItem {
        id: new_id(),
        title: req.title,
        subtitle: req.subtitle,
        image_url: req.image_url,
        link_url: req.link_url,
        sort_order: req.sort_order,
        is_active: req.is_active,
        created_at: state.clock.now(),
    };
    state.content.save_carousel(&item).await?;
    Ok(Json(ApiResponse::ok(item.into())))
}

#[utoipa::path(
    get,
    path = "/admin/carousels/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "轮播 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<CarouselResponse>),
        (status = 404, description = "轮播不存在")
    )
)]
pub async fn get_carousel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CarouselResponse>>, ApiError> {
    let item = state
        .content
        .get_carousel(&id)
        .await?
        .ok_or_else(|| not_found("Carousel", &id))?;
    Ok(Json(ApiResponse::ok(item.into())))
}

#[utoipa::path(
    put,
    path = "/admin/carousels/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "轮播 ID")),
    request_body = CarouselRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<CarouselResponse>),
        (status = 404, description = "轮播不存在")
    )
)]
pub async fn update_carousel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CarouselRequest>,
) -> Result<Json<ApiResponse<CarouselResponse>>, ApiError> {
    req.validate()?;
    let existing = state
        .content
        .get_carousel(&id)
        .await?
        .ok_or_else(|| not_found("Carousel", &id))?;
    let item = CarouselItem {
        id: existing.id,
        title: req.title,
        subtitle: req.subtitle,
        image_url: req.image_url,
        link_url: req.link_url,
        sort_order: req.sort_order,
        is_active: req.is_active,
        created_at: existing.created_at,
    };
    state.content.save_carousel(&item).await?;
    Ok(Json(ApiResponse::ok(item.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/carousels/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "轮播 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "轮播不存在")
    )
)]
pub async fn delete_carousel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.content.delete_carousel(&id).await?;
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

// ============================================================
//  排行榜
// ============================================================

#[utoipa::path(
    get,
    path = "/admin/leaderboard",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(LeaderboardQuery),
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<LeaderboardEntryResponse>>))
)]
pub async fn list_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntryResponse>>>, ApiError> {
    let items = state.content.list_leaderboard(query.period).await?;
    Ok(Json(ApiResponse::ok(items.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/admin/leaderboard",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    request_body = LeaderboardEntryRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<LeaderboardEntryResponse>),
        (status = 400, description = "无效的请求参数")
    )
)]
pub async fn create_leaderboard_entry(
    State(state): State<AppState>,
    Json(req): Json<LeaderboardEntryRequest>,
) -> Result<Json<ApiResponse<LeaderboardEntryResponse>>, ApiError> {
    req.validate()?;
    let entry = LeaderboardEntry {
        id: new_id(),
        display_name: req.display_name,
        avatar_url: req.avatar_url,
        profit: req.profit,
        win_rate: req.win_rate,
        rank: req.rank,
        period: req.period,
        created_at: state.clock.now(),
    };
    state.content.save_leaderboard_entry(&entry).await?;
    Ok(Json(ApiResponse::ok(entry.into())))
}

#[utoipa::path(
    get,
    path = "/admin/leaderboard/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "排行榜条目 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<LeaderboardEntryResponse>),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn get_leaderboard_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LeaderboardEntryResponse>>, ApiError> {
    let entry = state
        .content
        .get_leaderboard_entry(&id)
        .await?
        .ok_or_else(|| not_found("Leaderboard entry", &id))?;
    Ok(Json(ApiResponse::ok(entry.into())))
}

#[utoipa::path(
    put,
    path = "/admin/leaderboard/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "排行榜条目 ID")),
    request_body = LeaderboardEntryRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<LeaderboardEntryResponse>),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn update_leaderboard_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LeaderboardEntryRequest>,
) -> Result<Json<ApiResponse<LeaderboardEntryResponse>>, ApiError> {
    req.validate()?;
    let existing = state
        .content
        .get_leaderboard_entry(&id)
        .await?
        .ok_or_else(|| not_found("Leaderboard entry", &id))?;
    let entry = LeaderboardEntry {
        id: existing.id,
        display_name: req.display_name,
        avatar_url: req.avatar_url,
        profit: req.profit,
        win_rate: req.win_rate,
        rank: req.rank,
        period: req.period,
        created_at: existing.created_at,
    };
    state.content.save_leaderboard_entry(&entry).await?;
    Ok(Json(ApiResponse::ok(entry.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/leaderboard/{id}",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "排行榜条目 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn delete_leaderboard_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.content.delete_leaderboard_entry(&id).await?;
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
