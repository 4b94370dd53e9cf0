//! # 行情看板路由
//!
//! 运营手工发布报价；前台只读展示。报价超过配置的存活时间未刷新即自动失效。

use axum::Json;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::server::AppState;
use crate::types::{ApiResponse, PublishTickerRequest, TickerResponse, Validate};

/// 全部有效报价，按标的代码排序
#[utoipa::path(
    get,
    path = "/market/tickers",
    tag = "公开内容 (Public)",
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<TickerResponse>>))
)]
pub async fn list_tickers(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<TickerResponse>>>, ApiError> {
    let tickers = state.quotes.list().await?;
    Ok(Json(ApiResponse::ok(tickers.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    get,
    path = "/market/tickers/{symbol}",
    tag = "公开内容 (Public)",
    params(("symbol" = String, Path, description = "标的代码，大小写不敏感")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<TickerResponse>),
        (status = 404, description = "无有效报价")
    )
)]
pub async fn get_ticker(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<TickerResponse>>, ApiError> {
    let ticker = state
        .quotes
        .get(&symbol)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No ticker for {}", symbol)))?;
    Ok(Json(ApiResponse::ok(ticker.into())))
}

/// 发布或覆盖报价
#[utoipa::path(
    put,
    path = "/admin/market/tickers/{symbol}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("symbol" = String, Path, description = "标的代码")),
    request_body = PublishTickerRequest,
    responses(
        (status = 200, description = "发布成功", body = ApiResponse<TickerResponse>),
        (status = 400, description = "价格无效")
    )
)]
pub async fn publish_ticker(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(symbol): Path<String>,
    Json(req): Json<PublishTickerRequest>,
) -> Result<Json<ApiResponse<TickerResponse>>, ApiError> {
    req.validate()?;
    if symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("symbol must not be empty".into()));
    }
    let ticker = state.quotes.publish(req.into_ticker(&symbol, state.clock.now())).await?;
    tracing::info!("Admin {} published {} @ {}", admin.username, ticker.symbol, ticker.price);
    Ok(Json(ApiResponse::ok(ticker.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/market/tickers/{symbol}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("symbol" = String, Path, description = "标的代码")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "无此报价")
    )
)]
pub async fn remove_ticker(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if !state.quotes.remove(&symbol).await? {
        return Err(ApiError::NotFound(format!("No ticker for {}", symbol)));
    }
    tracing::info!("Admin {} removed ticker {}", admin.username, symbol);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
