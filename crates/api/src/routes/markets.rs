//! # 场次 / 子市场 / 周期管理路由
//!
//! 路由层只做参数校验与 DTO 转换，状态机与结算规则全部在 `MarketService` 中。

use axum::Json;
use axum::extract::{Path, Query, State};
use simtrade_trade::market::{NewSession, NewSubMarket, SubMarketUpdate};

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::server::AppState;
use crate::types::{
    ApiResponse, CreateSessionRequest, CreateSubMarketRequest, CycleResponse, CycleSettlementResponse, PageQuery,
    PageResponse, SessionResponse, SettleCycleRequest, StartCycleRequest, SubMarketResponse, UpdateSubMarketRequest,
    Validate,
};

// ============================================================
//  场次
// ============================================================

/// 分页查询场次，按开市时间倒序
#[utoipa::path(
    get,
    path = "/admin/market-sessions",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PageResponse<SessionResponse>>)
    )
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PageResponse<SessionResponse>>>, ApiError> {
    let page = state.markets.list_sessions(query.to_request()).await?;
    Ok(Json(ApiResponse::ok(page.into())))
}

/// 新建场次 (初始为 Scheduled)
#[utoipa::path(
    post,
    path = "/admin/market-sessions",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<SessionResponse>),
        (status = 400, description = "无效的请求参数")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    req.validate()?;
    let session = state
        .markets
        .create_session(NewSession {
            name: req.name,
            symbol: req.symbol,
            opens_at: req.opens_at,
            closes_at: req.closes_at,
        })
        .await?;
    tracing::info!("Admin {} created market session {}", admin.username, session.id);
    Ok(Json(ApiResponse::ok(session.into())))
}

#[utoipa::path(
    get,
    path = "/admin/market-sessions/{id}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<SessionResponse>),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.markets.get_session(&id).await?;
    Ok(Json(ApiResponse::ok(session.into())))
}

/// 删除场次，只允许删除尚无子市场的 Scheduled 场次
#[utoipa::path(
    delete,
    path = "/admin/market-sessions/{id}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "场次不存在"),
        (status = 409, description = "场次已开市或仍有子市场")
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.markets.delete_session(&id).await?;
    tracing::info!("Admin {} deleted market session {}", admin.username, id);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

/// 开市 (Scheduled -> Open)
#[utoipa::path(
    post,
    path = "/admin/market-sessions/{id}/open",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    responses(
        (status = 200, description = "开市成功", body = ApiResponse<SessionResponse>),
        (status = 404, description = "场次不存在"),
        (status = 409, description = "状态不允许")
    )
)]
pub async fn open_session(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.markets.open_session(&id).await?;
    tracing::info!("Admin {} opened market session {}", admin.username, id);
    Ok(Json(ApiResponse::ok(session.into())))
}

/// 闭市 (Open -> Closed)，仍有未结算周期时拒绝
#[utoipa::path(
    post,
    path = "/admin/market-sessions/{id}/close",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    responses(
        (status = 200, description = "闭市成功", body = ApiResponse<SessionResponse>),
        (status = 404, description = "场次不存在"),
        (status = 409, description = "状态不允许或仍有未结算周期")
    )
)]
pub async fn close_session(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.markets.close_session(&id).await?;
    tracing::info!("Admin {} closed market session {}", admin.username, id);
    Ok(Json(ApiResponse::ok(session.into())))
}

// ============================================================
//  子市场
// ============================================================

#[utoipa::path(
    get,
    path = "/admin/market-sessions/{id}/sub-markets",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<SubMarketResponse>>),
        (status = 404, description = "场次不存在")
    )
)]
pub async fn list_sub_markets(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SubMarketResponse>>>, ApiError> {
    let subs = state.markets.list_sub_markets(&id).await?;
    Ok(Json(ApiResponse::ok(subs.into_iter().map(Into::into).collect())))
}

/// 在场次下新建子市场
#[utoipa::path(
    post,
    path = "/admin/market-sessions/{id}/sub-markets",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "场次 ID")),
    request_body = CreateSubMarketRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<SubMarketResponse>),
        (status = 400, description = "收益率或周期长度越界"),
        (status = 404, description = "场次不存在"),
        (status = 409, description = "场次已闭市")
    )
)]
pub async fn create_sub_market(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<CreateSubMarketRequest>,
) -> Result<Json<ApiResponse<SubMarketResponse>>, ApiError> {
    req.validate()?;
    let sub = state
        .markets
        .create_sub_market(
            &id,
            NewSubMarket {
                name: req.name,
                return_rate: req.return_rate,
                cycle_seconds: req.cycle_seconds,
            },
        )
        .await?;
    tracing::info!("Admin {} created sub market {} in session {}", admin.username, sub.id, id);
    Ok(Json(ApiResponse::ok(sub.into())))
}

#[utoipa::path(
    get,
    path = "/admin/sub-markets/{id}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<SubMarketResponse>),
        (status = 404, description = "子市场不存在")
    )
)]
pub async fn get_sub_market(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SubMarketResponse>>, ApiError> {
    let sub = state.markets.get_sub_market(&id).await?;
    Ok(Json(ApiResponse::ok(sub.into())))
}

/// 修改子市场名称、收益率或周期长度，只影响之后开启的周期与订单
#[utoipa::path(
    put,
    path = "/admin/sub-markets/{id}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    request_body = UpdateSubMarketRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<SubMarketResponse>),
        (status = 400, description = "收益率或周期长度越界"),
        (status = 404, description = "子市场不存在")
    )
)]
pub async fn update_sub_market(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateSubMarketRequest>,
) -> Result<Json<ApiResponse<SubMarketResponse>>, ApiError> {
    req.validate()?;
    let sub = state
        .markets
        .update_sub_market(
            &id,
            SubMarketUpdate {
                name: req.name,
                return_rate: req.return_rate,
                cycle_seconds: req.cycle_seconds,
            },
        )
        .await?;
    tracing::info!("Admin {} updated sub market {}", admin.username, id);
    Ok(Json(ApiResponse::ok(sub.into())))
}

#[utoipa::path(
    post,
    path = "/admin/sub-markets/{id}/suspend",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    responses(
        (status = 200, description = "已暂停", body = ApiResponse<SubMarketResponse>),
        (status = 404, description = "子市场不存在"),
        (status = 409, description = "已处于暂停状态")
    )
)]
pub async fn suspend_sub_market(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SubMarketResponse>>, ApiError> {
    let sub = state.markets.suspend_sub_market(&id).await?;
    tracing::info!("Admin {} suspended sub market {}", admin.username, id);
    Ok(Json(ApiResponse::ok(sub.into())))
}

#[utoipa::path(
    post,
    path = "/admin/sub-markets/{id}/activate",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    responses(
        (status = 200, description = "已恢复", body = ApiResponse<SubMarketResponse>),
        (status = 404, description = "子市场不存在"),
        (status = 409, description = "已处于启用状态")
    )
)]
pub async fn activate_sub_market(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SubMarketResponse>>, ApiError> {
    let sub = state.markets.activate_sub_market(&id).await?;
    tracing::info!("Admin {} activated sub market {}", admin.username, id);
    Ok(Json(ApiResponse::ok(sub.into())))
}

// ============================================================
//  周期
// ============================================================

/// 子市场的周期列表，按序号倒序
#[utoipa::path(
    get,
    path = "/admin/sub-markets/{id}/cycles",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<CycleResponse>>),
        (status = 404, description = "子市场不存在")
    )
)]
pub async fn list_cycles(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<CycleResponse>>>, ApiError> {
    let cycles = state.markets.list_cycles(&id).await?;
    Ok(Json(ApiResponse::ok(cycles.into_iter().map(Into::into).collect())))
}

/// 开启下一个周期
#[utoipa::path(
    post,
    path = "/admin/sub-markets/{id}/cycles",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "子市场 ID")),
    request_body = StartCycleRequest,
    responses(
        (status = 200, description = "开启成功", body = ApiResponse<CycleResponse>),
        (status = 400, description = "无可用起始价"),
        (status = 404, description = "子市场不存在"),
        (status = 409, description = "场次未开市、子市场暂停或上一周期未结算")
    )
)]
pub async fn start_cycle(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<StartCycleRequest>,
) -> Result<Json<ApiResponse<CycleResponse>>, ApiError> {
    req.validate()?;
    let cycle = state.markets.start_cycle(&id, req.start_price).await?;
    tracing::info!(
        "Admin {} started cycle #{} of sub market {}",
        admin.username,
        cycle.sequence,
        id
    );
    Ok(Json(ApiResponse::ok(cycle.into())))
}

#[utoipa::path(
    get,
    path = "/admin/cycles/{id}",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "周期 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<CycleResponse>),
        (status = 404, description = "周期不存在")
    )
)]
pub async fn get_cycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CycleResponse>>, ApiError> {
    let cycle = state.markets.get_cycle(&id).await?;
    Ok(Json(ApiResponse::ok(cycle.into())))
}

/// 锁定周期，停止接受新订单
#[utoipa::path(
    post,
    path = "/admin/cycles/{id}/lock",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "周期 ID")),
    responses(
        (status = 200, description = "锁定成功", body = ApiResponse<CycleResponse>),
        (status = 404, description = "周期不存在"),
        (status = 409, description = "周期不处于 Open 状态")
    )
)]
pub async fn lock_cycle(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CycleResponse>>, ApiError> {
    let cycle = state.markets.lock_cycle(&id).await?;
    tracing::info!("Admin {} locked cycle {}", admin.username, id);
    Ok(Json(ApiResponse::ok(cycle.into())))
}

/// 以结算价结算周期及其下全部 Pending 订单
#[utoipa::path(
    post,
    path = "/admin/cycles/{id}/settle",
    tag = "场次管理 (Markets)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "周期 ID")),
    request_body = SettleCycleRequest,
    responses(
        (status = 200, description = "结算成功", body = ApiResponse<CycleSettlementResponse>),
        (status = 404, description = "周期不存在"),
        (status = 409, description = "周期已结算")
    )
)]
pub async fn settle_cycle(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<SettleCycleRequest>,
) -> Result<Json<ApiResponse<CycleSettlementResponse>>, ApiError> {
    req.validate()?;
    let result = state.markets.settle_cycle(&id, req.end_price).await?;
    tracing::info!(
        "Admin {} settled cycle {}: {} transactions, payout {}",
        admin.username,
        id,
        result.summary.settled,
        result.summary.total_payout
    );
    Ok(Json(ApiResponse::ok(result.into())))
}
