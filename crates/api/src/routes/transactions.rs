//! # 模拟订单路由
//!
//! 代用户下单、逐笔结算、撤单与订单查询。

use axum::Json;
use axum::extract::{Path, Query, State};
use simtrade_core::trade::entity::{NewTransaction, TransactionFilter};
use simtrade_trade::quote::normalize_symbol;

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::server::AppState;
use crate::types::{
    ApiResponse, PageQuery, PageResponse, PlaceTransactionRequest, SettleTransactionRequest, TransactionListQuery,
    TransactionResponse, Validate,
};

/// 分页查询订单
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "订单 (Transactions)",
    security(("bearer_jwt" = [])),
    params(TransactionListQuery),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PageResponse<TransactionResponse>>)
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<ApiResponse<PageResponse<TransactionResponse>>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .to_request();
    let filter = TransactionFilter {
        user_id: query.user_id,
        cycle_id: query.cycle_id,
        symbol: query.symbol.as_deref().map(normalize_symbol),
        status: query.status,
    };
    let result = state.transactions.list(&filter, page).await?;
    Ok(Json(ApiResponse::ok(result.into())))
}

/// 代用户下单
///
/// 本金立即从用户余额中扣除。挂周期的订单缺省取周期起始价与子市场收益率，
/// 自由单缺省开仓价取行情看板最新价。
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "订单 (Transactions)",
    security(("bearer_jwt" = [])),
    request_body = PlaceTransactionRequest,
    responses(
        (status = 200, description = "下单成功", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "参数错误、余额不足或无可用价格"),
        (status = 404, description = "用户或周期不存在"),
        (status = 409, description = "周期或子市场不接受下单")
    )
)]
pub async fn place_transaction(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(req): Json<PlaceTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    req.validate()?;
    let tx = state
        .transactions
        .place(NewTransaction {
            user_id: req.user_id,
            cycle_id: req.cycle_id,
            symbol: req.symbol,
            direction: req.direction,
            amount: req.amount,
            entry_price: req.entry_price,
            return_rate: req.return_rate,
        })
        .await?;
    tracing::info!("Admin {} placed transaction {} for user {}", admin.username, tx.id, tx.user_id);
    Ok(Json(ApiResponse::ok(tx.into())))
}

/// 订单详情
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "订单 (Transactions)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "订单 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let tx = state.transactions.get(&id).await?;
    Ok(Json(ApiResponse::ok(tx.into())))
}

/// 以指定结算价结算订单
#[utoipa::path(
    post,
    path = "/transactions/{id}/settle",
    tag = "订单 (Transactions)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "订单 ID")),
    request_body = SettleTransactionRequest,
    responses(
        (status = 200, description = "结算成功", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "订单不存在"),
        (status = 409, description = "订单已是终态")
    )
)]
pub async fn settle_transaction(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<SettleTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    req.validate()?;
    let tx = state.transactions.settle(&id, req.exit_price).await?;
    tracing::info!("Admin {} settled transaction {} as {}", admin.username, tx.id, tx.status);
    Ok(Json(ApiResponse::ok(tx.into())))
}

/// 撤单并退还本金
#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    tag = "订单 (Transactions)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "订单 ID")),
    responses(
        (status = 200, description = "撤单成功", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "订单不存在"),
        (status = 409, description = "订单已是终态")
    )
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let tx = state.transactions.cancel(&id).await?;
    tracing::info!("Admin {} cancelled transaction {}", admin.username, tx.id);
    Ok(Json(ApiResponse::ok(tx.into())))
}
