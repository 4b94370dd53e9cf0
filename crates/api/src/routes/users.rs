//! # 平台用户管理路由
//!
//! 用户开户、资料维护、余额调整与流水查询。
//! 对应的路由受 `auth_middleware` 和 `require_admin` 中间件保护。

use axum::Json;
use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use simtrade_core::account::entity::{User, UserStatus};
use simtrade_core::common::new_id;
use simtrade_core::store::port::UserFilter;
use simtrade_core::system::entity::SETTING_SIGNUP_BONUS;

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::routes::auth::hash_password;
use crate::server::AppState;
use crate::types::{
    ApiResponse, BalanceAdjustRequest, BalanceEntryResponse, CreateUserRequest, PageQuery, PageResponse,
    TransactionResponse, UpdateUserRequest, UserListQuery, UserResponse, Validate,
};

async fn load_user(state: &AppState, id: &str) -> Result<User, ApiError> {
    state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", id)))
}

/// 未指定初始资金时读取系统设置 `signup_bonus`，设置缺失或无法解析按 0 处理
async fn signup_bonus(state: &AppState) -> Result<Decimal, ApiError> {
    let setting = state.settings.get_setting(SETTING_SIGNUP_BONUS).await?;
    Ok(setting
        .and_then(|s| s.value.trim().parse::<Decimal>().ok())
        .filter(|v| *v >= Decimal::ZERO)
        .unwrap_or_default())
}

/// 分页查询平台用户
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(UserListQuery),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PageResponse<UserResponse>>),
        (status = 403, description = "无权限执行此操作")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<PageResponse<UserResponse>>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .to_request();
    let filter = UserFilter {
        query: query.q.filter(|q| !q.trim().is_empty()),
        status: query.status,
    };
    let users = state.users.list_users(&filter, page).await?;
    Ok(Json(ApiResponse::ok(users.into())))
}

/// 新建平台用户
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<UserResponse>),
        (status = 400, description = "无效的请求参数"),
        (status = 409, description = "邮箱或用户名已存在")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    req.validate()?;

    let balance = match req.initial_balance {
        Some(b) => b,
        None => signup_bonus(&state).await?,
    };
    let now = state.clock.now();
    let user = User {
        id: new_id(),
        email: req.email.trim().to_ascii_lowercase(),
        username: req.username,
        password_hash: hash_password(&req.password)?,
        balance,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
    };
    state.users.create_user(&user).await?;

    tracing::info!("Admin {} created user {} ({})", admin.username, user.username, user.id);
    Ok(Json(ApiResponse::ok(user.into())))
}

/// 用户详情
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<UserResponse>),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = load_user(&state, &id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// 修改用户资料或状态
///
/// 余额不能在此修改，请使用余额调整接口。
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<UserResponse>),
        (status = 404, description = "用户不存在"),
        (status = 409, description = "邮箱或用户名已被占用")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    req.validate()?;
    let mut user = load_user(&state, &id).await?;

    if let Some(email) = req.email {
        user.email = email.trim().to_ascii_lowercase();
    }
    if let Some(username) = req.username {
        user.username = username;
    }
    if let Some(password) = req.password {
        user.password_hash = hash_password(&password)?;
    }
    if let Some(status) = req.status
        && status != user.status
    {
        tracing::info!("Admin {} changed user {} status {} -> {}", admin.username, user.id, user.status, status);
        user.status = status;
    }
    user.updated_at = state.clock.now();

    state.users.update_user(&user).await?;
    // 重新读取以返回最新余额
    let user = load_user(&state, &id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// 删除用户
///
/// 已有订单的用户无法删除 (409)，请改为封禁。仅有调账记录的用户可以删除，流水一并清除。
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "用户不存在"),
        (status = 409, description = "用户仍有关联订单")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.users.delete_user(&id).await?;
    tracing::info!("Admin {} deleted user {}", admin.username, id);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

/// 调整用户余额
///
/// 正数入账、负数扣减，扣减后余额不得为负。每次调整写入一条资金流水。
#[utoipa::path(
    post,
    path = "/admin/users/{id}/balance",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID")),
    request_body = BalanceAdjustRequest,
    responses(
        (status = 200, description = "调整成功", body = ApiResponse<BalanceEntryResponse>),
        (status = 400, description = "余额不足或参数错误"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn adjust_balance(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<BalanceAdjustRequest>,
) -> Result<Json<ApiResponse<BalanceEntryResponse>>, ApiError> {
    req.validate()?;
    let reason = format!("{} (by {})", req.reason.trim(), admin.username);
    let entry = state.users.adjust_balance(&id, req.delta, &reason).await?;
    tracing::info!(
        "Admin {} adjusted balance of user {} by {}, now {}",
        admin.username,
        id,
        entry.delta,
        entry.balance_after
    );
    Ok(Json(ApiResponse::ok(entry.into())))
}

/// 用户的订单列表
#[utoipa::path(
    get,
    path = "/admin/users/{id}/transactions",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID"), PageQuery),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PageResponse<TransactionResponse>>),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn list_user_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PageResponse<TransactionResponse>>>, ApiError> {
    let page = state.transactions.list_for_user(&id, query.to_request()).await?;
    Ok(Json(ApiResponse::ok(page.into())))
}

/// 用户的资金流水
#[utoipa::path(
    get,
    path = "/admin/users/{id}/ledger",
    tag = "用户管理 (Users)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "用户 ID"), PageQuery),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<PageResponse<BalanceEntryResponse>>),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn list_user_ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<PageResponse<BalanceEntryResponse>>>, ApiError> {
    load_user(&state, &id).await?;
    let page = state.users.list_ledger(&id, query.to_request()).await?;
    Ok(Json(ApiResponse::ok(page.into())))
}
