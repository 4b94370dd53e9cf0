//! # 身份验证路由控制器
//!
//! 实现登录、令牌刷新 (轮换 + 重放检测)、注销与密码修改等鉴权相关接口。

use axum::Json;
use axum::extract::State;
use chrono::{TimeDelta, Utc};
use simtrade_core::account::entity::Admin;
use simtrade_core::common::new_id;
use simtrade_core::system::entity::RefreshToken;

use crate::error::ApiError;
use crate::middleware::auth::{CurrentAdmin, hash_refresh_token, issue_access_token, new_refresh_token};
use crate::server::AppState;
use crate::types::{
    AdminResponse, ApiResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, TokenResponse, Validate,
};

/// 生成密码的 bcrypt 摘要
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

/// 校验密码，摘要格式损坏视为不匹配
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 为管理员签发一对新令牌，刷新令牌只落库摘要
async fn issue_token_pair(state: &AppState, admin: &Admin) -> Result<TokenResponse, ApiError> {
    let auth = &state.config.auth;
    let now = Utc::now();
    let access_token = issue_access_token(admin, &auth.jwt_secret, auth.access_ttl_secs, now)?;

    let refresh_ttl = i64::try_from(auth.refresh_ttl_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| ApiError::Internal(format!("refresh_ttl_secs out of range: {}", auth.refresh_ttl_secs)))?;
    let refresh_token = new_refresh_token();
    state
        .tokens
        .save_refresh_token(&RefreshToken {
            id: new_id(),
            admin_id: admin.id.clone(),
            token_hash: hash_refresh_token(&refresh_token),
            expires_at: now + refresh_ttl,
            revoked_at: None,
            created_at: now,
        })
        .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        expires_in: auth.access_ttl_secs,
        token_type: "Bearer".to_string(),
    })
}

/// 管理员登录
///
/// 验证用户名和密码，颁发 Access Token 与 Refresh Token。
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "鉴权 (Auth)",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = ApiResponse<TokenResponse>),
        (status = 401, description = "用户名或密码错误"),
        (status = 403, description = "账号已停用")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    // 1. 获取管理员并验证密码
    let mut admin = match state.admins.get_admin_by_username(&req.username).await? {
        Some(a) if verify_password(&req.password, &a.password_hash) => a,
        _ => {
            tracing::warn!("Failed login attempt for {}", req.username);
            return Err(ApiError::Unauthorized("Invalid username or password".into()));
        }
    };

    if !admin.is_active {
        tracing::warn!("Disabled admin {} attempted to log in", admin.username);
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    // 2. 记录登录时间
    admin.last_login_at = Some(Utc::now());
    state.admins.update_admin(&admin).await?;

    // 3. 签发令牌
    let tokens = issue_token_pair(&state, &admin).await?;
    tracing::info!("Admin {} logged in", admin.username);
    Ok(Json(ApiResponse::ok(tokens)))
}

/// 刷新令牌
///
/// 用一次性的 Refresh Token 换取新的令牌对，旧令牌立即作废。
/// 已作废的令牌再次出现视为泄露，该管理员名下所有令牌全部吊销。
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "鉴权 (Auth)",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "刷新成功", body = ApiResponse<TokenResponse>),
        (status = 401, description = "令牌无效、过期或已被使用")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let now = Utc::now();
    let record = state
        .tokens
        .find_refresh_token(&hash_refresh_token(&req.refresh_token))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    if record.revoked_at.is_some() {
        let revoked = state.tokens.revoke_all_for_admin(&record.admin_id, now).await?;
        tracing::warn!(
            "Refresh token reuse detected for admin {}, revoked {} active tokens",
            record.admin_id,
            revoked
        );
        return Err(ApiError::Unauthorized("Refresh token has already been used".into()));
    }
    if !record.is_usable(now) {
        return Err(ApiError::Unauthorized("Refresh token expired".into()));
    }

    // 并发使用同一令牌时只有一个调用方能完成吊销
    if !state.tokens.revoke_refresh_token(&record.id, now).await? {
        let revoked = state.tokens.revoke_all_for_admin(&record.admin_id, now).await?;
        tracing::warn!(
            "Concurrent refresh token use for admin {}, revoked {} active tokens",
            record.admin_id,
            revoked
        );
        return Err(ApiError::Unauthorized("Refresh token has already been used".into()));
    }

    let admin = state
        .admins
        .get_admin(&record.admin_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Admin not found".into()))?;
    if !admin.is_active {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    let tokens = issue_token_pair(&state, &admin).await?;
    tracing::debug!("Refresh token rotated for admin {}", admin.username);
    Ok(Json(ApiResponse::ok(tokens)))
}

/// 注销
///
/// 吊销当前管理员提交的 Refresh Token。Access Token 自然过期。
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "鉴权 (Auth)",
    security(("bearer_jwt" = [])),
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "注销成功", body = ApiResponse<String>),
        (status = 401, description = "未认证")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if let Some(record) = state
        .tokens
        .find_refresh_token(&hash_refresh_token(&req.refresh_token))
        .await?
        && record.admin_id == admin.id
    {
        state.tokens.revoke_refresh_token(&record.id, Utc::now()).await?;
    }
    tracing::info!("Admin {} logged out", admin.username);
    Ok(Json(ApiResponse::ok("Logged out".to_string())))
}

/// 修改密码
///
/// 验证旧密码并设立新密码。如果管理员被标记为强制修改密码，此操作会解除该状态。
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "鉴权 (Auth)",
    security(("bearer_jwt" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "密码修改成功", body = ApiResponse<String>),
        (status = 400, description = "新密码不符合要求"),
        (status = 401, description = "原密码错误或未认证")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentAdmin(mut admin): CurrentAdmin,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    req.validate()?;

    // 1. 验证旧密码
    if !verify_password(&req.old_password, &admin.password_hash) {
        tracing::warn!("Failed old password validation for admin {}", admin.username);
        return Err(ApiError::Unauthorized("Invalid old password".into()));
    }

    // 2. 写入新密码并解除强制改密
    admin.password_hash = hash_password(&req.new_password)?;
    admin.force_password_change = false;
    state.admins.update_admin(&admin).await?;

    tracing::info!("Admin {} changed password", admin.username);
    Ok(Json(ApiResponse::ok("Password changed successfully".into())))
}

/// 当前登录的管理员信息
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "鉴权 (Auth)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<AdminResponse>),
        (status = 401, description = "未认证")
    )
)]
pub async fn me(CurrentAdmin(admin): CurrentAdmin) -> Json<ApiResponse<AdminResponse>> {
    Json(ApiResponse::ok(admin.into()))
}
