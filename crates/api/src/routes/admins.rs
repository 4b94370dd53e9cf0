//! # 后台管理员账号路由
//!
//! 仅超级管理员可用：开设后台账号、调整角色与启用状态、重置密码、删除账号。

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use simtrade_core::account::entity::{Admin, AdminRole};
use simtrade_core::common::new_id;

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::routes::auth::hash_password;
use crate::server::AppState;
use crate::types::{AdminResponse, ApiResponse, CreateAdminRequest, ResetPasswordRequest, UpdateAdminRequest, Validate};

async fn load_admin(state: &AppState, id: &str) -> Result<Admin, ApiError> {
    state
        .admins
        .get_admin(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Admin {} not found", id)))
}

/// 操作会让 `target` 失去有效超级管理员身份时，确认系统中仍有其他启用的超级管理员
async fn ensure_not_last_super_admin(state: &AppState, target: &Admin) -> Result<(), ApiError> {
    if target.role == AdminRole::SuperAdmin
        && target.is_active
        && state.admins.count_active_super_admins().await? <= 1
    {
        return Err(ApiError::Conflict("Cannot remove the last active SuperAdmin".into()));
    }
    Ok(())
}

/// 后台账号列表
#[utoipa::path(
    get,
    path = "/admin/admins",
    tag = "后台账号 (Admins)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<AdminResponse>>),
        (status = 403, description = "需要超级管理员权限")
    )
)]
pub async fn list_admins(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<AdminResponse>>>, ApiError> {
    let admins = state.admins.list_admins().await?;
    Ok(Json(ApiResponse::ok(admins.into_iter().map(Into::into).collect())))
}

/// 开设后台账号
///
/// 新账号默认被标记为强制修改密码。
#[utoipa::path(
    post,
    path = "/admin/admins",
    tag = "后台账号 (Admins)",
    security(("bearer_jwt" = [])),
    request_body = CreateAdminRequest,
    responses(
        (status = 200, description = "创建成功", body = ApiResponse<AdminResponse>),
        (status = 400, description = "无效的请求参数"),
        (status = 409, description = "用户名已存在")
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    CurrentAdmin(operator): CurrentAdmin,
    Json(req): Json<CreateAdminRequest>,
) -> Result<Json<ApiResponse<AdminResponse>>, ApiError> {
    req.validate()?;

    let admin = Admin {
        id: new_id(),
        username: req.username,
        password_hash: hash_password(&req.password)?,
        role: req.role,
        is_active: true,
        force_password_change: true,
        last_login_at: None,
        created_at: Utc::now(),
    };
    state.admins.create_admin(&admin).await?;

    tracing::info!("{} created {} account {}", operator.username, admin.role, admin.username);
    Ok(Json(ApiResponse::ok(admin.into())))
}

/// 调整角色或启用状态
///
/// 停用账号会同时吊销其全部刷新令牌。不能让系统失去最后一个启用的超级管理员。
#[utoipa::path(
    put,
    path = "/admin/admins/{id}",
    tag = "后台账号 (Admins)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "管理员 ID")),
    request_body = UpdateAdminRequest,
    responses(
        (status = 200, description = "修改成功", body = ApiResponse<AdminResponse>),
        (status = 404, description = "账号不存在"),
        (status = 409, description = "不能移除最后一个超级管理员")
    )
)]
pub async fn update_admin(
    State(state): State<AppState>,
    CurrentAdmin(operator): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<UpdateAdminRequest>,
) -> Result<Json<ApiResponse<AdminResponse>>, ApiError> {
    let mut admin = load_admin(&state, &id).await?;

    let demoted = req.role.is_some_and(|r| r != AdminRole::SuperAdmin);
    let deactivated = req.is_active == Some(false);
    if demoted || deactivated {
        ensure_not_last_super_admin(&state, &admin).await?;
    }

    if let Some(role) = req.role {
        admin.role = role;
    }
    if let Some(active) = req.is_active {
        admin.is_active = active;
    }
    state.admins.update_admin(&admin).await?;

    if !admin.is_active {
        state.tokens.revoke_all_for_admin(&admin.id, Utc::now()).await?;
    }
    tracing::info!(
        "{} updated admin {}: role={}, active={}",
        operator.username,
        admin.username,
        admin.role,
        admin.is_active
    );
    Ok(Json(ApiResponse::ok(admin.into())))
}

/// 重置管理员密码
///
/// 重置后该账号下次登录必须修改密码，已签发的刷新令牌全部作废。
#[utoipa::path(
    post,
    path = "/admin/admins/{id}/reset_password",
    tag = "后台账号 (Admins)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "管理员 ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "重置成功", body = ApiResponse<AdminResponse>),
        (status = 404, description = "账号不存在")
    )
)]
pub async fn reset_admin_password(
    State(state): State<AppState>,
    CurrentAdmin(operator): CurrentAdmin,
    Path(id): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<AdminResponse>>, ApiError> {
    req.validate()?;
    let mut admin = load_admin(&state, &id).await?;

    admin.password_hash = hash_password(&req.new_password)?;
    admin.force_password_change = true;
    state.admins.update_admin(&admin).await?;
    state.tokens.revoke_all_for_admin(&admin.id, Utc::now()).await?;

    tracing::info!("{} reset password of admin {}", operator.username, admin.username);
    Ok(Json(ApiResponse::ok(admin.into())))
}

/// 删除后台账号
///
/// 不能删除自己，也不能删除最后一个启用的超级管理员。
#[utoipa::path(
    delete,
    path = "/admin/admins/{id}",
    tag = "后台账号 (Admins)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "管理员 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "账号不存在"),
        (status = 409, description = "不能删除自己或最后一个超级管理员")
    )
)]
pub async fn delete_admin(
    State(state): State<AppState>,
    CurrentAdmin(operator): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if operator.id == id {
        return Err(ApiError::Conflict("Cannot delete your own account".into()));
    }
    let admin = load_admin(&state, &id).await?;
    ensure_not_last_super_admin(&state, &admin).await?;

    state.admins.delete_admin(&id).await?;
    tracing::info!("{} deleted admin {}", operator.username, admin.username);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
