//! # 系统设置与 IP 白名单路由
//!
//! 仅超级管理员可用。

use axum::Json;
use axum::extract::{Path, State};
use simtrade_core::common::new_id;
use simtrade_core::system::entity::{IpWhitelistEntry, Setting};

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::server::AppState;
use crate::types::{ApiResponse, IpWhitelistRequest, IpWhitelistResponse, PutSettingRequest, SettingResponse};

/// 全部系统设置
#[utoipa::path(
    get,
    path = "/admin/settings",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<Vec<SettingResponse>>),
        (status = 403, description = "需要超级管理员权限")
    )
)]
pub async fn list_settings(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<SettingResponse>>>, ApiError> {
    let settings = state.settings.list_settings().await?;
    Ok(Json(ApiResponse::ok(settings.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    get,
    path = "/admin/settings/{key}",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    params(("key" = String, Path, description = "设置键")),
    responses(
        (status = 200, description = "获取成功", body = ApiResponse<SettingResponse>),
        (status = 404, description = "设置不存在")
    )
)]
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<SettingResponse>>, ApiError> {
    let setting = state
        .settings
        .get_setting(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Setting {} not found", key)))?;
    Ok(Json(ApiResponse::ok(setting.into())))
}

/// 新增或覆盖设置值
#[utoipa::path(
    put,
    path = "/admin/settings/{key}",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    params(("key" = String, Path, description = "设置键")),
    request_body = PutSettingRequest,
    responses(
        (status = 200, description = "保存成功", body = ApiResponse<SettingResponse>),
        (status = 400, description = "设置键为空")
    )
)]
pub async fn put_setting(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(key): Path<String>,
    Json(req): Json<PutSettingRequest>,
) -> Result<Json<ApiResponse<SettingResponse>>, ApiError> {
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(ApiError::BadRequest("setting key must not be empty".into()));
    }
    state
        .settings
        .put_setting(&Setting {
            key: key.clone(),
            value: req.value,
            description: req.description,
            updated_at: state.clock.now(),
        })
        .await?;
    // 描述为空时存储层保留旧值，这里回读完整记录
    let saved = state
        .settings
        .get_setting(&key)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("setting {} vanished after write", key)))?;

    tracing::info!("Admin {} set {} = {}", admin.username, saved.key, saved.value);
    Ok(Json(ApiResponse::ok(saved.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/settings/{key}",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    params(("key" = String, Path, description = "设置键")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "设置不存在")
    )
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.settings.delete_setting(&key).await?;
    tracing::info!("Admin {} deleted setting {}", admin.username, key);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}

/// IP 白名单列表
#[utoipa::path(
    get,
    path = "/admin/ip-whitelist",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    responses((status = 200, description = "获取成功", body = ApiResponse<Vec<IpWhitelistResponse>>))
)]
pub async fn list_whitelist(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<IpWhitelistResponse>>>, ApiError> {
    let entries = state.settings.list_whitelist().await?;
    Ok(Json(ApiResponse::ok(entries.into_iter().map(Into::into).collect())))
}

#[utoipa::path(
    post,
    path = "/admin/ip-whitelist",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    request_body = IpWhitelistRequest,
    responses(
        (status = 200, description = "添加成功", body = ApiResponse<IpWhitelistResponse>),
        (status = 400, description = "IP 地址格式错误"),
        (status = 409, description = "IP 已在白名单中")
    )
)]
pub async fn add_whitelist(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(req): Json<IpWhitelistRequest>,
) -> Result<Json<ApiResponse<IpWhitelistResponse>>, ApiError> {
    let entry = IpWhitelistEntry {
        id: new_id(),
        ip_address: req.parse_ip()?,
        description: req.description,
        created_at: state.clock.now(),
    };
    state.settings.add_whitelist(&entry).await?;
    tracing::info!("Admin {} whitelisted {}", admin.username, entry.ip_address);
    Ok(Json(ApiResponse::ok(entry.into())))
}

#[utoipa::path(
    delete,
    path = "/admin/ip-whitelist/{id}",
    tag = "系统设置 (Settings)",
    security(("bearer_jwt" = [])),
    params(("id" = String, Path, description = "白名单条目 ID")),
    responses(
        (status = 200, description = "删除成功", body = ApiResponse<String>),
        (status = 404, description = "条目不存在")
    )
)]
pub async fn delete_whitelist(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    state.settings.delete_whitelist(&id).await?;
    tracing::info!("Admin {} removed ip whitelist entry {}", admin.username, id);
    Ok(Json(ApiResponse::ok("ok".to_string())))
}
