//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use simtrade_core::cache::error::CacheError;
use simtrade_core::market::error::MarketError;
use simtrade_core::store::error::StoreError;
use simtrade_core::trade::error::TradeError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 认证失败 (401)
    #[error("认证失败: {0}")]
    Unauthorized(String),

    /// 权限不足 (403)
    #[error("权限不足: {0}")]
    Forbidden(String),

    /// 资源未找到 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 唯一约束、外键约束或状态冲突 (409)
    #[error("资源冲突: {0}")]
    Conflict(String),

    /// 上传文件超出大小限制 (413)
    #[error("请求体过大: {0}")]
    PayloadTooLarge(String),

    /// 上传文件类型不被允许 (415)
    #[error("不支持的媒体类型: {0}")]
    UnsupportedMediaType(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                "服务器内部错误".to_string()
            }
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedMediaType(msg) => msg,
        };

        let body = Json(ApiErrorResponse::from_msg(message));
        (status, body).into_response()
    }
}

/// 从 `StoreError` 转换
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::InsufficientBalance { .. } => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

/// 从 `TradeError` 转换
impl From<TradeError> for ApiError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::TransactionNotFound(_) | TradeError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            TradeError::InvalidStatus(_) => ApiError::Conflict(err.to_string()),
            TradeError::UserNotActive(_)
            | TradeError::InsufficientBalance { .. }
            | TradeError::InvalidReturnRate(_)
            | TradeError::PriceUnavailable(_)
            | TradeError::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            TradeError::Market(inner) => inner.into(),
            TradeError::Store(inner) => inner.into(),
        }
    }
}

/// 从 `MarketError` 转换
impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::SessionNotFound(_) | MarketError::SubMarketNotFound(_) | MarketError::CycleNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            MarketError::InvalidTransition { .. } | MarketError::Rejected(_) => ApiError::Conflict(err.to_string()),
            MarketError::InvalidInput(_) | MarketError::PriceUnavailable(_) => ApiError::BadRequest(err.to_string()),
            MarketError::Store(inner) => inner.into(),
        }
    }
}

/// 从 `CacheError` 转换
impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
