//! # 鉴权中间件
//!
//! 提供基于 JWT 的身份验证、刷新令牌的生成与摘要，以及按角色分级的访问控制 (RBAC)。

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sha2::{Digest, Sha256};
use simtrade_core::account::entity::{Admin, AdminRole};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::Claims;

/// 强制改密状态下唯一放行的路径
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change_password";

/// 提取并验证 Authorization: Bearer <token>
///
/// # Logic
/// 1. 解析 Bearer 头并校验 JWT 签名与过期时间。
/// 2. 按 `sub` 加载管理员，账号不存在返回 401，已停用返回 403。
/// 3. 账号处于强制改密状态时，除修改密码接口外一律 403。
/// 4. 将 `Admin` 注入 request extensions，供 `CurrentAdmin` 提取。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)?;

    let claims = match verify_jwt(&token, &state.config.auth.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("JWT verification failed on {}: {}", req.uri().path(), e);
            return Err(e);
        }
    };

    let admin = state
        .admins
        .get_admin(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Admin not found".into()))?;

    if !admin.is_active {
        tracing::warn!("Disabled admin {} attempted {}", admin.username, req.uri().path());
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    if admin.force_password_change && req.uri().path() != CHANGE_PASSWORD_PATH {
        return Err(ApiError::Forbidden("You must change your password before using the API".into()));
    }

    req.extensions_mut().insert(admin);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Result<String, ApiError> {
    let header_val = match req.headers().get(axum::http::header::AUTHORIZATION) {
        Some(v) => v,
        None => {
            tracing::warn!("Missing Authorization header on {}", req.uri().path());
            return Err(ApiError::Unauthorized("Missing Authorization header".into()));
        }
    };
    let s = header_val
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid auth header".into()))?;
    match s.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => {
            tracing::warn!("Invalid Bearer format on {}", req.uri().path());
            Err(ApiError::Unauthorized("Invalid Bearer format".into()))
        }
    }
}

/// Admin 及以上角色校验中间件
/// 必须在 `auth_middleware` 之后应用！
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    check_role(&req, AdminRole::Admin)?;
    Ok(next.run(req).await)
}

/// SuperAdmin 角色校验中间件
/// 必须在 `auth_middleware` 之后应用！
pub async fn require_super_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    check_role(&req, AdminRole::SuperAdmin)?;
    Ok(next.run(req).await)
}

fn check_role(req: &Request, required: AdminRole) -> Result<(), ApiError> {
    let admin = req
        .extensions()
        .get::<Admin>()
        .ok_or_else(|| ApiError::Unauthorized("Admin context not found".into()))?;

    if !admin.role.at_least(required) {
        tracing::warn!(
            "{} ({}) denied {}: {} required",
            admin.username,
            admin.role,
            req.uri().path(),
            required
        );
        return Err(ApiError::Forbidden(format!("{} privileges required", required)));
    }
    Ok(())
}

/// 签发 Access Token，有效期 `ttl_secs` 秒，自 `now` 起算
pub fn issue_access_token(admin: &Admin, secret: &str, ttl_secs: u64, now: DateTime<Utc>) -> Result<String, ApiError> {
    let iat = now.timestamp().max(0).unsigned_abs();
    let claims = Claims {
        sub: admin.id.clone(),
        role: admin.role,
        iat,
        exp: iat.saturating_add(ttl_secs),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
}

/// 验证 JWT 返回强类型 Claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    Ok(token_data.claims)
}

/// 生成新的不透明刷新令牌 (两段 UUID v4，共 244 位随机数)
pub fn new_refresh_token() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// 刷新令牌落库前的 SHA-256 摘要
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// 在提取器中获取当前管理员的快捷方式
pub struct CurrentAdmin(pub Admin);

impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = parts
            .extensions
            .get::<Admin>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Missing admin context".into()))?;
        Ok(CurrentAdmin(admin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn admin() -> Admin {
        Admin {
            id: "a1".into(),
            username: "ops".into(),
            password_hash: String::new(),
            role: AdminRole::Operator,
            is_active: true,
            force_password_change: false,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip_and_tamper() {
        let token = issue_access_token(&admin(), "secret", 60, Utc::now()).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "a1");
        assert_eq!(claims.role, AdminRole::Operator);
        assert_eq!(claims.exp - claims.iat, 60);

        assert!(verify_jwt(&token, "other-secret").is_err());
        assert!(verify_jwt("garbage", "secret").is_err());
    }

    #[test]
    fn test_expired_jwt_rejected() {
        let issued = Utc::now() - Duration::hours(1);
        let token = issue_access_token(&admin(), "secret", 60, issued).unwrap();
        assert!(matches!(verify_jwt(&token, "secret"), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_refresh_token_hashing() {
        let a = new_refresh_token();
        let b = new_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);

        let hash = hash_refresh_token(&a);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_refresh_token(&a));
        assert_ne!(hash, hash_refresh_token(&b));
    }
}
