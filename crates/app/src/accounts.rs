//! # 后台账号运维命令
//!
//! 绕过 HTTP 直接操作存储，用于首次部署或找回超级管理员。

use anyhow::{Context, bail};
use chrono::Utc;
use simtrade_api::routes::auth::hash_password;
use simtrade_api::types::{validate_password, validate_username};
use simtrade_core::account::entity::{Admin, AdminRole};
use simtrade_core::common::new_id;
use simtrade_core::store::port::{AdminStore, TokenStore};

/// 新建后台账号，首次登录需修改密码
pub async fn create_admin(
    admins: &dyn AdminStore,
    username: &str,
    password: &str,
    role: AdminRole,
) -> anyhow::Result<Admin> {
    validate_username(username)?;
    validate_password(password)?;
    if admins.get_admin_by_username(username).await?.is_some() {
        bail!("admin {} already exists", username);
    }

    let admin = Admin {
        id: new_id(),
        username: username.to_string(),
        password_hash: hash_password(password)?,
        role,
        is_active: true,
        force_password_change: true,
        last_login_at: None,
        created_at: Utc::now(),
    };
    admins.create_admin(&admin).await?;
    tracing::info!("Created {} admin {}", admin.role, admin.username);
    Ok(admin)
}

/// # Summary
/// 重置密码并重新启用账号。
///
/// # Logic
/// 写入新密码、标记强制改密，并吊销该账号全部刷新令牌。
pub async fn reset_password(
    admins: &dyn AdminStore,
    tokens: &dyn TokenStore,
    username: &str,
    password: &str,
) -> anyhow::Result<Admin> {
    validate_password(password)?;
    let mut admin = admins
        .get_admin_by_username(username)
        .await?
        .with_context(|| format!("admin {} not found", username))?;

    admin.password_hash = hash_password(password)?;
    admin.force_password_change = true;
    admin.is_active = true;
    admins.update_admin(&admin).await?;
    let revoked = tokens.revoke_all_for_admin(&admin.id, Utc::now()).await?;

    tracing::info!("Reset password of admin {}, revoked {} token(s)", admin.username, revoked);
    Ok(admin)
}

/// 以表格形式输出账号列表
pub fn format_admins(admins: &[Admin]) -> String {
    let mut out = format!("{:<24} {:<12} {:<8} {:<8} {}\n", "USERNAME", "ROLE", "ACTIVE", "RESET", "LAST LOGIN");
    for a in admins {
        let last_login = a
            .last_login_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        out.push_str(&format!(
            "{:<24} {:<12} {:<8} {:<8} {}\n",
            a.username,
            a.role.as_str(),
            a.is_active,
            a.force_password_change,
            last_login
        ));
    }
    out
}
