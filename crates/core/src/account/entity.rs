use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// # Summary
/// 平台用户 (模拟交易参与者) 的账户状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UserStatus {
    /// 正常
    Active,
    /// 暂停交易，可恢复
    Suspended,
    /// 封禁
    Banned,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Suspended => "Suspended",
            UserStatus::Banned => "Banned",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(UserStatus::Active),
            "Suspended" => Ok(UserStatus::Suspended),
            "Banned" => Ok(UserStatus::Banned),
            _ => Err(format!("Unknown UserStatus: {}", s)),
        }
    }
}

/// # Summary
/// 平台用户实体。
///
/// # Invariants
/// - `email` 与 `username` 全局唯一。
/// - `balance` 永不为负，所有变动都伴随一条 `BalanceEntry`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    /// 模拟资金余额
    pub balance: Decimal,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// # Summary
/// 用户资金流水，记录每一次余额变动。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: String,
    pub user_id: String,
    /// 变动金额 (正为入账，负为出账)
    pub delta: Decimal,
    /// 变动后的余额
    pub balance_after: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 后台管理员角色，权限由高到低。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum AdminRole {
    /// 运营：交易结算、场次管理、内容管理
    Operator,
    /// 管理员：在运营权限基础上管理平台用户
    Admin,
    /// 超级管理员：管理后台账号、系统设置与 IP 白名单
    SuperAdmin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::Operator => "Operator",
            AdminRole::Admin => "Admin",
            AdminRole::SuperAdmin => "SuperAdmin",
        }
    }

    /// 当前角色是否至少拥有 `required` 级别的权限
    pub fn at_least(&self, required: AdminRole) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Operator" => Ok(AdminRole::Operator),
            "Admin" => Ok(AdminRole::Admin),
            "SuperAdmin" => Ok(AdminRole::SuperAdmin),
            _ => Err(format!("Unknown AdminRole: {}", s)),
        }
    }
}

/// # Summary
/// 后台管理员账号。
///
/// # Invariants
/// - `username` 全局唯一。
/// - `force_password_change` 为真时，除修改密码外的所有受保护接口均拒绝访问。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub is_active: bool,
    pub force_password_change: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(AdminRole::SuperAdmin.at_least(AdminRole::Admin));
        assert!(AdminRole::Admin.at_least(AdminRole::Operator));
        assert!(!AdminRole::Operator.at_least(AdminRole::Admin));
        assert!(AdminRole::Admin.at_least(AdminRole::Admin));
    }

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [AdminRole::Operator, AdminRole::Admin, AdminRole::SuperAdmin] {
            assert_eq!(role.to_string().parse::<AdminRole>(), Ok(role));
        }
        assert!("root".parse::<AdminRole>().is_err());
    }
}
