use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// 开启后台 IP 白名单校验的设置项
pub const SETTING_IP_WHITELIST_ENABLED: &str = "ip_whitelist_enabled";
/// 站点名称
pub const SETTING_SITE_NAME: &str = "site_name";
/// 子市场默认收益率
pub const SETTING_DEFAULT_RETURN_RATE: &str = "default_return_rate";
/// 新用户赠送的模拟资金
pub const SETTING_SIGNUP_BONUS: &str = "signup_bonus";

/// # Summary
/// 键值型系统设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    /// 按布尔语义解释设置值 (`true` / `1` / `yes` / `on`)
    pub fn as_bool(&self) -> bool {
        matches!(self.value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
    }
}

/// # Summary
/// 后台访问 IP 白名单条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpWhitelistEntry {
    pub id: String,
    pub ip_address: IpAddr,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// # Summary
/// 已签发的刷新令牌。只保存令牌的 SHA-256 摘要。
///
/// # Invariants
/// - 每次刷新都会吊销旧令牌并签发新令牌 (轮换)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub admin_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_setting_bool_parsing() {
        let mut s = Setting {
            key: SETTING_IP_WHITELIST_ENABLED.into(),
            value: " TRUE ".into(),
            description: None,
            updated_at: Utc::now(),
        };
        assert!(s.as_bool());
        s.value = "off".into();
        assert!(!s.as_bool());
    }

    #[test]
    fn test_refresh_token_usability() {
        let now = Utc::now();
        let mut token = RefreshToken {
            id: "t1".into(),
            admin_id: "a1".into(),
            token_hash: "abc".into(),
            expires_at: now + Duration::minutes(5),
            revoked_at: None,
            created_at: now,
        };
        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + Duration::minutes(6)));
        token.revoked_at = Some(now);
        assert!(!token.is_usable(now));
    }
}
