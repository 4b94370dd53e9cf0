use serde::{Deserialize, Serialize};

/// 全局应用配置
///
/// 由 `simtrade-app` 通过 `config` crate 按 默认值 → 配置文件 → 环境变量 的顺序合并加载。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub quotes: QuoteConfig,
    pub seed: SeedConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许跨域的来源。为空时允许任意来源 (开发模式)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access Token 有效期 (秒)
    pub access_ttl_secs: u64,
    /// Refresh Token 有效期 (秒)
    pub refresh_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 86400 * 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// 上传文件落盘目录
    pub dir: String,
    /// 单文件大小上限 (字节)
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    /// 行情条目的存活时间 (秒)，超时未刷新的报价视为失效
    pub ttl_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub admin_username: String,
    pub admin_password: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "admin12345".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` 语法的默认日志级别，`RUST_LOG` 优先
    pub level: String,
    /// 滚动日志文件目录，为空则只输出到终端
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(config.database.data_dir, "data");
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.quotes.ttl_secs, 300);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "server": { "port": 9090 } }"#).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.log.level, "info");
    }
}
