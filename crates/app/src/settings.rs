//! # 配置加载
//!
//! 合并顺序 (后者覆盖前者)：内置默认值 → 配置文件 → `SIMTRADE__SECTION__KEY` 环境变量。

use std::path::Path;

use config::{Config, Environment, File};
use simtrade_core::config::AppConfig;

/// 缺省配置文件 (不含扩展名，按 toml/yaml/json 自动识别)
pub const DEFAULT_CONFIG_FILE: &str = "config/simtrade";
pub const ENV_PREFIX: &str = "SIMTRADE";

/// # Summary
/// 加载应用配置。
///
/// # Arguments
/// * `path`: 显式指定的配置文件，必须存在；为 `None` 时尝试读取缺省文件。
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    let builder = match path {
        Some(p) => builder.add_source(File::from(p).required(true)),
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.cors_origins"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090
cors_origins = ["http://localhost:5173"]

[auth]
jwt_secret = "from-file"

[upload]
max_bytes = 1024
"#
        )
        .unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.auth.jwt_secret, "from-file");
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(config.upload.max_bytes, 1024);
        assert_eq!(config.quotes.ttl_secs, 300);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
