use std::path::PathBuf;

use clap::{Parser, Subcommand};
use simtrade_core::account::entity::AdminRole;

/// SimTrade 后台服务
#[derive(Debug, Parser)]
#[command(name = "simtrade", version, about = "模拟加密货币交易平台后台")]
pub struct Cli {
    /// 配置文件路径，缺省读取 `config/simtrade.toml` (可不存在)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 启动 HTTP 服务 (默认)
    Serve,
    /// 写入初始管理员、默认设置与演示数据，可重复执行
    Seed,
    /// 新建后台账号
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Operator", value_parser = parse_role)]
        role: AdminRole,
    },
    /// 重置后台账号密码，下次登录需修改
    ResetPassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// 列出全部后台账号
    ListAdmins,
}

fn parse_role(raw: &str) -> Result<AdminRole, String> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["simtrade"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_create_admin_args() {
        let cli = Cli::try_parse_from([
            "simtrade",
            "--config",
            "/etc/simtrade.toml",
            "create-admin",
            "--username",
            "ops",
            "--password",
            "secret_pass",
            "--role",
            "Admin",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/simtrade.toml")));
        match cli.command {
            Some(Command::CreateAdmin { username, role, .. }) => {
                assert_eq!(username, "ops");
                assert_eq!(role, AdminRole::Admin);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["simtrade", "create-admin", "--username", "x", "--password", "y", "--role", "Root"]).is_err());
    }
}
