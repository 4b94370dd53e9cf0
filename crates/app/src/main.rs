use clap::Parser;
use tracing::info;

use simtrade_app::cli::{Cli, Command};
use simtrade_app::{accounts, logging, seed, settings, wiring};

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
///
/// # Logic
/// 1. 解析命令行并加载分层配置。
/// 2. 初始化全局日志 (终端 + 按天滚动文件)。
/// 3. 打开数据库，实例化存储、行情缓存与领域服务。
/// 4. 执行子命令；缺省为启动 HTTP 服务并挂起直到收到退出信号。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = settings::load(cli.config.as_deref())?;
    let _log_guard = logging::init(&config.log)?;

    info!("SimTrade starting...");
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = wiring::build_state(config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let purged = state.tokens.purge_expired(chrono::Utc::now()).await?;
            if purged > 0 {
                info!("Purged {} expired refresh token(s)", purged);
            }
            if state.admins.list_admins().await?.is_empty() {
                tracing::warn!("No admin account exists yet, run `simtrade seed` or `simtrade create-admin` first");
            }
            simtrade_api::server::start_server(state, &bind_addr)
                .await
                .map_err(|e| anyhow::anyhow!("API server failed: {}", e))?;
        }
        Command::Seed => {
            let report = seed::run(&state).await?;
            println!("Seeded {} record(s): {:?}", report.total(), report);
        }
        Command::CreateAdmin { username, password, role } => {
            let admin = accounts::create_admin(state.admins.as_ref(), &username, &password, role).await?;
            println!("Created {} admin {} ({})", admin.role, admin.username, admin.id);
        }
        Command::ResetPassword { username, password } => {
            let admin =
                accounts::reset_password(state.admins.as_ref(), state.tokens.as_ref(), &username, &password).await?;
            println!("Password of {} reset, a change is required at next login", admin.username);
        }
        Command::ListAdmins => {
            let admins = state.admins.list_admins().await?;
            print!("{}", accounts::format_admins(&admins));
        }
    }

    Ok(())
}
