use simtrade_core::config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "simtrade.log";

/// # Summary
/// 初始化全局日志。
///
/// # Logic
/// 1. `RUST_LOG` 优先，否则使用配置中的级别。
/// 2. 始终输出到终端。
/// 3. 配置了日志目录时，额外按天滚动写入文件 (非阻塞)。
///
/// # Returns
/// 文件写入器的守卫，必须持有到进程退出，否则尾部日志会丢失。
pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if config.dir.trim().is_empty() {
        registry.try_init()?;
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()?;
    Ok(Some(guard))
}
