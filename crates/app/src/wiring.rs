use std::sync::Arc;
use std::time::Duration;

use simtrade_api::server::AppState;
use simtrade_cache::mem::MemCache;
use simtrade_core::common::time::{RealTimeProvider, TimeProvider};
use simtrade_core::config::AppConfig;
use simtrade_store::Database;
use simtrade_store::admin::SqliteAdminStore;
use simtrade_store::content::SqliteContentStore;
use simtrade_store::market::SqliteMarketStore;
use simtrade_store::system::{SqliteSettingStore, SqliteTokenStore};
use simtrade_store::transaction::SqliteTransactionStore;
use simtrade_store::user::SqliteUserStore;
use simtrade_trade::market::MarketService;
use simtrade_trade::quote::QuoteBoard;
use simtrade_trade::service::TransactionService;

/// # Summary
/// 实例化全部基础设施与服务，组装为 API 层共享状态。
///
/// # Logic
/// 1. 打开数据目录下的 SQLite 数据库 (幂等建表)。
/// 2. 构造存储实现与行情缓存。
/// 3. 构造订单服务与场次服务，注入真实时钟。
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let db = Database::open(&config.database.data_dir).await?;
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);

    let users = Arc::new(SqliteUserStore::new(db.pool()));
    let markets_store = Arc::new(SqliteMarketStore::new(db.pool()));
    let quotes = Arc::new(QuoteBoard::new(
        Arc::new(MemCache::new()),
        Duration::from_secs(config.quotes.ttl_secs),
    ));

    let transactions = Arc::new(TransactionService::new(
        users.clone(),
        Arc::new(SqliteTransactionStore::new(db.pool())),
        markets_store.clone(),
        quotes.clone(),
        clock.clone(),
    ));
    let markets = Arc::new(MarketService::new(
        markets_store,
        transactions.clone(),
        quotes.clone(),
        clock.clone(),
    ));

    Ok(AppState {
        config: Arc::new(config),
        users,
        admins: Arc::new(SqliteAdminStore::new(db.pool())),
        content: Arc::new(SqliteContentStore::new(db.pool())),
        settings: Arc::new(SqliteSettingStore::new(db.pool())),
        tokens: Arc::new(SqliteTokenStore::new(db.pool())),
        transactions,
        markets,
        quotes,
        clock,
    })
}
