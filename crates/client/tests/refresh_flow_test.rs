use chrono::Utc;
use rust_decimal_macros::dec;
use simtrade_api::routes::auth::hash_password;
use simtrade_api::server::{AppState, build_router};
use simtrade_api::types::{CreateUserRequest, UserListQuery};
use simtrade_cache::mem::MemCache;
use simtrade_client::{ApiClient, AuthEvent, ClientError};
use simtrade_core::account::entity::{Admin, AdminRole};
use simtrade_core::common::new_id;
use simtrade_core::common::time::RealTimeProvider;
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
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

// 帮助函数：启动一个带超级管理员 `root` / `root_password` 的测试服务器
async fn spawn_server() -> anyhow::Result<(String, AppState, TempDir)> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path()).await?;

    let mut config = AppConfig::default();
    config.auth.jwt_secret = "client-test-secret".to_string();
    config.upload.dir = dir.path().join("uploads").to_string_lossy().into_owned();

    let clock = Arc::new(RealTimeProvider);
    let users = Arc::new(SqliteUserStore::new(db.pool()));
    let markets_store = Arc::new(SqliteMarketStore::new(db.pool()));
    let quotes = Arc::new(QuoteBoard::new(Arc::new(MemCache::new()), std::time::Duration::from_secs(300)));
    let transactions = Arc::new(TransactionService::new(
        users.clone(),
        Arc::new(SqliteTransactionStore::new(db.pool())),
        markets_store.clone(),
        quotes.clone(),
        clock.clone(),
    ));
    let markets = Arc::new(MarketService::new(markets_store, transactions.clone(), quotes.clone(), clock.clone()));

    let state = AppState {
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
    };

    state
        .admins
        .create_admin(&Admin {
            id: new_id(),
            username: "root".to_string(),
            password_hash: hash_password("root_password")?,
            role: AdminRole::SuperAdmin,
            is_active: true,
            force_password_change: false,
            last_login_at: None,
            created_at: Utc::now(),
        })
        .await?;

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .ok();
    });

    Ok((format!("http://{}", addr), state, dir))
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() -> anyhow::Result<()> {
    let (base, _state, _dir) = spawn_server().await?;
    let client = ApiClient::new(base)?;
    let tokens = client.login("root", "root_password").await?;

    // Access Token 失效，Refresh Token 仍然有效
    client.set_tokens("garbage", tokens.refresh_token.clone());

    // 若并发请求各自刷新，第二次刷新会被当作重放并吊销全部令牌
    let (a, b, c, d, e) = tokio::join!(client.me(), client.me(), client.me(), client.me(), client.me());
    for result in [a, b, c, d, e] {
        assert_eq!(result?.username, "root");
    }

    let rotated = client.refresh_token().expect("refresh token");
    assert_ne!(rotated, tokens.refresh_token);

    // 轮换后的令牌链仍然可用
    client.set_tokens("garbage-again", rotated);
    let me = client.me().await?;
    assert_eq!(me.role, AdminRole::SuperAdmin);
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_expires_session() -> anyhow::Result<()> {
    let (base, _state, _dir) = spawn_server().await?;
    let client = ApiClient::new(base)?;
    let mut events = client.events();

    client.set_tokens("garbage", "not-a-refresh-token");
    let err = client.me().await.expect_err("refresh must fail");
    assert!(matches!(err, ClientError::SessionExpired));
    assert!(!client.is_authenticated());
    assert_eq!(events.recv().await?, AuthEvent::SessionExpired);

    // 登录失败不触发刷新
    let err = client.login("root", "wrong_password").await.expect_err("bad password");
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_forbidden_is_broadcast() -> anyhow::Result<()> {
    let (base, _state, _dir) = spawn_server().await?;
    let root = ApiClient::new(base.clone())?;
    root.login("root", "root_password").await?;

    let _: serde_json::Value = root
        .post(
            "/admin/admins",
            &serde_json::json!({ "username": "op", "password": "op_password", "role": "Operator" }),
        )
        .await?;

    let op = ApiClient::new(base)?;
    let mut events = op.events();
    op.login("op", "op_password").await?;

    // 新账号需要先改密
    let err = op.me().await.expect_err("must change password first");
    assert_eq!(err.status(), Some(403));
    assert_eq!(events.recv().await?, AuthEvent::Forbidden { path: "/auth/me".to_string() });
    assert!(op.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_typed_helpers_and_logout() -> anyhow::Result<()> {
    let (base, _state, _dir) = spawn_server().await?;
    let client = ApiClient::new(base)?;
    client.login("root", "root_password").await?;

    let user = client
        .create_user(&CreateUserRequest {
            email: "carol@example.com".to_string(),
            username: "carol".to_string(),
            password: "carol_password".to_string(),
            initial_balance: Some(dec!(500)),
        })
        .await?;
    let entry = client.adjust_balance(&user.id, dec!(25.5), "bonus").await?;
    assert_eq!(entry.balance_after, dec!(525.5));

    let page = client
        .list_users(&UserListQuery {
            page: Some(1),
            page_size: Some(5),
            q: Some("car".to_string()),
            status: None,
        })
        .await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].username, "carol");

    let ticker = client.publish_ticker("solusdt", dec!(150)).await?;
    assert_eq!(ticker.symbol, "SOLUSDT");
    assert_eq!(client.list_tickers().await?.len(), 1);

    let setting = client.put_setting("site_name", "Client Test").await?;
    assert_eq!(setting.value, "Client Test");
    let entry = client.add_whitelist("192.168.1.10", Some("lab")).await?;
    assert_eq!(entry.ip_address, "192.168.1.10");

    let err = client.get_user("missing").await.expect_err("not found");
    assert_eq!(err.status(), Some(404));

    let refresh = client.refresh_token().expect("refresh token");
    client.logout().await?;
    assert!(!client.is_authenticated());

    // 注销后的刷新令牌不可再用
    client.set_tokens("garbage", refresh);
    assert!(matches!(client.me().await, Err(ClientError::SessionExpired)));
    Ok(())
}
