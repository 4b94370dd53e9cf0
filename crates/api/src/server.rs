//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI 与上传目录、配置 CORS 与请求日志并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的 DI 容器持有并调用。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::{from_fn, from_fn_with_state};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use simtrade_core::common::time::TimeProvider;
use simtrade_core::config::AppConfig;
use simtrade_core::store::port::{AdminStore, ContentStore, SettingStore, TokenStore, UserStore};
use simtrade_trade::market::MarketService;
use simtrade_trade::quote::QuoteBoard;
use simtrade_trade::service::TransactionService;

use crate::middleware::auth::{auth_middleware, require_admin, require_super_admin};
use crate::middleware::ip_guard::ip_guard;
use crate::routes::{admins, auth, content, markets, settings, tickers, transactions, uploads, users};

/// multipart 边界与表头的额外余量
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - 所有端口与服务在服务启动前由 DI 容器注入，生命周期与进程等同。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub admins: Arc<dyn AdminStore>,
    pub content: Arc<dyn ContentStore>,
    pub settings: Arc<dyn SettingStore>,
    pub tokens: Arc<dyn TokenStore>,
    /// 下单 / 结算 / 撤单
    pub transactions: Arc<TransactionService>,
    /// 场次 / 子市场 / 周期生命周期
    pub markets: Arc<MarketService>,
    pub quotes: Arc<QuoteBoard>,
    /// 业务时间戳来源
    pub clock: Arc<dyn TimeProvider>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SimTrade 后台管理 API",
        version = "0.1.0",
        description = "模拟加密货币交易平台的后台 RESTful API。提供用户与订单管理、场次周期结算、CMS 内容、系统设置等功能。"
    ),
    tags(
        (name = "鉴权 (Auth)", description = "登录、令牌刷新、注销与修改密码"),
        (name = "用户管理 (Users)", description = "平台用户开户、资料、余额与流水"),
        (name = "后台账号 (Admins)", description = "后台管理员账号维护 (超级管理员)"),
        (name = "订单 (Transactions)", description = "模拟订单的下单、结算与撤单"),
        (name = "场次管理 (Markets)", description = "场次、子市场、周期与行情看板"),
        (name = "内容管理 (Content)", description = "评价、轮播、排行榜与图片上传"),
        (name = "系统设置 (Settings)", description = "键值设置与 IP 白名单 (超级管理员)"),
        (name = "公开内容 (Public)", description = "前台展示用的只读接口")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// 为 OpenAPI 文档注入全局 Bearer JWT 鉴权方案。
///
/// 注册后，Swagger UI 页面顶部将显示 Authorize 按钮。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);

        components.add_security_scheme(
            "bearer_jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("在此处填入登录接口返回的 access_token（无需 'Bearer ' 前缀）"))
                    .build(),
            ),
        );
    }
}

// ============================================================
//  路由构建
// ============================================================

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        // 未配置来源时视为开发模式
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// 构建完整的 axum 应用路由树。
///
/// # Logic
/// 1. 公开路由：登录、刷新、行情与前台内容。
/// 2. 登录态路由：注销、修改密码、个人信息。
/// 3. 后台路由 (`/admin/*`、`/transactions/*`)：依次经过 IP 白名单、JWT 鉴权、角色校验。
/// 4. 合并 OpenAPI 文档、Swagger UI、上传目录静态服务，最后套上 CORS 与请求日志。
pub fn build_router(state: AppState) -> Router {
    // 1. 无需鉴权的公开路由
    let public_router = OpenApiRouter::new()
        .routes(routes!(auth::login))
        .routes(routes!(auth::refresh))
        .routes(routes!(tickers::list_tickers))
        .routes(routes!(tickers::get_ticker))
        .routes(routes!(content::public_testimonials))
        .routes(routes!(content::public_carousels))
        .routes(routes!(content::public_leaderboard));

    // 2. 只需要合法 JWT 的路由
    let session_router = OpenApiRouter::new()
        .routes(routes!(auth::logout))
        .routes(routes!(auth::change_password))
        .routes(routes!(auth::me))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    // 3. 运营及以上角色
    let operator_router = OpenApiRouter::new()
        .routes(routes!(transactions::list_transactions, transactions::place_transaction))
        .routes(routes!(transactions::get_transaction))
        .routes(routes!(transactions::settle_transaction))
        .routes(routes!(transactions::cancel_transaction))
        .routes(routes!(markets::list_sessions, markets::create_session))
        .routes(routes!(markets::get_session, markets::delete_session))
        .routes(routes!(markets::open_session))
        .routes(routes!(markets::close_session))
        .routes(routes!(markets::list_sub_markets, markets::create_sub_market))
        .routes(routes!(markets::get_sub_market, markets::update_sub_market))
        .routes(routes!(markets::suspend_sub_market))
        .routes(routes!(markets::activate_sub_market))
        .routes(routes!(markets::list_cycles, markets::start_cycle))
        .routes(routes!(markets::get_cycle))
        .routes(routes!(markets::lock_cycle))
        .routes(routes!(markets::settle_cycle))
        .routes(routes!(tickers::publish_ticker, tickers::remove_ticker))
        .routes(routes!(content::list_testimonials, content::create_testimonial))
        .routes(routes!(
            content::get_testimonial,
            content::update_testimonial,
            content::delete_testimonial
        ))
        .routes(routes!(content::list_carousels, content::create_carousel))
        .routes(routes!(content::get_carousel, content::update_carousel, content::delete_carousel))
        .routes(routes!(content::list_leaderboard, content::create_leaderboard_entry))
        .routes(routes!(
            content::get_leaderboard_entry,
            content::update_leaderboard_entry,
            content::delete_leaderboard_entry
        ))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.clone(), ip_guard));

    // 4. 上传路由单独放宽请求体上限
    let upload_limit = state.config.upload.max_bytes.saturating_add(MULTIPART_OVERHEAD);
    let upload_router = OpenApiRouter::new()
        .routes(routes!(uploads::upload_image))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.clone(), ip_guard));

    // 5. Admin 及以上角色
    let admin_router = OpenApiRouter::new()
        .routes(routes!(users::list_users, users::create_user))
        .routes(routes!(users::get_user, users::update_user, users::delete_user))
        .routes(routes!(users::adjust_balance))
        .routes(routes!(users::list_user_transactions))
        .routes(routes!(users::list_user_ledger))
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.clone(), ip_guard));

    // 6. 仅超级管理员
    let super_admin_router = OpenApiRouter::new()
        .routes(routes!(admins::list_admins, admins::create_admin))
        .routes(routes!(admins::update_admin, admins::delete_admin))
        .routes(routes!(admins::reset_admin_password))
        .routes(routes!(settings::list_settings))
        .routes(routes!(settings::get_setting, settings::put_setting, settings::delete_setting))
        .routes(routes!(settings::list_whitelist, settings::add_whitelist))
        .routes(routes!(settings::delete_whitelist))
        .layer(from_fn(require_super_admin))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.clone(), ip_guard));

    let cors = cors_layer(&state.config);
    let upload_dir = state.config.upload.dir.clone();

    // 7. 合并所有路由与自动收集的 OpenAPI Doc
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(public_router)
        .merge(session_router)
        .merge(operator_router)
        .merge(upload_router)
        .merge(admin_router)
        .merge(super_admin_router)
        .with_state(state)
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================
//  服务启动
// ============================================================

/// 构建路由并启动 HTTP 监听，收到 Ctrl-C 后优雅退出。
///
/// # Arguments
/// * `state` - 由外部 DI 容器注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
pub async fn start_server(state: AppState, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    tracing::info!("SimTrade API Server listening on {}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    // IP 白名单依赖 ConnectInfo 提供的对端地址
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
