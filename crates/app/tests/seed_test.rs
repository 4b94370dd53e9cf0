use rust_decimal_macros::dec;
use simtrade_app::{accounts, seed, wiring};
use simtrade_core::account::entity::AdminRole;
use simtrade_core::common::PageRequest;
use simtrade_core::config::AppConfig;
use simtrade_core::store::port::UserFilter;
use simtrade_core::system::entity::SETTING_SIGNUP_BONUS;

fn test_config(dir: &tempfile::TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.data_dir = dir.path().join("data").to_string_lossy().into_owned();
    config.upload.dir = dir.path().join("uploads").to_string_lossy().into_owned();
    config.seed.admin_username = "bootstrap".to_string();
    config.seed.admin_password = "bootstrap_pass".to_string();
    config
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let state = wiring::build_state(test_config(&dir)).await.unwrap();

    let first = seed::run(&state).await.unwrap();
    assert_eq!(first.admins, 1);
    assert_eq!(first.settings, 4);
    assert_eq!(first.users, 2);
    assert_eq!(first.sessions, 1);
    assert_eq!(first.content, 6);

    let admin = state.admins.get_admin_by_username("bootstrap").await.unwrap().unwrap();
    assert_eq!(admin.role, AdminRole::SuperAdmin);
    assert!(admin.force_password_change);

    let bonus = state.settings.get_setting(SETTING_SIGNUP_BONUS).await.unwrap().unwrap();
    assert_eq!(bonus.value, "10000");
    let users = state
        .users
        .list_users(&UserFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(users.total, 2);
    assert!(users.items.iter().all(|u| u.balance == dec!(10000)));

    let sessions = state.markets.list_sessions(PageRequest::default()).await.unwrap();
    assert_eq!(sessions.total, 1);
    let subs = state.markets.list_sub_markets(&sessions.items[0].id).await.unwrap();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.return_rate == dec!(0.85)));

    let second = seed::run(&state).await.unwrap();
    assert_eq!(second.total(), 0);
}

#[tokio::test]
async fn test_admin_utilities() {
    let dir = tempfile::tempdir().unwrap();
    let state = wiring::build_state(test_config(&dir)).await.unwrap();

    let created = accounts::create_admin(state.admins.as_ref(), "ops_lead", "ops_password", AdminRole::Admin)
        .await
        .unwrap();
    assert!(created.force_password_change);
    assert!(
        accounts::create_admin(state.admins.as_ref(), "ops_lead", "ops_password", AdminRole::Admin)
            .await
            .is_err()
    );
    assert!(
        accounts::create_admin(state.admins.as_ref(), "x", "ops_password", AdminRole::Admin)
            .await
            .is_err()
    );

    // 停用后重置密码会重新启用账号
    let mut disabled = created.clone();
    disabled.is_active = false;
    disabled.force_password_change = false;
    state.admins.update_admin(&disabled).await.unwrap();

    let reset = accounts::reset_password(state.admins.as_ref(), state.tokens.as_ref(), "ops_lead", "fresh_password")
        .await
        .unwrap();
    assert!(reset.is_active);
    assert!(reset.force_password_change);
    assert!(
        accounts::reset_password(state.admins.as_ref(), state.tokens.as_ref(), "ghost", "fresh_password")
            .await
            .is_err()
    );

    let table = accounts::format_admins(&state.admins.list_admins().await.unwrap());
    assert!(table.starts_with("USERNAME"));
    assert!(table.contains("ops_lead"));
}
