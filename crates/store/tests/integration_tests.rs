use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use simtrade_core::account::entity::{Admin, AdminRole, User, UserStatus};
use simtrade_core::common::{PageRequest, new_id};
use simtrade_core::content::entity::{CarouselItem, LeaderboardEntry, LeaderboardPeriod, Testimonial};
use simtrade_core::market::entity::{
    CycleStatus, MarketSession, SessionStatus, SubMarket, SubMarketCycle, SubMarketStatus,
};
use simtrade_core::store::error::StoreError;
use simtrade_core::store::port::{
    AdminStore, ContentStore, MarketStore, SettingStore, TokenStore, TransactionStore, UserFilter, UserStore,
};
use simtrade_core::system::entity::{IpWhitelistEntry, RefreshToken, Setting};
use simtrade_core::trade::entity::{Direction, Transaction, TransactionFilter, TransactionStatus};
use simtrade_store::Database;
use simtrade_store::admin::SqliteAdminStore;
use simtrade_store::content::SqliteContentStore;
use simtrade_store::market::SqliteMarketStore;
use simtrade_store::system::{SqliteSettingStore, SqliteTokenStore};
use simtrade_store::transaction::SqliteTransactionStore;
use simtrade_store::user::SqliteUserStore;
use tempfile::{TempDir, tempdir};

async fn open_db() -> (TempDir, Database) {
    let dir = tempdir().expect("Failed to create temp dir");
    let db = Database::open(dir.path()).await.expect("Failed to open database");
    (dir, db)
}

fn user(name: &str, balance: Decimal) -> User {
    let now = Utc::now();
    User {
        id: new_id(),
        email: format!("{}@example.com", name),
        username: name.to_string(),
        password_hash: "hash".to_string(),
        balance,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

fn pending_tx(user_id: &str, cycle_id: Option<String>, amount: Decimal) -> Transaction {
    Transaction {
        id: new_id(),
        user_id: user_id.to_string(),
        cycle_id,
        symbol: "BTCUSDT".to_string(),
        direction: Direction::Up,
        amount,
        entry_price: dec!(100),
        exit_price: None,
        return_rate: dec!(0.8),
        status: TransactionStatus::Pending,
        payout: None,
        profit: None,
        created_at: Utc::now(),
        settled_at: None,
    }
}

#[tokio::test]
async fn test_user_crud_and_filter() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let store = SqliteUserStore::new(db.pool());

    let alice = user("alice", dec!(1000));
    let bob = user("bob", Decimal::ZERO);
    store.create_user(&alice).await?;
    store.create_user(&bob).await?;

    // 重复用户名
    let mut dup = user("alice", Decimal::ZERO);
    dup.email = "other@example.com".to_string();
    assert!(matches!(store.create_user(&dup).await, Err(StoreError::Conflict(_))));

    let loaded = store.get_user(&alice.id).await?.expect("alice should exist");
    assert_eq!(loaded.balance, dec!(1000));

    let filter = UserFilter {
        query: Some("ali".to_string()),
        status: None,
    };
    let page = store.list_users(&filter, PageRequest::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].username, "alice");

    let mut suspended = bob.clone();
    suspended.status = UserStatus::Suspended;
    suspended.balance = dec!(999);
    store.update_user(&suspended).await?;
    let bob_loaded = store.get_user(&bob.id).await?.expect("bob should exist");
    assert_eq!(bob_loaded.status, UserStatus::Suspended);
    // update_user 不触碰余额
    assert_eq!(bob_loaded.balance, Decimal::ZERO);

    let filter = UserFilter {
        query: None,
        status: Some(UserStatus::Suspended),
    };
    assert_eq!(store.list_users(&filter, PageRequest::default()).await?.total, 1);

    let page = store.list_users(&UserFilter::default(), PageRequest::new(2, 1)).await?;
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);

    // 只有调账流水的用户可以删除，流水一并清除
    store.adjust_balance(&bob.id, dec!(25), "manual credit").await?;
    store.delete_user(&bob.id).await?;
    assert!(store.get_user(&bob.id).await?.is_none());
    assert!(store.list_ledger(&bob.id, PageRequest::default()).await?.items.is_empty());
    assert!(matches!(store.delete_user(&bob.id).await, Err(StoreError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_balance_adjust_and_ledger() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let store = SqliteUserStore::new(db.pool());
    let u = user("carol", dec!(100));
    store.create_user(&u).await?;

    let entry = store.adjust_balance(&u.id, dec!(50.5), "Bonus").await?;
    assert_eq!(entry.balance_after, dec!(150.5));

    let err = store.adjust_balance(&u.id, dec!(-200), "Too much").await;
    match err {
        Err(StoreError::InsufficientBalance { required, actual }) => {
            assert_eq!(required, dec!(200));
            assert_eq!(actual, dec!(150.5));
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let loaded = store.get_user(&u.id).await?.expect("user should exist");
    assert_eq!(loaded.balance, dec!(150.5));

    // 开户流水 + 一笔调整
    let ledger = store.list_ledger(&u.id, PageRequest::default()).await?;
    assert_eq!(ledger.total, 2);
    assert_eq!(ledger.items[0].reason, "Bonus");

    assert!(matches!(
        store.adjust_balance("missing", dec!(1), "x").await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_transaction_place_and_finalize() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let users = SqliteUserStore::new(db.pool());
    let txs = SqliteTransactionStore::new(db.pool());

    let u = user("dave", dec!(100));
    users.create_user(&u).await?;

    let t = pending_tx(&u.id, None, dec!(40));
    let entry = txs.place_transaction(&t).await?;
    assert_eq!(entry.balance_after, dec!(60));

    // 余额不足时订单不落库
    let too_big = pending_tx(&u.id, None, dec!(500));
    assert!(matches!(
        txs.place_transaction(&too_big).await,
        Err(StoreError::InsufficientBalance { .. })
    ));
    assert!(txs.get_transaction(&too_big.id).await?.is_none());

    let mut won = t.clone();
    won.status = TransactionStatus::Won;
    won.exit_price = Some(dec!(110));
    won.payout = Some(dec!(72));
    won.profit = Some(dec!(32));
    won.settled_at = Some(Utc::now());
    txs.finalize_transaction(&won).await?;

    let balance = users.get_user(&u.id).await?.expect("user").balance;
    assert_eq!(balance, dec!(132));

    // 二次结算被拒绝且余额不变
    assert!(matches!(txs.finalize_transaction(&won).await, Err(StoreError::Conflict(_))));
    assert_eq!(users.get_user(&u.id).await?.expect("user").balance, dec!(132));

    let mut not_terminal = t.clone();
    not_terminal.status = TransactionStatus::Pending;
    assert!(matches!(
        txs.finalize_transaction(&not_terminal).await,
        Err(StoreError::Conflict(_))
    ));

    let filter = TransactionFilter {
        user_id: Some(u.id.clone()),
        status: Some(TransactionStatus::Won),
        ..Default::default()
    };
    let page = txs.list_transactions(&filter, PageRequest::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].payout, Some(dec!(72)));

    // 有订单的用户不能删除，流水随事务回滚保留
    let ledger_before = users.list_ledger(&u.id, PageRequest::default()).await?.total;
    assert!(matches!(users.delete_user(&u.id).await, Err(StoreError::Conflict(_))));
    assert!(ledger_before > 0);
    assert_eq!(users.list_ledger(&u.id, PageRequest::default()).await?.total, ledger_before);
    Ok(())
}

#[tokio::test]
async fn test_market_hierarchy() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let markets = SqliteMarketStore::new(db.pool());
    let users = SqliteUserStore::new(db.pool());
    let txs = SqliteTransactionStore::new(db.pool());
    let now = Utc::now();

    let session = MarketSession {
        id: new_id(),
        name: "Morning".to_string(),
        symbol: "BTCUSDT".to_string(),
        status: SessionStatus::Open,
        opens_at: now,
        closes_at: now + Duration::hours(4),
        created_at: now,
    };
    markets.create_session(&session).await?;

    let sub = SubMarket {
        id: new_id(),
        session_id: session.id.clone(),
        name: "60s".to_string(),
        return_rate: dec!(0.85),
        cycle_seconds: 60,
        status: SubMarketStatus::Active,
        created_at: now,
    };
    markets.create_sub_market(&sub).await?;

    let mut first = SubMarketCycle {
        id: new_id(),
        sub_market_id: sub.id.clone(),
        sequence: 1,
        start_price: dec!(100),
        end_price: None,
        starts_at: now,
        ends_at: now + Duration::seconds(60),
        status: CycleStatus::Open,
        settled_at: None,
    };
    markets.create_cycle(&first).await?;

    let mut dup = first.clone();
    dup.id = new_id();
    assert!(matches!(markets.create_cycle(&dup).await, Err(StoreError::Conflict(_))));

    assert_eq!(markets.count_unsettled_cycles(&session.id).await?, 1);

    first.status = CycleStatus::Settled;
    first.end_price = Some(dec!(101));
    first.settled_at = Some(now);
    markets.update_cycle(&first, CycleStatus::Open).await?;
    assert_eq!(markets.count_unsettled_cycles(&session.id).await?, 0);

    let second = SubMarketCycle {
        id: new_id(),
        sequence: 2,
        status: CycleStatus::Open,
        end_price: None,
        settled_at: None,
        ..first.clone()
    };
    markets.create_cycle(&second).await?;

    let latest = markets.latest_cycle(&sub.id).await?.expect("latest cycle");
    assert_eq!(latest.sequence, 2);
    let cycles = markets.list_cycles(&sub.id).await?;
    assert_eq!(cycles.iter().map(|c| c.sequence).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(cycles[1].end_price, Some(dec!(101)));

    let u = user("erin", dec!(20));
    users.create_user(&u).await?;
    txs.place_transaction(&pending_tx(&u.id, Some(second.id.clone()), dec!(5))).await?;
    txs.place_transaction(&pending_tx(&u.id, Some(second.id.clone()), dec!(5))).await?;
    assert_eq!(txs.list_pending_by_cycle(&second.id).await?.len(), 2);

    // 不存在的周期不接受订单
    assert!(matches!(
        txs.place_transaction(&pending_tx(&u.id, Some("nope".to_string()), dec!(0.5))).await,
        Err(StoreError::Conflict(_))
    ));

    let listed = markets.list_sub_markets(&session.id).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].return_rate, dec!(0.85));

    let page = markets.list_sessions(PageRequest::default()).await?;
    assert_eq!(page.total, 1);
    Ok(())
}

#[tokio::test]
async fn test_cycle_status_is_checked_at_write_time() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let markets = SqliteMarketStore::new(db.pool());
    let users = SqliteUserStore::new(db.pool());
    let txs = SqliteTransactionStore::new(db.pool());
    let now = Utc::now();

    let session = MarketSession {
        id: new_id(),
        name: "Evening".to_string(),
        symbol: "ETHUSDT".to_string(),
        status: SessionStatus::Open,
        opens_at: now,
        closes_at: now + Duration::hours(2),
        created_at: now,
    };
    markets.create_session(&session).await?;
    let sub = SubMarket {
        id: new_id(),
        session_id: session.id.clone(),
        name: "30s".to_string(),
        return_rate: dec!(0.9),
        cycle_seconds: 30,
        status: SubMarketStatus::Active,
        created_at: now,
    };
    markets.create_sub_market(&sub).await?;
    let open = SubMarketCycle {
        id: new_id(),
        sub_market_id: sub.id.clone(),
        sequence: 1,
        start_price: dec!(2000),
        end_price: None,
        starts_at: now,
        ends_at: now + Duration::seconds(30),
        status: CycleStatus::Open,
        settled_at: None,
    };
    markets.create_cycle(&open).await?;

    let u = user("frank", dec!(50));
    users.create_user(&u).await?;

    // 下单前读到的是 Open，写入前周期已被锁定
    let mut locked = open.clone();
    locked.status = CycleStatus::Locked;
    markets.update_cycle(&locked, CycleStatus::Open).await?;
    assert!(matches!(
        txs.place_transaction(&pending_tx(&u.id, Some(open.id.clone()), dec!(5))).await,
        Err(StoreError::Conflict(_))
    ));
    // 被拒绝的订单不扣款、不留流水
    let after = users.get_user(&u.id).await?.expect("user");
    assert_eq!(after.balance, dec!(50));
    assert!(users.list_ledger(&u.id, PageRequest::default()).await?.items.is_empty());

    // 重复锁定：期望 Open 但库中已是 Locked
    assert!(matches!(
        markets.update_cycle(&locked, CycleStatus::Open).await,
        Err(StoreError::Conflict(_))
    ));

    let mut settled = locked.clone();
    settled.status = CycleStatus::Settled;
    settled.end_price = Some(dec!(2010));
    settled.settled_at = Some(now);
    markets.update_cycle(&settled, CycleStatus::Locked).await?;

    // 过期副本不能把终态写回 Locked
    assert!(matches!(
        markets.update_cycle(&locked, CycleStatus::Open).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(matches!(
        markets.update_cycle(&locked, CycleStatus::Locked).await,
        Err(StoreError::Conflict(_))
    ));
    let current = markets.get_cycle(&open.id).await?.expect("cycle");
    assert_eq!(current.status, CycleStatus::Settled);
    assert_eq!(current.end_price, Some(dec!(2010)));

    // 已结算周期同样拒绝新订单
    assert!(matches!(
        txs.place_transaction(&pending_tx(&u.id, Some(open.id.clone()), dec!(5))).await,
        Err(StoreError::Conflict(_))
    ));
    assert!(txs.list_pending_by_cycle(&open.id).await?.is_empty());

    // 不挂周期的订单不受影响
    txs.place_transaction(&pending_tx(&u.id, None, dec!(5))).await?;
    assert_eq!(users.get_user(&u.id).await?.expect("user").balance, dec!(45));

    let mut ghost = locked.clone();
    ghost.id = new_id();
    assert!(matches!(
        markets.update_cycle(&ghost, CycleStatus::Locked).await,
        Err(StoreError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_content_ordering_and_visibility() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let store = SqliteContentStore::new(db.pool());
    let now = Utc::now();

    for (i, published) in [(2, true), (1, false), (3, true)] {
        store
            .save_testimonial(&Testimonial {
                id: format!("t{}", i),
                author_name: format!("Author {}", i),
                author_title: None,
                content: "Great".to_string(),
                avatar_url: None,
                rating: 5,
                is_published: published,
                sort_order: i,
                created_at: now,
            })
            .await?;
    }
    let all = store.list_testimonials(false).await?;
    assert_eq!(all.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["t1", "t2", "t3"]);
    let public = store.list_testimonials(true).await?;
    assert_eq!(public.len(), 2);

    // upsert
    let mut t1 = store.get_testimonial("t1").await?.expect("t1");
    t1.is_published = true;
    store.save_testimonial(&t1).await?;
    assert_eq!(store.list_testimonials(true).await?.len(), 3);

    store
        .save_carousel(&CarouselItem {
            id: "c1".to_string(),
            title: "Welcome".to_string(),
            subtitle: None,
            image_url: "/uploads/a.png".to_string(),
            link_url: None,
            sort_order: 0,
            is_active: false,
            created_at: now,
        })
        .await?;
    assert!(store.list_carousels(true).await?.is_empty());
    assert_eq!(store.list_carousels(false).await?.len(), 1);
    store.delete_carousel("c1").await?;
    assert!(matches!(store.delete_carousel("c1").await, Err(StoreError::NotFound(_))));

    for (rank, period) in [(2, LeaderboardPeriod::Daily), (1, LeaderboardPeriod::Daily), (1, LeaderboardPeriod::Weekly)] {
        store
            .save_leaderboard_entry(&LeaderboardEntry {
                id: new_id(),
                display_name: format!("Trader {}", rank),
                avatar_url: None,
                profit: dec!(1234.5),
                win_rate: dec!(66.7),
                rank,
                period,
                created_at: now,
            })
            .await?;
    }
    let daily = store.list_leaderboard(Some(LeaderboardPeriod::Daily)).await?;
    assert_eq!(daily.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(daily[0].profit, dec!(1234.5));
    assert_eq!(store.list_leaderboard(None).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_settings_and_whitelist() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let store = SqliteSettingStore::new(db.pool());

    let mut setting = Setting {
        key: "ip_whitelist_enabled".to_string(),
        value: "false".to_string(),
        description: Some("Restrict admin access".to_string()),
        updated_at: Utc::now(),
    };
    store.put_setting(&setting).await?;
    setting.value = "true".to_string();
    setting.description = None;
    store.put_setting(&setting).await?;

    let loaded = store.get_setting("ip_whitelist_enabled").await?.expect("setting");
    assert!(loaded.as_bool());
    assert_eq!(loaded.description.as_deref(), Some("Restrict admin access"));
    assert_eq!(store.list_settings().await?.len(), 1);

    let entry = IpWhitelistEntry {
        id: new_id(),
        ip_address: "10.0.0.7".parse()?,
        description: None,
        created_at: Utc::now(),
    };
    store.add_whitelist(&entry).await?;
    let dup = IpWhitelistEntry {
        id: new_id(),
        ..entry.clone()
    };
    assert!(matches!(store.add_whitelist(&dup).await, Err(StoreError::Conflict(_))));

    assert!(store.is_whitelisted("10.0.0.7".parse()?).await?);
    assert!(!store.is_whitelisted("10.0.0.8".parse()?).await?);

    store.delete_whitelist(&entry.id).await?;
    assert!(store.list_whitelist().await?.is_empty());

    store.delete_setting("ip_whitelist_enabled").await?;
    assert!(store.get_setting("ip_whitelist_enabled").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_admins_and_refresh_tokens() -> anyhow::Result<()> {
    let (_dir, db) = open_db().await;
    let admins = SqliteAdminStore::new(db.pool());
    let tokens = SqliteTokenStore::new(db.pool());
    let now = Utc::now();

    let root = Admin {
        id: new_id(),
        username: "root".to_string(),
        password_hash: "hash".to_string(),
        role: AdminRole::SuperAdmin,
        is_active: true,
        force_password_change: false,
        last_login_at: None,
        created_at: now,
    };
    admins.create_admin(&root).await?;
    assert_eq!(admins.count_active_super_admins().await?, 1);
    assert!(admins.get_admin_by_username("root").await?.is_some());

    let token = |hash: &str, expires_in: Duration| RefreshToken {
        id: new_id(),
        admin_id: root.id.clone(),
        token_hash: hash.to_string(),
        expires_at: now + expires_in,
        revoked_at: None,
        created_at: now,
    };
    let live = token("h-live", Duration::days(7));
    let other = token("h-other", Duration::days(7));
    let stale = token("h-stale", Duration::days(-1));
    tokens.save_refresh_token(&live).await?;
    tokens.save_refresh_token(&other).await?;
    tokens.save_refresh_token(&stale).await?;

    let found = tokens.find_refresh_token("h-live").await?.expect("token");
    assert!(found.is_usable(now));

    // 只有第一次吊销成功
    assert!(tokens.revoke_refresh_token(&live.id, now).await?);
    assert!(!tokens.revoke_refresh_token(&live.id, now).await?);

    // live 已吊销，剩 other 与 stale
    assert_eq!(tokens.revoke_all_for_admin(&root.id, now).await?, 2);
    assert_eq!(tokens.purge_expired(now).await?, 1);
    assert!(tokens.find_refresh_token("h-stale").await?.is_none());

    // 删除管理员时级联删除令牌
    admins.delete_admin(&root.id).await?;
    assert!(tokens.find_refresh_token("h-other").await?.is_none());
    assert_eq!(admins.count_active_super_admins().await?, 0);
    Ok(())
}
