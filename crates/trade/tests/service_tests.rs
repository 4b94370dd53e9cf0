use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use simtrade_cache::mem::MemCache;
use simtrade_core::account::entity::{User, UserStatus};
use simtrade_core::common::time::{FakeClockProvider, TimeProvider};
use simtrade_core::common::{PageRequest, new_id};
use simtrade_core::market::entity::{CycleStatus, MarketTicker, SessionStatus};
use simtrade_core::market::error::MarketError;
use simtrade_core::store::port::{MarketStore, UserStore};
use simtrade_core::trade::entity::{Direction, NewTransaction, TransactionFilter, TransactionStatus};
use simtrade_core::trade::error::TradeError;
use simtrade_store::Database;
use simtrade_store::market::SqliteMarketStore;
use simtrade_store::transaction::SqliteTransactionStore;
use simtrade_store::user::SqliteUserStore;
use simtrade_trade::market::{MarketService, NewSession, NewSubMarket, SubMarketUpdate};
use simtrade_trade::quote::QuoteBoard;
use simtrade_trade::service::TransactionService;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    users: Arc<SqliteUserStore>,
    markets_store: Arc<SqliteMarketStore>,
    clock: Arc<FakeClockProvider>,
    quotes: Arc<QuoteBoard>,
    transactions: Arc<TransactionService>,
    markets: MarketService,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = Database::open(dir.path()).await.expect("Failed to open database");

    let users = Arc::new(SqliteUserStore::new(db.pool()));
    let tx_store = Arc::new(SqliteTransactionStore::new(db.pool()));
    let markets_store = Arc::new(SqliteMarketStore::new(db.pool()));
    let clock = Arc::new(FakeClockProvider::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()));
    let quotes = Arc::new(QuoteBoard::new(Arc::new(MemCache::new()), std::time::Duration::from_secs(300)));

    let transactions = Arc::new(TransactionService::new(
        users.clone(),
        tx_store,
        markets_store.clone(),
        quotes.clone(),
        clock.clone(),
    ));
    let markets = MarketService::new(markets_store.clone(), transactions.clone(), quotes.clone(), clock.clone());

    Harness {
        _dir: dir,
        users,
        markets_store,
        clock,
        quotes,
        transactions,
        markets,
    }
}

impl Harness {
    fn clock_now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }
}

async fn add_user(h: &Harness, name: &str, balance: Decimal) -> User {
    let now = Utc::now();
    let user = User {
        id: new_id(),
        email: format!("{}@example.com", name),
        username: name.to_string(),
        password_hash: "hash".to_string(),
        balance,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
    };
    h.users.create_user(&user).await.unwrap();
    user
}

async fn balance_of(h: &Harness, user_id: &str) -> Decimal {
    h.users.get_user(user_id).await.unwrap().unwrap().balance
}

fn free_order(user_id: &str, direction: Direction, amount: Decimal) -> NewTransaction {
    NewTransaction {
        user_id: user_id.to_string(),
        cycle_id: None,
        symbol: Some("btcusdt".to_string()),
        direction,
        amount,
        entry_price: Some(dec!(50000)),
        return_rate: Some(dec!(0.85)),
    }
}

#[tokio::test]
async fn test_place_and_settle_free_transaction() {
    let h = setup().await;
    let user = add_user(&h, "alice", dec!(1000)).await;

    let tx = h.transactions.place(free_order(&user.id, Direction::Up, dec!(100))).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.symbol, "BTCUSDT");
    assert_eq!(balance_of(&h, &user.id).await, dec!(900));

    h.clock.advance(Duration::seconds(30));
    let settled = h.transactions.settle(&tx.id, dec!(50100)).await.unwrap();
    assert_eq!(settled.status, TransactionStatus::Won);
    assert_eq!(settled.payout, Some(dec!(185)));
    assert_eq!(settled.profit, Some(dec!(85)));
    assert_eq!(settled.settled_at, Some(h.clock_now()));
    assert_eq!(balance_of(&h, &user.id).await, dec!(1085));

    // 终态订单不可再次结算或撤销
    assert!(matches!(
        h.transactions.settle(&tx.id, dec!(1)).await,
        Err(TradeError::InvalidStatus(_))
    ));
    assert!(matches!(h.transactions.cancel(&tx.id).await, Err(TradeError::InvalidStatus(_))));
}

#[tokio::test]
async fn test_lost_draw_and_cancel() {
    let h = setup().await;
    let user = add_user(&h, "bob", dec!(300)).await;

    let lose = h.transactions.place(free_order(&user.id, Direction::Down, dec!(100))).await.unwrap();
    let draw = h.transactions.place(free_order(&user.id, Direction::Down, dec!(100))).await.unwrap();
    let cancel = h.transactions.place(free_order(&user.id, Direction::Up, dec!(100))).await.unwrap();
    assert_eq!(balance_of(&h, &user.id).await, dec!(0));

    let lost = h.transactions.settle(&lose.id, dec!(50001)).await.unwrap();
    assert_eq!(lost.status, TransactionStatus::Lost);
    assert_eq!(lost.payout, Some(dec!(0)));
    assert_eq!(lost.profit, Some(dec!(-100)));

    let drawn = h.transactions.settle(&draw.id, dec!(50000)).await.unwrap();
    assert_eq!(drawn.status, TransactionStatus::Draw);
    assert_eq!(balance_of(&h, &user.id).await, dec!(100));

    let cancelled = h.transactions.cancel(&cancel.id).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(balance_of(&h, &user.id).await, dec!(200));

    let page = h.transactions.list_for_user(&user.id, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 3);
    assert!(page.items.iter().all(|t| t.status.is_terminal()));
}

#[tokio::test]
async fn test_place_rejections() {
    let h = setup().await;
    let poor = add_user(&h, "poor", dec!(10)).await;

    match h.transactions.place(free_order(&poor.id, Direction::Up, dec!(150))).await {
        Err(TradeError::InsufficientBalance { required, actual }) => {
            assert_eq!(required, dec!(150));
            assert_eq!(actual, dec!(10));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(balance_of(&h, &poor.id).await, dec!(10));

    let mut bad_rate = free_order(&poor.id, Direction::Up, dec!(1));
    bad_rate.return_rate = Some(dec!(10.5));
    assert!(matches!(
        h.transactions.place(bad_rate).await,
        Err(TradeError::InvalidReturnRate(_))
    ));

    assert!(matches!(
        h.transactions.place(free_order(&poor.id, Direction::Up, dec!(0))).await,
        Err(TradeError::InvalidInput(_))
    ));

    // 无显式价格且看板没有报价
    let mut no_price = free_order(&poor.id, Direction::Up, dec!(1));
    no_price.entry_price = None;
    assert!(matches!(
        h.transactions.place(no_price.clone()).await,
        Err(TradeError::PriceUnavailable(_))
    ));

    h.quotes
        .publish(MarketTicker {
            symbol: "BTCUSDT".to_string(),
            price: dec!(48000),
            change_24h: dec!(-1.2),
            volume_24h: dec!(1000),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let tx = h.transactions.place(no_price).await.unwrap();
    assert_eq!(tx.entry_price, dec!(48000));

    let mut suspended = h.users.get_user(&poor.id).await.unwrap().unwrap();
    suspended.status = UserStatus::Suspended;
    h.users.update_user(&suspended).await.unwrap();
    assert!(matches!(
        h.transactions.place(free_order(&poor.id, Direction::Up, dec!(1))).await,
        Err(TradeError::UserNotActive(_))
    ));

    assert!(matches!(
        h.transactions.place(free_order("ghost", Direction::Up, dec!(1))).await,
        Err(TradeError::UserNotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_placement_never_overdraws() {
    let h = setup().await;
    let user = add_user(&h, "racer", dec!(1000)).await;

    let mut handles = vec![];
    for _ in 0..20 {
        let svc = h.transactions.clone();
        let order = free_order(&user.id, Direction::Up, dec!(100));
        handles.push(tokio::spawn(async move { svc.place(order).await }));
    }

    let mut ok = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(TradeError::InsufficientBalance { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(ok, 10, "余额只够 10 笔订单");
    assert_eq!(rejected, 10);
    assert_eq!(balance_of(&h, &user.id).await, dec!(0));
}

#[tokio::test]
async fn test_market_lifecycle_with_cycle_settlement() {
    let h = setup().await;
    let start = h.clock_now();

    let session = h
        .markets
        .create_session(NewSession {
            name: "Morning BTC".to_string(),
            symbol: "btcusdt".to_string(),
            opens_at: start,
            closes_at: start + Duration::hours(4),
        })
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Scheduled);
    assert_eq!(session.symbol, "BTCUSDT");

    let sub = h
        .markets
        .create_sub_market(
            &session.id,
            NewSubMarket {
                name: "60s".to_string(),
                return_rate: dec!(0.8),
                cycle_seconds: 60,
            },
        )
        .await
        .unwrap();

    // 场次未开放时不能开启周期
    assert!(matches!(
        h.markets.start_cycle(&sub.id, Some(dec!(100))).await,
        Err(MarketError::Rejected(_))
    ));

    h.markets.open_session(&session.id).await.unwrap();
    let cycle = h.markets.start_cycle(&sub.id, Some(dec!(100))).await.unwrap();
    assert_eq!(cycle.sequence, 1);
    assert_eq!(cycle.ends_at, start + Duration::seconds(60));

    // 同一子市场不能并行两个周期
    assert!(matches!(
        h.markets.start_cycle(&sub.id, Some(dec!(100))).await,
        Err(MarketError::Rejected(_))
    ));

    let up_user = add_user(&h, "up", dec!(100)).await;
    let down_user = add_user(&h, "down", dec!(100)).await;
    for (user, direction) in [(&up_user, Direction::Up), (&down_user, Direction::Down)] {
        let tx = h
            .transactions
            .place(NewTransaction {
                user_id: user.id.clone(),
                cycle_id: Some(cycle.id.clone()),
                symbol: None,
                direction,
                amount: dec!(50),
                entry_price: None,
                return_rate: None,
            })
            .await
            .unwrap();
        assert_eq!(tx.entry_price, dec!(100));
        assert_eq!(tx.return_rate, dec!(0.8));
        assert_eq!(tx.symbol, "BTCUSDT");
    }

    // 仍有未结算周期，场次不能关闭
    assert!(matches!(
        h.markets.close_session(&session.id).await,
        Err(MarketError::Rejected(_))
    ));

    h.markets.lock_cycle(&cycle.id).await.unwrap();
    let late = h
        .transactions
        .place(NewTransaction {
            user_id: up_user.id.clone(),
            cycle_id: Some(cycle.id.clone()),
            symbol: None,
            direction: Direction::Up,
            amount: dec!(10),
            entry_price: None,
            return_rate: None,
        })
        .await;
    assert!(matches!(late, Err(TradeError::Market(MarketError::Rejected(_)))));

    h.clock.advance(Duration::seconds(60));
    let result = h.markets.settle_cycle(&cycle.id, dec!(105)).await.unwrap();
    assert_eq!(result.cycle.status, CycleStatus::Settled);
    assert_eq!(result.cycle.end_price, Some(dec!(105)));
    assert_eq!(result.summary.settled, 2);
    assert_eq!(result.summary.won, 1);
    assert_eq!(result.summary.lost, 1);
    assert_eq!(result.summary.total_payout, dec!(90));

    assert_eq!(balance_of(&h, &up_user.id).await, dec!(140));
    assert_eq!(balance_of(&h, &down_user.id).await, dec!(50));

    // 已结算周期不能再次结算
    assert!(matches!(
        h.markets.settle_cycle(&cycle.id, dec!(105)).await,
        Err(MarketError::InvalidTransition { .. })
    ));

    // 下一周期序号递增，起始价取看板报价
    h.quotes
        .publish(MarketTicker {
            symbol: "BTCUSDT".to_string(),
            price: dec!(106),
            change_24h: dec!(0),
            volume_24h: dec!(0),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
    let next = h.markets.start_cycle(&sub.id, None).await.unwrap();
    assert_eq!(next.sequence, 2);
    assert_eq!(next.start_price, dec!(106));
    h.markets.settle_cycle(&next.id, dec!(106)).await.unwrap();

    let closed = h.markets.close_session(&session.id).await.unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);
    assert_eq!(h.markets_store.count_unsettled_cycles(&session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cycle_settlement_races_with_placement_and_lock() {
    let h = setup().await;
    let start = h.clock_now();

    let session = h
        .markets
        .create_session(NewSession {
            name: "Race".to_string(),
            symbol: "ETHUSDT".to_string(),
            opens_at: start,
            closes_at: start + Duration::hours(1),
        })
        .await
        .unwrap();
    let sub = h
        .markets
        .create_sub_market(
            &session.id,
            NewSubMarket {
                name: "30s".to_string(),
                return_rate: dec!(0.8),
                cycle_seconds: 30,
            },
        )
        .await
        .unwrap();
    h.markets.open_session(&session.id).await.unwrap();
    let cycle = h.markets.start_cycle(&sub.id, Some(dec!(100))).await.unwrap();

    let mut traders = Vec::new();
    for i in 0..6 {
        traders.push(add_user(&h, &format!("racer_{}", i), dec!(100)).await);
    }

    let mut handles = vec![];
    for u in &traders {
        let svc = h.transactions.clone();
        let order = NewTransaction {
            user_id: u.id.clone(),
            cycle_id: Some(cycle.id.clone()),
            symbol: None,
            direction: Direction::Up,
            amount: dec!(10),
            entry_price: None,
            return_rate: None,
        };
        handles.push(tokio::spawn(async move { svc.place(order).await }));
    }
    let (settled, locked) = tokio::join!(
        h.markets.settle_cycle(&cycle.id, dec!(105)),
        h.markets.lock_cycle(&cycle.id),
    );
    let mut placed = vec![];
    for handle in handles {
        placed.push(handle.await.unwrap());
    }

    // 与锁定冲突的结算可以重试
    let settled = match settled {
        Ok(s) => s,
        Err(_) => h.markets.settle_cycle(&cycle.id, dec!(105)).await.unwrap(),
    };
    assert_eq!(settled.cycle.status, CycleStatus::Settled);
    if let Err(e) = locked {
        assert!(matches!(e, MarketError::Rejected(_) | MarketError::InvalidTransition { .. }));
    }

    // 每笔订单要么被拒绝且未扣款，要么随周期结算，不会滞留在已结算周期中
    let mut accepted = 0;
    for (user, result) in traders.iter().zip(placed) {
        match result {
            Ok(_) => {
                accepted += 1;
                assert_eq!(balance_of(&h, &user.id).await, dec!(108));
            }
            Err(e) => {
                assert!(matches!(e, TradeError::Market(MarketError::Rejected(_)) | TradeError::InvalidStatus(_)));
                assert_eq!(balance_of(&h, &user.id).await, dec!(100));
            }
        }
    }
    let pending = h
        .transactions
        .list(
            &TransactionFilter {
                cycle_id: Some(cycle.id.clone()),
                status: Some(TransactionStatus::Pending),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(pending.total, 0);
    assert_eq!(settled.summary.settled, accepted);

    // 终态之后锁定与再次锁定都被拒绝
    assert!(h.markets.lock_cycle(&cycle.id).await.is_err());
    let stored = h.markets_store.get_cycle(&cycle.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CycleStatus::Settled);
}

#[tokio::test]
async fn test_lock_twice_is_rejected() {
    let h = setup().await;
    let start = h.clock_now();
    let session = h
        .markets
        .create_session(NewSession {
            name: "Twice".to_string(),
            symbol: "BTCUSDT".to_string(),
            opens_at: start,
            closes_at: start + Duration::hours(1),
        })
        .await
        .unwrap();
    let sub = h
        .markets
        .create_sub_market(
            &session.id,
            NewSubMarket {
                name: "60s".to_string(),
                return_rate: dec!(0.8),
                cycle_seconds: 60,
            },
        )
        .await
        .unwrap();
    h.markets.open_session(&session.id).await.unwrap();
    let cycle = h.markets.start_cycle(&sub.id, Some(dec!(100))).await.unwrap();

    let (a, b) = tokio::join!(h.markets.lock_cycle(&cycle.id), h.markets.lock_cycle(&cycle.id));
    assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);
    assert!(matches!(
        h.markets.lock_cycle(&cycle.id).await,
        Err(MarketError::InvalidTransition { .. })
    ));
    assert_eq!(h.markets.get_cycle(&cycle.id).await.unwrap().status, CycleStatus::Locked);
}

#[tokio::test]
async fn test_sub_market_management() {
    let h = setup().await;
    let now = h.clock_now();
    let session = h
        .markets
        .create_session(NewSession {
            name: "Evening".to_string(),
            symbol: "ETHUSDT".to_string(),
            opens_at: now,
            closes_at: now + Duration::hours(1),
        })
        .await
        .unwrap();

    assert!(matches!(
        h.markets
            .create_sub_market(
                &session.id,
                NewSubMarket {
                    name: "bad".to_string(),
                    return_rate: dec!(11),
                    cycle_seconds: 60,
                },
            )
            .await,
        Err(MarketError::InvalidInput(_))
    ));

    let sub = h
        .markets
        .create_sub_market(
            &session.id,
            NewSubMarket {
                name: "5m".to_string(),
                return_rate: dec!(0.9),
                cycle_seconds: 300,
            },
        )
        .await
        .unwrap();

    let updated = h
        .markets
        .update_sub_market(
            &sub.id,
            SubMarketUpdate {
                return_rate: Some(dec!(1.2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.return_rate, dec!(1.2));
    assert_eq!(updated.cycle_seconds, 300);

    h.markets.suspend_sub_market(&sub.id).await.unwrap();
    assert!(matches!(
        h.markets.suspend_sub_market(&sub.id).await,
        Err(MarketError::InvalidTransition { .. })
    ));
    h.markets.activate_sub_market(&sub.id).await.unwrap();

    // 有子市场的场次不能删除
    assert!(matches!(
        h.markets.delete_session(&session.id).await,
        Err(MarketError::Rejected(_))
    ));

    let bad_window = h
        .markets
        .create_session(NewSession {
            name: "Backwards".to_string(),
            symbol: "ETHUSDT".to_string(),
            opens_at: now,
            closes_at: now - Duration::minutes(1),
        })
        .await;
    assert!(matches!(bad_window, Err(MarketError::InvalidInput(_))));

    let empty = h
        .markets
        .create_session(NewSession {
            name: "Empty".to_string(),
            symbol: "SOLUSDT".to_string(),
            opens_at: now,
            closes_at: now + Duration::hours(1),
        })
        .await
        .unwrap();
    h.markets.delete_session(&empty.id).await.unwrap();
    assert!(matches!(
        h.markets.get_session(&empty.id).await,
        Err(MarketError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_quote_board_listing() {
    let h = setup().await;
    for (symbol, price) in [("ethusdt", dec!(3000)), ("BTCUSDT", dec!(50000))] {
        h.quotes
            .publish(MarketTicker {
                symbol: symbol.to_string(),
                price,
                change_24h: dec!(0.5),
                volume_24h: dec!(10),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    let listed = h.quotes.list().await.unwrap();
    assert_eq!(
        listed.iter().map(|t| t.symbol.as_str()).collect::<Vec<_>>(),
        vec!["BTCUSDT", "ETHUSDT"]
    );
    assert_eq!(h.quotes.latest_price("EthUsdt").await.unwrap(), Some(dec!(3000)));
    assert!(h.quotes.remove("ethusdt").await.unwrap());
    assert!(!h.quotes.remove("ethusdt").await.unwrap());
    assert!(h.quotes.get("ETHUSDT").await.unwrap().is_none());
}
