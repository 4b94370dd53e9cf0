use serde::{Deserialize, Serialize};
use simtrade_cache::mem::MemCache;
use simtrade_core::cache::port::{Cache, CacheExt};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Quote {
    symbol: String,
    price: String,
}

#[tokio::test]
async fn test_mem_cache_raw_ops() {
    let cache = MemCache::new();
    cache.set_raw("raw_key", vec![1, 2, 3, 4], None).await.unwrap();
    assert_eq!(cache.get_raw("raw_key").await.unwrap(), Some(vec![1, 2, 3, 4]));

    cache.del("raw_key").await.unwrap();
    assert!(cache.get_raw("raw_key").await.unwrap().is_none());
    // 删除不存在的键不报错
    cache.del("raw_key").await.unwrap();
}

#[tokio::test]
async fn test_mem_cache_typed_ops() {
    let cache = MemCache::new();
    let quote = Quote {
        symbol: "BTCUSDT".to_string(),
        price: "65000.5".to_string(),
    };
    cache.set("ticker:BTCUSDT", &quote, None).await.unwrap();
    let loaded: Quote = cache.get("ticker:BTCUSDT").await.unwrap().unwrap();
    assert_eq!(loaded, quote);

    let wrong: Result<Option<u64>, _> = cache.get("ticker:BTCUSDT").await;
    assert!(wrong.is_err(), "decoding into a mismatched type must fail");
}

#[tokio::test]
async fn test_mem_cache_ttl_expiry() {
    let cache = MemCache::new();
    cache.set_raw("short", vec![1], Some(Duration::from_millis(50))).await.unwrap();
    cache.set_raw("long", vec![2], None).await.unwrap();
    assert!(cache.get_raw("short").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(cache.get_raw("short").await.unwrap().is_none());
    assert_eq!(cache.get_raw("long").await.unwrap(), Some(vec![2]));
    assert_eq!(cache.evict_expired(), 0, "lazy read already removed the expired entry");
}

#[tokio::test]
async fn test_mem_cache_keys_by_prefix() {
    let cache = MemCache::new();
    cache.set_raw("ticker:BTC", vec![], None).await.unwrap();
    cache.set_raw("ticker:ETH", vec![], None).await.unwrap();
    cache.set_raw("ticker:OLD", vec![], Some(Duration::from_millis(10))).await.unwrap();
    cache.set_raw("other:X", vec![], None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;

    let mut keys = cache.keys("ticker:").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["ticker:BTC".to_string(), "ticker:ETH".to_string()]);
    assert_eq!(cache.evict_expired(), 1);
}
