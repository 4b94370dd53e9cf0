use rust_decimal::Decimal;
use simtrade_core::cache::error::CacheError;
use simtrade_core::cache::port::{Cache, CacheExt};
use simtrade_core::market::entity::MarketTicker;
use std::sync::Arc;
use std::time::Duration;

/// 行情条目在缓存中的键前缀
const TICKER_PREFIX: &str = "ticker:";

/// # Summary
/// 行情看板：运营手工发布的最新报价，供前台展示与下单时补全价格。
///
/// # Invariants
/// * 标的代码统一转为大写存储，查询时大小写不敏感。
/// * 条目超过 `ttl` 未刷新即视为过期，不再参与定价。
pub struct QuoteBoard {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl QuoteBoard {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(symbol: &str) -> String {
        format!("{}{}", TICKER_PREFIX, normalize_symbol(symbol))
    }

    /// 发布或覆盖一条报价，重置其过期时间
    pub async fn publish(&self, mut ticker: MarketTicker) -> Result<MarketTicker, CacheError> {
        ticker.symbol = normalize_symbol(&ticker.symbol);
        self.cache.set(&Self::key(&ticker.symbol), &ticker, Some(self.ttl)).await?;
        tracing::debug!("Ticker {} published at {}", ticker.symbol, ticker.price);
        Ok(ticker)
    }

    pub async fn get(&self, symbol: &str) -> Result<Option<MarketTicker>, CacheError> {
        self.cache.get::<MarketTicker>(&Self::key(symbol)).await
    }

    /// # Summary
    /// 列出全部未过期的报价，按标的代码升序。
    ///
    /// # Logic
    /// 列举键与逐个读取之间条目可能过期，读不到的直接跳过。
    pub async fn list(&self) -> Result<Vec<MarketTicker>, CacheError> {
        let keys = self.cache.keys(TICKER_PREFIX).await?;
        let mut tickers = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(t) = self.cache.get::<MarketTicker>(&key).await? {
                tickers.push(t);
            }
        }
        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(tickers)
    }

    /// 删除报价，返回删除前是否存在
    pub async fn remove(&self, symbol: &str) -> Result<bool, CacheError> {
        let key = Self::key(symbol);
        let existed = self.cache.get_raw(&key).await?.is_some();
        self.cache.del(&key).await?;
        Ok(existed)
    }

    pub async fn latest_price(&self, symbol: &str) -> Result<Option<Decimal>, CacheError> {
        Ok(self.get(symbol).await?.map(|t| t.price))
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btcusdt "), "BTCUSDT");
        assert_eq!(QuoteBoard::key("eth"), "ticker:ETH");
    }
}
