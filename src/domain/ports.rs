use crate::domain::errors::PriceError;
use crate::domain::quote::TokenQuote;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Most ids a single `fetch_markets` call accepts.
pub const MAX_IDS_PER_REQUEST: usize = 250;

/// Upstream source of market quotes.
#[async_trait]
pub trait QuoteTransport: Send + Sync {
    /// One batched request for at most `MAX_IDS_PER_REQUEST` canonical ids.
    async fn fetch_markets(&self, ids: &[String]) -> Result<Vec<TokenQuote>, PriceError>;

    /// Top tokens by 24h volume.
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TokenQuote>, PriceError>;
}

/// Durable string key-value storage (possibly shared with other writers).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PriceError>;
    async fn set(&self, key: &str, value: String) -> Result<(), PriceError>;
    async fn remove(&self, key: &str) -> Result<(), PriceError>;
}

/// Wall clock used for cache ages and quote timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
