//! Persisted quote snapshot used for offline and cold-start lookups.
//!
//! Two keys are written: the JSON quote array and an epoch-millis timestamp no
//! later than the fetch time of any quote in it. Every write carries the
//! complete snapshot, so concurrent writers resolve as last-writer-wins.

use crate::domain::errors::PriceError;
use crate::domain::ports::KeyValueStore;
use crate::domain::quote::{QuoteSource, TokenQuote};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tracing::debug;

pub const SNAPSHOT_KEY: &str = "price_cache";
pub const SNAPSHOT_TIMESTAMP_KEY: &str = "price_cache_timestamp";

#[derive(Debug, Clone)]
pub struct PersistedSnapshot {
    pub quotes: Vec<TokenQuote>,
    pub saved_at: DateTime<Utc>,
}

pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
    max_age: Duration,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub async fn save(&self, quotes: &[TokenQuote], saved_at: DateTime<Utc>) -> Result<(), PriceError> {
        let payload = serde_json::to_string(quotes).map_err(PriceError::storage)?;
        self.store.set(SNAPSHOT_KEY, payload).await?;
        self.store
            .set(SNAPSHOT_TIMESTAMP_KEY, saved_at.timestamp_millis().to_string())
            .await?;
        debug!("SnapshotStore: Persisted {} quotes", quotes.len());
        Ok(())
    }

    /// Snapshot younger than the max age at `now`, re-tagged as persisted.
    ///
    /// `Ok(None)` when nothing is stored or the snapshot is too old; corrupt
    /// contents surface as `PriceError::Storage`.
    pub async fn load_fresh(&self, now: DateTime<Utc>) -> Result<Option<PersistedSnapshot>, PriceError> {
        let Some(payload) = self.store.get(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };
        let Some(raw_timestamp) = self.store.get(SNAPSHOT_TIMESTAMP_KEY).await? else {
            return Ok(None);
        };

        let millis: i64 = raw_timestamp
            .trim()
            .parse()
            .map_err(|e| PriceError::storage(format!("bad snapshot timestamp {raw_timestamp:?}: {e}")))?;
        let saved_at = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| PriceError::storage(format!("snapshot timestamp out of range: {millis}")))?;

        if now - saved_at > self.max_age {
            debug!("SnapshotStore: Snapshot from {} is expired", saved_at);
            return Ok(None);
        }

        let quotes: Vec<TokenQuote> = serde_json::from_str(&payload)
            .map_err(|e| PriceError::storage(format!("corrupt snapshot: {e}")))?;

        Ok(Some(PersistedSnapshot {
            quotes: quotes
                .into_iter()
                .map(|q| q.with_source(QuoteSource::Persisted))
                .collect(),
            saved_at,
        }))
    }

    pub async fn clear(&self) -> Result<(), PriceError> {
        self.store.remove(SNAPSHOT_KEY).await?;
        self.store.remove(SNAPSHOT_TIMESTAMP_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryKeyValueStore;

    fn quote(id: &str) -> TokenQuote {
        TokenQuote {
            id: id.to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            current_price: 12345.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: 1,
            total_volume: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            circulating_supply: 0.0,
            last_updated: Utc::now(),
            source: QuoteSource::Live,
        }
    }

    #[tokio::test]
    async fn test_save_then_load_marks_persisted() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let snapshots = SnapshotStore::new(kv, Duration::seconds(600));
        let now = Utc::now();

        snapshots.save(&[quote("bitcoin")], now).await.unwrap();
        let snapshot = snapshots.load_fresh(now + Duration::seconds(30)).await.unwrap().unwrap();

        assert_eq!(snapshot.quotes.len(), 1);
        assert_eq!(snapshot.quotes[0].current_price, 12345.0);
        assert_eq!(snapshot.quotes[0].source, QuoteSource::Persisted);
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_ignored() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let snapshots = SnapshotStore::new(kv, Duration::seconds(600));
        let now = Utc::now();

        snapshots.save(&[quote("bitcoin")], now).await.unwrap();
        let loaded = snapshots.load_fresh(now + Duration::seconds(601)).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_storage_error() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        kv.set(SNAPSHOT_KEY, "{not json".to_string()).await.unwrap();
        kv.set(SNAPSHOT_TIMESTAMP_KEY, Utc::now().timestamp_millis().to_string())
            .await
            .unwrap();

        let snapshots = SnapshotStore::new(kv, Duration::seconds(600));
        let result = snapshots.load_fresh(Utc::now()).await;
        assert!(matches!(result, Err(PriceError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_clear_removes_both_keys() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let snapshots = SnapshotStore::new(kv.clone(), Duration::seconds(600));
        snapshots.save(&[quote("bitcoin")], Utc::now()).await.unwrap();

        snapshots.clear().await.unwrap();
        assert!(kv.get(SNAPSHOT_KEY).await.unwrap().is_none());
        assert!(kv.get(SNAPSHOT_TIMESTAMP_KEY).await.unwrap().is_none());
    }
}
