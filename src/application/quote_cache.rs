use crate::domain::quote::{CacheEntry, CacheStatus, TokenQuote};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory quotes keyed by canonical id.
pub struct QuoteCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl std::fmt::Debug for QuoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCache")
            .field("entries", &"<RwLock>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Overwrite the entry for each quote's id.
    pub fn insert_all(&self, quotes: &[TokenQuote], fetched_at: DateTime<Utc>) {
        let mut guard = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("QuoteCache: Lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        };
        for quote in quotes {
            guard.insert(
                quote.id.clone(),
                CacheEntry {
                    quote: quote.clone(),
                    fetched_at,
                },
            );
        }
    }

    /// Quote for `id` if it is younger than the TTL at `now`.
    pub fn get_fresh(&self, id: &str, now: DateTime<Utc>) -> Option<TokenQuote> {
        let guard = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .get(id)
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.quote.clone())
    }

    /// Split `ids` into fresh quotes and ids that need fetching.
    pub fn partition(&self, ids: &[String], now: DateTime<Utc>) -> (Vec<TokenQuote>, Vec<String>) {
        let mut fresh = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.get_fresh(id, now) {
                Some(quote) => fresh.push(quote),
                None => missing.push(id.clone()),
            }
        }
        (fresh, missing)
    }

    /// Entries still younger than the TTL at `now`, sorted by id.
    pub fn fresh_entries(&self, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let guard = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut entries: Vec<CacheEntry> = guard
            .values()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.quote.id.cmp(&b.quote.id));
        entries
    }

    pub fn clear(&self) {
        match self.entries.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn status(&self) -> CacheStatus {
        let guard = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        CacheStatus {
            size: guard.len(),
            last_update: guard.values().map(|e| e.fetched_at).max(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::QuoteSource;

    fn quote(id: &str, price: f64) -> TokenQuote {
        TokenQuote {
            id: id.to_string(),
            symbol: id[..3].to_string(),
            name: id.to_string(),
            current_price: price,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: 0,
            total_volume: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            circulating_supply: 0.0,
            last_updated: Utc::now(),
            source: QuoteSource::Live,
        }
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = QuoteCache::new(Duration::seconds(60));
        let t0 = Utc::now();
        cache.insert_all(&[quote("bitcoin", 100.0)], t0);

        assert!(cache.get_fresh("bitcoin", t0 + Duration::seconds(59)).is_some());
        assert!(cache.get_fresh("bitcoin", t0 + Duration::seconds(60)).is_none());
        assert!(cache.get_fresh("ethereum", t0).is_none());
    }

    #[test]
    fn test_partition_separates_fresh_and_missing() {
        let cache = QuoteCache::new(Duration::seconds(60));
        let t0 = Utc::now();
        cache.insert_all(&[quote("bitcoin", 100.0)], t0 - Duration::seconds(120));
        cache.insert_all(&[quote("ethereum", 10.0)], t0);

        let ids = vec![
            "bitcoin".to_string(),
            "ethereum".to_string(),
            "solana".to_string(),
        ];
        let (fresh, missing) = cache.partition(&ids, t0);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "ethereum");
        assert_eq!(missing, vec!["bitcoin".to_string(), "solana".to_string()]);
    }

    #[test]
    fn test_fresh_entries_skip_expired() {
        let cache = QuoteCache::new(Duration::seconds(60));
        let t0 = Utc::now();
        cache.insert_all(&[quote("bitcoin", 100.0)], t0 - Duration::minutes(20));
        cache.insert_all(&[quote("solana", 1.0), quote("ethereum", 10.0)], t0);

        let entries = cache.fresh_entries(t0);
        let ids: Vec<&str> = entries.iter().map(|e| e.quote.id.as_str()).collect();
        assert_eq!(ids, vec!["ethereum", "solana"]);
        assert!(entries.iter().all(|e| e.fetched_at == t0));
    }

    #[test]
    fn test_status_and_clear() {
        let cache = QuoteCache::new(Duration::seconds(60));
        assert_eq!(cache.status().size, 0);
        assert!(cache.status().last_update.is_none());

        let t0 = Utc::now();
        cache.insert_all(&[quote("bitcoin", 1.0), quote("ethereum", 2.0)], t0);
        let status = cache.status();
        assert_eq!(status.size, 2);
        assert_eq!(status.last_update, Some(t0));

        cache.clear();
        assert_eq!(cache.status().size, 0);
    }
}
