//! Token price client with rate limiting, caching and a layered fallback chain.
//!
//! Lookups go through: fresh in-memory cache → quote API (via the request
//! queue) → persisted snapshot → synthetic quotes. Only invalid input is ever
//! reported as an error; every upstream or storage failure is absorbed by the
//! next stage of the chain and logged.

use crate::application::fallback::{TRENDING_FALLBACK, synthesize_quotes};
use crate::application::polling::{PollingHandle, PollingPolicy, spawn_poller};
use crate::application::quote_cache::QuoteCache;
use crate::application::request_queue::RequestQueue;
use crate::application::snapshot_store::SnapshotStore;
use crate::domain::errors::PriceError;
use crate::domain::portfolio::{PortfolioHolding, PortfolioToken, join_holdings};
use crate::domain::ports::{Clock, KeyValueStore, MAX_IDS_PER_REQUEST, QuoteTransport};
use crate::domain::quote::{CacheStatus, Conversion, FetchOutcome, QuoteBatch, TokenQuote};
use crate::domain::symbols::{canonical_id, canonical_ids, ticker_for_id};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::observability::Metrics;
use anyhow::Context;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const MAX_TRENDING_LIMIT: usize = 250;

/// Runtime knobs for a `PriceClient`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Age below which an in-memory quote is served without a request.
    pub cache_ttl: Duration,
    /// Persisted snapshots are usable for `cache_ttl * persisted_ttl_multiplier`.
    pub persisted_ttl_multiplier: u32,
    /// Minimum gap between two outbound requests.
    pub min_request_delay: Duration,
    /// Upper bound for one upstream call.
    pub request_timeout: Duration,
    pub polling: PollingPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_millis(60_000),
            persisted_ttl_multiplier: 10,
            min_request_delay: Duration::from_millis(2_000),
            request_timeout: Duration::from_millis(10_000),
            polling: PollingPolicy::default(),
        }
    }
}

impl ClientSettings {
    pub fn persisted_ttl(&self) -> Duration {
        self.cache_ttl.saturating_mul(self.persisted_ttl_multiplier)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

pub struct PriceClient {
    transport: Arc<dyn QuoteTransport>,
    cache: QuoteCache,
    snapshots: SnapshotStore,
    queue: RequestQueue,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    settings: ClientSettings,
}

impl PriceClient {
    pub fn builder() -> PriceClientBuilder {
        PriceClientBuilder::default()
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Current quotes for `symbols`, from whichever stage of the chain answers.
    pub async fn fetch_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<TokenQuote>, PriceError> {
        Ok(self.fetch_batch(symbols).await?.quotes)
    }

    /// Like `fetch_quotes`, also reporting which stage produced the batch.
    ///
    /// Only the ids that are missing or stale in memory are requested upstream;
    /// fresh cached entries are merged into the result.
    pub async fn fetch_batch<S: AsRef<str>>(&self, symbols: &[S]) -> Result<QuoteBatch, PriceError> {
        validate_symbols(symbols)?;

        let ids = canonical_ids(symbols);
        let (fresh, missing) = self.cache.partition(&ids, self.clock.now());

        if missing.is_empty() {
            debug!("PriceClient: Cache hit for {:?}", ids);
            self.metrics.inc_fetch(FetchOutcome::CacheHit.as_str());
            return Ok(QuoteBatch {
                quotes: order_by_ids(&ids, fresh),
                outcome: FetchOutcome::CacheHit,
            });
        }

        let batch = match self.fetch_live(missing.clone()).await {
            Ok(fetched) => {
                let fetched_at = self.clock.now();
                self.cache.insert_all(&fetched, fetched_at);
                self.metrics.set_cache_entries(self.cache.status().size);
                self.persist_snapshot(fetched_at).await;

                info!(
                    "PriceClient: Fetched {} live quotes ({} served from cache)",
                    fetched.len(),
                    fresh.len()
                );
                let mut quotes = fresh;
                quotes.extend(fetched);
                QuoteBatch {
                    quotes: order_by_ids(&ids, quotes),
                    outcome: FetchOutcome::Live,
                }
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                self.metrics.inc_upstream_error(e.kind());
                warn!(
                    "PriceClient: Live fetch failed for {:?}: {}. Falling back to persisted snapshot",
                    missing, e
                );
                let symbol_by_id = symbols_by_id(symbols);
                let (recovered, outcome) = self.recover(&missing, &symbol_by_id).await;
                let mut quotes = fresh;
                quotes.extend(recovered);
                QuoteBatch {
                    quotes: order_by_ids(&ids, quotes),
                    outcome,
                }
            }
        };

        self.metrics.inc_fetch(batch.outcome.as_str());
        Ok(batch)
    }

    /// Quote for one symbol, or `None` if no stage can resolve it.
    pub async fn get_single_quote(&self, symbol: &str) -> Option<TokenQuote> {
        let quotes = match self.fetch_quotes(&[symbol]).await {
            Ok(quotes) => quotes,
            Err(e) => {
                debug!("PriceClient: Single quote lookup for {:?} rejected: {}", symbol, e);
                return None;
            }
        };
        let id = canonical_id(symbol);
        quotes
            .into_iter()
            .find(|q| q.id == id || q.matches_symbol(symbol))
    }

    /// Price each holding; rows without a quote are kept with a zero price.
    pub async fn get_portfolio(&self, holdings: &[PortfolioHolding]) -> Result<Vec<PortfolioToken>, PriceError> {
        if holdings.is_empty() {
            return Ok(Vec::new());
        }
        let symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        let quotes = self.fetch_quotes(&symbols).await?;
        Ok(join_holdings(holdings, &quotes))
    }

    /// Convert `amount` of `from` into `to` at current prices.
    ///
    /// Synthetic quotes count as resolvable, so this only returns `None` for
    /// invalid symbols, tokens the quote API does not list, or a zero target price.
    pub async fn convert(&self, from: &str, to: &str, amount: f64) -> Option<Conversion> {
        let (from_quote, to_quote) = tokio::join!(self.get_single_quote(from), self.get_single_quote(to));
        let (from_quote, to_quote) = (from_quote?, to_quote?);

        let conversion = Conversion::between(from_quote.current_price, to_quote.current_price, amount);
        if conversion.is_none() {
            warn!("PriceClient: Cannot convert {} -> {}: target price is zero", from, to);
        }
        conversion
    }

    /// Top tokens by 24h volume. Not cached; synthesized on any failure.
    pub async fn trending_quotes(&self, limit: usize) -> Vec<TokenQuote> {
        let limit = limit.clamp(1, MAX_TRENDING_LIMIT);
        let transport = self.transport.clone();

        let result = self
            .submit_timed("trending", move || async move {
                transport.fetch_trending(limit).await
            })
            .await
            .and_then(validate_prices);

        match result {
            Ok(quotes) => quotes,
            Err(e) => {
                self.metrics.inc_upstream_error(e.kind());
                self.metrics.inc_fallback("synthetic");
                warn!("PriceClient: Trending fetch failed: {}. Using synthetic quotes", e);
                synthesize_quotes(&TRENDING_FALLBACK, self.clock.now())
            }
        }
    }

    /// Poll `symbols` every `interval`, widening the delay after repeated failures.
    pub fn start_polling<F>(
        self: &Arc<Self>,
        symbols: Vec<String>,
        interval: Duration,
        on_update: F,
    ) -> Result<PollingHandle, PriceError>
    where
        F: FnMut(Vec<TokenQuote>) + Send + 'static,
    {
        validate_symbols(&symbols)?;
        if interval.is_zero() {
            return Err(PriceError::invalid_argument("polling interval must be positive"));
        }
        Ok(spawn_poller(
            self.clone(),
            symbols,
            interval,
            self.settings.polling,
            on_update,
        ))
    }

    /// Drop every cached quote, in memory and persisted.
    ///
    /// The in-memory cache is always emptied; a storage error is still returned.
    pub async fn clear_cache(&self) -> Result<(), PriceError> {
        self.cache.clear();
        self.metrics.set_cache_entries(0);
        info!("PriceClient: Cache cleared");
        self.snapshots.clear().await
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// One queued request per chunk of ids; any failed chunk fails the lookup.
    async fn fetch_live(&self, ids: Vec<String>) -> Result<Vec<TokenQuote>, PriceError> {
        let mut quotes = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let transport = self.transport.clone();
            let chunk = chunk.to_vec();
            let fetched = self
                .submit_timed("markets", move || async move {
                    transport.fetch_markets(&chunk).await
                })
                .await
                .and_then(validate_prices)?;
            quotes.extend(fetched);
        }
        Ok(quotes)
    }

    /// Run an upstream call through the queue, bounded by the request timeout.
    async fn submit_timed<F, Fut>(&self, endpoint: &'static str, call: F) -> Result<Vec<TokenQuote>, PriceError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<TokenQuote>, PriceError>> + Send + 'static,
    {
        let timeout = self.settings.request_timeout;
        let metrics = self.metrics.clone();
        self.metrics.set_queue_depth(self.queue.depth() + 1);

        let result = self
            .queue
            .submit(move || async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(PriceError::Timeout {
                        duration_ms: timeout.as_millis() as u64,
                    }),
                };
                metrics.observe_request_latency(endpoint, started.elapsed().as_secs_f64());
                result
            })
            .await;

        self.metrics.set_queue_depth(self.queue.depth());
        result
    }

    /// Persisted snapshot first, synthetic quotes for whatever it lacks.
    async fn recover(
        &self,
        ids: &[String],
        symbol_by_id: &HashMap<String, String>,
    ) -> (Vec<TokenQuote>, FetchOutcome) {
        let now = self.clock.now();
        let snapshot = match self.snapshots.load_fresh(now).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("PriceClient: Persisted snapshot unusable: {}", e);
                None
            }
        };

        let mut recovered = Vec::with_capacity(ids.len());
        let mut unresolved = Vec::new();
        if let Some(snapshot) = snapshot {
            for id in ids {
                match snapshot.quotes.iter().find(|q| &q.id == id) {
                    Some(quote) => recovered.push(quote.clone()),
                    None => unresolved.push(id.clone()),
                }
            }
            if !recovered.is_empty() {
                self.metrics.inc_fallback("persisted");
                info!(
                    "PriceClient: Serving {} quotes from snapshot saved at {}",
                    recovered.len(),
                    snapshot.saved_at
                );
            }
        } else {
            unresolved.extend(ids.iter().cloned());
        }

        if unresolved.is_empty() {
            return (recovered, FetchOutcome::Persisted);
        }

        warn!(
            "PriceClient: No persisted quotes for {:?}, synthesizing estimates",
            unresolved
        );
        self.metrics.inc_fallback("synthetic");
        let symbols: Vec<&str> = unresolved
            .iter()
            .map(|id| {
                symbol_by_id
                    .get(id)
                    .map(String::as_str)
                    .or_else(|| ticker_for_id(id))
                    .unwrap_or(id.as_str())
            })
            .collect();
        recovered.extend(synthesize_quotes(&symbols, now));
        (recovered, FetchOutcome::Synthetic)
    }

    /// Save every still-fresh cached quote, stamped with the oldest fetch
    /// time among them so no quote outlives the persisted TTL.
    async fn persist_snapshot(&self, now: chrono::DateTime<chrono::Utc>) {
        let entries = self.cache.fresh_entries(now);
        let Some(saved_at) = entries.iter().map(|e| e.fetched_at).min() else {
            return;
        };
        let quotes: Vec<TokenQuote> = entries.into_iter().map(|e| e.quote).collect();
        if let Err(e) = self.snapshots.save(&quotes, saved_at).await {
            warn!("PriceClient: Failed to persist quote snapshot: {}", e);
        }
    }
}

fn validate_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<(), PriceError> {
    if symbols.is_empty() {
        return Err(PriceError::invalid_argument("symbol list is empty"));
    }
    if symbols.iter().any(|s| s.as_ref().trim().is_empty()) {
        return Err(PriceError::invalid_argument("symbol list contains a blank symbol"));
    }
    Ok(())
}

fn validate_prices(quotes: Vec<TokenQuote>) -> Result<Vec<TokenQuote>, PriceError> {
    if let Some(bad) = quotes
        .iter()
        .find(|q| q.current_price < 0.0 || !q.current_price.is_finite())
    {
        return Err(PriceError::Parse {
            reason: format!("invalid price {} for {}", bad.current_price, bad.id),
        });
    }
    Ok(quotes)
}

fn symbols_by_id<S: AsRef<str>>(symbols: &[S]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(symbols.len());
    for symbol in symbols {
        map.entry(canonical_id(symbol.as_ref()))
            .or_insert_with(|| symbol.as_ref().trim().to_string());
    }
    map
}

/// Keep only requested ids, in request order.
fn order_by_ids(ids: &[String], quotes: Vec<TokenQuote>) -> Vec<TokenQuote> {
    let mut by_id: HashMap<String, TokenQuote> =
        quotes.into_iter().map(|q| (q.id.clone(), q)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[derive(Default)]
pub struct PriceClientBuilder {
    transport: Option<Arc<dyn QuoteTransport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Metrics>,
    settings: Option<ClientSettings>,
}

impl PriceClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn QuoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Spawns the request queue drain task; call inside a Tokio runtime.
    pub fn build(self) -> anyhow::Result<PriceClient> {
        let transport = self.transport.context("quote transport is required")?;
        let store = self.store.context("key-value store is required")?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let settings = self.settings.unwrap_or_default();
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new().context("Failed to register price metrics")?,
        };

        let cache = QuoteCache::new(to_chrono(settings.cache_ttl));
        let queue = RequestQueue::new(settings.min_request_delay);
        info!(
            "PriceClient: Ready (cache ttl: {}s, min request gap: {:?})",
            cache.ttl().num_seconds(),
            queue.min_delay()
        );

        Ok(PriceClient {
            transport,
            cache,
            snapshots: SnapshotStore::new(store, to_chrono(settings.persisted_ttl())),
            queue,
            clock,
            metrics,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(id: &str) -> TokenQuote {
        TokenQuote {
            id: id.to_string(),
            symbol: id.to_string(),
            name: id.to_string(),
            current_price: 1.0,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: 0,
            total_volume: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            circulating_supply: 0.0,
            last_updated: chrono::Utc::now(),
            source: Default::default(),
        }
    }

    #[test]
    fn test_validate_symbols_rejects_empty_and_blank() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            validate_symbols(&empty),
            Err(PriceError::InvalidArgument { .. })
        ));
        assert!(validate_symbols(&["BTC", "  "]).is_err());
        assert!(validate_symbols(&["BTC"]).is_ok());
    }

    #[test]
    fn test_negative_price_is_parse_error() {
        let mut bad = quote("bitcoin");
        bad.current_price = -1.0;
        assert!(matches!(
            validate_prices(vec![bad]),
            Err(PriceError::Parse { .. })
        ));
    }

    #[test]
    fn test_order_by_ids_drops_unrequested() {
        let ids = vec!["b".to_string(), "a".to_string()];
        let ordered = order_by_ids(&ids, vec![quote("a"), quote("c"), quote("b")]);
        let got: Vec<&str> = ordered.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(got, vec!["b", "a"]);
    }

    #[test]
    fn test_persisted_ttl_is_multiple_of_cache_ttl() {
        let settings = ClientSettings::default();
        assert_eq!(settings.persisted_ttl(), Duration::from_secs(600));
    }
}
