use crate::domain::errors::PriceError;
use crate::domain::ports::QuoteTransport;
use crate::domain::quote::TokenQuote;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One recorded upstream call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub ids: Vec<String>,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    market: HashMap<String, TokenQuote>,
    scripted: VecDeque<Result<Vec<TokenQuote>, PriceError>>,
    failure: Option<PriceError>,
    latency: Option<Duration>,
    calls: Vec<MockCall>,
}

/// In-process quote API.
///
/// Scripted responses are consumed first; after that the configured failure
/// (if any) is returned, otherwise quotes for the requested ids are served
/// from the market table. A configured latency delays every answer. Clones
/// share state.
#[derive(Clone, Default)]
pub struct MockQuoteTransport {
    state: Arc<Mutex<MockState>>,
    pub simulation_enabled: bool,
}

impl MockQuoteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Four well-known tokens whose prices random-walk on every fetch.
    pub fn with_demo_market() -> Self {
        let mock = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            simulation_enabled: true,
        };
        for (id, symbol, name, price, rank) in [
            ("bitcoin", "btc", "Bitcoin", 96420.32, 1),
            ("ethereum", "eth", "Ethereum", 3842.15, 2),
            ("solana", "sol", "Solana", 245.67, 5),
            ("usd-coin", "usdc", "USD Coin", 1.0, 6),
        ] {
            let mut quote = TokenQuote::priced(id, symbol, name, price);
            quote.market_cap_rank = rank;
            mock.insert_quote(quote);
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert_quote(&self, quote: TokenQuote) {
        self.lock().market.insert(quote.id.clone(), quote);
    }

    pub fn set_price(&self, id: &str, price: f64) {
        if let Some(quote) = self.lock().market.get_mut(id) {
            quote.current_price = price;
        }
    }

    pub fn push_response(&self, response: Result<Vec<TokenQuote>, PriceError>) {
        self.lock().scripted.push_back(response);
    }

    /// Fail every unscripted call with `error` (or stop failing with `None`).
    pub fn fail_with(&self, error: Option<PriceError>) {
        self.lock().failure = error;
    }

    /// Delay each call by `latency` before answering (`None` answers at once).
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn next_response(&self, ids: Vec<String>) -> Option<Result<Vec<TokenQuote>, PriceError>> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            ids,
            at: Instant::now(),
        });
        if let Some(scripted) = state.scripted.pop_front() {
            return Some(scripted);
        }
        state.failure.clone().map(Err)
    }

    async fn stall(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn simulate_tick(&self, state: &mut MockState) {
        if !self.simulation_enabled {
            return;
        }
        let mut rng = rand::rng();
        for quote in state.market.values_mut() {
            let step = rng.random_range(-0.005..=0.005);
            quote.current_price = (quote.current_price * (1.0 + step)).max(0.0);
            quote.high_24h = quote.high_24h.max(quote.current_price);
            quote.low_24h = quote.low_24h.min(quote.current_price);
            quote.last_updated = Utc::now();
        }
    }
}

#[async_trait]
impl QuoteTransport for MockQuoteTransport {
    async fn fetch_markets(&self, ids: &[String]) -> Result<Vec<TokenQuote>, PriceError> {
        let scripted = self.next_response(ids.to_vec());
        self.stall().await;
        if let Some(response) = scripted {
            return response;
        }

        let mut state = self.lock();
        self.simulate_tick(&mut state);
        let quotes: Vec<TokenQuote> = ids
            .iter()
            .filter_map(|id| state.market.get(id).cloned())
            .collect();
        debug!("MockQuoteTransport: Served {}/{} quotes", quotes.len(), ids.len());
        Ok(quotes)
    }

    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TokenQuote>, PriceError> {
        let scripted = self.next_response(Vec::new());
        self.stall().await;
        if let Some(response) = scripted {
            return response;
        }

        let state = self.lock();
        let mut quotes: Vec<TokenQuote> = state.market.values().cloned().collect();
        quotes.sort_by(|a, b| b.total_volume.total_cmp(&a.total_volume).then(a.id.cmp(&b.id)));
        quotes.truncate(limit);
        Ok(quotes)
    }
}
