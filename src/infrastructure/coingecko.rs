//! CoinGecko-compatible `/coins/markets` transport.

use crate::domain::errors::PriceError;
use crate::domain::ports::{MAX_IDS_PER_REQUEST, QuoteTransport};
use crate::domain::quote::TokenQuote;
use crate::infrastructure::http_client_factory::HttpClientFactory;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoTransport {
    client: Client,
    markets_url: Url,
    vs_currency: String,
    timeout: Duration,
}

impl CoinGeckoTransport {
    /// Fails when `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, vs_currency: impl Into<String>, timeout: Duration) -> Result<Self, PriceError> {
        Ok(Self {
            client: HttpClientFactory::create_client(timeout),
            markets_url: markets_url(base_url)?,
            vs_currency: vs_currency.into(),
            timeout,
        })
    }

    pub fn markets_url(&self) -> &Url {
        &self.markets_url
    }

    async fn get_markets(&self, params: Vec<(&'static str, String)>) -> Result<Vec<TokenQuote>, PriceError> {
        debug!("CoinGeckoTransport: GET {} {:?}", self.markets_url, params);

        let response = self
            .client
            .get(self.markets_url.clone())
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        check_status(response.status())?;

        let body = response
            .text()
            .await
            .map_err(|e| self.map_request_error(e))?;
        parse_markets(&body)
    }

    fn map_request_error(&self, error: reqwest::Error) -> PriceError {
        if error.is_timeout() {
            PriceError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            PriceError::Network {
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl QuoteTransport for CoinGeckoTransport {
    async fn fetch_markets(&self, ids: &[String]) -> Result<Vec<TokenQuote>, PriceError> {
        // One page holds at most MAX_IDS_PER_REQUEST rows; more would be cut off
        if ids.len() > MAX_IDS_PER_REQUEST {
            return Err(PriceError::invalid_argument(format!(
                "{} ids exceed the per-request limit of {}",
                ids.len(),
                MAX_IDS_PER_REQUEST
            )));
        }
        let params = vec![
            ("vs_currency", self.vs_currency.clone()),
            ("ids", ids.join(",")),
            ("order", "market_cap_desc".to_string()),
            ("per_page", ids.len().clamp(100, MAX_IDS_PER_REQUEST).to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        self.get_markets(params).await
    }

    async fn fetch_trending(&self, limit: usize) -> Result<Vec<TokenQuote>, PriceError> {
        let params = vec![
            ("vs_currency", self.vs_currency.clone()),
            ("order", "volume_desc".to_string()),
            ("per_page", limit.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        self.get_markets(params).await
    }
}

fn markets_url(base_url: &str) -> Result<Url, PriceError> {
    let invalid = |reason: String| PriceError::invalid_argument(format!("base URL {:?}: {}", base_url, reason));

    let mut url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["coins", "markets"]);
    Ok(url)
}

fn check_status(status: StatusCode) -> Result<(), PriceError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PriceError::RateLimited);
    }
    if !status.is_success() {
        return Err(PriceError::HttpStatus {
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn parse_markets(body: &str) -> Result<Vec<TokenQuote>, PriceError> {
    serde_json::from_str(body).map_err(|e| PriceError::Parse {
        reason: e.to_string(),
    })
}
