//! Price client configuration parsing from environment variables.

use super::{parse_or, var_or};
use crate::domain::portfolio::PortfolioHolding;
use crate::infrastructure::coingecko::DEFAULT_BASE_URL;
use anyhow::{Context, bail};
use std::path::PathBuf;

pub const DEFAULT_SYMBOLS: &str = "BTC,ETH,SOL,USDC";

/// Quote API, cache and polling settings
#[derive(Debug, Clone)]
pub struct PriceEnvConfig {
    pub api_base_url: String,
    pub vs_currency: String,
    pub cache_ttl_ms: u64,
    pub persisted_ttl_multiplier: u32,
    pub min_request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub symbols: Vec<String>,
    pub store_dir: PathBuf,
}

impl Default for PriceEnvConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl PriceEnvConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_base_url: var_or(&lookup, "PRICE_API_BASE_URL", DEFAULT_BASE_URL),
            vs_currency: var_or(&lookup, "PRICE_VS_CURRENCY", "usd").to_lowercase(),
            cache_ttl_ms: parse_or(&lookup, "PRICE_CACHE_TTL_MS", 60_000),
            persisted_ttl_multiplier: parse_or(&lookup, "PRICE_PERSISTED_TTL_MULTIPLIER", 10),
            min_request_delay_ms: parse_or(&lookup, "PRICE_MIN_REQUEST_DELAY_MS", 2_000),
            request_timeout_ms: parse_or(&lookup, "PRICE_REQUEST_TIMEOUT_MS", 10_000),
            poll_interval_ms: parse_or(&lookup, "PRICE_POLL_INTERVAL_MS", 45_000),
            symbols: parse_symbols(&var_or(&lookup, "PRICE_SYMBOLS", DEFAULT_SYMBOLS)),
            store_dir: lookup("PRICE_STORE_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| default_store_dir(&lookup)),
        }
    }
}

/// Comma-separated tickers, blanks dropped.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let symbols: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return parse_symbols(DEFAULT_SYMBOLS);
    }
    symbols
}

/// `SYMBOL=BALANCE` pairs separated by commas, e.g. `BTC=0.5,ETH=2`.
pub fn parse_holdings(raw: &str) -> anyhow::Result<Vec<PortfolioHolding>> {
    let mut holdings = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((symbol, balance)) = pair.split_once('=') else {
            bail!("Invalid holding {:?}, expected SYMBOL=BALANCE", pair);
        };
        let symbol = symbol.trim();
        if symbol.is_empty() {
            bail!("Invalid holding {:?}: empty symbol", pair);
        }
        let balance: f64 = balance
            .trim()
            .parse()
            .with_context(|| format!("Invalid balance in holding {:?}", pair))?;
        holdings.push(PortfolioHolding::new(symbol.to_uppercase(), balance));
    }
    Ok(holdings)
}

fn default_store_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".tokenprices")
}
