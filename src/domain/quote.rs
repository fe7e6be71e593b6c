use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    #[default]
    Live,
    Persisted,
    Synthetic,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Persisted => write!(f, "persisted"),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Point-in-time price observation for one token.
///
/// Field names follow the quote API payload so the same type is used for the
/// wire format and for the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_change_percentage_24h: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market_cap: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub market_cap_rank: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_volume: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub high_24h: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub low_24h: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub circulating_supply: f64,
    #[serde(default = "Utc::now", deserialize_with = "null_as_now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub source: QuoteSource,
}

impl TokenQuote {
    /// Quote with only identity and price set, stamped now.
    pub fn priced(id: &str, symbol: &str, name: &str, current_price: f64) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            current_price,
            price_change_percentage_24h: 0.0,
            market_cap: 0.0,
            market_cap_rank: 0,
            total_volume: 0.0,
            high_24h: current_price,
            low_24h: current_price,
            circulating_supply: 0.0,
            last_updated: Utc::now(),
            source: QuoteSource::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        self.source == QuoteSource::Live
    }

    /// Case-insensitive ticker match.
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol.trim())
    }

    pub fn with_source(mut self, source: QuoteSource) -> Self {
        self.source = source;
        self
    }
}

// The quote API reports `null` for fields it has no data on (rank, supply, 24h change).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(Utc::now))
}

/// Cached quote plus the instant it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub quote: TokenQuote,
    pub fetched_at: DateTime<Utc>,
}

/// How a batch of quotes was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Every requested id was fresh in memory.
    CacheHit,
    /// At least part of the batch came from the quote API.
    Live,
    /// The API failed and the persisted snapshot was served.
    Persisted,
    /// The API failed and no usable snapshot existed.
    Synthetic,
}

impl FetchOutcome {
    /// Whether the batch reflects recent upstream data.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::CacheHit | Self::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::Live => "live",
            Self::Persisted => "persisted",
            Self::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuoteBatch {
    pub quotes: Vec<TokenQuote>,
    pub outcome: FetchOutcome,
}

/// In-memory cache summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub size: usize,
    pub last_update: Option<DateTime<Utc>>,
}

/// Result of converting an amount of one token into another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub converted_amount: f64,
    pub rate: f64,
}

impl Conversion {
    /// `None` when the target price is zero (or not finite) rather than an infinite rate.
    pub fn between(from_price: f64, to_price: f64, amount: f64) -> Option<Self> {
        if to_price <= 0.0 || !to_price.is_finite() || !from_price.is_finite() {
            return None;
        }
        let rate = from_price / to_price;
        Some(Self {
            converted_amount: amount * rate,
            rate,
        })
    }
}
