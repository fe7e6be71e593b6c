//! Synthetic quotes for when neither the quote API nor a persisted snapshot
//! is available.
//!
//! Well-known tokens get a static base price with a small random jitter so
//! repeated calls do not return identical values. Anything else gets a random
//! price below 1000 with derived high/low/supply fields. Every quote produced
//! here is tagged `QuoteSource::Synthetic`.

use crate::domain::quote::{QuoteSource, TokenQuote};
use crate::domain::symbols::canonical_id;
use chrono::{DateTime, Utc};
use rand::Rng;

struct MockBase {
    ticker: &'static str,
    id: &'static str,
    name: &'static str,
    price: f64,
    price_jitter: f64,
    change_24h: f64,
    change_jitter: f64,
    market_cap: f64,
    rank: u32,
}

const MOCK_BASES: &[MockBase] = &[
    MockBase {
        ticker: "SOL",
        id: "solana",
        name: "Solana",
        price: 245.67,
        price_jitter: 10.0,
        change_24h: 5.23,
        change_jitter: 4.0,
        market_cap: 117_000_000_000.0,
        rank: 5,
    },
    MockBase {
        ticker: "ETH",
        id: "ethereum",
        name: "Ethereum",
        price: 3842.15,
        price_jitter: 100.0,
        change_24h: 2.87,
        change_jitter: 3.0,
        market_cap: 462_000_000_000.0,
        rank: 2,
    },
    MockBase {
        ticker: "BTC",
        id: "bitcoin",
        name: "Bitcoin",
        price: 96420.32,
        price_jitter: 2000.0,
        change_24h: 1.45,
        change_jitter: 2.0,
        market_cap: 1_900_000_000_000.0,
        rank: 1,
    },
    MockBase {
        ticker: "USDC",
        id: "usd-coin",
        name: "USD Coin",
        price: 1.0,
        price_jitter: 0.02,
        change_24h: 0.01,
        change_jitter: 0.1,
        market_cap: 38_000_000_000.0,
        rank: 6,
    },
];

/// Tickers used when a trending lookup has to be synthesized.
pub const TRENDING_FALLBACK: [&str; 4] = ["BTC", "ETH", "SOL", "USDC"];

fn mock_base(symbol: &str) -> Option<&'static MockBase> {
    let symbol = symbol.trim();
    let id = canonical_id(symbol);
    MOCK_BASES
        .iter()
        .find(|base| base.ticker.eq_ignore_ascii_case(symbol) || base.id == id)
}

/// One synthetic quote per symbol, in input order.
pub fn synthesize_quotes<S: AsRef<str>>(symbols: &[S], now: DateTime<Utc>) -> Vec<TokenQuote> {
    let mut rng = rand::rng();
    symbols
        .iter()
        .map(|symbol| synthesize_one(&mut rng, symbol.as_ref(), now))
        .collect()
}

fn synthesize_one<R: Rng>(rng: &mut R, symbol: &str, now: DateTime<Utc>) -> TokenQuote {
    match mock_base(symbol) {
        Some(base) => {
            let price = (base.price + (rng.random::<f64>() - 0.5) * base.price_jitter).max(0.0);
            let change = base.change_24h + (rng.random::<f64>() - 0.5) * base.change_jitter;
            TokenQuote {
                id: base.id.to_string(),
                symbol: base.ticker.to_lowercase(),
                name: base.name.to_string(),
                current_price: price,
                price_change_percentage_24h: change,
                market_cap: base.market_cap,
                market_cap_rank: base.rank,
                total_volume: base.market_cap * 0.1,
                high_24h: price * 1.05,
                low_24h: price * 0.95,
                circulating_supply: if price > 0.0 { base.market_cap / price } else { 0.0 },
                last_updated: now,
                source: QuoteSource::Synthetic,
            }
        }
        None => {
            let price = rng.random_range(0.01..1000.0);
            TokenQuote {
                id: canonical_id(symbol),
                symbol: symbol.trim().to_lowercase(),
                name: symbol.trim().to_uppercase(),
                current_price: price,
                price_change_percentage_24h: (rng.random::<f64>() - 0.5) * 20.0,
                market_cap: price * rng.random::<f64>() * 1_000_000_000.0,
                market_cap_rank: rng.random_range(1..=100),
                total_volume: price * rng.random::<f64>() * 100_000_000.0,
                high_24h: price * 1.05,
                low_24h: price * 0.95,
                circulating_supply: rng.random::<f64>() * 1_000_000_000.0,
                last_updated: now,
                source: QuoteSource::Synthetic,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_symbols_are_synthesized() {
        let quotes = synthesize_quotes(&["BTC", "UNKNOWNCOIN"], Utc::now());

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].id, "bitcoin");
        assert!(quotes[0].current_price > 90_000.0 && quotes[0].current_price < 100_000.0);
        assert_eq!(quotes[1].id, "unknowncoin");
        assert_eq!(quotes[1].name, "UNKNOWNCOIN");
        assert!(quotes.iter().all(|q| q.current_price >= 0.0));
        assert!(quotes.iter().all(|q| q.source == QuoteSource::Synthetic));
    }

    #[test]
    fn test_derived_fields_follow_price() {
        let quote = &synthesize_quotes(&["ETH"], Utc::now())[0];
        assert!((quote.high_24h - quote.current_price * 1.05).abs() < 1e-9);
        assert!((quote.low_24h - quote.current_price * 0.95).abs() < 1e-9);
        assert!((quote.circulating_supply * quote.current_price - quote.market_cap).abs() < 1.0);
    }

    #[test]
    fn test_lookup_by_canonical_id_uses_mock_base() {
        let quote = &synthesize_quotes(&["usd-coin"], Utc::now())[0];
        assert_eq!(quote.symbol, "usdc");
        assert!((quote.current_price - 1.0).abs() <= 0.01);
    }
}
