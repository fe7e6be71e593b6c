//! Ticker symbol to canonical token id mapping.
//!
//! The quote API addresses tokens by a stable id ("bitcoin") rather than by the
//! market ticker ("BTC"). Unknown tickers pass through lower-cased.

const TOKEN_IDS: &[(&str, &str)] = &[
    ("SOL", "solana"),
    ("ETH", "ethereum"),
    ("BTC", "bitcoin"),
    ("USDC", "usd-coin"),
    ("USDT", "tether"),
    ("BNB", "binancecoin"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("MATIC", "matic-network"),
    ("DOT", "polkadot"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("LTC", "litecoin"),
    ("XRP", "ripple"),
];

/// Translate a ticker into the id the quote API expects.
pub fn canonical_id(symbol: &str) -> String {
    let symbol = symbol.trim();
    TOKEN_IDS
        .iter()
        .find(|(ticker, _)| ticker.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

/// Reverse lookup, only for ids present in the static table.
pub fn ticker_for_id(id: &str) -> Option<&'static str> {
    TOKEN_IDS
        .iter()
        .find(|(_, known)| *known == id)
        .map(|(ticker, _)| *ticker)
}

/// Canonical ids for `symbols`, de-duplicated, first occurrence wins.
pub fn canonical_ids<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let id = canonical_id(symbol.as_ref());
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_symbols_map_to_ids() {
        assert_eq!(canonical_id("BTC"), "bitcoin");
        assert_eq!(canonical_id("sol"), "solana");
        assert_eq!(canonical_id(" AVAX "), "avalanche-2");
    }

    #[test]
    fn test_unknown_symbol_passes_through_lowercased() {
        assert_eq!(canonical_id("UNKNOWNCOIN"), "unknowncoin");
        assert_eq!(ticker_for_id("unknowncoin"), None);
        assert_eq!(ticker_for_id("usd-coin"), Some("USDC"));
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let ids = canonical_ids(&["BTC", "btc", "ETH", "BTC"]);
        assert_eq!(ids, vec!["bitcoin", "ethereum"]);
    }
}
