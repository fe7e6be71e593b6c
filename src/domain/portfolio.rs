use super::quote::TokenQuote;
use super::symbols::canonical_id;
use serde::{Deserialize, Serialize};

/// Caller-owned balance for one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub symbol: String,
    pub balance: f64,
}

impl PortfolioHolding {
    pub fn new(symbol: impl Into<String>, balance: f64) -> Self {
        Self {
            symbol: symbol.into(),
            balance,
        }
    }
}

/// A holding priced against the latest quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub balance: f64,
    pub price: f64,
    pub change_24h: f64,
    pub value: f64,
}

impl PortfolioToken {
    /// Join a holding with its quote. A missing quote yields a zero-priced row.
    pub fn from_holding(holding: &PortfolioHolding, quote: Option<&TokenQuote>) -> Self {
        match quote {
            Some(quote) => Self {
                id: quote.id.clone(),
                symbol: quote.symbol.to_uppercase(),
                name: quote.name.clone(),
                balance: holding.balance,
                price: quote.current_price,
                change_24h: quote.price_change_percentage_24h,
                value: holding.balance * quote.current_price,
            },
            None => Self {
                id: holding.symbol.to_lowercase(),
                symbol: holding.symbol.to_uppercase(),
                name: holding.symbol.clone(),
                balance: holding.balance,
                price: 0.0,
                change_24h: 0.0,
                value: 0.0,
            },
        }
    }

    pub fn has_price(&self) -> bool {
        self.price > 0.0
    }
}

/// Price every holding, preserving input order and length.
pub fn join_holdings(holdings: &[PortfolioHolding], quotes: &[TokenQuote]) -> Vec<PortfolioToken> {
    holdings
        .iter()
        .map(|holding| {
            let id = canonical_id(&holding.symbol);
            let quote = quotes
                .iter()
                .find(|q| q.id == id || q.matches_symbol(&holding.symbol));
            PortfolioToken::from_holding(holding, quote)
        })
        .collect()
}

pub fn total_value(tokens: &[PortfolioToken]) -> f64 {
    tokens.iter().map(|t| t.value).sum()
}
