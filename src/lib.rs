pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{ClientSettings, PollingHandle, PriceClient, PriceClientBuilder};
pub use domain::errors::PriceError;
pub use domain::portfolio::{PortfolioHolding, PortfolioToken};
pub use domain::quote::{Conversion, FetchOutcome, QuoteSource, TokenQuote};
