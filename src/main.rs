//! tokenprices - headless token price watcher
//!
//! Polls the quote API for a set of tickers and logs every update. Metrics are
//! pushed via structured JSON logs to stdout.
//!
//! # Usage
//! ```sh
//! PRICE_MODE=mock cargo run -- --symbols BTC,ETH --interval-ms 5000
//! ```
//!
//! # Environment Variables
//! - `PRICE_MODE` - `live` or `mock` (default: live)
//! - `PRICE_SYMBOLS` - Comma-separated tickers (default: BTC,ETH,SOL,USDC)
//! - `PRICE_POLL_INTERVAL_MS` - Polling interval (default: 45000)
//! - `OBSERVABILITY_ENABLED` - Enable metrics reporting (default: true)
//! - `OBSERVABILITY_INTERVAL` - Interval in seconds between metric outputs (default: 60)

use anyhow::{Context, Result};
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokenprices::config::{Config, Mode, parse_holdings, parse_symbols};
use tokenprices::domain::ports::{KeyValueStore, QuoteTransport};
use tokenprices::infrastructure::observability::MetricsReporter;
use tokenprices::infrastructure::{
    CoinGeckoTransport, FileKeyValueStore, InMemoryKeyValueStore, MockQuoteTransport,
};
use tokenprices::domain::portfolio::total_value;
use tokenprices::{PriceClient, TokenQuote};
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch token prices with caching and fallbacks", long_about = None)]
struct Args {
    /// Comma-separated tickers to poll (overrides PRICE_SYMBOLS)
    #[arg(short, long)]
    symbols: Option<String>,

    /// Polling interval in milliseconds (overrides PRICE_POLL_INTERVAL_MS)
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Quote source: live or mock (overrides PRICE_MODE)
    #[arg(short, long)]
    mode: Option<String>,

    /// Print the top N tokens by volume once at startup
    #[arg(long)]
    trending: Option<usize>,

    /// Value a portfolio once at startup, e.g. BTC=0.5,ETH=2
    #[arg(long)]
    holdings: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let args = Args::parse();
    let holdings = args.holdings.as_deref().map(parse_holdings).transpose()?;

    let mut config = Config::from_env()?;
    if let Some(mode) = &args.mode {
        config.mode = Mode::from_str(mode)?;
    }
    if let Some(symbols) = &args.symbols {
        config.price.symbols = parse_symbols(symbols);
    }
    if let Some(interval_ms) = args.interval_ms {
        config.price.poll_interval_ms = interval_ms;
    }

    info!("tokenprices {} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: Mode={:?}, Symbols={:?}, Interval={:?}",
        config.mode,
        config.price.symbols,
        config.poll_interval()
    );

    let (transport, store): (Arc<dyn QuoteTransport>, Arc<dyn KeyValueStore>) = match config.mode {
        Mode::Live => {
            let transport = CoinGeckoTransport::new(
                &config.price.api_base_url,
                config.price.vs_currency.clone(),
                config.request_timeout(),
            )?;
            let store = FileKeyValueStore::open(config.price.store_dir.clone())
                .await
                .with_context(|| format!("Failed to open store at {}", config.price.store_dir.display()))?;
            info!("Quote API: {} (snapshots in {})", transport.markets_url(), store.dir().display());
            let transport: Arc<dyn QuoteTransport> = Arc::new(transport);
            let store: Arc<dyn KeyValueStore> = Arc::new(store);
            (transport, store)
        }
        Mode::Mock => {
            info!("Quote API: in-process mock market");
            let transport: Arc<dyn QuoteTransport> = Arc::new(MockQuoteTransport::with_demo_market());
            let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
            (transport, store)
        }
    };

    let client = Arc::new(
        PriceClient::builder()
            .transport(transport)
            .store(store)
            .settings(config.client_settings())
            .build()?,
    );

    if let Some(limit) = args.trending {
        for quote in client.trending_quotes(limit).await {
            log_quote(&quote);
        }
    }

    if let Some(holdings) = holdings.filter(|h| !h.is_empty()) {
        let tokens = client.get_portfolio(&holdings).await?;
        for token in &tokens {
            if token.has_price() {
                info!(
                    "{:>6} {:>14.6} x {:>14.4} = {:>14.2}",
                    token.symbol, token.balance, token.price, token.value
                );
            } else {
                warn!("{:>6} {:>14.6} has no price", token.symbol, token.balance);
            }
        }
        info!("Portfolio value: {:.2}", total_value(&tokens));
    }

    let _polling = client.start_polling(
        config.price.symbols.clone(),
        config.poll_interval(),
        |quotes| {
            for quote in &quotes {
                log_quote(quote);
            }
        },
    )?;

    if config.observability.enabled {
        let reporter = MetricsReporter::new(client.clone(), config.observability.interval_secs);
        tokio::spawn(async move {
            reporter.run().await;
        });
        info!(
            "Metrics reporter started (interval: {:?})",
            Duration::from_secs(config.observability.interval_secs)
        );
    } else {
        info!("Metrics reporting disabled.");
    }

    info!("Watching prices. Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting...");

    Ok(())
}

fn log_quote(quote: &TokenQuote) {
    info!(
        "{:>6} {:>14.4} ({:+.2}% 24h) [{}]",
        quote.symbol.to_uppercase(),
        quote.current_price,
        quote.price_change_percentage_24h,
        quote.source
    );
}
