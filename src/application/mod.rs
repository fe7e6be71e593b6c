pub mod fallback;
pub mod polling;
pub mod price_client;
pub mod quote_cache;
pub mod request_queue;
pub mod snapshot_store;

pub use polling::{Backoff, PollingHandle, PollingPolicy};
pub use price_client::{ClientSettings, PriceClient, PriceClientBuilder};
