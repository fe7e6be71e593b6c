pub mod clock;
pub mod coingecko;
pub mod file_store;
pub mod http_client_factory;
pub mod in_memory;
pub mod mock;
pub mod observability;

pub use clock::{ManualClock, SystemClock};
pub use coingecko::CoinGeckoTransport;
pub use file_store::FileKeyValueStore;
pub use in_memory::InMemoryKeyValueStore;
pub use mock::MockQuoteTransport;
