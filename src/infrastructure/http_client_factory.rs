use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("tokenprices/", env!("CARGO_PKG_VERSION"));

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates an HTTP client for JSON APIs.
    ///
    /// No retry middleware: every request is paced by the request queue and a
    /// retry would bypass that spacing.
    pub fn create_client(timeout: Duration) -> Client {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}
