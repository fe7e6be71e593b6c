//! Push-based metrics reporter
//!
//! Periodically outputs a structured JSON snapshot of the price client to stdout.

use crate::application::price_client::PriceClient;
use crate::domain::quote::FetchOutcome;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub cache: CacheSnapshot,
    pub fetches: FetchSnapshot,
}

#[derive(Debug, Serialize)]
pub struct CacheSnapshot {
    pub size: usize,
    pub last_update: Option<String>,
    pub queue_depth: usize,
}

#[derive(Debug, Serialize)]
pub struct FetchSnapshot {
    pub cache_hit: u64,
    pub live: u64,
    pub persisted: u64,
    pub synthetic: u64,
}

/// Outputs metrics as JSON logs on a fixed interval. Only outbound data.
pub struct MetricsReporter {
    client: Arc<PriceClient>,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(client: Arc<PriceClient>, interval_seconds: u64) -> Self {
        Self {
            client,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically
    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let snapshot = self.collect_snapshot();
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    // Use a special prefix so logs can be easily filtered
                    println!("METRICS_JSON:{}", json);
                    info!(
                        "Cache: {} quotes | Live: {} | Fallbacks: {} persisted, {} synthetic",
                        snapshot.cache.size,
                        snapshot.fetches.live,
                        snapshot.fetches.persisted,
                        snapshot.fetches.synthetic
                    );
                }
                Err(e) => warn!("Failed to serialize metrics: {}", e),
            }
        }
    }

    pub fn collect_snapshot(&self) -> MetricsSnapshot {
        let metrics = self.client.metrics();
        let status = self.client.cache_status();
        let uptime = self.start_time.elapsed().as_secs();

        metrics.uptime_seconds.set(uptime as f64);
        metrics.set_cache_entries(status.size);

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            cache: CacheSnapshot {
                size: status.size,
                last_update: status.last_update.map(|t| t.to_rfc3339()),
                queue_depth: self.client.queue_depth(),
            },
            fetches: FetchSnapshot {
                cache_hit: metrics.fetch_count(FetchOutcome::CacheHit.as_str()),
                live: metrics.fetch_count(FetchOutcome::Live.as_str()),
                persisted: metrics.fetch_count(FetchOutcome::Persisted.as_str()),
                synthetic: metrics.fetch_count(FetchOutcome::Synthetic.as_str()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryKeyValueStore;
    use crate::infrastructure::mock::MockQuoteTransport;

    #[tokio::test]
    async fn test_metrics_snapshot_collection() {
        let client = PriceClient::builder()
            .transport(Arc::new(MockQuoteTransport::with_demo_market()))
            .store(Arc::new(InMemoryKeyValueStore::new()))
            .build()
            .expect("Failed to build client");
        let client = Arc::new(client);

        client.fetch_quotes(&["BTC"]).await.unwrap();

        let reporter = MetricsReporter::new(client, 60);
        let snapshot = reporter.collect_snapshot();

        assert_eq!(snapshot.cache.size, 1);
        assert!(snapshot.cache.last_update.is_some());
        assert_eq!(snapshot.fetches.live, 1);

        let json = serde_json::to_string(&snapshot).expect("Failed to serialize");
        assert!(json.contains("\"queue_depth\":0"));
    }
}
