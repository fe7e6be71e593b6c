//! Prometheus metrics for the price client
//!
//! All metrics use the `tokenprices_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for quote fetching
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Fetches by outcome (cache_hit, live, persisted, synthetic)
    pub fetches_total: CounterVec,
    /// Fallback chain transitions by stage reached
    pub fallbacks_total: CounterVec,
    /// Upstream failures by error kind
    pub upstream_errors_total: CounterVec,
    /// Polling ticks by outcome
    pub polls_total: CounterVec,
    /// Upstream request latency in seconds
    pub request_latency_seconds: HistogramVec,
    /// Quotes held in memory
    pub cache_entries: GenericGauge<AtomicF64>,
    /// Requests waiting in the queue
    pub queue_depth: GenericGauge<AtomicF64>,
    /// Uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fetches_total = CounterVec::new(
            Opts::new("tokenprices_fetches_total", "Quote fetches by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;

        let fallbacks_total = CounterVec::new(
            Opts::new(
                "tokenprices_fallbacks_total",
                "Fallback chain transitions by stage",
            ),
            &["stage"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let upstream_errors_total = CounterVec::new(
            Opts::new(
                "tokenprices_upstream_errors_total",
                "Quote API failures by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(upstream_errors_total.clone()))?;

        let polls_total = CounterVec::new(
            Opts::new("tokenprices_polls_total", "Polling ticks by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(polls_total.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tokenprices_request_latency_seconds",
                "Quote API request latency in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        let cache_entries = Gauge::with_opts(Opts::new(
            "tokenprices_cache_entries",
            "Quotes held in the in-memory cache",
        ))?;
        registry.register(Box::new(cache_entries.clone()))?;

        let queue_depth = Gauge::with_opts(Opts::new(
            "tokenprices_queue_depth",
            "Requests waiting in the rate-limited queue",
        ))?;
        registry.register(Box::new(queue_depth.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "tokenprices_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            fetches_total,
            fallbacks_total,
            upstream_errors_total,
            polls_total,
            request_latency_seconds,
            cache_entries,
            queue_depth,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_fetch(&self, outcome: &str) {
        self.fetches_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_fallback(&self, stage: &str) {
        self.fallbacks_total.with_label_values(&[stage]).inc();
    }

    pub fn inc_upstream_error(&self, kind: &str) {
        self.upstream_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn inc_polls(&self, outcome: &str) {
        self.polls_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_request_latency(&self, endpoint: &str, latency: f64) {
        self.request_latency_seconds
            .with_label_values(&[endpoint])
            .observe(latency);
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_entries.set(entries as f64);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as f64);
    }

    pub fn fetch_count(&self, outcome: &str) -> u64 {
        self.fetches_total.with_label_values(&[outcome]).get() as u64
    }

    pub fn fallback_count(&self, stage: &str) -> u64 {
        self.fallbacks_total.with_label_values(&[stage]).get() as u64
    }

    pub fn upstream_error_count(&self, kind: &str) -> u64 {
        self.upstream_errors_total.with_label_values(&[kind]).get() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.set_cache_entries(3);
        assert!(metrics.render().contains("tokenprices_cache_entries 3"));
    }

    #[test]
    fn test_fetch_and_fallback_counters() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_fetch("live");
        metrics.inc_fetch("live");
        metrics.inc_fallback("synthetic");

        assert_eq!(metrics.fetch_count("live"), 2);
        assert_eq!(metrics.fetch_count("persisted"), 0);
        assert_eq!(metrics.fallback_count("synthetic"), 1);
        assert!(metrics.render().contains("tokenprices_fallbacks_total"));
    }
}
