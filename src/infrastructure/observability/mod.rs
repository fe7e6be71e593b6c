//! Push-based observability
//!
//! Metrics are only ever pushed out: a Prometheus registry that can be
//! rendered on demand, and periodic structured JSON logs on stdout. Nothing
//! here listens for incoming requests.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
