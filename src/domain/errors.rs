use thiserror::Error;

/// Errors raised while fetching, caching or persisting token quotes.
///
/// Only `InvalidArgument` ever reaches callers of the price client; every other
/// variant is recovered internally by the fallback chain.
#[derive(Debug, Clone, Error)]
pub enum PriceError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Rate limited by quote API (HTTP 429)")]
    RateLimited,

    #[error("Network failure: {reason}")]
    Network { reason: String },

    #[error("Quote API returned status {status}")]
    HttpStatus { status: u16 },

    #[error("Failed to parse quote payload: {reason}")]
    Parse { reason: String },

    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Request queue is closed")]
    QueueClosed,
}

impl PriceError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl std::fmt::Display) -> Self {
        Self::Storage {
            reason: reason.to_string(),
        }
    }

    /// Failures that should push a lookup down the fallback chain.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidArgument { .. })
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::RateLimited => "rate_limited",
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Parse { .. } => "parse",
            Self::Timeout { .. } => "timeout",
            Self::Storage { .. } => "storage",
            Self::QueueClosed => "queue_closed",
        }
    }
}
