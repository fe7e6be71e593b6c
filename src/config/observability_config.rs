//! Observability configuration parsing from environment variables.

use super::parse_or;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    /// Seconds between two pushed metric snapshots
    pub interval_secs: u64,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            enabled: parse_or(&lookup, "OBSERVABILITY_ENABLED", true),
            interval_secs: parse_or(&lookup, "OBSERVABILITY_INTERVAL", 60),
        }
    }
}
