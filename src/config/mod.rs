//! Configuration module for tokenprices.
//!
//! Settings are loaded from environment variables (and `.env` through
//! `dotenvy` in the binary), organized by concern: Price and Observability.
//! Unparseable numbers fall back to their defaults; an unknown mode is an error.

mod observability_config;
mod price_config;

pub use observability_config::ObservabilityEnvConfig;
pub use price_config::{DEFAULT_SYMBOLS, PriceEnvConfig, parse_holdings, parse_symbols};

use crate::application::polling::PollingPolicy;
use crate::application::price_client::ClientSettings;
use anyhow::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Where quotes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Live,
    Mock,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "mock" => Ok(Mode::Mock),
            _ => anyhow::bail!("Invalid PRICE_MODE: {}. Must be 'live' or 'mock'", s),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub price: PriceEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup("PRICE_MODE") {
            Some(raw) => Mode::from_str(&raw)?,
            None => Mode::default(),
        };

        Ok(Self {
            mode,
            price: PriceEnvConfig::from_lookup(&lookup),
            observability: ObservabilityEnvConfig::from_lookup(&lookup),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.price.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.price.request_timeout_ms)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            cache_ttl: Duration::from_millis(self.price.cache_ttl_ms),
            persisted_ttl_multiplier: self.price.persisted_ttl_multiplier,
            min_request_delay: Duration::from_millis(self.price.min_request_delay_ms),
            request_timeout: self.request_timeout(),
            polling: PollingPolicy::default(),
        }
    }
}

fn var_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Config: Invalid {}={:?}, using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}
