use crate::application::price_client::PriceClient;
use crate::domain::quote::{FetchOutcome, TokenQuote};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Backoff knobs shared by every polling subscription of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingPolicy {
    /// Consecutive failed ticks before the interval starts widening.
    pub failure_threshold: u32,
    /// Upper bound for a widened interval.
    pub max_delay: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            max_delay: Duration::from_secs(300),
        }
    }
}

/// Per-subscription failure counter driving the delay between ticks.
///
/// A tick fails when its quotes came from the persisted snapshot or were
/// synthesized. From `failure_threshold` failures on, the delay becomes
/// `interval * (failures + 1)` capped at `max_delay`; one success resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    policy: PollingPolicy,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(interval: Duration, policy: PollingPolicy) -> Self {
        Self {
            interval,
            policy,
            consecutive_failures: 0,
        }
    }

    pub fn record(&mut self, outcome: FetchOutcome) {
        if outcome.is_success() {
            if self.consecutive_failures > 0 {
                info!(
                    "Polling: Live quotes recovered after {} failed ticks",
                    self.consecutive_failures
                );
            }
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            warn!(
                "Polling: Tick served {} quotes ({}/{} consecutive failures)",
                outcome.as_str(),
                self.consecutive_failures,
                self.policy.failure_threshold
            );
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn next_delay(&self) -> Duration {
        if self.consecutive_failures < self.policy.failure_threshold {
            return self.interval;
        }
        let widened = self
            .interval
            .saturating_mul(self.consecutive_failures.saturating_add(1));
        // Never shorter than the base interval, even when it exceeds the cap
        widened.min(self.policy.max_delay).max(self.interval)
    }
}

/// Cancels a polling subscription. Dropping the handle cancels it as well.
pub struct PollingHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop future ticks. A fetch already in flight completes, but its result
    /// is not delivered.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Cancelled explicitly, or the handle (the only sender) was dropped.
fn is_cancelled(cancel_rx: &watch::Receiver<bool>) -> bool {
    *cancel_rx.borrow() || cancel_rx.has_changed().is_err()
}

pub(crate) fn spawn_poller<F>(
    client: Arc<PriceClient>,
    symbols: Vec<String>,
    interval: Duration,
    policy: PollingPolicy,
    mut on_update: F,
) -> PollingHandle
where
    F: FnMut(Vec<TokenQuote>) + Send + 'static,
{
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut backoff = Backoff::new(interval, policy);
        info!(
            "Polling: Started for {:?} (interval: {:?})",
            symbols, interval
        );

        loop {
            let batch = match client.fetch_batch(symbols.as_slice()).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!("Polling: Stopping, fetch rejected: {}", e);
                    break;
                }
            };

            if is_cancelled(&cancel_rx) {
                break;
            }

            backoff.record(batch.outcome);
            client.metrics().inc_polls(batch.outcome.as_str());
            on_update(batch.quotes);

            let delay = backoff.next_delay();
            debug!("Polling: Next tick in {:?}", delay);

            tokio::select! {
                _ = time::sleep(delay) => {}
                // Fires on cancel() and when the handle is dropped
                _ = cancel_rx.changed() => break,
            }

            if is_cancelled(&cancel_rx) {
                break;
            }
        }

        info!("Polling: Stopped for {:?}", symbols);
    });

    PollingHandle { cancel_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_sender_counts_as_cancelled() {
        let (tx, rx) = watch::channel(false);
        assert!(!is_cancelled(&rx));
        drop(tx);
        assert!(is_cancelled(&rx));
    }

    #[test]
    fn test_delay_stays_at_interval_below_threshold() {
        let interval = Duration::from_millis(45_000);
        let mut backoff = Backoff::new(interval, PollingPolicy::default());

        backoff.record(FetchOutcome::Synthetic);
        backoff.record(FetchOutcome::Persisted);
        assert_eq!(backoff.next_delay(), interval);
    }

    #[test]
    fn test_backoff_grows_then_resets() {
        let interval = Duration::from_millis(10_000);
        let mut backoff = Backoff::new(interval, PollingPolicy::default());

        for _ in 0..3 {
            backoff.record(FetchOutcome::Synthetic);
        }
        let delay = backoff.next_delay();
        assert!(delay >= interval * 4);
        assert!(delay <= Duration::from_millis(300_000));

        backoff.record(FetchOutcome::Live);
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.next_delay(), interval);
    }

    #[test]
    fn test_backoff_is_capped() {
        let interval = Duration::from_millis(45_000);
        let mut backoff = Backoff::new(interval, PollingPolicy::default());
        for _ in 0..20 {
            backoff.record(FetchOutcome::Persisted);
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(300));
    }

    #[test]
    fn test_cache_hit_counts_as_success() {
        let interval = Duration::from_secs(1);
        let mut backoff = Backoff::new(interval, PollingPolicy::default());
        for _ in 0..5 {
            backoff.record(FetchOutcome::Synthetic);
        }
        backoff.record(FetchOutcome::CacheHit);
        assert_eq!(backoff.next_delay(), interval);
    }
}
