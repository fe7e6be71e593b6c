use crate::domain::errors::PriceError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info};

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO queue that serializes outbound requests with a minimum gap between them.
///
/// A single drain task runs one job at a time, so no two requests are ever in
/// flight together. The queue is unbounded and jobs cannot be withdrawn once
/// submitted; dropping the caller's future does not cancel the job.
pub struct RequestQueue {
    job_tx: mpsc::UnboundedSender<Job>,
    depth: Arc<AtomicUsize>,
    min_delay: Duration,
}

impl RequestQueue {
    /// Spawns the drain task; must be called inside a Tokio runtime.
    pub fn new(min_delay: Duration) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        let drain = QueueDrain {
            job_rx,
            min_delay,
            last_request: None,
            depth: depth.clone(),
        };
        tokio::spawn(drain.run());

        Self {
            job_tx,
            depth,
            min_delay,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Jobs submitted but not yet started.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Enqueue `task` and wait for its result.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T, PriceError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, PriceError>> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let result = task().await;
                // Receiver may be gone if the caller gave up waiting
                let _ = result_tx.send(result);
            })
        });

        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.job_tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(PriceError::QueueClosed);
        }

        result_rx.await.map_err(|_| PriceError::QueueClosed)?
    }
}

struct QueueDrain {
    job_rx: mpsc::UnboundedReceiver<Job>,
    min_delay: Duration,
    last_request: Option<Instant>,
    depth: Arc<AtomicUsize>,
}

impl QueueDrain {
    async fn run(mut self) {
        info!(
            "RequestQueue: Drain started (min delay between requests: {:?})",
            self.min_delay
        );

        while let Some(job) = self.job_rx.recv().await {
            self.depth.fetch_sub(1, Ordering::SeqCst);

            if let Some(last) = self.last_request {
                let elapsed = last.elapsed();
                if elapsed < self.min_delay {
                    let wait = self.min_delay - elapsed;
                    debug!("RequestQueue: Waiting {:?} before next request", wait);
                    time::sleep(wait).await;
                }
            }

            self.last_request = Some(Instant::now());
            job().await;
        }

        debug!("RequestQueue: All senders dropped, drain stopped");
    }
}
