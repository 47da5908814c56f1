//! Bounded worker pool for pages and ids
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Structured completion: a run returns only after every dispatched unit finished
//! - Run-level cancellation: no new units once the token fires
//! - Stopping dispatch after the first structural error

use crate::HarvestError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything a pool run produced
#[derive(Debug)]
pub struct PoolRun<K, T> {
    /// One entry per dispatched unit, in completion order
    pub results: Vec<(K, Result<T, HarvestError>)>,

    /// Items that were never dispatched
    pub undispatched: usize,

    /// Units that panicked; their key is lost
    pub panicked: usize,

    /// Whether the caller's token stopped dispatch
    pub cancelled: bool,
}

impl<K, T> PoolRun<K, T> {
    /// First structural error among the results, if any
    pub fn take_structural_error(&mut self) -> Option<HarvestError> {
        let index = self
            .results
            .iter()
            .position(|(_, r)| matches!(r, Err(e) if e.is_structural()))?;
        match self.results.remove(index).1 {
            Err(e) => Some(e),
            Ok(_) => None,
        }
    }
}

/// Fixed-size pool of concurrent units
///
/// At most `size` units run at once. Units are tokio tasks, so the operation
/// must be `Send + 'static`.
#[derive(Debug, Clone)]
pub struct WorkPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkPool {
    /// Creates a pool that runs at most `size` units concurrently
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `op` once per item and waits for all dispatched units
    ///
    /// Dispatch stops early when `cancel` fires or when a unit fails with a
    /// structural error; units already in flight are drained either way.
    pub async fn run<K, T, F, Fut>(
        &self,
        items: Vec<K>,
        cancel: &CancellationToken,
        op: F,
    ) -> PoolRun<K, T>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, HarvestError>> + Send + 'static,
    {
        let stop = cancel.child_token();
        let mut join_set = JoinSet::new();
        let total = items.len();
        let mut dispatched = 0usize;

        for item in items {
            if stop.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let key = item.clone();
            let unit = op(item);
            let stop = stop.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = unit.await;
                if let Err(e) = &result {
                    if e.is_structural() {
                        stop.cancel();
                    }
                }
                (key, result)
            });
            dispatched += 1;
        }

        let mut results = Vec::with_capacity(dispatched);
        let mut panicked = 0;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    panicked += 1;
                }
            }
        }

        PoolRun {
            results,
            undispatched: total - dispatched,
            panicked,
            cancelled: cancel.is_cancelled(),
        }
    }
}
