//! Bounded-parallelism task pool
//!
//! [`ConcurrencyPool`] runs a batch of indexed async tasks with at most
//! `concurrency` in flight: persistent workers pull from a shared queue, so a
//! finished task immediately frees its slot for the next one (no
//! wait-for-batch semantics). Worker `w` delays its first pull by
//! `w * stagger` to spread the cold-start burst; tasks beyond the first wave
//! are gated purely by slot availability.
//!
//! Every submitted task reaches exactly one terminal [`TaskOutcome`],
//! delivered to the caller's `on_complete` callback in completion order. One
//! task's failure never cancels or blocks the others. Cancelling the supplied
//! token resolves in-flight tasks and drains queued ones as
//! [`Error::Cancelled`] outcomes.

use crate::error::{Error, Result};
use rand::Rng;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one pool task
#[derive(Debug)]
pub struct TaskOutcome<T> {
    /// Submission index of the task
    pub index: usize,
    /// Success value or the error the task failed with
    pub result: Result<T>,
}

/// Bounded-parallelism task runner
#[derive(Clone, Debug)]
pub struct ConcurrencyPool {
    concurrency: usize,
    stagger: Duration,
    jitter: bool,
}

impl ConcurrencyPool {
    /// Create a pool with the given worker count and first-wave stagger
    pub fn new(concurrency: usize, stagger: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            stagger,
            jitter: false,
        }
    }

    /// Add a uniform random 0..stagger component to each worker's startup delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Run all tasks, invoking `on_complete` exactly once per task index
    ///
    /// Returns only when every task has reached a terminal outcome. An empty
    /// task list returns immediately.
    pub async fn run<T, F, Fut>(
        &self,
        tasks: Vec<F>,
        cancel: CancellationToken,
        mut on_complete: impl FnMut(TaskOutcome<T>),
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if tasks.is_empty() {
            return;
        }

        let total = tasks.len();
        let queue: Arc<Mutex<VecDeque<(usize, F)>>> =
            Arc::new(Mutex::new(tasks.into_iter().enumerate().collect()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let workers = self.concurrency.min(total);
        let mut handles = Vec::with_capacity(workers);

        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let delay = self.startup_delay(worker);

            handles.push(tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, task)) = next else { break };

                    let result = if cancel.is_cancelled() {
                        // Queued tasks still get their terminal outcome
                        Err(Error::Cancelled)
                    } else {
                        tokio::select! {
                            _ = cancel.cancelled() => Err(Error::Cancelled),
                            result = task() => result,
                        }
                    };

                    if tx.send(TaskOutcome { index, result }).is_err() {
                        break;
                    }
                }
            }));
        }
        // Collector exits once every worker has dropped its sender
        drop(tx);

        let mut completed = 0usize;
        while let Some(outcome) = rx.recv().await {
            completed += 1;
            on_complete(outcome);
        }
        for handle in handles {
            // Worker bodies don't panic; a join error here means a task did
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "pool worker panicked");
            }
        }
        debug_assert_eq!(completed, total);
    }

    /// Startup delay for the given worker slot
    fn startup_delay(&self, worker: usize) -> Duration {
        let base = self.stagger.saturating_mul(worker as u32);
        if self.jitter && !self.stagger.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=self.stagger.as_millis() as u64);
            base + Duration::from_millis(extra)
        } else {
            base
        }
    }
}
