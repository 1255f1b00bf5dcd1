//! Worker pool turning work items into paged fetches
//!
//! Workers share one bounded queue. Each worker takes an item, pages through its
//! span until the tracked count is used up or the service runs dry, and passes
//! every decoded page to the [`PageConsumer`] on the blocking thread pool.
//!
//! All workers watch one [`CancellationToken`]. A worker that fails cancels it,
//! which wakes every other worker, whether parked on the queue or waiting on a
//! fetch, and stops the partitioner feeding the queue.

use serde_json::value::RawValue;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::{MAX_ITEMS_PER_PAGE, SearchApi};
use crate::error::{Error, Result};
use crate::record;
use crate::span::WorkItem;

/// Receives the results of every fetched page
///
/// Called from the blocking thread pool, so implementations may do blocking I/O.
pub trait PageConsumer: Send + Sync {
    /// Handle one page worth of raw results (never empty)
    fn consume(&self, results: &[Box<RawValue>]) -> Result<()>;
}

/// Fixed group of workers draining a bounded queue of [`WorkItem`]s
pub struct WorkerPool {
    workers: JoinSet<Result<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks and return the pool with the sending half of its queue
    ///
    /// Dropping every clone of the sender closes the queue; workers exit once it is
    /// drained. Cancelling `cancel` makes every worker stop at its next fetch or
    /// queue read. A failing worker cancels it itself.
    pub fn start(
        workers: usize,
        queue_capacity: usize,
        api: Arc<dyn SearchApi>,
        consumer: Arc<dyn PageConsumer>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Sender<WorkItem>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let queue = Arc::new(Mutex::new(rx));

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let worker_ctx = Worker {
                id: worker,
                queue: queue.clone(),
                api: api.clone(),
                consumer: consumer.clone(),
                cancel: cancel.clone(),
            };
            set.spawn(worker_ctx.run());
        }
        tracing::debug!(workers, queue_capacity, "worker pool started");
        (Self { workers: set }, tx)
    }

    /// Wait for every worker to exit and return the first error any of them hit
    pub async fn join(mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(joined) = self.workers.join_next().await {
            let outcome = joined
                .map_err(|e| Error::Worker(e.to_string()))
                .and_then(|result| result);
            if let Err(e) = outcome {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    tracing::debug!(error = %e, "additional worker failure");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    api: Arc<dyn SearchApi>,
    consumer: Arc<dyn PageConsumer>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<()> {
        let mut items = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                item = async {
                    let mut queue = self.queue.lock().await;
                    queue.recv().await
                } => item,
            };
            let Some(item) = next else {
                break;
            };

            if let Err(e) = self.drain(item).await {
                tracing::error!(worker = self.id, range = %item.span, error = %e, "worker failed, cancelling export");
                self.cancel.cancel();
                return Err(e);
            }
            items += 1;
        }
        tracing::debug!(
            worker = self.id,
            items,
            cancelled = self.cancel.is_cancelled(),
            "worker finished"
        );
        Ok(())
    }

    /// Fetch every page of one item, giving up quietly once the export is cancelled
    async fn drain(&self, item: WorkItem) -> Result<()> {
        let WorkItem {
            span,
            mut remaining,
        } = item;
        let per_page = u64::from(MAX_ITEMS_PER_PAGE);
        let mut page = 0;

        while remaining > 0 {
            let item_count = remaining.min(per_page) as u32;
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(worker = self.id, range = %span, page, "export cancelled, abandoning item");
                    return Ok(());
                }
                fetched = self.api.fetch_page(span, page, item_count) => fetched?,
            };
            if fetched.body.is_empty() {
                if fetched.remaining != 0 {
                    return Err(Error::Integrity(format!(
                        "empty page {page} of {span} while {} matches are reported",
                        fetched.remaining
                    )));
                }
                tracing::debug!(range = %span, page, remaining, "span ran dry before its probed count");
                break;
            }

            let results = record::decode_page(&fetched.body)?;
            let count = results.len();
            let consumer = self.consumer.clone();
            tokio::task::spawn_blocking(move || consumer.consume(&results))
                .await
                .map_err(|e| Error::Worker(e.to_string()))??;
            tracing::debug!(worker = self.id, range = %span, page, results = count, "page done");

            remaining = remaining.saturating_sub(per_page);
            page += 1;
        }
        Ok(())
    }
}
