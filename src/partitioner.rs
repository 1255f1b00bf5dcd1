//! Bisection of a time span into sub-spans the search service can fully enumerate
//!
//! A single query never yields more than [`MAX_ITEMS`] results, whatever its true
//! match count. The partitioner probes a span for its count and halves it until
//! every piece holds fewer matches than that, then hands the pieces to the workers.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{MAX_ITEMS, SearchApi};
use crate::error::Result;
use crate::record;
use crate::span::{Span, WorkItem};

/// Counters describing one partitioning run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Match count of the whole span, from the first probe
    pub expected: u64,
    /// Probe queries issued
    pub probes: u64,
    /// Work items handed to the queue
    pub emitted: u64,
    /// Spans dropped because they held no match
    pub discarded: u64,
    /// One-second spans emitted with more matches than a query can return
    pub truncated: u64,
}

/// Splits a span depth-first, lower half first, emitting [`WorkItem`]s as it goes
///
/// When a span splits, both halves are counted before either is handed out, so
/// every probe for a span's children precedes the first page fetch inside it.
pub struct SpanPartitioner {
    api: Arc<dyn SearchApi>,
}

impl SpanPartitioner {
    /// Create a partitioner probing through `api`
    pub fn new(api: Arc<dyn SearchApi>) -> Self {
        Self { api }
    }

    /// True match count of `span`, from a one-item query
    pub async fn count(&self, span: Span) -> Result<u64> {
        let page = self.api.fetch_page(span, 0, 1).await?;
        if page.remaining > 0 {
            return Ok(page.remaining);
        }
        if page.body.is_empty() {
            return Ok(0);
        }
        // a complete answer carries no total: everything is in the body
        Ok(record::decode_page(&page.body)?.len() as u64)
    }

    /// Partition `span` and send each piece to `queue`
    ///
    /// The queue is closed when this returns. Once `cancel` fires, or every
    /// receiver went away, the remaining spans are abandoned without error. A
    /// failed probe cancels `cancel` before the error is returned.
    pub async fn run(
        &self,
        span: Span,
        queue: mpsc::Sender<WorkItem>,
        cancel: &CancellationToken,
    ) -> Result<PartitionStats> {
        let mut stats = PartitionStats::default();
        if let Err(e) = self.partition(span, &queue, cancel, &mut stats).await {
            tracing::error!(range = %span, probes = stats.probes, error = %e, "partitioning failed, cancelling export");
            cancel.cancel();
            return Err(e);
        }

        tracing::debug!(
            probes = stats.probes,
            emitted = stats.emitted,
            discarded = stats.discarded,
            cancelled = cancel.is_cancelled(),
            "partitioning finished"
        );
        Ok(stats)
    }

    async fn partition(
        &self,
        span: Span,
        queue: &mpsc::Sender<WorkItem>,
        cancel: &CancellationToken,
        stats: &mut PartitionStats,
    ) -> Result<()> {
        let Some(expected) = self.probe(span, cancel, stats).await? else {
            return Ok(());
        };
        stats.expected = expected;
        tracing::info!(range = %span, expected, "probed export range");

        let mut stack = vec![(span, expected)];
        while let Some((span, count)) = stack.pop() {
            let item = if count == 0 {
                tracing::trace!(range = %span, "no match, discarding");
                stats.discarded += 1;
                continue;
            } else if count < MAX_ITEMS {
                WorkItem {
                    span,
                    remaining: count,
                }
            } else if let Some((lower, upper)) = span.split() {
                tracing::debug!(range = %span, count, "too many matches, splitting");
                let Some(lower_count) = self.probe(lower, cancel, stats).await? else {
                    break;
                };
                let Some(upper_count) = self.probe(upper, cancel, stats).await? else {
                    break;
                };
                stack.push((upper, upper_count));
                stack.push((lower, lower_count));
                continue;
            } else {
                tracing::warn!(
                    range = %span,
                    count,
                    kept = MAX_ITEMS,
                    "single second holds more matches than a query can return, output will be truncated"
                );
                stats.truncated += 1;
                WorkItem {
                    span,
                    remaining: MAX_ITEMS,
                }
            };

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = queue.send(item) => sent.is_ok(),
            };
            if !sent {
                tracing::debug!(pending = stack.len(), "export cancelled or work queue closed, stopping");
                break;
            }
            stats.emitted += 1;
        }
        Ok(())
    }

    /// Count `span` unless the export was cancelled first
    async fn probe(
        &self,
        span: Span,
        cancel: &CancellationToken,
        stats: &mut PartitionStats,
    ) -> Result<Option<u64>> {
        let count = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(range = %span, "export cancelled, skipping probe");
                return Ok(None);
            }
            count = self.count(span) => count?,
        };
        stats.probes += 1;
        Ok(Some(count))
    }
}
