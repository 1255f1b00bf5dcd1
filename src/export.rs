//! One complete export run
//!
//! [`Exporter::run`] starts the worker pool, partitions the requested span on the
//! calling task, waits for the workers and closes the output stream. Records go
//! through [`RecordPipeline`]: duplicate check, text cleanup, then the sink.
//!
//! The partitioner and the workers share one cancellation token. The first
//! fatal error on either side cancels it and the whole run winds down without
//! issuing further requests.

use serde_json::value::RawValue;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::SearchApi;
use crate::config::PipelineConfig;
use crate::dedup::Deduplicator;
use crate::error::{Error, Result};
use crate::normalize;
use crate::partitioner::SpanPartitioner;
use crate::pool::{PageConsumer, WorkerPool};
use crate::record::Record;
use crate::sink::OutputSink;
use crate::span::Span;

/// What an export run achieved
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportSummary {
    /// Matches the service reported for the whole span
    pub expected: u64,
    /// Records written to the output
    pub saved: u64,
    /// Records dropped because their id was already written
    pub duplicates: u64,
    /// Search requests issued, probes and retries included
    pub requests: u64,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl ExportSummary {
    /// Achieved request rate over the whole run
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.requests as f64 / secs
        } else {
            0.0
        }
    }
}

/// Per-record processing shared by all workers
pub struct RecordPipeline<W: Write> {
    dedup: Deduplicator,
    sink: OutputSink<W>,
    id_field: String,
    description_field: String,
    title_field: Option<String>,
}

impl<W: Write> RecordPipeline<W> {
    /// Build the pipeline writing to `writer`
    pub fn new(config: &PipelineConfig, writer: W) -> Result<Self> {
        Ok(Self {
            dedup: Deduplicator::new(),
            sink: OutputSink::new(writer, config.encoding, config.compression_level)?,
            id_field: config.id_field.clone(),
            description_field: config.description_field.clone(),
            title_field: config.clean_title.then(|| config.title_field.clone()),
        })
    }

    /// Deduplicate, clean and write one result
    pub fn process(&self, raw: &RawValue) -> Result<()> {
        let mut record = Record::from_json(raw)?;
        let id = record.id(&self.id_field)?;
        if self.dedup.check_and_mark(&id) {
            return Ok(());
        }
        record.rewrite_text(&self.description_field, normalize::normalize)?;
        if let Some(title_field) = &self.title_field {
            record.rewrite_text(title_field, normalize::normalize)?;
        }
        self.sink.write(&record)
    }
}

impl<W: Write + Send> PageConsumer for RecordPipeline<W> {
    fn consume(&self, results: &[Box<RawValue>]) -> Result<()> {
        results.iter().try_for_each(|raw| self.process(raw))
    }
}

/// Runs the partitioner and the worker pool against one search source
pub struct Exporter {
    api: Arc<dyn SearchApi>,
    config: PipelineConfig,
}

impl Exporter {
    /// Create an exporter using `config` for workers, fields and output framing
    pub fn new(api: Arc<dyn SearchApi>, config: PipelineConfig) -> Self {
        Self { api, config }
    }

    /// Export every match in `span` to `writer` as one zstd frame
    ///
    /// The stream is only closed after all workers are done; on error it is left
    /// unfinished. A partitioning error takes precedence over worker errors.
    pub async fn run<W>(&self, span: Span, writer: W) -> Result<ExportSummary>
    where
        W: Write + Send + 'static,
    {
        let started = Instant::now();
        let requests_before = self.api.requests();
        let pipeline = Arc::new(RecordPipeline::new(&self.config, writer)?);

        let cancel = CancellationToken::new();
        let (pool, queue) = WorkerPool::start(
            self.config.workers,
            self.config.queue_capacity,
            self.api.clone(),
            pipeline.clone(),
            cancel.clone(),
        );
        let partitioned = SpanPartitioner::new(self.api.clone())
            .run(span, queue, &cancel)
            .await;
        let joined = pool.join().await;
        let stats = partitioned?;
        joined?;

        let closing = pipeline.clone();
        tokio::task::spawn_blocking(move || closing.sink.finish())
            .await
            .map_err(|e| Error::Worker(e.to_string()))??;

        let summary = ExportSummary {
            expected: stats.expected,
            saved: pipeline.sink.written(),
            duplicates: pipeline.dedup.duplicates(),
            requests: self.api.requests() - requests_before,
            elapsed: started.elapsed(),
        };
        if summary.saved + summary.duplicates < summary.expected {
            tracing::warn!(
                expected = summary.expected,
                saved = summary.saved,
                "fewer records than the first probe announced"
            );
        }
        Ok(summary)
    }
}
