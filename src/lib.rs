//! # offers-dump
//!
//! Complete bulk export of a rate-limited, result-capped job offer search API.
//!
//! ## Design Philosophy
//!
//! offers-dump is designed to be:
//! - **Complete** - Spans too large for one query are bisected until every match is reachable
//! - **Polite** - One request gate for the whole process, shared by every worker
//! - **Lossless** - Fields the exporter does not clean are written back byte for byte
//! - **Streaming** - Records go straight into a zstd frame, nothing is held in memory
//!
//! ## Quick Start
//!
//! ```no_run
//! use offers_dump::{Config, Span, run_export};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.client_id = "my-client".to_string();
//!     config.api.client_secret = "my-secret".to_string();
//!
//!     let span = Span::from_local("2024-01-01 00:00:00", "2024-12-31 23:59:59")?;
//!     let output = std::fs::File::create("offers.ndjson.zst")?;
//!     let summary = run_export(&config, span, output).await?;
//!
//!     println!("saved {} offers", summary.saved);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Rate-limited search API client
pub mod client;
/// Configuration types
pub mod config;
/// Duplicate record detection
pub mod dedup;
/// Error types
pub mod error;
/// Export orchestration and summary
pub mod export;
/// Free-text cleanup
pub mod normalize;
/// Span bisection around the per-query result cap
pub mod partitioner;
/// Concurrent page fetching
pub mod pool;
/// Raw search result records
pub mod record;
/// Retry logic with exponential backoff
pub mod retry;
/// Compressed output stream
pub mod sink;
/// Time spans and work items
pub mod span;

use std::io::Write;
use std::sync::Arc;

// Re-export commonly used types
pub use client::{MAX_ITEMS, MAX_ITEMS_PER_PAGE, MAX_PAGES, Page, RateLimitedClient, SearchApi};
pub use config::{ApiConfig, Config, PipelineConfig, RateLimitConfig, RecordEncoding, RetryConfig};
pub use dedup::Deduplicator;
pub use error::{Error, Result};
pub use export::{ExportSummary, Exporter, RecordPipeline};
pub use partitioner::{PartitionStats, SpanPartitioner};
pub use pool::{PageConsumer, WorkerPool};
pub use record::Record;
pub use sink::OutputSink;
pub use span::{Span, WorkItem};

/// Validate `config`, authenticate and export every offer created within `span`
///
/// Fails before any search request if the configuration is incomplete or the
/// credentials are rejected.
pub async fn run_export<W>(config: &Config, span: Span, writer: W) -> Result<ExportSummary>
where
    W: Write + Send + 'static,
{
    config.validate()?;
    let client = RateLimitedClient::new(config).await?;
    Exporter::new(Arc::new(client), config.pipeline.clone())
        .run(span, writer)
        .await
}
