//! Command line entry point: export job offers to a zstd-compressed stream

use chrono::{Local, Months};
use clap::{Parser, ValueEnum};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use offers_dump::span::LOCAL_DATE_TIME_FORMAT;
use offers_dump::{Config, RecordEncoding, Span, run_export};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// API client identifier
    #[arg(long, env = "OFFERS_DUMP_ID", hide_env_values = true)]
    id: String,

    /// API client secret
    #[arg(long, env = "OFFERS_DUMP_SECRET", hide_env_values = true)]
    secret: String,

    /// First creation date, local time "YYYY-MM-DD HH:MM:SS" (default: one year ago)
    #[arg(long)]
    min: Option<String>,

    /// Last creation date, local time "YYYY-MM-DD HH:MM:SS" (default: now)
    #[arg(long)]
    max: Option<String>,

    /// Write to FILE instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Record framing inside the compressed stream
    #[arg(long, value_enum, default_value_t = Format::Ndjson)]
    format: Format,

    /// Leave the title field as the service returned it
    #[arg(long, default_value_t = false)]
    no_clean_title: bool,

    /// Number of concurrent page-fetching workers
    #[arg(long)]
    workers: Option<usize>,

    /// Request ceiling across all workers
    #[arg(long, value_name = "N")]
    max_rps: Option<f64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// One JSON object per line
    Ndjson,
    /// 4-byte big-endian length before each JSON object
    Framed,
}

impl From<Format> for RecordEncoding {
    fn from(format: Format) -> Self {
        match format {
            Format::Ndjson => RecordEncoding::Ndjson,
            Format::Framed => RecordEncoding::Framed,
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.client_id = self.id.clone();
        config.api.client_secret = self.secret.clone();
        config.pipeline.encoding = self.format.into();
        config.pipeline.clean_title = !self.no_clean_title;
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(max_rps) = self.max_rps {
            config.rate_limit.max_requests_per_second = max_rps;
        }
        config
    }

    fn span(&self) -> offers_dump::Result<Span> {
        let now = Local::now();
        let year_ago = now.checked_sub_months(Months::new(12)).unwrap_or(now);
        let min = self
            .min
            .clone()
            .unwrap_or_else(|| year_ago.format(LOCAL_DATE_TIME_FORMAT).to_string());
        let max = self
            .max
            .clone()
            .unwrap_or_else(|| now.format(LOCAL_DATE_TIME_FORMAT).to_string());
        Span::from_local(&min, &max)
    }

    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        match &self.output {
            Some(path) => Ok(Box::new(std::fs::File::create(path)?)),
            None => {
                let stdout = std::io::stdout();
                if stdout.is_terminal() {
                    return Err(std::io::Error::other(
                        "refusing to write compressed output to a terminal, redirect stdout or use --output",
                    ));
                }
                Ok(Box::new(stdout))
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "export failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.config();
    let span = cli.span()?;
    let writer = cli.writer()?;

    let summary = run_export(&config, span, writer).await?;
    tracing::info!(
        saved = summary.saved,
        duplicates = summary.duplicates,
        requests = summary.requests,
        elapsed_secs = summary.elapsed.as_secs(),
        "saved {} job offers at a rate of {:.1} req/sec (maximum allowed: {})",
        summary.saved,
        summary.requests_per_second(),
        config.rate_limit.max_requests_per_second,
    );
    Ok(())
}
