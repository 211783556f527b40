//! Talegraph CLI: feed JSON Lines records into the graph.
//!
//! Usage:
//!   talegraph ingest [FILE] [--uri URI] [--workers N] [--write-timeout-secs S]
//!
//! Connection settings come from NEO4J_URI, NEO4J_USER, NEO4J_PASSWORD and
//! NEO4J_DATABASE; `--uri` overrides NEO4J_URI.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use talegraph::{ingest, GraphConfig, PipelineOptions, Record};
use tracing::{error, warn, Level};

#[derive(Parser)]
#[command(name = "talegraph", version, about = "Idempotent graph persistence for fiction catalogs")]
struct Cli {
    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write records from a JSON Lines file (or stdin) to the graph
    Ingest {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
        /// Connection URI (overrides NEO4J_URI)
        #[arg(long)]
        uri: Option<String>,
        /// Concurrent transactions
        #[arg(long, default_value_t = talegraph::pipeline::DEFAULT_WORKERS)]
        workers: usize,
        /// Per-record write timeout in seconds
        #[arg(long, default_value_t = 30)]
        write_timeout_secs: u64,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse records lazily, skipping lines that are not valid records
fn read_records(reader: impl BufRead) -> impl Iterator<Item = Record> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(line = index + 1, error = %e, "failed to read input line");
                    return None;
                }
            };
            if line.trim().is_empty() {
                return None;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "skipping unparsable record");
                    None
                }
            }
        })
}

async fn cmd_ingest(file: Option<PathBuf>, uri: Option<String>, options: PipelineOptions) -> i32 {
    let mut config = GraphConfig::from_env();
    if let Some(uri) = uri {
        config = config.with_uri(uri);
    }

    let reader: Box<dyn BufRead> = match file {
        Some(path) => match File::open(&path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                eprintln!("Error: cannot open '{}': {}", path.display(), e);
                return 1;
            }
        },
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    match ingest(&config, options, read_records(reader)).await {
        Ok(summary) => {
            println!(
                "Ingested {} records: {} committed, {} rejected, {} failed",
                summary.total(),
                summary.committed,
                summary.rejected,
                summary.failed
            );
            0
        }
        Err(e) => {
            error!(error = %e, "run aborted");
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let code = match cli.command {
        Commands::Ingest {
            file,
            uri,
            workers,
            write_timeout_secs,
        } => {
            let options = PipelineOptions::default()
                .with_workers(workers)
                .with_write_timeout(Duration::from_secs(write_timeout_secs));
            cmd_ingest(file, uri, options).await
        }
    };
    std::process::exit(code);
}
