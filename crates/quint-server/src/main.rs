//! quint-server binary: the knowledge-assurance engine.
//!
//! Speaks line-delimited JSON-RPC 2.0 on stdin/stdout. stdout carries
//! protocol responses only; diagnostics go to stderr or, with `--log-file`,
//! to a file. One engine instance per project: the store does not support
//! concurrent writers.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use quint_server::protocol::Server;
use quint_server::tools::Tools;

/// quint engine - assured knowledge for software decisions
#[derive(Parser, Debug)]
#[command(name = "quint-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Project root containing (or receiving) the .quint directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Current version-control commit id, used to detect a moved workspace
    #[arg(long, env = "QUINT_COMMIT")]
    commit: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        // stdout is the protocol channel; diagnostics go to stderr.
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }

    let tools = Tools::open_existing(&args.root, args.commit.clone())
        .context("failed to open the knowledge store")?;
    info!(
        root = %args.root.display(),
        commit = args.commit.as_deref().unwrap_or("unknown"),
        "quint engine started"
    );

    let mut server = Server::new(tools);
    let stdin = io::stdin();
    let stdout = io::stdout();
    server
        .run(stdin.lock(), stdout.lock())
        .context("protocol loop failed")?;
    Ok(())
}
