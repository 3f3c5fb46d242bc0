//! Run a single investigation from the command line.
//!
//! Prints one JSON event per line as the investigation progresses. Exits
//! non-zero when the investigation fails.
//!
//! Usage:
//!   vigil-investigate --indicator 185.220.101.4 --logs-file auth.log
//!   vigil-investigate --config vigil.toml --prompt "SSH brute force" --logs "..."

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_common::{InvestigationRequest, InvestigationState, Outcome};
use vigil_coordinator::{CancelToken, VigilConfig, build_orchestrator};

#[derive(Parser, Debug)]
#[command(name = "vigil-investigate")]
#[command(author, version, about = "Investigate one security alert", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Free-text alert description
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// IP address under suspicion
    #[arg(short, long)]
    indicator: Option<String>,

    /// Raw log excerpt
    #[arg(short, long, conflicts_with = "logs_file")]
    logs: Option<String>,

    /// Read the log excerpt from a file
    #[arg(long)]
    logs_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout stays one JSON event per line
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,vigil_coordinator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => VigilConfig::from_file(path)?,
        None => VigilConfig::default(),
    };
    let orchestrator = Arc::new(build_orchestrator(&config)?);

    let logs = match &args.logs_file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading logs from {}", path.display()))?,
        ),
        None => args.logs,
    };
    let mut request = InvestigationRequest {
        indicator: args.indicator,
        logs,
        ..Default::default()
    };
    request.alert.source = "cli".into();
    request.alert.details = args.prompt;

    let (tx, mut rx) = mpsc::channel(config.orchestrator.max_steps + 1);
    let cancel = CancelToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let run = tokio::spawn(async move {
        orchestrator
            .run(InvestigationState::new(request), &tx, &cancel)
            .await
    });

    while let Some(event) = rx.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }

    match run.await? {
        Outcome::Failed { .. } => Ok(ExitCode::FAILURE),
        _ => Ok(ExitCode::SUCCESS),
    }
}
