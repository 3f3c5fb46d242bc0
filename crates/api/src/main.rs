//! Vigil API server binary.
//!
//! Usage:
//!   vigil-api --config vigil.toml
//!   vigil-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `VIGIL_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `GROQ_API_KEY` / `OPENAI_API_KEY` - LLM provider credentials
//! - `VT_API_KEY` - VirusTotal credentials

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_api::{AppState, serve};
use vigil_coordinator::VigilConfig;

#[derive(Parser, Debug)]
#[command(name = "vigil-api")]
#[command(author, version, about = "Vigil incident investigation server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Bind address
    #[arg(short, long, env = "VIGIL_BIND_ADDR", default_value = "127.0.0.1")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vigil_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.bind == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0. The API has no authentication; \
             keep it behind a firewall or reverse proxy."
        );
    }

    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            VigilConfig::from_file(path)?
        }
        None => {
            tracing::info!("Using default configuration");
            VigilConfig::default()
        }
    };

    let state = AppState::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    serve(Arc::new(state), addr).await?;

    Ok(())
}
