use std::path::PathBuf;

use clap::Parser;
use filters_core::{AppConfig, ErrorExt};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "reddit_filters=debug,web=debug,reddit_client=debug,filters_core=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(
    name = "reddit-filters",
    about = "Browse Reddit listings with content filters"
)]
struct Cli {
    /// Path to config file (defaults to reddit-filters.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Reddit Filters");

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).inspect_err(|e| {
        e.log_error();
    })?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Err(e) = config.validate() {
        e.log_error();
        tracing::error!("{}", e.user_friendly_message());
        return Err(e.into());
    }
    tracing::debug!("Configuration: {:?}", config);

    let host = config.server.host.clone();
    let port = config.server.port;

    let state = web::AppState::new(config)?;
    let app = web::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
