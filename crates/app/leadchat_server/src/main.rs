//! Leadchat relay server binary.
//!
//! Serves the chat relay, the contact intake, and a health check. Every
//! setting can come from a flag or the matching environment variable; a
//! `.env` file is loaded first when present.

use std::time::Duration;

use clap::Parser;
use leadchat_api::config::{ApiConfig, DEFAULT_BIND_ADDR, parse_origins};
use leadchat_core::archive::ArchiveConfig;
use leadchat_core::stream::{ChunkGranularity, StreamPolicy};
use tracing::{info, warn};
use url::Url;

/// CLI arguments for the relay server.
#[derive(Parser, Debug)]
#[command(name = "leadchat_server", about = "Chat widget relay server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind_addr: String,

    /// Base URL of the upstream chat backend (required, no default).
    #[arg(long, env = "BACKEND_URL")]
    backend_url: Url,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value_t = 60)]
    backend_timeout_secs: u64,

    /// Number of most recent messages forwarded upstream.
    #[arg(long, env = "CHAT_HISTORY_LIMIT", default_value_t = 12)]
    history_limit: usize,

    /// Delay before each streamed chunk, in milliseconds.
    #[arg(long, env = "STREAM_CHUNK_DELAY_MS", default_value_t = 20)]
    chunk_delay_ms: u64,

    /// Chunking of the simulated stream: `word` or `whitespace`.
    #[arg(long, env = "STREAM_CHUNKING", default_value = "word")]
    chunking: ChunkGranularity,

    /// Comma-separated CORS origins. Empty allows any origin.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    allowed_origins: String,

    /// Base URL of the conversation archival API.
    #[arg(long, env = "ARCHIVE_ENDPOINT")]
    archive_endpoint: Option<Url>,

    /// Bearer key for the archival API.
    #[arg(long, env = "ARCHIVE_API_KEY", hide_env_values = true)]
    archive_api_key: Option<String>,

    /// Project id sent as `X-Project-Id` to the archival API.
    #[arg(long, env = "ARCHIVE_PROJECT_ID")]
    archive_project_id: Option<String>,
}

impl Args {
    /// Archival is enabled only when both the endpoint and the key are set.
    fn archive_config(&self) -> Option<ArchiveConfig> {
        match (&self.archive_endpoint, &self.archive_api_key) {
            (Some(endpoint), Some(api_key)) => Some(ArchiveConfig {
                endpoint: endpoint.clone(),
                api_key: api_key.clone(),
                project_id: self.archive_project_id.clone(),
            }),
            (None, None) => None,
            _ => {
                warn!("archival needs both ARCHIVE_ENDPOINT and ARCHIVE_API_KEY; disabled");
                None
            }
        }
    }

    fn into_config(self) -> ApiConfig {
        let archive = self.archive_config();
        ApiConfig {
            bind_addr: self.bind_addr,
            backend_url: self.backend_url,
            backend_timeout: Duration::from_secs(self.backend_timeout_secs),
            history_limit: self.history_limit,
            stream: StreamPolicy {
                granularity: self.chunking,
                chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            },
            allowed_origins: parse_origins(&self.allowed_origins),
            archive,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,leadchat_api=debug,leadchat_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let config = args.into_config();

    info!(
        backend_url = %config.backend_url,
        history_limit = config.history_limit,
        chunk_delay_ms = config.stream.chunk_delay.as_millis() as u64,
        chunking = ?config.stream.granularity,
        archive = config.archive.is_some(),
        "starting leadchat_server"
    );

    let state = leadchat_api::AppState::from_config(config.clone())?;
    let app = leadchat_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
