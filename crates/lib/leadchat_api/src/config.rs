//! API server configuration.

use std::time::Duration;

use leadchat_core::archive::ArchiveConfig;
use leadchat_core::backend::DEFAULT_TIMEOUT;
use leadchat_core::history::DEFAULT_HISTORY_LIMIT;
use leadchat_core::stream::StreamPolicy;
use url::Url;

/// Default listener address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3000").
    pub bind_addr: String,
    /// Base URL of the upstream chat backend. There is no default.
    pub backend_url: Url,
    /// Timeout for one upstream completion call.
    pub backend_timeout: Duration,
    /// Number of most recent messages forwarded upstream.
    pub history_limit: usize,
    /// Chunking and pacing of the simulated stream.
    pub stream: StreamPolicy,
    /// CORS origins; empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Conversation archival, when configured.
    pub archive: Option<ArchiveConfig>,
}

impl ApiConfig {
    /// Configuration with defaults for everything but the backend URL.
    ///
    /// | Setting           | Default            |
    /// |-------------------|--------------------|
    /// | `bind_addr`       | `127.0.0.1:3000`   |
    /// | `backend_timeout` | 60s                |
    /// | `history_limit`   | 12                 |
    /// | `stream`          | word chunks, 20ms  |
    pub fn new(backend_url: Url) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            backend_url,
            backend_timeout: DEFAULT_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
            stream: StreamPolicy::default(),
            allowed_origins: Vec::new(),
            archive: None,
        }
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
