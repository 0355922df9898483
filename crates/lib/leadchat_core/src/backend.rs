//! Backend relay: one blocking completion call to the upstream chat service.
//!
//! The upstream contract is `POST <base>/chat` with `{ messages }`, answered
//! by a JSON object carrying the reply in `content` (or `message`). There is
//! no retry; any failure is surfaced to the caller before streaming starts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::message::Message;

/// Reply used when the backend answers without any text.
pub const PLACEHOLDER_REPLY: &str = "No response received.";

/// Default upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while relaying a conversation upstream.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed backend reply: {0}")]
    MalformedReply(String),

    #[error("Token stream failed: {0}")]
    Stream(String),
}

/// A completion service that turns a conversation into one assistant reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, RelayError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

/// Reply body of the upstream `/chat` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct BackendReply {
    pub content: Option<String>,
    pub message: Option<String>,
}

impl BackendReply {
    /// Reply text: `content`, then `message`, then the placeholder.
    /// Empty strings count as absent.
    pub fn into_text(self) -> String {
        self.content
            .filter(|s| !s.is_empty())
            .or(self.message.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| PLACEHOLDER_REPLY.to_string())
    }
}

/// reqwest-backed [`CompletionBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    chat_url: String,
}

impl HttpBackend {
    /// Create a backend for the service at `base_url` with a request timeout.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Unreachable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a backend sharing an existing client.
    pub fn with_client(client: Client, base_url: &Url) -> Self {
        Self {
            client,
            chat_url: chat_url(base_url),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

fn chat_url(base_url: &Url) -> String {
    format!("{}/chat", base_url.as_str().trim_end_matches('/'))
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, messages: &[Message]) -> Result<String, RelayError> {
        debug!(url = %self.chat_url, count = messages.len(), "relaying conversation");

        let resp = self
            .client
            .post(&self.chat_url)
            .json(&ChatRequest { messages })
            .send()
            .await
            .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RelayError::Status { status, body });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Unreachable(format!("Failed to read reply: {e}")))?;
        let reply: BackendReply = serde_json::from_slice(&bytes)
            .map_err(|e| RelayError::MalformedReply(e.to_string()))?;

        Ok(reply.into_text())
    }
}
