//! Conversation archival client.
//!
//! Posts finished conversations to an external archival API:
//! `POST <endpoint>/conversations` with `{ sessionId, messages }`, a bearer
//! key, and an optional `X-Project-Id` header.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::message::Message;

/// Errors that can occur while archiving a conversation.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Archive returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Connection settings for the archival API.
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub project_id: Option<String>,
}

/// One archived message.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivedMessage {
    pub id: String,
    pub content: String,
    pub role: String,
    pub timestamp: String,
}

impl ArchivedMessage {
    /// Archive `message` under a freshly generated id.
    pub fn from_message(message: &Message, at: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), message, at)
    }

    /// Archive `message` under the id the client already gave it.
    pub fn with_id(id: impl Into<String>, message: &Message, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content: message.content.clone(),
            role: message.role.as_str().to_string(),
            timestamp: at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreRequest<'a> {
    session_id: &'a str,
    messages: &'a [ArchivedMessage],
}

/// Client for the archival API.
#[derive(Clone, Debug)]
pub struct ArchiveClient {
    client: Client,
    config: ArchiveConfig,
}

impl ArchiveClient {
    pub fn new(client: Client, config: ArchiveConfig) -> Self {
        Self { client, config }
    }

    fn conversations_url(&self) -> String {
        format!(
            "{}/conversations",
            self.config.endpoint.as_str().trim_end_matches('/')
        )
    }

    /// Store a conversation and return the API's JSON reply.
    pub async fn store_conversation(
        &self,
        session_id: &str,
        messages: &[ArchivedMessage],
    ) -> Result<serde_json::Value, ArchiveError> {
        let url = self.conversations_url();
        debug!(%url, session_id, count = messages.len(), "archiving conversation");

        let mut req = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&StoreRequest {
                session_id,
                messages,
            });
        if let Some(project_id) = &self.config.project_id {
            req = req.header("X-Project-Id", project_id);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ArchiveError::Status { status, body });
        }

        Ok(resp.json().await?)
    }
}
