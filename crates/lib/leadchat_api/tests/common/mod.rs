//! Shared fixtures for the API integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::{DateTime, Utc};
use leadchat_api::AppState;
use leadchat_api::config::ApiConfig;
use leadchat_core::backend::{CompletionBackend, RelayError};
use leadchat_core::lead::{ContactLead, LeadError, LeadSink, LogLeadSink};
use leadchat_core::message::Message;
use leadchat_core::stream::{ChunkGranularity, StreamPolicy};
use leadchat_core::trigger::PhraseClassifier;
use tower::ServiceExt;

/// Backend that answers with a fixed reply and records what it was sent.
#[derive(Default)]
pub struct ScriptedBackend {
    pub reply: String,
    pub seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, messages: &[Message]) -> Result<String, RelayError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

/// Backend that always fails as if the upstream were down.
pub struct DownBackend;

#[async_trait]
impl CompletionBackend for DownBackend {
    async fn complete(&self, _messages: &[Message]) -> Result<String, RelayError> {
        Err(RelayError::Unreachable("connection refused".into()))
    }
}

/// Lead sink that keeps every submission in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub leads: Mutex<Vec<ContactLead>>,
}

#[async_trait]
impl LeadSink for RecordingSink {
    async fn submit(
        &self,
        lead: &ContactLead,
        _received_at: DateTime<Utc>,
    ) -> Result<(), LeadError> {
        self.leads.lock().unwrap().push(lead.clone());
        Ok(())
    }
}

/// Config pointing at an unused address, with no stream pacing.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::new("http://127.0.0.1:9".parse().unwrap());
    config.stream = StreamPolicy {
        granularity: ChunkGranularity::Word,
        chunk_delay: Duration::ZERO,
    };
    config
}

pub fn state_with(backend: Arc<dyn CompletionBackend>) -> AppState {
    AppState {
        config: test_config(),
        backend,
        classifier: Arc::new(PhraseClassifier),
        leads: Arc::new(LogLeadSink),
        archive: None,
    }
}

pub fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.expect("request")
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Parse an event-stream body into its JSON events.
pub fn parse_events(body: &str) -> Vec<serde_json::Value> {
    assert!(body.ends_with("\n\n"), "body must end with a frame terminator");
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            let data = frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("unframed chunk: {frame:?}"));
            serde_json::from_str(data).expect("event JSON")
        })
        .collect()
}

pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().expect("type tag").to_string())
        .collect()
}

pub fn chat_body(messages: &[(&str, &str)]) -> String {
    let messages: Vec<serde_json::Value> = messages
        .iter()
        .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
        .collect();
    serde_json::json!({ "messages": messages }).to_string()
}
