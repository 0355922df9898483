//! Chat relay handler.
//!
//! `POST /chat`:
//! 1. Validates the body and trims the history
//! 2. Relays the conversation to the backend (one blocking call)
//! 3. Archives the newest exchange in the background when a session id is
//!    supplied
//! 4. Pseudo-streams the reply as an event stream, offering the contact
//!    form when the classifier asks for it
//!
//! Everything that can fail happens before the first byte is written.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use leadchat_core::archive::{ArchiveClient, ArchivedMessage};
use leadchat_core::history::{message_id, normalize_message, trim_history};
use leadchat_core::message::{Message, Role, last_user_text};
use leadchat_core::stream::{emit_turn, paced_tokens, sse_frames};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Raw client messages; normalised by the history trimmer.
    pub messages: Vec<Value>,
    /// Archive the turn under this session when archival is configured.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /chat`: relay the conversation and stream the reply.
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    let received_at = Utc::now();
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    if request.messages.is_empty() {
        return Err(AppError::Validation("messages must not be empty".into()));
    }

    let conversation = trim_history(&request.messages, state.config.history_limit);
    debug!(
        received = request.messages.len(),
        forwarded = conversation.len(),
        "trimmed chat history"
    );

    let reply = match state.backend.complete(&conversation).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "backend relay failed");
            return Err(e.into());
        }
    };
    info!(chars = reply.len(), "backend reply received");

    if let (Some(archive), Some(session_id)) = (&state.archive, request.session_id) {
        let turn = exchange_to_archive(&request.messages, received_at, &reply, Utc::now());
        spawn_archive(archive.clone(), session_id, turn);
    }

    let user_text = last_user_text(&conversation).to_string();
    let events = emit_turn(
        paced_tokens(&reply, state.config.stream),
        user_text,
        state.classifier.clone(),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(sse_frames(events)))
        .map_err(|e| AppError::Internal(format!("Response build failed: {e}")))
}

/// The latest user message and the reply. Earlier turns were archived by the
/// requests that produced them. The user message keeps its client id when it
/// has one.
fn exchange_to_archive(
    raw_messages: &[Value],
    asked_at: DateTime<Utc>,
    reply: &str,
    replied_at: DateTime<Utc>,
) -> Vec<ArchivedMessage> {
    let latest_user = raw_messages
        .iter()
        .rev()
        .map(|raw| (raw, normalize_message(raw)))
        .find(|(_, message)| message.role == Role::User);

    let mut exchange = Vec::with_capacity(2);
    if let Some((raw, message)) = latest_user {
        exchange.push(match message_id(raw) {
            Some(id) => ArchivedMessage::with_id(id, &message, asked_at),
            None => ArchivedMessage::from_message(&message, asked_at),
        });
    }
    exchange.push(ArchivedMessage::from_message(
        &Message::assistant(reply),
        replied_at,
    ));
    exchange
}

/// Store the exchange without blocking the turn.
fn spawn_archive(archive: ArchiveClient, session_id: String, messages: Vec<ArchivedMessage>) {
    tokio::spawn(async move {
        if let Err(e) = archive.store_conversation(&session_id, &messages).await {
            warn!(session_id = %session_id, "conversation archival failed: {e}");
        }
    });
}
