//! # leadchat_api
//!
//! HTTP API library for Leadchat.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use leadchat_core::archive::ArchiveClient;
use leadchat_core::backend::{CompletionBackend, HttpBackend, RelayError};
use leadchat_core::lead::{LeadSink, LogLeadSink};
use leadchat_core::trigger::{ContactIntentClassifier, PhraseClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{chat, contact, health};

/// Shared application state passed to all handlers.
///
/// Every collaborator is built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Upstream completion service.
    pub backend: Arc<dyn CompletionBackend>,
    /// Contact-form trigger.
    pub classifier: Arc<dyn ContactIntentClassifier>,
    /// Destination for submitted leads.
    pub leads: Arc<dyn LeadSink>,
    /// Conversation archival, when configured.
    pub archive: Option<ArchiveClient>,
}

impl AppState {
    /// Builds the production collaborators from configuration.
    pub fn from_config(config: ApiConfig) -> Result<Self, RelayError> {
        let backend = HttpBackend::new(&config.backend_url, config.backend_timeout)?;
        let archive = config
            .archive
            .clone()
            .map(|archive| ArchiveClient::new(reqwest::Client::new(), archive));

        Ok(Self {
            config,
            backend: Arc::new(backend),
            classifier: Arc::new(PhraseClassifier),
            leads: Arc::new(LogLeadSink),
            archive,
        })
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins = origin_header_values(allowed_origins);
    if origins.is_empty() {
        warn!("no configured CORS origin is usable; cross-origin requests will be refused");
    }
    layer.allow_origin(AllowOrigin::list(origins))
}

fn origin_header_values(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, "ignoring CORS origin: {e}");
                None
            }
        })
        .collect()
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_CHAT, post(chat::chat_handler))
        .route(routes::POST_CONTACT, post(contact::contact_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
